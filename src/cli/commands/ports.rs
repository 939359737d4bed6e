//! Ports command implementation - List serial ports a printer may sit on

use anyhow::Result;
use log::{debug, info};

/// USB vendor ids of USB-serial bridges and MCUs found on printer boards
fn is_printer_board_vid(vid: u16) -> bool {
    matches!(
        vid,
        0x2341 |  // Arduino
        0x2A03 |  // Arduino.org
        0x1A86 |  // WCH CH340/CH341
        0x0403 |  // FTDI
        0x10C4 |  // Silicon Labs CP210x
        0x0483 |  // STMicroelectronics (STM32 boards)
        0x1D50 |  // OpenMoko ids used by Marlin USB CDC
        0x16C0 // Teensy
    )
}

/// List serial ports with their USB identity
pub async fn execute_ports_command() -> Result<()> {
    info!("Scanning for serial ports...");

    let ports = serialport::available_ports()?;

    if ports.is_empty() {
        println!("⚠️  No serial ports detected");
        return Ok(());
    }

    println!("🔍 Detected Serial Ports:");
    println!("========================\n");

    for port_info in &ports {
        println!("Port: {}", port_info.port_name);

        match &port_info.port_type {
            serialport::SerialPortType::UsbPort(usb_info) => {
                println!("  Type: USB Serial Port");
                println!("  VID:  0x{:04X}", usb_info.vid);
                println!("  PID:  0x{:04X}", usb_info.pid);

                if let Some(ref manufacturer) = usb_info.manufacturer {
                    println!("  Manufacturer: {}", manufacturer);
                }
                if let Some(ref product) = usb_info.product {
                    println!("  Product: {}", product);
                }

                if is_printer_board_vid(usb_info.vid) {
                    println!("  ✅ Likely printer controller board");
                } else {
                    debug!("Port {} has an unknown vendor id", port_info.port_name);
                }
            }
            serialport::SerialPortType::PciPort => println!("  Type: PCI Serial Port"),
            serialport::SerialPortType::BluetoothPort => println!("  Type: Bluetooth Serial Port"),
            serialport::SerialPortType::Unknown => println!("  Type: Unknown"),
        }

        println!();
    }

    println!("Total ports detected: {}", ports.len());
    Ok(())
}
