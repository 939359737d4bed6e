//! Intel HEX record validation
//!
//! Only checks that a file is a well-formed image; the toolchain does the
//! actual programming.

use std::fmt;

const RECORD_DATA: u8 = 0x00;
const RECORD_EOF: u8 = 0x01;
const RECORD_EXTENDED_SEGMENT: u8 = 0x02;
const RECORD_START_SEGMENT: u8 = 0x03;
const RECORD_EXTENDED_LINEAR: u8 = 0x04;
const RECORD_START_LINEAR: u8 = 0x05;

/// Summary of a valid Intel HEX image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexSummary {
    pub records: usize,
    pub data_bytes: usize,
    /// Lowest and one-past-highest absolute address written
    pub address_range: Option<(u32, u32)>,
}

/// Why a file is not a valid Intel HEX image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexError {
    /// 1-based line number
    pub line: usize,
    pub reason: String,
}

impl fmt::Display for HexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

impl std::error::Error for HexError {}

/// Parse and checksum every record in `content`
pub fn validate(content: &[u8]) -> Result<HexSummary, HexError> {
    let text = std::str::from_utf8(content).map_err(|_| HexError {
        line: 1,
        reason: "not ASCII text".to_string(),
    })?;

    let mut records = 0;
    let mut data_bytes = 0;
    let mut base: u32 = 0;
    let mut range: Option<(u32, u32)> = None;
    let mut seen_eof = false;

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let fail = |reason: &str| HexError {
            line: line_no,
            reason: reason.to_string(),
        };

        if seen_eof {
            return Err(fail("record after end-of-file record"));
        }

        let body = line
            .strip_prefix(':')
            .ok_or_else(|| fail("missing ':' start code"))?;
        let bytes = decode_hex(body).ok_or_else(|| fail("invalid hex digits"))?;
        if bytes.len() < 5 {
            return Err(fail("record too short"));
        }

        let count = bytes[0] as usize;
        if bytes.len() != count + 5 {
            return Err(fail("byte count does not match record length"));
        }
        let checksum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        if checksum != 0 {
            return Err(fail("checksum mismatch"));
        }

        let offset = u16::from_be_bytes([bytes[1], bytes[2]]) as u32;
        let record_type = bytes[3];
        let data = &bytes[4..4 + count];

        match record_type {
            RECORD_DATA => {
                let start = base.wrapping_add(offset);
                let end = start.saturating_add(count as u32);
                range = Some(match range {
                    Some((lo, hi)) => (lo.min(start), hi.max(end)),
                    None => (start, end),
                });
                data_bytes += count;
            }
            RECORD_EOF => {
                if count != 0 {
                    return Err(fail("end-of-file record carries data"));
                }
                seen_eof = true;
            }
            RECORD_EXTENDED_SEGMENT => {
                let segment = two_byte_payload(data).ok_or_else(|| fail("bad segment record"))?;
                base = (segment as u32) << 4;
            }
            RECORD_EXTENDED_LINEAR => {
                let upper = two_byte_payload(data).ok_or_else(|| fail("bad linear record"))?;
                base = (upper as u32) << 16;
            }
            RECORD_START_SEGMENT | RECORD_START_LINEAR => {
                if count != 4 {
                    return Err(fail("start address record must carry 4 bytes"));
                }
            }
            other => return Err(fail(&format!("unknown record type {:02X}", other))),
        }

        records += 1;
    }

    if !seen_eof {
        return Err(HexError {
            line: text.lines().count().max(1),
            reason: "missing end-of-file record".to_string(),
        });
    }

    Ok(HexSummary {
        records,
        data_bytes,
        address_range: range,
    })
}

fn two_byte_payload(data: &[u8]) -> Option<u16> {
    match data {
        [hi, lo] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

fn decode_hex(body: &str) -> Option<Vec<u8>> {
    if body.len() % 2 != 0 || !body.is_ascii() {
        return None;
    }
    (0..body.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&body[i..i + 2], 16).ok())
        .collect()
}
