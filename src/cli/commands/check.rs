use anyhow::{Result, bail};

use super::CliContext;

/// Report whether the configured toolchain is usable
pub async fn execute_check_command(ctx: &CliContext) -> Result<()> {
    let orchestrator = ctx.flasher.orchestrator().await;
    let toolchain = orchestrator.toolchain();

    println!("🔧 Platform: {}", toolchain.platform());
    match toolchain.executable() {
        Some(path) => println!("📁 Executable: {}", path.display()),
        None => println!("📁 Executable: <not configured>"),
    }
    println!("📄 Settings: {}", ctx.store.path().display());

    let diagnostics = orchestrator.check_setup_errors().await;
    if diagnostics.is_empty() {
        println!("✅ Toolchain is ready");
        return Ok(());
    }

    for diagnostic in &diagnostics {
        println!("❌ [{}] {}", diagnostic.code(), diagnostic);
    }
    bail!("Toolchain setup has {} problem(s)", diagnostics.len())
}
