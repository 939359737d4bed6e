use anyhow::Result;

use marlin_flasher::cli::{self, Cli};
use marlin_flasher::utils::logging::{init_cli_logging, init_service_logging, verbosity_level};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    if cli.log_json {
        init_service_logging(
            true,
            cli.log_file.as_deref(),
            Some(verbosity_level(cli.verbose, cli.quiet)),
        )?;
    } else {
        init_cli_logging(cli.verbose, cli.quiet)?;
    }

    cli::run(cli).await
}
