use anyhow::Result;
use tracing::{error, info};

mod cli;
mod error;
mod fetch;
mod metrics;
mod proxy;
mod storage;
#[cfg(test)]
mod testutil;
mod utils;
mod worker;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = cli::parse_args();

    // Initialize logging; verbose runs keep a file copy by default
    let log_file = args.log_file.clone().or_else(|| {
        args.verbose.then(utils::default_log_file)
    });
    utils::init_logging(args.verbose, log_file)?;

    info!("Starting fleet-crawler v{}", env!("CARGO_PKG_VERSION"));

    // Process commands
    match cli::process_command(args).await {
        Ok(_) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {}", e);
            Err(e)
        }
    }
}
