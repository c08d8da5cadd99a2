pub mod commands;
pub mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a crawl worker
    Run {
        /// Configuration profile to use (defaults to the default config)
        #[arg(short, long)]
        profile: Option<String>,

        /// Override the configured role flag: 1 = master, 0 = slave
        #[arg(short, long)]
        role: Option<i64>,
    },

    /// Push a seed list task onto the master queue
    Seed {
        /// First list-page URL of the site
        #[arg(required = true)]
        url: String,

        /// Site identifier, scopes the dedup namespace
        #[arg(long)]
        site_id: String,

        /// Parsing template identifier for the site
        #[arg(long)]
        template_id: String,

        /// Destination collection for detail records
        #[arg(long)]
        table: String,

        /// Configuration profile to use
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Manage configuration profiles
    Config {
        /// Profile name to manage
        #[arg(required = false)]
        profile: Option<String>,

        /// List all available profiles
        #[arg(short, long)]
        list: bool,
    },
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Process the command
pub async fn process_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run { profile, role } => commands::run(profile, role).await,
        Commands::Seed {
            url,
            site_id,
            template_id,
            table,
            profile,
        } => {
            info!("Seeding list task for {}", url);
            commands::seed(url, site_id, template_id, table, profile).await
        }
        Commands::Config { profile, list } => {
            if list {
                commands::list_profiles().await
            } else if let Some(profile_name) = profile {
                commands::manage_profile(profile_name).await
            } else {
                commands::show_config().await
            }
        }
    }
}
