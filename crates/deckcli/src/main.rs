//! deckcli - screen recording sessions for devices under test
//!
//! Subcommands:
//! - `deckcli record <serial>` - Record a device for a fixed window, then pull and publish
//! - `deckcli check <serial>` - Verify a device answers over adb

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "deckcli")]
#[command(about = "Screen recording sessions for devices under test")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a device screen, then pull and publish the clip
    Record {
        /// Device serial (as shown by `adb devices`)
        serial: String,

        /// Recording window in seconds; Ctrl-C ends it early
        #[arg(short, long, default_value = "30")]
        duration: u64,

        /// Config file (TOML); defaults plus environment otherwise
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Local directory for pulled recordings
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Upload endpoint; omit to archive locally
        #[arg(long)]
        upload_url: Option<String>,

        /// adb binary to use instead of whatever is on PATH
        #[arg(long)]
        adb: Option<PathBuf>,
    },

    /// Check that a device answers over adb
    Check {
        /// Device serial
        serial: String,

        /// adb binary to use instead of whatever is on PATH
        #[arg(long)]
        adb: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    match cli.command {
        Commands::Record {
            serial,
            duration,
            config,
            output_dir,
            upload_url,
            adb,
        } => {
            commands::record(
                &serial,
                duration,
                config.as_deref(),
                output_dir,
                upload_url,
                adb,
            )
            .await?;
        }
        Commands::Check { serial, adb } => {
            commands::check(&serial, adb).await?;
        }
    }

    Ok(())
}
