//! Cost Metrics Operator CLI
//!
//! A command-line tool for inspecting report archives, listing pending
//! reports and running packaging or retention by hand over the operator's
//! report directories.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{archive, reports, status};
use operator_lib::{dirconfig::DEFAULT_BASE_DIR, DirectoryConfig, OperatorStatus};
use std::path::PathBuf;

const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Cost Metrics Operator CLI
#[derive(Parser)]
#[command(name = "cmm")]
#[command(author, version, about = "CLI for the Cost Metrics Operator", long_about = None)]
pub struct Cli {
    /// Base directory of the report directories (can also be set via COSTMGMT_BASE_DIR)
    #[arg(long, env = "COSTMGMT_BASE_DIR")]
    pub base_dir: Option<PathBuf>,

    /// Operator API endpoint URL (can also be set via COSTMGMT_API_URL)
    #[arg(long, env = "COSTMGMT_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the manifest and members of an archive
    Inspect {
        /// Path to a .tar.gz archive
        archive: PathBuf,
    },

    /// List report, staged and archived files
    List {
        /// Directory to list
        #[arg(value_enum, default_value = "all")]
        location: reports::Location,
    },

    /// Package the reports directory into archives
    Package {
        /// Copy reports into staging instead of moving them
        #[arg(long)]
        copy: bool,

        /// Size in megabytes above which a report is split
        #[arg(long, default_value_t = operator_lib::status::DEFAULT_MAX_SIZE_MB)]
        max_size_mb: i64,

        /// Cluster identifier written to the manifest
        #[arg(long, env = "CLUSTER_ID", default_value = "unknown")]
        cluster_id: String,
    },

    /// Remove the oldest archive batches
    Trim {
        /// Number of archive batches to keep
        #[arg(long, default_value_t = operator_lib::status::DEFAULT_MAX_REPORTS)]
        max_reports: i64,
    },

    /// Show the status of a running operator
    Status,

    /// Show component health of a running operator
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let file_config = config::Config::load()?;

    let base_dir = cli
        .base_dir
        .or(file_config.base_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_DIR));
    let api_url = cli
        .api_url
        .or(file_config.api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let result = match cli.command {
        Commands::Inspect { archive } => archive::inspect(&archive, cli.format),
        Commands::List { location } => {
            reports::list(&DirectoryConfig::new(&base_dir), location, cli.format)
        }
        Commands::Package {
            copy,
            max_size_mb,
            cluster_id,
        } => {
            let mut status = OperatorStatus::new(cluster_id, env!("CARGO_PKG_VERSION"));
            status.packaging.max_size_mb = Some(max_size_mb);
            reports::package(DirectoryConfig::new(&base_dir), &mut status, copy, cli.format)
        }
        Commands::Trim { max_reports } => {
            let mut status = OperatorStatus::default();
            status.packaging.max_reports = Some(max_reports);
            reports::trim(DirectoryConfig::new(&base_dir), &mut status, cli.format)
        }
        Commands::Status => {
            let client = client::ApiClient::new(&api_url)?;
            status::show_status(&client, cli.format).await
        }
        Commands::Health => {
            let client = client::ApiClient::new(&api_url)?;
            status::show_health(&client, cli.format).await
        }
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}
