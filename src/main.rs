//! Offset Sheet CLI
//!
//! Places a carbon offset order for every row of a CSV spreadsheet and
//! records the results in the same file. Safe to re-run after an
//! interruption: complete rows are skipped.
//!
//! # Usage
//!
//! ```bash
//! LUNE_API_KEY=... cargo run -- -i orders.csv -b "Acme's customers" -l logo.png
//! ```
//!
//! # Environment Variables
//!
//! - `LUNE_API_KEY`: API key (required)
//! - `LUNE_API_URL`: API base URL, only useful against a development instance
//! - `RUST_LOG`: Set to `info` or `debug` to follow progress

use clap::Parser;
use log::info;
use offset_sheet::lune::{DEFAULT_API_URL, DEFAULT_PORTFOLIO};
use offset_sheet::{run_file, LuneClient, LuneSettings, PipelineError, Result, RunConfig};
use std::path::PathBuf;
use std::process;

/// Offset emissions based on spreadsheet contents.
#[derive(Debug, Parser)]
#[command(name = "offset-sheet", version, about, long_about = None)]
struct Cli {
    /// The CSV spreadsheet file to read data from and write back to.
    #[arg(short, long)]
    input_file: PathBuf,

    /// A file with the company logo (.jpg, .jpeg or .png).
    #[arg(short, long)]
    logo_file: Option<PathBuf>,

    /// The aggregate name offsets are purchased and retired under, for
    /// example: "Acme Corporation's customers".
    #[arg(short, long)]
    beneficiary: String,

    /// Allows running against live API keys and live accounts.
    #[arg(long)]
    allow_live: bool,

    /// Label of the bundle portfolio orders are placed against.
    #[arg(long, default_value = DEFAULT_PORTFOLIO)]
    portfolio: String,

    /// Lune API key.
    #[arg(long, env = "LUNE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Lune API base URL.
    #[arg(long, env = "LUNE_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,
}

fn main() {
    env_logger::init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let api_key = cli
        .api_key
        .filter(|k| !k.trim().is_empty())
        .ok_or(PipelineError::MissingApiKey)?;

    let mut config = RunConfig::new(cli.beneficiary).allow_live(cli.allow_live);
    if let Some(logo) = cli.logo_file {
        config = config.with_branding(logo);
    }

    let settings = LuneSettings {
        api_key,
        api_url: cli.api_url,
        portfolio: cli.portfolio,
    };
    let client = LuneClient::new(settings).map_err(PipelineError::Client)?;

    let summary = run_file(&cli.input_file, client, config)?;
    info!("{:?}", summary);
    println!(
        "Success! {} orders placed, {} rows already complete. Find your results in {}.",
        summary.purchased,
        summary.skipped,
        cli.input_file.display()
    );
    Ok(())
}
