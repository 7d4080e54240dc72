use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "exposcrape")]
#[command(about = "Extracts company records from exhibitor and vendor directory websites")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Listing page to scrape (exhibitor/vendor directory URL)
    pub url: Option<String>,

    /// Create default configuration file at ./config/exposcrape.toml
    #[arg(long, global = true)]
    pub init: bool,

    /// Configuration file (defaults to ./config/exposcrape.toml, then built-in defaults)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the per-site <site>_companies.json/.csv files
    #[arg(long, value_name = "DIR", default_value = ".", global = true)]
    pub output_dir: PathBuf,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub visible: bool,

    /// Browser operation timeout in seconds (overrides config)
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Scrape a saved HTML page instead of launching a browser; the URL is
    /// used as the page's address
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Verbose logging (use -v for DEBUG, -vv for everything)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print statistics for the records stored for a site
    Stats {
        /// Listing URL the records were scraped from
        url: String,
    },
    /// Re-export stored records to a CSV file plus a sibling .json
    Export {
        /// Listing URL the records were scraped from
        url: String,
        /// Destination CSV path
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
    /// Delete all records stored for a site
    Clear {
        /// Listing URL the records were scraped from
        url: String,
    },
}
