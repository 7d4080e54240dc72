use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use exposcrape::browser::ChromeSurface;
use exposcrape::cli::{Cli, Commands};
use exposcrape::config::{AppConfig, BrowserConfig, Heuristics};
use exposcrape::export::print_summary;
use exposcrape::logger::{self, VerbosityLevel};
use exposcrape::session::{RunSummary, ScraperSession};
use exposcrape::surface::{HtmlSurface, Surface};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle --init flag first (before any other processing)
    if cli.init {
        let result = match &cli.config {
            Some(path) => AppConfig::create_default_config_at(path),
            None => AppConfig::create_default_config(),
        };
        match result {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize selectors and patterns, then run exposcrape again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    let verbosity = VerbosityLevel::from_verbose_count(cli.verbose);
    logger::init_logging(verbosity, cli.log_file.as_deref())?;

    let mut app_config = match AppConfig::load_or_default(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    if cli.visible {
        app_config.browser.headless = false;
    }
    if let Some(secs) = cli.timeout_secs {
        app_config.browser.timeout_secs = secs.max(1);
    }

    let mut heuristics = Heuristics::compile(&app_config)?;
    if cli.snapshot.is_some() {
        heuristics = heuristics.without_pauses();
    }
    let heuristics = Arc::new(heuristics);

    match cli.command {
        Some(Commands::Stats { url }) => {
            let session = ScraperSession::open(heuristics, &url, &cli.output_dir)?;
            let paths = session.paths();
            print_summary(&url, &session.stats(), &paths.document, &paths.columnar);
            Ok(())
        }
        Some(Commands::Export { url, output }) => {
            let session = ScraperSession::open(heuristics, &url, &cli.output_dir)?;
            session.export(&output)?;
            println!(
                "✅ Exported {} companies to {}",
                session.records().len(),
                output.display()
            );
            Ok(())
        }
        Some(Commands::Clear { url }) => {
            let mut session = ScraperSession::open(heuristics, &url, &cli.output_dir)?;
            let removed = session.records().len();
            session.clear_all()?;
            println!("✅ Removed {} stored companies for {}", removed, url);
            Ok(())
        }
        None => {
            let Some(url) = cli.url else {
                eprintln!("❌ A listing URL is required. Run with --help for usage.");
                std::process::exit(2);
            };
            let browser_config = app_config.browser.clone();
            let output_dir = cli.output_dir.clone();
            let snapshot = cli.snapshot.clone();

            let outcome = tokio::task::spawn_blocking(move || {
                scrape(heuristics, &url, &output_dir, snapshot.as_deref(), &browser_config)
            })
            .await
            .map_err(|e| anyhow!("Scrape task panicked: {}", e))?;

            if let Err(e) = outcome {
                error!("Scrape failed: {:#}", e);
                eprintln!("❌ {:#}", e);
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// Run one scrape on the blocking pool: open the session, pick a surface,
/// run, flush and print the summary.
fn scrape(
    heuristics: Arc<Heuristics>,
    url: &str,
    output_dir: &Path,
    snapshot: Option<&Path>,
    browser_config: &BrowserConfig,
) -> Result<RunSummary> {
    let session = ScraperSession::open(heuristics, url, output_dir)
        .with_context(|| format!("Failed to open store in {}", output_dir.display()))?;
    let mut session = session.with_progress(logger::progress_bar(0));

    let summary = match snapshot {
        Some(path) => {
            info!("Scraping snapshot {} as {}", path.display(), url);
            let surface = HtmlSurface::from_file(url, path)?;
            run_session(&mut session, &surface)?
        }
        None => {
            let surface = ChromeSurface::launch(browser_config)?;
            run_session(&mut session, &surface)?
        }
    };

    let document: PathBuf = session.paths().document.clone();
    let columnar: PathBuf = session.paths().columnar.clone();
    let stats = session.finish()?;
    print_summary(url, &stats, &document, &columnar);
    Ok(summary)
}

fn run_session(session: &mut ScraperSession, surface: &dyn Surface) -> Result<RunSummary> {
    let summary = session.run(surface)?;
    info!(
        "Run complete ({}): {} visited, {} new, {} duplicates, {} failed, {} stored",
        summary.strategy,
        summary.counts.visited,
        summary.counts.accepted,
        summary.counts.duplicates,
        summary.counts.failed,
        summary.total_stored
    );
    Ok(summary)
}
