// Copyright 2026 Forager Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use forager::config::CrawlConfig;
use forager::crawl::Crawler;
use forager::error::CrawlError;
use forager::events;
use forager::store::PageStore;
use forager::surface::chromium::ChromiumSurface;

#[derive(Parser)]
#[command(
    name = "forager",
    about = "Forager — headless search harvester: collect organic result links, then archive each page's rendered HTML",
    version,
    after_help = "Saved pages land in --out-dir as <prefix>_<n>.html, indexed by manifest.jsonl."
)]
struct Cli {
    /// Search query term(s)
    query: String,

    /// Number of result pages to scan before visiting links
    #[arg(long, default_value = "3")]
    max_pages: u32,

    /// Directory saved pages and the manifest are written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// File name prefix for saved pages
    #[arg(long, default_value = "page")]
    prefix: String,

    /// Pacing delay between a result batch and the next pagination step (ms)
    #[arg(long, default_value = "1500")]
    delay_ms: u64,

    /// Watchdog bound on each wait for a browser event (ms)
    #[arg(long, default_value = "30000")]
    timeout_ms: u64,

    /// Search endpoint the query is appended to
    #[arg(long, default_value = forager::config::DEFAULT_SEARCH_ENDPOINT)]
    search_url: String,

    /// Path to the Chromium/Chrome binary (otherwise auto-discovered)
    #[arg(long)]
    chromium: Option<PathBuf>,

    /// Enable verbose/debug logging
    #[arg(long, short)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short)]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    // Distinct exit codes per fault class: 2 configuration (shared with
    // clap's own usage errors), 3 session/stall, 1 anything else.
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        let code = e
            .downcast_ref::<CrawlError>()
            .map_or(1, CrawlError::exit_code);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = CrawlConfig::new(cli.query);
    config.search_endpoint = cli.search_url;
    config.max_pages = cli.max_pages;
    config.page_delay = Duration::from_millis(cli.delay_ms);
    config.event_timeout = Duration::from_millis(cli.timeout_ms);
    config.out_dir = cli.out_dir;
    config.file_prefix = cli.prefix;

    // Surface configuration faults before any engine work begins.
    let target = config.search_url()?;
    tracing::debug!("initial navigation target: {target}");

    let (tx, rx) = events::channel();
    let surface = ChromiumSurface::launch(cli.chromium, tx.clone())
        .await
        .map_err(|e| CrawlError::Session(format!("{e:#}")))?;

    let store = PageStore::new(&config.out_dir, &config.file_prefix);
    let mut crawler = Crawler::new(surface, store, config, tx);
    let result = crawler.run(rx).await;

    // Dropping the browser leaves the renderer process behind; tear it down
    // whether or not the crawl succeeded.
    if let Err(e) = crawler.into_surface().shutdown().await {
        tracing::warn!("browser teardown failed: {e:#}");
    }
    let report = result?;

    println!(
        "scanned {} result pages, collected {} links, saved {}, skipped {}",
        report.pages_scanned, report.links_collected, report.pages_saved, report.links_skipped
    );
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let default = if verbose {
        "forager=debug"
    } else if quiet {
        "forager=error"
    } else {
        "forager=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
