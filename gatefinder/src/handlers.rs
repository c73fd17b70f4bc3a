use anyhow::{Context, Result};
use chrono::Local;
use clap::ArgMatches;
use colored::Colorize;
use gatefinder_core::report::{generate_summary, write_report};
use gatefinder_core::{DetectorConfig, DispatchSummary, Dispatcher, ResultStore, Snapshot};
use gatefinder_scanner::{CrawlMode, Crawler, CrawlerOptions, PageFactory, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Events buffered between the crawl workers and the dispatcher.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Install the fmt subscriber. `RUST_LOG` overrides the verbosity flag.
pub fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "gatefinder={level},gatefinder_core={level},gatefinder_scanner={level}"
        ))
    });

    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Parse a start URL, trying to add http:// if needed
pub fn parse_target(raw: &str) -> Result<Url, String> {
    let raw = raw.trim();
    if let Ok(url) = Url::parse(raw)
        && url.has_host()
    {
        return Ok(url);
    }

    let with_scheme = format!("http://{}", raw);
    match Url::parse(&with_scheme) {
        Ok(url) if url.has_host() => Ok(url),
        _ => Err(format!("'{}' is not a crawlable URL", raw)),
    }
}

/// Path component of a URL for compact progress output.
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path();
            if path.is_empty() { "/".to_string() } else { path.to_string() }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Everything a scan needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub url: Url,
    pub threads: usize,
    pub crawler: CrawlerOptions,
    pub detector: DetectorConfig,
}

impl ScanSettings {
    pub fn from_matches(args: &ArgMatches) -> Result<Self> {
        let url = args
            .get_one::<Url>("url")
            .cloned()
            .context("--url is required")?;
        let mode = args
            .get_one::<String>("mode")
            .and_then(|m| m.parse::<CrawlMode>().ok())
            .unwrap_or(CrawlMode::Static);
        let threads = *args.get_one::<usize>("threads").unwrap_or(&10);
        let depth = *args.get_one::<usize>("depth").unwrap_or(&3);
        let timeout = *args.get_one::<u64>("timeout").unwrap_or(&30);
        let request_timeout = *args.get_one::<u64>("request-timeout").unwrap_or(&30);
        let settle_ms = *args.get_one::<u64>("settle-ms").unwrap_or(&2000);
        let max_in_flight = *args.get_one::<usize>("max-in-flight").unwrap_or(&32);
        let cap = *args.get_one::<usize>("cap").unwrap_or(&500);
        let output = args
            .get_one::<String>("output")
            .map(String::as_str)
            .unwrap_or("results");
        let output_dir = PathBuf::from(shellexpand::tilde(output).as_ref());

        let crawler = CrawlerOptions {
            max_depth: depth,
            timeout_secs: request_timeout,
            mode,
            ..CrawlerOptions::default()
        };
        let detector = DetectorConfig::default()
            .with_host_cap(cap)
            .with_task_timeout(Duration::from_secs(timeout))
            .with_settle_delay(Duration::from_millis(settle_ms))
            .with_max_in_flight(max_in_flight)
            .with_output_dir(output_dir);

        Ok(Self {
            url,
            threads,
            crawler,
            detector,
        })
    }
}

/// Result of a completed scan.
#[derive(Debug)]
pub struct ScanOutcome {
    pub emitted: usize,
    pub summary: DispatchSummary,
    pub snapshot: Snapshot,
    pub report: PathBuf,
}

/// Crawl, classify and write the report. The report is written only after
/// the crawl has returned and every detection task has finished.
pub async fn run_scan(
    settings: &ScanSettings,
    progress: Option<ProgressCallback>,
) -> Result<ScanOutcome> {
    let store = Arc::new(ResultStore::new(settings.detector.host_cap));
    let mut dispatcher = Dispatcher::new(store.clone(), &settings.detector);
    if settings.crawler.mode == CrawlMode::Headless {
        dispatcher = dispatcher.with_page_factory(launch_browser(&settings.detector)?);
    }

    let mut crawler = Crawler::new(settings.crawler.clone()).context("building crawler")?;
    if let Some(callback) = progress {
        crawler = crawler.with_progress_callback(callback);
    }

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let detection = tokio::spawn(dispatcher.run(rx));

    // the crawl owns the only sender, so its return closes the channel
    let crawled = crawler.crawl(settings.url.as_str(), settings.threads, tx).await;
    let summary = detection.await.context("detection tasks panicked")?;
    let emitted = crawled.with_context(|| format!("crawling {}", settings.url))?;
    info!(
        "Detection finished: {} admitted, {} login pages",
        summary.admitted, summary.login_pages
    );

    let snapshot = store.snapshot();
    let report = write_report(
        &snapshot,
        settings.url.as_str(),
        &settings.detector.output_dir,
        Local::now(),
    )
    .with_context(|| {
        format!(
            "writing report to {}",
            settings.detector.output_dir.display()
        )
    })?;

    Ok(ScanOutcome {
        emitted,
        summary,
        snapshot,
        report,
    })
}

#[cfg(feature = "headless")]
fn launch_browser(config: &DetectorConfig) -> Result<Arc<dyn PageFactory>> {
    let browser = gatefinder_scanner::HeadlessBrowser::launch(config.task_timeout)
        .context("launching headless chrome")?;
    Ok(Arc::new(browser))
}

#[cfg(not(feature = "headless"))]
fn launch_browser(_config: &DetectorConfig) -> Result<Arc<dyn PageFactory>> {
    anyhow::bail!("headless mode requires gatefinder to be built with the `headless` feature")
}

fn scan_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("starting crawl");
    spinner
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_task_stats(summary: &DispatchSummary) {
    if summary.timed_out == 0 && summary.failed == 0 && summary.dropped == 0 {
        return;
    }
    println!(
        "  {} timed out, {} failed, {} past the per-host cap",
        summary.timed_out.to_string().yellow(),
        summary.failed.to_string().red(),
        summary.dropped
    );
    println!();
}

pub async fn handle_scan(args: &ArgMatches, quiet: bool) -> Result<()> {
    let settings = ScanSettings::from_matches(args)?;

    if !quiet {
        print_divider();
        println!(
            "{} {}",
            "  SCANNING".bright_white().bold(),
            settings.url.as_str().bright_white()
        );
        print_divider();
        println!("{} Mode: {:?}", "→".blue(), settings.crawler.mode);
        println!("{} Workers: {}", "→".blue(), settings.threads);
        println!("{} Max depth: {}", "→".blue(), settings.crawler.max_depth);
        println!(
            "{} Pages per host: {}",
            "→".blue(),
            settings.detector.host_cap
        );
        println!();
    }

    let spinner = (!quiet).then(scan_spinner);
    let progress = spinner.clone().map(|pb| {
        Arc::new(move |worker_id: usize, url: String| {
            pb.set_message(format!("[{}] {}", worker_id, extract_url_path(&url)));
        }) as ProgressCallback
    });

    let outcome = run_scan(&settings, progress).await;
    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }
    let outcome = outcome?;

    println!("\n{} Scan complete! {} pages crawled\n", "✓".green().bold(), outcome.emitted);
    print!("{}", generate_summary(&outcome.snapshot));
    print_task_stats(&outcome.summary);
    println!(
        "{} Report: {}",
        "✓".green().bold(),
        outcome.report.display().to_string().bright_white()
    );

    Ok(())
}
