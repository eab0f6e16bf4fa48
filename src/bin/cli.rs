//! Slotscan CLI
//!
//! Local execution entry point.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
#[cfg(feature = "chrome")]
use slotscan::browser::ChromeBrowser;
use slotscan::{
    browser::{SnapshotSite, SnapshotSurface},
    error::{AppError, Result},
    models::Config,
    pipeline,
    storage::{LocalStorage, ResultStorage, WriteSummary},
};

/// Slotscan - Scheduling Widget Availability Scanner
#[derive(Parser, Debug)]
#[command(
    name = "slotscan",
    version,
    about = "Finds the earliest day with enough open slots on scheduling widgets"
)]
struct Cli {
    /// Path to the links/config file (JSON, or TOML by extension)
    #[arg(short, long, default_value = "links.json", global = true)]
    config: PathBuf,

    /// Path of the results file
    #[arg(short, long, default_value = "availability.json", global = true)]
    output: PathBuf,

    /// IANA timezone for date math and browser emulation
    #[arg(long, env = "TZ", global = true)]
    timezone: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan every configured link and write the results file
    #[cfg(feature = "chrome")]
    Scan,

    /// Validate the configuration file
    Validate,

    /// Run the locator stages once against saved HTML
    Inspect {
        /// Saved top-level page
        page: PathBuf,

        /// URL the saved page was captured from
        #[arg(long, default_value = "https://snapshot.local/")]
        url: String,

        /// Embedded frame as <url>=<file.html>; repeatable
        #[arg(long = "frame", value_parser = parse_frame)]
        frames: Vec<(String, PathBuf)>,
    },

    /// Summarize the last results file
    Info,
}

fn parse_frame(value: &str) -> std::result::Result<(String, PathBuf), String> {
    match value.rsplit_once('=') {
        Some((url, file)) if !url.is_empty() && !file.is_empty() => {
            Ok((url.to_string(), PathBuf::from(file)))
        }
        _ => Err(format!("expected <url>=<file.html>, got '{value}'")),
    }
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Load, apply the timezone override and validate.
fn load_config(path: &Path, timezone: Option<String>) -> Result<Config> {
    let config = Config::load(path)
        .map_err(|e| AppError::config(format!("{}: {}", path.display(), e)))?
        .with_timezone_override(timezone);
    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }
    Ok(config)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let storage = LocalStorage::new(&cli.output);

    match cli.command {
        #[cfg(feature = "chrome")]
        Command::Scan => {
            let config = load_config(&cli.config, cli.timezone)?;
            log::info!(
                "Loaded {} link(s) from {}",
                config.links.len(),
                cli.config.display()
            );

            let browser = ChromeBrowser::launch(&config.browser, &config.timezone).await?;
            let results = pipeline::run_scan(&config, &browser).await;
            if let Err(e) = browser.close().await {
                log::warn!("Browser shutdown failed: {}", e);
            }

            storage.write_results(&results?).await?;
        }

        Command::Validate => {
            log::info!("Validating {}...", cli.config.display());
            let config = load_config(&cli.config, cli.timezone)?;

            log::info!("✓ {} link(s)", config.links.len());
            for link in &config.links {
                log::info!("  {} -> {}", link.name, link.url);
            }
            log::info!(
                "Timezone {}, minSlots {}, maxMonthsToScan {}",
                config.timezone,
                config.min_slots,
                config.max_months_to_scan
            );
            log::info!(
                "Poll {} x {}ms, click timeout {}ms, navigation timeout {}s",
                config.scan.poll_attempts,
                config.scan.poll_interval_ms,
                config.scan.click_timeout_ms,
                config.scan.navigation_timeout_secs
            );
            log::info!("All validations passed!");
        }

        Command::Inspect { page, url, frames } => {
            let config = Config::load_or_default(&cli.config).with_timezone_override(cli.timezone);

            let mut site = SnapshotSite::new(SnapshotSurface::from_file(url, &page)?);
            for (frame_url, file) in frames {
                site = site.with_frame(SnapshotSurface::from_file(frame_url, &file)?);
            }

            pipeline::run_inspect(&config, site).await?.log();
        }

        Command::Info => {
            log::info!("Results file: {}", storage.path().display());
            let results = storage.load_results().await?;
            if results.is_empty() {
                log::info!("No results found yet.");
                return Ok(());
            }

            let summary = WriteSummary::of(&results);
            log::info!(
                "{} link(s): {} found, {} exhausted, {} failed",
                summary.total,
                summary.found,
                summary.exhausted(),
                summary.failed
            );
            for result in &results {
                let status = match (&result.earliest_date, &result.error) {
                    (Some(date), _) => format!(
                        "{} (+{}d, {} slots)",
                        date,
                        result.days_from_today.unwrap_or_default(),
                        result.slot_count_observed
                    ),
                    (None, Some(error)) => format!("error: {error}"),
                    (None, None) => "no qualifying day".to_string(),
                };
                log::info!(
                    "  {} [{}] {}",
                    result.name,
                    result.scanned_at.format("%Y-%m-%d %H:%M"),
                    status
                );
            }
        }
    }

    Ok(())
}
