//! Command handlers for URL Reader CLI
//!
//! This module implements the command handlers that connect CLI arguments
//! and the loaded configuration to the [`UrlReader`].

use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::app::{format_bytes, CacheStats, FetchRequest, Fetched, ReaderConfig, UrlReader};
use crate::cli::{CacheAction, CacheArgs, FetchArgs};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Handle the fetch command
///
/// Starts every URL at once, reports each result as its callback runs and
/// fails if any fetch failed.
pub fn handle_fetch(args: FetchArgs, app_config: &AppConfig, quiet: bool) -> Result<()> {
    args.validate().map_err(AppError::generic)?;

    let start_time = Instant::now();
    let config = fetch_reader_config(&args, app_config)?;
    info!(
        "Fetching {} URL(s) with timeout {:?} (cache: {})",
        args.urls.len(),
        config.timeout,
        config.uses_cache()
    );
    let reader = UrlReader::new(config)?;

    let progress = fetch_progress_bar(args.urls.len() as u64, quiet);
    let failures = Arc::new(AtomicUsize::new(0));

    for url in &args.urls {
        let progress = progress.clone();
        let failures = Arc::clone(&failures);
        let print_body = args.print;
        let request = FetchRequest::new(url.as_str()).invalidate_cache(args.invalidate);

        reader.submit(request, move |fetched| {
            if !fetched.is_success() {
                failures.fetch_add(1, Ordering::Relaxed);
            }
            report_fetched(&fetched, &progress, print_body);
            progress.inc(1);
        });
    }

    reader.run_until_done(None);
    progress.finish_and_clear();

    let failed = failures.load(Ordering::Relaxed);
    info!(
        "Fetched {} URL(s) in {:?}, {} failed",
        args.urls.len(),
        start_time.elapsed(),
        failed
    );

    if failed > 0 {
        return Err(AppError::generic(format!(
            "{} of {} fetch(es) failed",
            failed,
            args.urls.len()
        )));
    }
    Ok(())
}

/// Apply fetch flags on top of the loaded configuration
fn fetch_reader_config(args: &FetchArgs, app_config: &AppConfig) -> Result<ReaderConfig> {
    let mut app_config = app_config.clone();
    if args.cache {
        app_config.cache.enabled = true;
    }
    if let Some(timeout) = args.timeout {
        app_config.reader.timeout_secs = timeout;
    }
    if args.no_quote {
        app_config.reader.quote_url_path = false;
    }
    if args.force_https {
        app_config.reader.force_https = true;
    }
    // The CLI drives the run loop itself
    app_config.reader.wait_until_done = false;

    Ok(app_config.to_reader_config()?)
}

fn fetch_progress_bar(total: u64, quiet: bool) -> ProgressBar {
    if quiet || !atty::is(atty::Stream::Stderr) {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::new(total);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .tick_strings(&["◐", "◓", "◑", "◒"])
            .progress_chars("=> "),
    );
    progress.set_message("fetching");
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

fn report_fetched(fetched: &Fetched, progress: &ProgressBar, print_body: bool) {
    let host = fetched.host().unwrap_or_else(|| fetched.url.clone());

    if let Some(error) = &fetched.error {
        progress.println(format!("❌ {}: {}", fetched.url, error));
        return;
    }

    if print_body {
        progress.suspend(|| {
            let mut stdout = io::stdout().lock();
            if let Err(e) = stdout.write_all(&fetched.data).and_then(|()| stdout.flush()) {
                warn!("Failed to write body of {}: {}", fetched.url, e);
            }
        });
        return;
    }

    let status = fetched
        .status
        .map(|code| format!(", status {}", code))
        .unwrap_or_default();
    progress.println(format!(
        "{} fully loaded, size: {} ({}{})",
        host,
        fetched.data.len(),
        fetched.source,
        status
    ));
}

/// Handle cache management commands
pub fn handle_cache(args: CacheArgs, app_config: &AppConfig) -> Result<()> {
    let reader = cache_reader(app_config)?;

    match args.action {
        CacheAction::Get { url, output } => {
            let data = reader
                .get_cache(&url)?
                .ok_or_else(|| AppError::generic(format!("No cache entry for {}", url)))?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &data)?;
                    println!("Wrote {} to {}", format_bytes(data.len() as u64), path.display());
                }
                None => {
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(&data)?;
                    stdout.flush()?;
                }
            }
            Ok(())
        }
        CacheAction::Set { url, file } => {
            let data = std::fs::read(&file)?;
            reader.set_cache(&url, &data)?;
            println!("Cached {} for {}", format_bytes(data.len() as u64), url);
            Ok(())
        }
        CacheAction::Invalidate { url } => {
            if reader.invalidate_cache_for_url(&url)? {
                println!("Removed cache entry for {}", url);
            } else {
                println!("No cache entry for {}", url);
            }
            Ok(())
        }
        CacheAction::Flush => {
            reader.flush_cache()?;
            println!("🧹 Cache flushed");
            Ok(())
        }
        CacheAction::Info { json } => {
            let stats = reader
                .cache_stats()
                .ok_or_else(|| AppError::generic("Cache is not configured"))?;
            if json {
                let rendered = serde_json::to_string_pretty(&stats)
                    .map_err(|e| AppError::generic(format!("Failed to encode stats: {}", e)))?;
                println!("{}", rendered);
            } else {
                print_cache_info(&stats);
            }
            Ok(())
        }
    }
}

/// Reader used for direct cache access; the cache is always enabled
fn cache_reader(app_config: &AppConfig) -> Result<UrlReader> {
    let mut app_config = app_config.clone();
    app_config.cache.enabled = true;
    let config = app_config.to_reader_config()?;
    debug!("Using cache configuration: {:?}", config.cache);
    UrlReader::new(config)
}

fn print_cache_info(stats: &CacheStats) {
    println!("💾 Cache Information");
    println!("===================");
    println!("Location: {}", stats.cache_root.display());
    if !stats.root_exists {
        println!("Cache directory has not been created yet");
        return;
    }
    println!("Cached entries: {}", stats.entry_count);
    println!("Cache size: {}", stats.format_total_size());
    println!(
        "Average entry: {}",
        format_bytes(stats.average_entry_size())
    );
    if let Some(newest) = stats.newest_entry {
        println!("Last write: {}", newest.format("%Y-%m-%d %H:%M:%S UTC"));
    }
}
