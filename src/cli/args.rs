//! Command-line argument parsing for URL Reader
//!
//! This module defines the CLI structure using clap derive macros: a `fetch`
//! command for downloading URLs through the cache and a `cache` command for
//! inspecting and editing cache entries directly.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// URL Reader - Fetch URLs through a persistent content cache
#[derive(Parser, Debug)]
#[command(
    name = "url_reader",
    version,
    about = "Fetch URLs concurrently with a persistent content cache",
    long_about = "Fetches URLs in the background and reports each result as it completes.
Successful responses are stored in a content-addressed cache and served from it on later runs."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cache directory path (enables the cache)
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch one or more URLs
    Fetch(FetchArgs),

    /// Inspect and edit the content cache
    Cache(CacheArgs),
}

/// Arguments for the fetch command
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// URLs to fetch
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Per-request timeout in seconds
    #[arg(short, long, value_name = "SECONDS")]
    pub timeout: Option<f64>,

    /// Do not percent-quote URL paths
    #[arg(long)]
    pub no_quote: bool,

    /// Promote http URLs to https
    #[arg(long)]
    pub force_https: bool,

    /// Use the persistent cache at its default location
    #[arg(short, long)]
    pub cache: bool,

    /// Drop cached entries before fetching
    #[arg(long)]
    pub invalidate: bool,

    /// Print response bodies instead of a summary line
    #[arg(short, long)]
    pub print: bool,
}

/// Arguments for cache management
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache management actions
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Print the cached content for a URL
    Get {
        /// URL whose entry to read
        url: String,

        /// Write the content to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Store a file as the cached content for a URL
    Set {
        /// URL whose entry to write
        url: String,

        /// File with the content to store
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Remove the cached content for a URL
    Invalidate {
        /// URL whose entry to remove
        url: String,
    },

    /// Remove every cache entry
    Flush,

    /// Show cache location, entry count and size
    Info {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    ///
    /// Returns `None` when no verbosity flag was given so the configured
    /// default applies.
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.very_verbose {
            Some(tracing::Level::DEBUG)
        } else if self.global.verbose {
            Some(tracing::Level::INFO)
        } else {
            None
        }
    }
}

impl FetchArgs {
    /// Check argument values that clap cannot express
    pub fn validate(&self) -> Result<(), String> {
        if let Some(timeout) = self.timeout {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err("Timeout must be a positive number of seconds".to_string());
            }
        }

        if self.urls.iter().any(|url| url.trim().is_empty()) {
            return Err("URLs must not be empty".to_string());
        }

        Ok(())
    }
}
