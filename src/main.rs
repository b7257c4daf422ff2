//! URL Reader CLI application
//!
//! Command-line interface for fetching URLs through the persistent content
//! cache and for managing cache entries directly.

use std::process;

use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use url_reader::cli::{handle_cache, handle_fetch, Cli, Commands};
use url_reader::config::AppConfig;
use url_reader::errors::Result;

fn main() {
    let result = run();

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    // Configuration comes first so its logging section can apply
    let mut app_config = AppConfig::load(cli.global.config.clone())?;
    if let Some(cache_dir) = &cli.global.cache_dir {
        app_config.cache.enabled = true;
        app_config.cache.cache_root = Some(cache_dir.clone());
    }

    init_logging(&cli, &app_config);

    info!("URL Reader v{} starting", env!("CARGO_PKG_VERSION"));
    // The config file is read before the subscriber exists
    match &app_config.source {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    match cli.command {
        Commands::Fetch(args) => {
            info!("Executing fetch command");
            handle_fetch(args, &app_config, cli.global.quiet)
        }
        Commands::Cache(args) => {
            info!("Executing cache command");
            handle_cache(args, &app_config)
        }
    }
}

/// Initialize logging from CLI verbosity, falling back to the config file
fn init_logging(cli: &Cli, app_config: &AppConfig) {
    let level = cli
        .log_level()
        .map(|level| level.to_string().to_lowercase())
        .unwrap_or_else(|| app_config.logging.level.clone());

    let mut filter = EnvFilter::from_default_env();
    match format!("url_reader={}", level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring invalid log level '{}': {}", level, e),
    }

    let ansi = app_config.logging.colored_output && atty::is(atty::Stream::Stderr);

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(false)
        .with_level(cli.global.very_verbose) // Show levels only in very verbose mode
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
