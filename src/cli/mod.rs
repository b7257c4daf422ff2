//! Command-line interface components
//!
//! This module contains CLI-specific code for the URL Reader application:
//! argument parsing and the command handlers.

pub mod args;
pub mod commands;

pub use args::{CacheAction, CacheArgs, Cli, Commands, FetchArgs, GlobalArgs};
pub use commands::{handle_cache, handle_fetch};
