//! URL Reader Library
//!
//! Fetches URLs on a background transport and delivers every result, exactly
//! once, on the thread that created the reader. Successful responses are
//! kept in a persistent, content-addressed cache so later runs can be served
//! offline.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
