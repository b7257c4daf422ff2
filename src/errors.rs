//! Error types for URL Reader
//!
//! Errors fall into two groups. Environmental failures (network, timeout,
//! cache I/O) travel through the fetch callback or are logged and ignored.
//! Programmer errors (bad arguments, broken task bookkeeping) are returned
//! synchronously or reported loudly.

use std::path::PathBuf;

use thiserror::Error;

use crate::app::registry::TaskHandle;

/// Errors delivered to a fetch callback
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request did not finish within the configured timeout
    #[error("The request timed out after {seconds:.3} seconds")]
    Timeout { seconds: f64 },

    /// The URL could not be turned into a request
    #[error("unsupported URL: {url}")]
    UnsupportedUrl { url: String },

    /// HTTP transport failure (DNS, connect, TLS, body stream)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport failure reported by a non-reqwest transport
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// An identical request is already in flight and duplicates are rejected
    #[error("A request for {url} is already in flight")]
    DuplicateRequest { url: String },

    /// The transport was shut down before the request could start
    #[error("Transport is shut down")]
    Shutdown,
}

impl FetchError {
    /// Create a transport error from any message
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Check whether this error is a timeout
    pub fn is_timeout(&self) -> bool {
        match self {
            FetchError::Timeout { .. } => true,
            FetchError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Persistent cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache directory could not be created or read
    #[error("Cache directory not accessible: {path}")]
    DirectoryNotAccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading an entry failed for a reason other than absence
    #[error("Failed to read cache entry: {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the temporary file for an entry failed
    #[error("Failed to write cache entry: {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Atomic rename of the temporary file failed
    #[error("Atomic cache operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Removing an entry or the cache root failed
    #[error("Failed to remove cache path: {path}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid arguments passed to the reader
#[derive(Error, Debug)]
pub enum ReaderError {
    /// No URL was given
    #[error("A URL is required")]
    MissingUrl,

    /// The URL could not be parsed
    #[error("Invalid URL: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Broken task bookkeeping; these indicate a bug, not an environmental problem
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConsistencyError {
    /// A handle was registered twice
    #[error("Task {handle} is already registered")]
    DuplicateRegistration { handle: TaskHandle },

    /// Data or completion arrived for a handle that is not registered
    #[error("Task {handle} is not registered (completed twice or never started)")]
    UnknownTask { handle: TaskHandle },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file could not be read
    #[error("Failed to read configuration file: {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// No user directory could be determined
    #[error("Could not determine the user {kind} directory")]
    NoUserDirectory { kind: &'static str },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Cache error
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Invalid argument
    #[error(transparent)]
    Reader(#[from] ReaderError),

    /// Task bookkeeping error
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Fetch(FetchError::Timeout { .. })
            | AppError::Fetch(FetchError::Http(_))
            | AppError::Fetch(FetchError::Transport { .. })
            | AppError::Fetch(FetchError::DuplicateRequest { .. }) => true,

            AppError::Fetch(FetchError::UnsupportedUrl { .. })
            | AppError::Reader(_)
            | AppError::Consistency(_)
            | AppError::Config(_) => false,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Fetch(_) => "fetch",
            AppError::Cache(_) => "cache",
            AppError::Reader(_) => "argument",
            AppError::Consistency(_) => "consistency",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Cache result type alias
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Reader argument result type alias
pub type ReaderResult<T> = std::result::Result<T, ReaderError>;

/// Task bookkeeping result type alias
pub type ConsistencyResult<T> = std::result::Result<T, ConsistencyError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
