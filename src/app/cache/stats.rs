//! Cache statistics and disk usage
//!
//! Scans the cache root for entry files (64-character hex digests) and
//! reports their count, total size and most recent modification.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::key::CacheKey;

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Cache root directory
    pub cache_root: PathBuf,
    /// Whether the cache root currently exists
    pub root_exists: bool,
    /// Number of entries on disk
    pub entry_count: usize,
    /// Total size of entries in bytes
    pub total_size: u64,
    /// Modification time of the most recently written entry
    pub newest_entry: Option<DateTime<Utc>>,
}

impl CacheStats {
    /// Create empty statistics for a cache root
    pub fn new(cache_root: PathBuf) -> Self {
        Self {
            cache_root,
            root_exists: false,
            entry_count: 0,
            total_size: 0,
            newest_entry: None,
        }
    }

    /// Record one entry
    fn add_entry(&mut self, size: u64, modified: Option<SystemTime>) {
        self.entry_count += 1;
        self.total_size += size;
        if let Some(modified) = modified.map(DateTime::<Utc>::from) {
            if self.newest_entry.map_or(true, |newest| modified > newest) {
                self.newest_entry = Some(modified);
            }
        }
    }

    /// Average entry size in bytes
    pub fn average_entry_size(&self) -> u64 {
        if self.entry_count == 0 {
            return 0;
        }
        self.total_size / self.entry_count as u64
    }

    /// Format total size in human-readable format
    pub fn format_total_size(&self) -> String {
        format_bytes(self.total_size)
    }
}

/// Directory scanner for cache statistics
pub struct DirectoryScanner;

impl DirectoryScanner {
    /// Scan the cache root; a missing root yields empty statistics
    pub fn scan(cache_root: &Path) -> CacheStats {
        let mut stats = CacheStats::new(cache_root.to_path_buf());

        let entries = match std::fs::read_dir(cache_root) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to scan cache directory {}: {}", cache_root.display(), e);
                }
                return stats;
            }
        };
        stats.root_exists = true;

        for entry in entries.flatten() {
            if !Self::is_entry_file(&entry.path()) {
                continue;
            }
            match entry.metadata() {
                Ok(metadata) if metadata.is_file() => {
                    stats.add_entry(metadata.len(), metadata.modified().ok());
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to stat cache entry {}: {}", entry.path().display(), e),
            }
        }

        stats
    }

    /// Entry files are named by the hex digest of their key; temporary
    /// files and anything else placed in the root are ignored
    fn is_entry_file(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(CacheKey::from_hex)
            .is_some()
    }
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: u64 = 1024;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD as f64 && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD as f64;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
