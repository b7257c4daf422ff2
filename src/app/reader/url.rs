//! URL normalization
//!
//! Every URL goes through the same steps before it is used as a request or
//! as a cache key: optional path quoting, then optional `http` to `https`
//! promotion. Fetching and direct cache access share this path, so
//! `set_cache(u)` and `fetch(u)` agree on the key.

use std::fmt::Write as _;

use url::Url;

use crate::errors::FetchError;

/// Applies path quoting and scheme promotion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlNormalizer {
    quote_path: bool,
    force_https: bool,
}

impl UrlNormalizer {
    /// Create a normalizer
    ///
    /// # Arguments
    ///
    /// * `quote_path` - Percent-quote the path component
    /// * `force_https` - Promote `http` URLs to `https`
    pub fn new(quote_path: bool, force_https: bool) -> Self {
        Self {
            quote_path,
            force_https,
        }
    }

    /// Normalize `raw` into a request URL
    ///
    /// With quoting disabled the input must already be a legal URL: a raw
    /// space or other character that needs escaping is rejected rather than
    /// repaired.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::UnsupportedUrl` if `raw` cannot be used as a URL
    pub fn normalize(&self, raw: &str) -> Result<Url, FetchError> {
        let unsupported = || FetchError::UnsupportedUrl {
            url: raw.to_string(),
        };

        if !self.quote_path && has_illegal_characters(raw) {
            return Err(unsupported());
        }

        let mut url = Url::parse(raw.trim()).map_err(|_| unsupported())?;

        if self.quote_path && !url.cannot_be_a_base() {
            let quoted = quote_path(url.path());
            url.set_path(&quoted);
        }

        if self.force_https && url.scheme() == "http" {
            url.set_scheme("https").map_err(|()| unsupported())?;
        }

        Ok(url)
    }

    /// Whether path quoting is enabled
    pub fn quotes_path(&self) -> bool {
        self.quote_path
    }

    /// Whether scheme promotion is enabled
    pub fn forces_https(&self) -> bool {
        self.force_https
    }
}

impl Default for UrlNormalizer {
    fn default() -> Self {
        Self::new(true, false)
    }
}

/// Percent-encode a path, keeping `/`, unreserved characters and any
/// existing valid `%XX` escape
pub fn quote_path(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut quoted = String::with_capacity(path.len());
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        if byte == b'%' && is_escape(&bytes[i..]) {
            quoted.push_str(&path[i..i + 3]);
            i += 3;
            continue;
        }

        if is_unreserved(byte) || byte == b'/' {
            quoted.push(byte as char);
        } else {
            let _ = write!(quoted, "%{:02X}", byte);
        }
        i += 1;
    }

    quoted
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

/// `%` followed by two hex digits
fn is_escape(bytes: &[u8]) -> bool {
    bytes.len() >= 3 && bytes[1].is_ascii_hexdigit() && bytes[2].is_ascii_hexdigit()
}

/// Characters that may not appear unescaped anywhere in a URL
fn has_illegal_characters(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.iter().enumerate().any(|(i, &byte)| {
        !byte.is_ascii_graphic()
            || matches!(byte, b'"' | b'<' | b'>' | b'\\' | b'^' | b'`' | b'{' | b'|' | b'}')
            || (byte == b'%' && !is_escape(&bytes[i..]))
    })
}
