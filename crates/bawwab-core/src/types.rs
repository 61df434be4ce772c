//! Request-scoped types
//!
//! Everything a request carries through the gate lives here, so nothing
//! per-request ever lands on the shared configuration.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::collections::HashMap;

/// Credentials presented by one request.
///
/// `username` is kept exactly as supplied and is what directory
/// operations see; `username_lc` is the lower-cased form used for every
/// comparison (session match, allow-lists, forwarded header), so case
/// normalization happens in exactly one place.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub username_lc: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        let username = username.into();
        let username_lc = username.to_lowercase();
        Self {
            username,
            username_lc,
            password: password.into(),
        }
    }

    /// Parse an `Authorization: Basic` header value.
    ///
    /// Returns `None` for anything that is not well-formed Basic with a
    /// non-empty username; callers treat that the same as no header.
    pub fn from_basic_header(header: &str) -> Option<Self> {
        let encoded = header.strip_prefix("Basic ")?;
        let decoded = BASE64.decode(encoded.trim()).ok()?;
        let text = String::from_utf8(decoded).ok()?;
        let (username, password) = text.split_once(':')?;
        if username.is_empty() {
            return None;
        }
        Some(Self::new(username, password))
    }
}

/// Directory entry resolved during authentication.
///
/// In bind mode this is just the constructed DN; in search mode it also
/// carries the attributes returned for the matched entry.
#[derive(Debug, Clone, Default)]
pub struct DirectoryIdentity {
    pub dn: String,
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryIdentity {
    pub fn from_dn(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    /// First value of an attribute, if present.
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|v| v.first())
            .map(|s| s.as_str())
    }
}
