//! Order identifiers.
//!
//! Identifiers are generated server-side when an order is created and are
//! also the key the payment gateway echoes back on confirmation, so they
//! travel through URLs and filenames. [`OrderId::storage_key`] is the only
//! form that may touch the filesystem.

use core::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Prefix shared by every generated order identifier.
pub const ORDER_ID_PREFIX: &str = "HO";

/// A storefront order identifier, e.g. `HO-1718000000000-3fa9c2d1`.
///
/// Identifiers received from clients are kept verbatim; they are only
/// trusted after the store has found a record for them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Generate a fresh identifier from the creation time plus a random suffix.
    #[must_use]
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix: u32 = rand::rng().random();
        Self(format!(
            "{ORDER_ID_PREFIX}-{}-{suffix:08x}",
            now.timestamp_millis()
        ))
    }

    /// Wrap an identifier supplied by a client or read from storage.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe key: the identifier with everything outside
    /// `[A-Za-z0-9_-]` removed. May be empty for hostile input.
    #[must_use]
    pub fn storage_key(&self) -> String {
        self.0
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .collect()
    }

    /// Returns `true` if the identifier is empty or whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OrderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl AsRef<str> for OrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
