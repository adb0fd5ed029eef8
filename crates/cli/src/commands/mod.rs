//! Command implementations.

pub mod orders;
pub mod reconcile;

use std::path::PathBuf;
use std::time::Duration;

use silvertape_storefront::config::DEFAULT_ORDER_STORAGE_DIR;
use silvertape_storefront::store::OrderStore;
use thiserror::Error;

/// Default staleness threshold when neither flag nor env var is given.
const DEFAULT_STALE_MINUTES: u64 = 30;

/// Errors resolving command settings from the environment.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Open the order store named by `ORDER_STORAGE_DIR`.
///
/// Does not require the rest of the storefront configuration, so read-only
/// commands work on a machine with only the data directory.
pub(crate) fn order_store() -> OrderStore {
    dotenvy::dotenv().ok();
    let dir = std::env::var("ORDER_STORAGE_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_ORDER_STORAGE_DIR), PathBuf::from);
    OrderStore::new(dir)
}

/// Staleness threshold: the flag, else `STALE_ORDER_MINUTES`, else 30.
pub(crate) fn stale_threshold(minutes: Option<u64>) -> Result<Duration, SettingsError> {
    let minutes = match minutes {
        Some(m) => m,
        None => match std::env::var("STALE_ORDER_MINUTES") {
            Ok(value) if !value.trim().is_empty() => {
                value.trim().parse().map_err(|_| SettingsError::Invalid {
                    name: "STALE_ORDER_MINUTES",
                    value,
                })?
            }
            _ => DEFAULT_STALE_MINUTES,
        },
    };
    Ok(Duration::from_secs(minutes.saturating_mul(60)))
}
