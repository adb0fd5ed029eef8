//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::payments::{TossClient, TossError};
use crate::services::conversions::{ConversionsError, MetaConversionsClient};
use crate::services::{ConversionTracker, OrderService, PaymentService, Reconciler};
use crate::store::OrderStore;

/// Error building application state from configuration.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment gateway client: {0}")]
    Gateway(#[from] TossError),
    #[error("conversions client: {0}")]
    Conversions(#[from] ConversionsError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. All services share one
/// [`OrderStore`], and therefore one per-order lock table.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: OrderStore,
    orders: OrderService,
    payments: PaymentService,
    reconciler: Reconciler,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Builds the gateway client when Toss keys are configured (otherwise
    /// payments run in simulation mode) and the conversions client when Meta
    /// credentials are configured.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let store = OrderStore::new(&config.order_storage_dir);

        let gateway = config.toss.as_ref().map(TossClient::new).transpose()?;
        let conversions = config
            .meta
            .as_ref()
            .map(|meta| MetaConversionsClient::new(meta, config.base_url.clone()))
            .transpose()?;
        let tracker = ConversionTracker::new(conversions);

        if gateway.is_none() {
            tracing::warn!("Toss keys not configured, payments run in simulation mode");
        }
        if !tracker.is_enabled() {
            tracing::info!("Meta conversions not configured, events will be skipped");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                orders: OrderService::new(store.clone(), tracker.clone()),
                payments: PaymentService::new(store.clone(), gateway.clone(), tracker.clone()),
                reconciler: Reconciler::new(store.clone(), gateway, tracker),
                store,
                config,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the order store.
    #[must_use]
    pub fn store(&self) -> &OrderStore {
        &self.inner.store
    }

    /// Get a reference to the order service.
    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }

    /// Get a reference to the payment confirmation service.
    #[must_use]
    pub fn payments(&self) -> &PaymentService {
        &self.inner.payments
    }

    /// Get a reference to the stale-order reconciler.
    #[must_use]
    pub fn reconciler(&self) -> &Reconciler {
        &self.inner.reconciler
    }
}
