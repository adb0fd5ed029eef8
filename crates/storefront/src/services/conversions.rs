//! Server-side conversion events (Meta Conversions API compatible).
//!
//! Checkout and purchase events are sent from the server so they survive
//! ad blockers. Event IDs are derived from the order ID, which lets the
//! provider de-duplicate them against the browser pixel firing the same
//! event.
//!
//! Sending is fire-and-forget: [`ConversionTracker::track`] spawns a task
//! and returns immediately. Failures are logged and never reach the
//! request that triggered them.

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

use silvertape_core::{Order, OrderId, ShippingInfo, Won};

use crate::config::MetaConfig;
use crate::middleware::ClientContext;

/// Conversions API version.
const API_VERSION: &str = "v25.0";

/// Currency reported with every event.
const CURRENCY: &str = "KRW";

/// Errors that can occur when sending conversion events.
#[derive(Debug, Error)]
pub enum ConversionsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// Buyer details attached to an event. Hashed before leaving the process,
/// except IP and user agent which the API expects in the clear.
#[derive(Debug, Clone, Default)]
pub struct BuyerData {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl BuyerData {
    /// Buyer data from the order's shipping details and the caller's
    /// network context.
    #[must_use]
    pub fn from_order(shipping: &ShippingInfo, client: &ClientContext) -> Self {
        Self {
            name: Some(shipping.name.clone()),
            phone: Some(shipping.phone.clone()),
            client_ip: client.ip.clone(),
            user_agent: client.user_agent.clone(),
        }
    }
}

/// One purchased line, as reported in `contents`.
#[derive(Debug, Clone, Serialize)]
pub struct PurchasedItem {
    pub id: String,
    pub quantity: u32,
    pub item_price: Won,
}

/// A conversion event.
#[derive(Debug, Clone)]
pub enum ConversionEvent {
    /// Order created, buyer sent to the payment widget.
    InitiateCheckout {
        order_id: OrderId,
        value: Won,
        num_items: u32,
    },
    /// Payment confirmed.
    Purchase {
        order_id: OrderId,
        value: Won,
        items: Vec<PurchasedItem>,
    },
}

impl ConversionEvent {
    /// Build a purchase event from a stored order.
    #[must_use]
    pub fn purchase(order: &Order, value: Won) -> Self {
        Self::Purchase {
            order_id: order.order_id.clone(),
            value,
            items: order
                .items
                .iter()
                .map(|item| PurchasedItem {
                    id: item.product_id.clone(),
                    quantity: item.quantity,
                    // Per-unit price; the API multiplies by quantity itself.
                    item_price: item.unit_price().unwrap_or(Won::ZERO),
                })
                .collect(),
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::InitiateCheckout { .. } => "InitiateCheckout",
            Self::Purchase { .. } => "Purchase",
        }
    }

    /// De-duplication key shared with the browser pixel.
    fn event_id(&self) -> String {
        match self {
            Self::InitiateCheckout { order_id, .. } => format!("checkout_{order_id}"),
            Self::Purchase { order_id, .. } => format!("purchase_{order_id}"),
        }
    }

    const fn source_path(&self) -> &'static str {
        match self {
            Self::InitiateCheckout { .. } => "/checkout",
            Self::Purchase { .. } => "/checkout/success",
        }
    }

    fn order_id(&self) -> &OrderId {
        match self {
            Self::InitiateCheckout { order_id, .. } | Self::Purchase { order_id, .. } => order_id,
        }
    }

    fn custom_data(&self) -> serde_json::Value {
        match self {
            Self::InitiateCheckout {
                value, num_items, ..
            } => serde_json::json!({
                "currency": CURRENCY,
                "value": value,
                "num_items": num_items,
            }),
            Self::Purchase {
                order_id,
                value,
                items,
            } => serde_json::json!({
                "currency": CURRENCY,
                "value": value,
                "order_id": order_id,
                "content_type": "product",
                "contents": items,
                "num_items": items.iter().map(|i| i.quantity).sum::<u32>(),
            }),
        }
    }
}

/// Conversions API client.
#[derive(Clone)]
pub struct MetaConversionsClient {
    client: reqwest::Client,
    endpoint: String,
    access_token: SecretString,
    site_url: Url,
}

impl MetaConversionsClient {
    /// Create a new Conversions API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &MetaConfig, site_url: Url) -> Result<Self, ConversionsError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/{API_VERSION}/{}/events",
                config.api_base.as_str().trim_end_matches('/'),
                config.pixel_id
            ),
            access_token: config.access_token.clone(),
            site_url,
        })
    }

    /// Send one event.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects the event.
    #[instrument(skip(self, event, buyer), fields(event = event.name(), order_id = %event.order_id()))]
    pub async fn send(
        &self,
        event: &ConversionEvent,
        buyer: &BuyerData,
    ) -> Result<(), ConversionsError> {
        let payload = self.payload(event, buyer);

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("access_token", self.access_token.expose_secret())])
            .json(&payload)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ConversionsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }

    fn payload(&self, event: &ConversionEvent, buyer: &BuyerData) -> serde_json::Value {
        let source_url = self
            .site_url
            .join(event.source_path())
            .map_or_else(|_| self.site_url.to_string(), String::from);

        serde_json::json!({
            "data": [{
                "event_name": event.name(),
                "event_time": Utc::now().timestamp(),
                "event_id": event.event_id(),
                "event_source_url": source_url,
                "action_source": "website",
                "user_data": user_data(buyer),
                "custom_data": event.custom_data(),
            }]
        })
    }
}

/// Dispatches conversion events in the background.
///
/// Unconfigured trackers drop events.
#[derive(Clone, Default)]
pub struct ConversionTracker {
    client: Option<MetaConversionsClient>,
}

impl ConversionTracker {
    /// Create a tracker. `None` disables event delivery.
    #[must_use]
    pub const fn new(client: Option<MetaConversionsClient>) -> Self {
        Self { client }
    }

    /// Returns `true` if events will actually be sent.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Send an event without waiting for the result.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn track(&self, event: ConversionEvent, buyer: BuyerData) {
        let Some(client) = self.client.clone() else {
            debug!(event = event.name(), "conversions API not configured, event dropped");
            return;
        };

        tokio::spawn(async move {
            match client.send(&event, &buyer).await {
                Ok(()) => info!(
                    event = event.name(),
                    order_id = %event.order_id(),
                    "conversion event sent"
                ),
                Err(e) => warn!(
                    event = event.name(),
                    order_id = %event.order_id(),
                    error = %e,
                    "conversion event failed"
                ),
            }
        });
    }
}

/// SHA-256 of the trimmed, lowercased value, hex encoded.
fn hash_normalized(value: &str) -> String {
    hex::encode(Sha256::digest(value.trim().to_lowercase().as_bytes()))
}

fn user_data(buyer: &BuyerData) -> serde_json::Value {
    let mut data = serde_json::Map::new();

    if let Some(phone) = &buyer.phone {
        let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
        if !digits.is_empty() {
            data.insert("ph".into(), serde_json::json!([hash_normalized(&digits)]));
        }
    }
    if let Some(name) = &buyer.name {
        let mut parts = name.split_whitespace();
        if let Some(first) = parts.next() {
            data.insert("fn".into(), serde_json::json!([hash_normalized(first)]));
            let last = parts.collect::<Vec<_>>().join(" ");
            if !last.is_empty() {
                data.insert("ln".into(), serde_json::json!([hash_normalized(&last)]));
            }
        }
    }
    if let Some(ip) = &buyer.client_ip {
        data.insert("client_ip_address".into(), serde_json::json!(ip));
    }
    if let Some(ua) = &buyer.user_agent {
        data.insert("client_user_agent".into(), serde_json::json!(ua));
    }

    serde_json::Value::Object(data)
}
