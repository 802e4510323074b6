//! Payment Gateway Adapter
//!
//! The seam between the checkout workflow and the payment provider. The
//! workflow only sees this trait; `StripeGateway` talks to Stripe and
//! `MemoryGateway` stands in for it in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shop_core::CartLineItem;

use crate::error::{PaymentError, Result};
use crate::event::WebhookEvent;
use crate::signature;

/// How many of the provider's most recent products (or a product's prices)
/// a lookup inspects before deciding to create a new one.
///
/// Known limitation: with more objects than this on the provider side, an
/// existing match can fall off the page and a duplicate is created. Two
/// concurrent checkouts for the same item can race the same way.
pub const LOOKUP_PAGE_SIZE: u64 = 100;

/// Metadata key holding the size on provider products
pub const SIZE_METADATA_KEY: &str = "sizeId";

/// Metadata key holding the category on provider products
pub const CATEGORY_METADATA_KEY: &str = "category";

/// Product attributes sent to the provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSpec {
    pub name: String,
    pub size_id: String,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub category: Option<String>,
}

impl ProductSpec {
    pub fn new(name: impl Into<String>, size_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_id: size_id.into(),
            description: None,
            images: Vec::new(),
            category: None,
        }
    }

    pub fn from_line_item(item: &CartLineItem) -> Self {
        Self {
            name: item.name.clone(),
            size_id: item.size_id.clone(),
            description: item.description.clone().filter(|d| !d.is_empty()),
            images: item.img.iter().filter(|i| !i.is_empty()).cloned().collect(),
            category: item.category.clone().filter(|c| !c.is_empty()),
        }
    }

    /// Lookup key: exact name plus size metadata
    pub fn matches(&self, name: Option<&str>, metadata: &HashMap<String, String>) -> bool {
        name == Some(self.name.as_str())
            && metadata.get(SIZE_METADATA_KEY).map(String::as_str) == Some(self.size_id.as_str())
    }
}

/// One entry of a hosted checkout session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLineItem {
    pub price_id: String,
    pub quantity: u32,
}

/// Request to open a hosted checkout session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionRequest {
    pub line_items: Vec<CheckoutLineItem>,

    /// URL to redirect after successful payment
    pub success_url: String,

    /// URL to redirect if checkout is cancelled
    pub cancel_url: String,

    #[serde(default)]
    pub customer_email: Option<String>,

    /// Ties the session back to `userId` / `cartId`
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionRequest {
    /// Every line item needs a resolved price id and a positive quantity
    pub fn validate(&self) -> Result<()> {
        if self.line_items.is_empty() {
            return Err(PaymentError::EmptyCart);
        }
        for (index, item) in self.line_items.iter().enumerate() {
            if item.price_id.trim().is_empty() {
                return Err(PaymentError::InvalidLineItem(format!(
                    "line item {index} has no price id"
                )));
            }
            if item.quantity == 0 {
                return Err(PaymentError::InvalidLineItem(format!(
                    "line item {index} has zero quantity"
                )));
            }
        }
        Ok(())
    }
}

/// Result of creating a checkout session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider session ID
    pub id: String,

    /// URL to redirect user to
    pub checkout_url: String,

    #[serde(default)]
    pub customer_email: Option<String>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Payment provider operations used by checkout and webhook ingestion
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Find a provider product by exact name and size metadata among the
    /// most recent [`LOOKUP_PAGE_SIZE`] products, or create one.
    async fn resolve_or_create_product(&self, product: &ProductSpec) -> Result<String>;

    /// Find a price of `product_id` with exactly `unit_amount` minor units in
    /// `currency` among its most recent [`LOOKUP_PAGE_SIZE`] prices, or create one.
    async fn resolve_or_create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: &str,
    ) -> Result<String>;

    /// Open a hosted checkout session. Fails with `InvalidLineItem` when a
    /// line item has no price id.
    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSession>;

    /// Verify a webhook signature header against the raw body and parse the event
    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
        secret: &str,
    ) -> Result<WebhookEvent> {
        signature::construct_event(
            payload,
            signature_header,
            secret,
            signature::DEFAULT_TOLERANCE_SECS,
        )
    }

    /// Gateway name
    fn name(&self) -> &str;
}
