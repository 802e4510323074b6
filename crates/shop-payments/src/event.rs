//! Webhook Events
//!
//! Provider events as delivered in the webhook body, and the subset of them
//! the storefront acts on.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{PaymentError, Result};

pub const CHARGE_SUCCEEDED: &str = "charge.succeeded";
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Raw event envelope
#[derive(Clone, Debug, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: i64,
    pub data: EventData,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChargeObject {
    amount: i64,
    created: i64,
    #[serde(default)]
    receipt_url: Option<String>,
    #[serde(default)]
    billing_details: Option<BillingDetails>,
}

#[derive(Debug, Deserialize)]
struct BillingDetails {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: String,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
}

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    /// A charge went through - record a receipt for the payer
    ChargeSucceeded {
        event_id: String,
        email: Option<String>,
        receipt_url: Option<String>,
        /// Minor currency units
        amount: i64,
        /// Epoch seconds
        created: i64,
    },

    /// Hosted checkout finished; metadata links it back to user and cart
    CheckoutCompleted {
        event_id: String,
        session_id: String,
        user_id: Option<String>,
        cart_id: Option<String>,
    },

    /// Unhandled event type
    Other { event_id: String, event_type: String },
}

impl WebhookEvent {
    /// Parse a raw event body
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        let event: Event = serde_json::from_slice(payload)
            .map_err(|e| PaymentError::WebhookParse(format!("invalid event JSON: {e}")))?;
        Self::from_event(event)
    }

    pub fn from_event(event: Event) -> Result<Self> {
        match event.event_type.as_str() {
            CHARGE_SUCCEEDED => {
                let charge: ChargeObject = serde_json::from_value(event.data.object)
                    .map_err(|e| PaymentError::WebhookParse(format!("invalid charge data: {e}")))?;
                Ok(WebhookEvent::ChargeSucceeded {
                    event_id: event.id,
                    email: charge
                        .billing_details
                        .and_then(|details| details.email)
                        .filter(|email| !email.is_empty()),
                    receipt_url: charge.receipt_url,
                    amount: charge.amount,
                    created: charge.created,
                })
            }

            CHECKOUT_SESSION_COMPLETED => {
                let session: SessionObject = serde_json::from_value(event.data.object)
                    .map_err(|e| PaymentError::WebhookParse(format!("invalid checkout session data: {e}")))?;
                let mut metadata = session.metadata.unwrap_or_default();
                Ok(WebhookEvent::CheckoutCompleted {
                    event_id: event.id,
                    session_id: session.id,
                    user_id: metadata.remove("userId"),
                    cart_id: metadata.remove("cartId"),
                })
            }

            _ => Ok(WebhookEvent::Other {
                event_id: event.id,
                event_type: event.event_type,
            }),
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            WebhookEvent::ChargeSucceeded { .. } => CHARGE_SUCCEEDED,
            WebhookEvent::CheckoutCompleted { .. } => CHECKOUT_SESSION_COMPLETED,
            WebhookEvent::Other { event_type, .. } => event_type,
        }
    }
}
