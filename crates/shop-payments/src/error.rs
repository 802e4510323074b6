//! Payment Error Types

use shop_core::ShopError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Checkout, gateway and webhook errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Missing or malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Checkout requested for a cart without line items
    #[error("Cart is empty")]
    EmptyCart,

    /// A line item reached session creation without a resolved price
    #[error("Invalid line item: {0}")]
    InvalidLineItem(String),

    /// No account for the given id or email
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The account has no cart, or the referenced cart is gone
    #[error("Cart not found: {0}")]
    CartNotFound(String),

    /// Charge event without a billing email
    #[error("Billing email missing from charge")]
    MissingEmail,

    /// Signature header or signing secret absent
    #[error("Missing webhook signature or signing secret")]
    MissingWebhookCredentials,

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Gateway call timed out or could not be reached
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Store error
    #[error(transparent)]
    Storage(#[from] ShopError),
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::GatewayUnavailable(_)
                | PaymentError::Stripe(_)
                | PaymentError::Storage(ShopError::Storage(_))
        )
    }

    /// Signature and credential failures are the caller's fault, not ours
    pub fn is_webhook_rejection(&self) -> bool {
        matches!(
            self,
            PaymentError::MissingWebhookCredentials
                | PaymentError::WebhookSignature(_)
                | PaymentError::WebhookParse(_)
        )
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            PaymentError::Validation(_) => "The request is missing required data.",
            PaymentError::EmptyCart => "The cart is empty.",
            PaymentError::InvalidLineItem(_) => "A cart item has no price.",
            PaymentError::UserNotFound(_) => "User not found.",
            PaymentError::CartNotFound(_) => "Cart not found.",
            PaymentError::MissingEmail => "Billing email not found in the charge.",
            PaymentError::MissingWebhookCredentials => {
                "Missing Stripe signature or webhook signing secret."
            }
            PaymentError::WebhookSignature(_) | PaymentError::WebhookParse(_) => {
                "There was a problem with the Stripe event."
            }
            PaymentError::Stripe(_) => "Payment processing failed. Please try again.",
            PaymentError::GatewayUnavailable(_) => {
                "The payment service is unavailable. Please try again."
            }
            PaymentError::Storage(_) => "An error occurred processing your request.",
        }
    }
}
