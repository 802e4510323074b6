//! # shop-payments
//!
//! Checkout and payment recording for the storefront, on top of Stripe
//! Checkout (Hosted).
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────┐
//! │  Storefront │────▶│  Stripe Hosted  │────▶│  Storefront │
//! │   (cart)    │     │  Checkout Page  │     │  (success)  │
//! └─────────────┘     └─────────────────┘     └─────────────┘
//!                              │
//!                              │ charge.succeeded (signed webhook)
//!                              ▼
//!                     ┌─────────────────┐
//!                     │ receipt appended│
//!                     │  to the payer   │
//!                     └─────────────────┘
//! ```
//!
//! Every line item is matched to a Stripe product (by name and size) and a
//! price (by exact amount), created on first use. The lookup only inspects the
//! provider's most recent objects, see [`LOOKUP_PAGE_SIZE`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shop_payments::{CheckoutSettings, CheckoutWorkflow, StripeGateway};
//!
//! let gateway = Arc::new(StripeGateway::new("sk_test_xxx"));
//! let workflow = CheckoutWorkflow::new(gateway, carts, users, CheckoutSettings::default());
//!
//! let outcome = workflow.create_session(&user_id).await?;
//! // Redirect user to: outcome.session.checkout_url
//! ```

mod checkout;
mod error;
mod event;
mod gateway;
mod mock;
pub mod signature;
mod stripe;
mod webhook;

pub use checkout::{
    find_user_and_cart, CheckoutOutcome, CheckoutSettings, CheckoutWorkflow, ANONYMOUS_USER,
    CART_ID_METADATA_KEY, USER_ID_METADATA_KEY,
};
pub use error::{PaymentError, Result};
pub use event::{Event, EventData, WebhookEvent, CHARGE_SUCCEEDED, CHECKOUT_SESSION_COMPLETED};
pub use gateway::{
    CheckoutLineItem, CheckoutSession, CheckoutSessionRequest, PaymentGateway, ProductSpec,
    CATEGORY_METADATA_KEY, LOOKUP_PAGE_SIZE, SIZE_METADATA_KEY,
};
pub use mock::{GatewayCalls, MemoryGateway};
pub use stripe::StripeGateway;
pub use webhook::{WebhookHandler, WebhookOutcome};
