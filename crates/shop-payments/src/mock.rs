//! In-memory Gateway
//!
//! For testing and local development. Mimics the provider's lookup-or-create
//! behavior, including the bounded lookup page, and counts every call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::gateway::{
    CheckoutSession, CheckoutSessionRequest, PaymentGateway, ProductSpec, LOOKUP_PAGE_SIZE,
};

#[derive(Clone, Debug)]
struct StoredProduct {
    id: String,
    spec: ProductSpec,
}

#[derive(Clone, Debug)]
struct StoredPrice {
    id: String,
    product_id: String,
    unit_amount: i64,
    currency: String,
}

#[derive(Default)]
struct GatewayState {
    products: Vec<StoredProduct>,
    prices: Vec<StoredPrice>,
    sessions: Vec<CheckoutSessionRequest>,
}

/// Snapshot of how often each gateway operation ran
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GatewayCalls {
    pub products: usize,
    pub prices: usize,
    pub sessions: usize,
}

impl GatewayCalls {
    pub fn total(&self) -> usize {
        self.products + self.prices + self.sessions
    }
}

/// In-memory payment gateway
pub struct MemoryGateway {
    state: Mutex<GatewayState>,
    product_calls: AtomicUsize,
    price_calls: AtomicUsize,
    session_calls: AtomicUsize,
    page_size: usize,
    latency: Option<Duration>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GatewayState::default()),
            product_calls: AtomicUsize::new(0),
            price_calls: AtomicUsize::new(0),
            session_calls: AtomicUsize::new(0),
            page_size: usize::try_from(LOOKUP_PAGE_SIZE).unwrap_or(usize::MAX),
            latency: None,
        }
    }

    /// Inspect only the `page_size` most recent objects on lookup
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Delay every async call (for timeout testing)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> GatewayCalls {
        GatewayCalls {
            products: self.product_calls.load(Ordering::SeqCst),
            prices: self.price_calls.load(Ordering::SeqCst),
            sessions: self.session_calls.load(Ordering::SeqCst),
        }
    }

    pub async fn product_count(&self) -> usize {
        self.state.lock().await.products.len()
    }

    pub async fn price_count(&self) -> usize {
        self.state.lock().await.prices.len()
    }

    /// Every session request received, oldest first
    pub async fn sessions(&self) -> Vec<CheckoutSessionRequest> {
        self.state.lock().await.sessions.clone()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn object_id(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
}

#[async_trait]
impl PaymentGateway for MemoryGateway {
    async fn resolve_or_create_product(&self, product: &ProductSpec) -> Result<String> {
        self.product_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let mut state = self.state.lock().await;
        let existing = state
            .products
            .iter()
            .rev()
            .take(self.page_size)
            .find(|p| p.spec.name == product.name && p.spec.size_id == product.size_id)
            .map(|p| p.id.clone());

        if let Some(id) = existing {
            return Ok(id);
        }

        let id = object_id("prod");
        state.products.push(StoredProduct {
            id: id.clone(),
            spec: product.clone(),
        });
        Ok(id)
    }

    async fn resolve_or_create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: &str,
    ) -> Result<String> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let mut state = self.state.lock().await;
        let existing = state
            .prices
            .iter()
            .rev()
            .filter(|p| p.product_id == product_id)
            .take(self.page_size)
            .find(|p| p.unit_amount == unit_amount && p.currency.eq_ignore_ascii_case(currency))
            .map(|p| p.id.clone());

        if let Some(id) = existing {
            return Ok(id);
        }

        let id = object_id("price");
        state.prices.push(StoredPrice {
            id: id.clone(),
            product_id: product_id.to_string(),
            unit_amount,
            currency: currency.to_string(),
        });
        Ok(id)
    }

    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSession> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        request.validate()?;

        let id = object_id("cs");
        self.state.lock().await.sessions.push(request.clone());

        Ok(CheckoutSession {
            checkout_url: format!("https://checkout.memory.test/pay/{id}"),
            id,
            customer_email: request.customer_email.clone(),
            metadata: request.metadata.clone(),
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
