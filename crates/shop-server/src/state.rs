//! Application State

use std::sync::Arc;

use shop_core::{
    CartStore, CatalogStore, MemoryCartStore, MemoryCatalogStore, MemoryUserStore, UserStore,
};
use shop_payments::{CheckoutWorkflow, PaymentGateway, WebhookHandler};

use crate::auth::AuthKeys;
use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub carts: Arc<dyn CartStore>,
    pub users: Arc<dyn UserStore>,

    /// Checkout workflow (None if payments are not configured)
    pub checkout: Option<Arc<CheckoutWorkflow>>,

    /// Webhook ingestion (None if payments are not configured)
    pub webhooks: Option<Arc<WebhookHandler>>,

    /// Signing secret for webhook deliveries
    pub webhook_secret: Option<String>,

    pub auth: AuthKeys,
}

impl AppState {
    pub fn new(
        config: &Config,
        catalog: Arc<dyn CatalogStore>,
        carts: Arc<dyn CartStore>,
        users: Arc<dyn UserStore>,
        gateway: Option<Arc<dyn PaymentGateway>>,
    ) -> Self {
        let checkout = gateway.as_ref().map(|gateway| {
            Arc::new(CheckoutWorkflow::new(
                gateway.clone(),
                carts.clone(),
                users.clone(),
                config.checkout.clone(),
            ))
        });
        let webhooks = gateway
            .map(|gateway| Arc::new(WebhookHandler::new(gateway, users.clone())));

        Self {
            catalog,
            carts,
            users,
            checkout,
            webhooks,
            webhook_secret: config.webhook_secret.clone(),
            auth: AuthKeys::new(&config.jwt_secret, config.token_ttl_secs),
        }
    }

    /// State backed by the in-memory stores
    pub fn in_memory(config: &Config, gateway: Option<Arc<dyn PaymentGateway>>) -> Self {
        Self::new(
            config,
            Arc::new(MemoryCatalogStore::new()),
            Arc::new(MemoryCartStore::new()),
            Arc::new(MemoryUserStore::new()),
            gateway,
        )
    }

    pub fn payments_configured(&self) -> bool {
        self.checkout.is_some()
    }
}
