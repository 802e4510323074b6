//! Storefront HTTP Server
//!
//! Axum-based REST API: accounts, catalog, carts, and Stripe checkout with
//! webhook-driven receipt recording.

mod auth;
mod config;
mod error;
mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shop_payments::{PaymentGateway, StripeGateway};

use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("invalid configuration")?;

    // Initialize payments
    let gateway: Option<Arc<dyn PaymentGateway>> = config.stripe_secret_key.as_deref().map(|key| {
        Arc::new(StripeGateway::new(key).with_webhook_tolerance(config.webhook_tolerance_secs))
            as Arc<dyn PaymentGateway>
    });

    if config.payments_configured() {
        tracing::info!(currency = %config.checkout.currency, "Stripe configured");
    } else {
        tracing::warn!("Stripe not configured - payments disabled");
        tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
    }
    if config.webhook_secret.is_none() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set - webhooks will be rejected");
    }

    let state = AppState::in_memory(&config, gateway);
    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("Storefront server running on http://{}", config.bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health");
    tracing::info!("  /users     register, login, verify, update");
    tracing::info!("  /clothes   sizes, create-cloth, get-all-clothes, get/update/delete-cloth");
    tracing::info!("  /checkout  create-cart, get-cart, edit-cart, create-checkout-session,");
    tracing::info!("             create-order-from-items, create-order (Stripe webhook)");

    axum::serve(listener, app).await?;

    Ok(())
}
