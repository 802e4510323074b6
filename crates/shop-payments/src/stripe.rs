//! Stripe Gateway
//!
//! `PaymentGateway` backed by the Stripe API: product/price lookup-or-create
//! and hosted checkout sessions ("Stripe Checkout (Hosted)").

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionMode, Client, CreateCheckoutSession,
    CreateCheckoutSessionLineItems,
};

use crate::error::{PaymentError, Result};
use crate::event::WebhookEvent;
use crate::gateway::{
    CheckoutSession, CheckoutSessionRequest, PaymentGateway, ProductSpec, CATEGORY_METADATA_KEY,
    LOOKUP_PAGE_SIZE, SIZE_METADATA_KEY,
};
use crate::signature;

/// Stripe client wrapper
pub struct StripeGateway {
    client: Client,
    webhook_tolerance_secs: i64,
}

impl StripeGateway {
    /// Create a new Stripe gateway from a secret key
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            webhook_tolerance_secs: signature::DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Accept webhook signatures up to `secs` old
    pub fn with_webhook_tolerance(mut self, secs: i64) -> Self {
        self.webhook_tolerance_secs = secs;
        self
    }
}

#[derive(Serialize)]
struct ListQuery<'a> {
    limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    product: Option<&'a str>,
}

#[derive(Deserialize)]
struct Page<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct ProductObject {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Deserialize)]
struct PriceObject {
    id: String,
    #[serde(default)]
    unit_amount: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Serialize)]
struct CreateProductForm<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    metadata: HashMap<&'static str, &'a str>,
}

#[derive(Serialize)]
struct CreatePriceForm<'a> {
    product: &'a str,
    unit_amount: i64,
    currency: &'a str,
}

fn stripe_error(e: stripe::StripeError) -> PaymentError {
    PaymentError::Stripe(e.to_string())
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn resolve_or_create_product(&self, product: &ProductSpec) -> Result<String> {
        let page: Page<ProductObject> = self
            .client
            .get_query(
                "/products",
                ListQuery {
                    limit: LOOKUP_PAGE_SIZE,
                    product: None,
                },
            )
            .await
            .map_err(stripe_error)?;

        if let Some(existing) = page
            .data
            .into_iter()
            .find(|p| product.matches(p.name.as_deref(), &p.metadata))
        {
            tracing::debug!(product_id = %existing.id, name = %product.name, "Reusing Stripe product");
            return Ok(existing.id);
        }

        let mut metadata = HashMap::new();
        metadata.insert(SIZE_METADATA_KEY, product.size_id.as_str());
        metadata.insert(
            CATEGORY_METADATA_KEY,
            product.category.as_deref().unwrap_or("general"),
        );

        let created: ProductObject = self
            .client
            .post_form(
                "/products",
                CreateProductForm {
                    name: &product.name,
                    description: Some(product.description.as_deref().unwrap_or(&product.name)),
                    images: product.images.clone(),
                    metadata,
                },
            )
            .await
            .map_err(stripe_error)?;

        tracing::info!(product_id = %created.id, name = %product.name, size = %product.size_id, "Created Stripe product");
        Ok(created.id)
    }

    async fn resolve_or_create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: &str,
    ) -> Result<String> {
        let page: Page<PriceObject> = self
            .client
            .get_query(
                "/prices",
                ListQuery {
                    limit: LOOKUP_PAGE_SIZE,
                    product: Some(product_id),
                },
            )
            .await
            .map_err(stripe_error)?;

        if let Some(existing) = page.data.into_iter().find(|p| {
            p.unit_amount == Some(unit_amount)
                && p.currency.as_deref().is_none_or(|c| c.eq_ignore_ascii_case(currency))
        }) {
            tracing::debug!(price_id = %existing.id, product_id, "Reusing Stripe price");
            return Ok(existing.id);
        }

        let created: PriceObject = self
            .client
            .post_form(
                "/prices",
                CreatePriceForm {
                    product: product_id,
                    unit_amount,
                    currency,
                },
            )
            .await
            .map_err(stripe_error)?;

        tracing::info!(price_id = %created.id, product_id, unit_amount, "Created Stripe price");
        Ok(created.id)
    }

    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSession> {
        request.validate()?;

        let mut params = CreateCheckoutSession::new();
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.customer_email = request.customer_email.as_deref();
        params.mode = Some(CheckoutSessionMode::Payment);
        params.metadata = Some(request.metadata.clone());
        params.line_items = Some(
            request
                .line_items
                .iter()
                .map(|item| CreateCheckoutSessionLineItems {
                    price: Some(item.price_id.clone()),
                    quantity: Some(u64::from(item.quantity)),
                    ..Default::default()
                })
                .collect(),
        );

        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(stripe_error)?;

        let checkout_url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("No checkout URL returned".into()))?;

        Ok(CheckoutSession {
            id: session.id.to_string(),
            checkout_url,
            customer_email: request.customer_email.clone(),
            metadata: request.metadata.clone(),
        })
    }

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
        secret: &str,
    ) -> Result<WebhookEvent> {
        signature::construct_event(payload, signature_header, secret, self.webhook_tolerance_secs)
    }

    fn name(&self) -> &str {
        "stripe"
    }
}
