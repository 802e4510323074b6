//! Checkout Workflow
//!
//! Cart → provider prices → hosted checkout session.
//!
//! ```text
//! ┌──────────┐  resolve   ┌──────────────┐  create   ┌──────────────┐
//! │   Cart   │──────────▶ │ product/price│─────────▶ │   session    │──▶ redirect URL
//! │ (stored) │◀── annotate│  (gateway)   │           │  (gateway)   │
//! └──────────┘  price ids └──────────────┘           └──────────────┘
//! ```
//!
//! Resolved price ids are written back onto the stored cart so a repeated
//! checkout of unchanged items makes no provider calls for them. Items edited
//! while checkout runs keep the edit and get no price id. The cart is
//! not cleared here; payment confirmation arrives later through the webhook.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use shop_core::{
    Cart, CartId, CartLineItem, CartStore, PriceAnnotation, User, UserId, UserStore, DEFAULT_CURRENCY,
};

use crate::error::{PaymentError, Result};
use crate::gateway::{CheckoutLineItem, CheckoutSession, CheckoutSessionRequest, PaymentGateway, ProductSpec};

/// Metadata key tying a session to the account
pub const USER_ID_METADATA_KEY: &str = "userId";

/// Metadata key tying a session to the cart
pub const CART_ID_METADATA_KEY: &str = "cartId";

/// `userId` metadata value for checkouts without an account
pub const ANONYMOUS_USER: &str = "anonymous";

/// Checkout configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSettings {
    pub success_url: String,
    pub cancel_url: String,
    /// Currency for created prices
    pub currency: String,
    /// Upper bound on every single gateway call
    pub gateway_timeout: Duration,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            success_url: "http://localhost:5173/success".into(),
            cancel_url: "http://localhost:5173/carrito".into(),
            currency: DEFAULT_CURRENCY.into(),
            gateway_timeout: Duration::from_secs(10),
        }
    }
}

/// A created session and the cart it was built from
#[derive(Clone, Debug, Serialize)]
pub struct CheckoutOutcome {
    pub cart_id: CartId,
    pub session: CheckoutSession,
}

/// Load an account and the cart it references. `UserNotFound` without the
/// account, `CartNotFound` when it has no cart or the cart is gone.
pub async fn find_user_and_cart(
    users: &dyn UserStore,
    carts: &dyn CartStore,
    user_id: &UserId,
) -> Result<(User, Cart)> {
    let user = users
        .get(user_id)
        .await?
        .ok_or_else(|| PaymentError::UserNotFound(user_id.to_string()))?;

    let cart_id = user
        .cart
        .clone()
        .ok_or_else(|| PaymentError::CartNotFound(format!("user {} has no cart", user.id)))?;

    let cart = carts
        .get(&cart_id)
        .await?
        .ok_or_else(|| PaymentError::CartNotFound(cart_id.to_string()))?;

    Ok((user, cart))
}

/// Orchestrates stores and gateway for session creation
pub struct CheckoutWorkflow {
    gateway: Arc<dyn PaymentGateway>,
    carts: Arc<dyn CartStore>,
    users: Arc<dyn UserStore>,
    settings: CheckoutSettings,
}

impl CheckoutWorkflow {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        carts: Arc<dyn CartStore>,
        users: Arc<dyn UserStore>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            gateway,
            carts,
            users,
            settings,
        }
    }

    /// Load an account and the cart it references
    pub async fn find_user_and_cart(&self, user_id: &UserId) -> Result<(User, Cart)> {
        find_user_and_cart(self.users.as_ref(), self.carts.as_ref(), user_id).await
    }

    /// Check out the account's stored cart
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn create_session(&self, user_id: &UserId) -> Result<CheckoutOutcome> {
        let (user, mut cart) = self.find_user_and_cart(user_id).await?;

        if cart.is_empty() {
            return Err(PaymentError::EmptyCart);
        }

        self.resolve_prices(&mut cart).await?;
        let session = self
            .open_session(&cart, user.email.clone(), user.id.as_str())
            .await?;

        Ok(CheckoutOutcome {
            cart_id: cart.id,
            session,
        })
    }

    /// Check out an explicit item list: store it as a new cart (linked to the
    /// account when there is one), resolve prices and open a session.
    #[tracing::instrument(skip(self, items), fields(items = items.len()))]
    pub async fn create_session_from_items(
        &self,
        user_id: Option<&UserId>,
        items: Vec<CartLineItem>,
    ) -> Result<CheckoutOutcome> {
        if items.is_empty() {
            return Err(PaymentError::Validation("No items provided".into()));
        }

        let cart = Cart::new(items);
        cart.validate()
            .map_err(|e| PaymentError::Validation(e.to_string()))?;

        let user = match user_id {
            Some(id) => Some(
                self.users
                    .get(id)
                    .await?
                    .ok_or_else(|| PaymentError::UserNotFound(id.to_string()))?,
            ),
            None => None,
        };

        let mut cart = self.carts.insert(cart).await?;
        if let Some(user) = &user {
            self.users.set_cart(&user.id, &cart.id).await?;
        }

        self.resolve_prices(&mut cart).await?;

        let (email, user_ref) = match &user {
            Some(user) => (user.email.clone(), user.id.as_str()),
            None => (None, ANONYMOUS_USER),
        };
        let session = self.open_session(&cart, email, user_ref).await?;

        Ok(CheckoutOutcome {
            cart_id: cart.id,
            session,
        })
    }

    /// Resolve provider prices for every unresolved line item and record them
    /// on the stored cart.
    ///
    /// Items sharing a name and size resolve one product; items sharing that
    /// product and a unit amount resolve one price. Distinct products resolve
    /// concurrently.
    async fn resolve_prices(&self, cart: &mut Cart) -> Result<()> {
        let mut groups: HashMap<(String, String), (ProductSpec, HashMap<i64, Vec<usize>>)> =
            HashMap::new();
        for (index, item) in cart.products.iter().enumerate() {
            if item.resolved_price().is_some() {
                continue;
            }
            let unit_amount = item.unit_amount_minor().ok_or_else(|| {
                PaymentError::Validation(format!("price for '{}' is out of range", item.name))
            })?;
            groups
                .entry((item.name.clone(), item.size_id.clone()))
                .or_insert_with(|| (ProductSpec::from_line_item(item), HashMap::new()))
                .1
                .entry(unit_amount)
                .or_default()
                .push(index);
        }

        if groups.is_empty() {
            return Ok(());
        }

        let resolved = try_join_all(
            groups
                .into_values()
                .map(|(spec, amounts)| self.resolve_product_prices(spec, amounts)),
        )
        .await?;

        let mut annotations = Vec::new();
        for (indexes, price_id) in resolved.into_iter().flatten() {
            for index in indexes {
                if let Some(item) = cart.products.get_mut(index) {
                    annotations.push(PriceAnnotation {
                        index,
                        snapshot: item.clone(),
                        price_id: price_id.clone(),
                    });
                    item.external_price_id = Some(price_id.clone());
                }
            }
        }

        // Prices created above are orphaned on the provider if this write fails.
        let applied = self.carts.annotate_prices(&cart.id, &annotations).await?;
        tracing::debug!(
            cart_id = %cart.id,
            resolved = annotations.len(),
            applied = ?applied,
            "Annotated cart with provider prices"
        );
        Ok(())
    }

    /// One product, then one price per distinct unit amount
    async fn resolve_product_prices(
        &self,
        spec: ProductSpec,
        amounts: HashMap<i64, Vec<usize>>,
    ) -> Result<Vec<(Vec<usize>, String)>> {
        let product_id = self
            .bounded(self.gateway.resolve_or_create_product(&spec))
            .await?;
        let product_id = product_id.as_str();

        try_join_all(amounts.into_iter().map(|(unit_amount, indexes)| async move {
            self.bounded(self.gateway.resolve_or_create_price(
                product_id,
                unit_amount,
                &self.settings.currency,
            ))
            .await
            .map(|price_id| (indexes, price_id))
        }))
        .await
    }

    async fn open_session(
        &self,
        cart: &Cart,
        customer_email: Option<String>,
        user_ref: &str,
    ) -> Result<CheckoutSession> {
        let line_items = cart
            .products
            .iter()
            .map(|item| {
                let price_id = item.resolved_price().ok_or_else(|| {
                    PaymentError::InvalidLineItem(format!("'{}' has no resolved price", item.name))
                })?;
                Ok(CheckoutLineItem {
                    price_id: price_id.to_string(),
                    quantity: item.quantity.max(1),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut metadata = HashMap::new();
        metadata.insert(USER_ID_METADATA_KEY.to_string(), user_ref.to_string());
        metadata.insert(CART_ID_METADATA_KEY.to_string(), cart.id.to_string());

        let request = CheckoutSessionRequest {
            line_items,
            success_url: self.settings.success_url.clone(),
            cancel_url: self.settings.cancel_url.clone(),
            customer_email,
            metadata,
        };

        let session = self
            .bounded(self.gateway.create_checkout_session(&request))
            .await?;

        tracing::info!(
            session_id = %session.id,
            cart_id = %cart.id,
            user_id = %user_ref,
            gateway = self.gateway.name(),
            "Created checkout session"
        );

        Ok(session)
    }

    /// Apply the gateway timeout to one call
    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        let limit = self.settings.gateway_timeout;
        tokio::time::timeout(limit, call).await.map_err(|_| {
            PaymentError::GatewayUnavailable(format!("no response within {}ms", limit.as_millis()))
        })?
    }
}
