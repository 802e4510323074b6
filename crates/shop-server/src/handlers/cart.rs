//! Cart handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use shop_core::{Cart, CartLineItem};
use shop_payments::{find_user_and_cart, PaymentError};

use super::Envelope;
use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateCartRequest {
    #[serde(default)]
    pub products: Vec<CartLineItem>,
}

#[derive(Debug, Deserialize)]
pub struct EditCartRequest {
    #[serde(default)]
    pub products: Option<Vec<CartLineItem>>,
}

#[derive(Debug, Serialize)]
pub struct CartData {
    pub cart: Cart,
}

/// Create a cart. With a bearer token the caller's account is pointed at it.
pub async fn create_cart(
    State(state): State<AppState>,
    MaybeAuthUser(user_id): MaybeAuthUser,
    ApiJson(payload): ApiJson<CreateCartRequest>,
) -> Result<(StatusCode, Json<Envelope<CartData>>), ApiError> {
    let cart = Cart::new(payload.products);
    cart.validate()?;

    let cart = state.carts.insert(cart).await?;
    if let Some(user_id) = user_id {
        state
            .users
            .set_cart(&user_id, &cart.id)
            .await?
            .ok_or_else(|| PaymentError::UserNotFound(user_id.to_string()))?;
    }

    tracing::info!(cart_id = %cart.id, items = cart.products.len(), "Created cart");
    Ok((
        StatusCode::CREATED,
        Envelope::with_message("Cart created", CartData { cart }),
    ))
}

pub async fn get_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Envelope<CartData>>, ApiError> {
    let (_, cart) = find_user_and_cart(state.users.as_ref(), state.carts.as_ref(), &user_id).await?;
    Ok(Envelope::ok(CartData { cart }))
}

/// Replace the caller's line items wholesale
pub async fn edit_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<EditCartRequest>,
) -> Result<Json<Envelope<CartData>>, ApiError> {
    let products = payload
        .products
        .ok_or_else(|| ApiError::BadRequest("products is required".into()))?;
    products.iter().try_for_each(CartLineItem::validate)?;

    let (_, cart) = find_user_and_cart(state.users.as_ref(), state.carts.as_ref(), &user_id).await?;
    let cart = state
        .carts
        .replace_items(&cart.id, products)
        .await?
        .ok_or_else(|| PaymentError::CartNotFound(cart.id.to_string()))?;

    tracing::info!(cart_id = %cart.id, items = cart.products.len(), "Edited cart");
    Ok(Envelope::ok(CartData { cart }))
}
