//! Checkout and webhook handlers

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shop_core::CartLineItem;
use shop_payments::{signature::SIGNATURE_HEADER, CheckoutSession, CheckoutWorkflow};

use super::Envelope;
use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

/// One requested item; absent fields take storefront defaults
#[derive(Debug, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub img: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl OrderItem {
    fn into_line_item(self) -> CartLineItem {
        let description = self.description.unwrap_or_else(|| self.name.clone());
        CartLineItem {
            quantity: self.quantity.unwrap_or(1),
            price: self.price,
            size_id: self.size.unwrap_or_else(|| "standard".into()),
            description: Some(description),
            img: Some(self.img.unwrap_or_default()),
            category: Some(self.category.unwrap_or_else(|| "general".into())),
            external_price_id: None,
            name: self.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderFromItemsRequest {
    #[serde(default)]
    pub items: Option<Vec<OrderItem>>,
}

#[derive(Debug, Serialize)]
pub struct SessionData {
    pub session_url: String,
    pub session: CheckoutSession,
}

/// `{success, url}` rather than the usual envelope; clients depend on it
#[derive(Debug, Serialize)]
pub struct OrderUrlResponse {
    pub success: bool,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

fn workflow(state: &AppState) -> Result<&CheckoutWorkflow, ApiError> {
    state.checkout.as_deref().ok_or_else(|| {
        tracing::warn!("Checkout requested but Stripe is not configured");
        ApiError::PaymentsDisabled
    })
}

/// Open a hosted checkout session for the caller's stored cart
pub async fn create_checkout_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Envelope<SessionData>>, ApiError> {
    let outcome = workflow(&state)?.create_session(&user_id).await?;

    Ok(Envelope::ok(SessionData {
        session_url: outcome.session.checkout_url.clone(),
        session: outcome.session,
    }))
}

/// Store the items as a new cart and open a session for it
pub async fn create_order_from_items(
    State(state): State<AppState>,
    MaybeAuthUser(user_id): MaybeAuthUser,
    ApiJson(payload): ApiJson<OrderFromItemsRequest>,
) -> Result<Json<OrderUrlResponse>, ApiError> {
    let items: Vec<CartLineItem> = payload
        .items
        .filter(|items| !items.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No items provided".into()))?
        .into_iter()
        .map(OrderItem::into_line_item)
        .collect();

    let outcome = workflow(&state)?
        .create_session_from_items(user_id.as_ref(), items)
        .await?;

    Ok(Json(OrderUrlResponse {
        success: true,
        url: outcome.session.checkout_url,
    }))
}

/// Stripe webhook: raw body plus `Stripe-Signature`
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let handler = state.webhooks.as_ref().ok_or_else(|| {
        tracing::warn!("Webhook received but Stripe is not configured");
        ApiError::PaymentsDisabled
    })?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = handler
        .ingest(&body, signature, state.webhook_secret.as_deref())
        .await?;

    tracing::debug!(?outcome, "Webhook handled");
    Ok(Json(WebhookAck { received: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::{register_and_login, send, send_raw, TestApp};
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use shop_payments::{signature::sign_payload, ANONYMOUS_USER};

    #[test]
    fn test_order_item_defaults() {
        let item: OrderItem = serde_json::from_value(json!({"name": "Tee", "price": 12})).unwrap();
        let line = item.into_line_item();
        assert_eq!(line.quantity, 1);
        assert_eq!(line.size_id, "standard");
        assert_eq!(line.description.as_deref(), Some("Tee"));
        assert_eq!(line.img.as_deref(), Some(""));
        assert_eq!(line.category.as_deref(), Some("general"));
    }

    async fn cart_with_items(app: &TestApp, token: &str) {
        let (status, _) = send(
            &app.router,
            Method::POST,
            "/checkout/create-cart",
            Some(token),
            Some(json!({"products": [
                {"name": "Tee", "price": 19.99, "sizeId": "M", "quantity": 2},
                {"name": "Cap", "price": 9.5, "sizeId": "standard"}
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_checkout_session_for_stored_cart() {
        let app = TestApp::new();
        let token = register_and_login(&app, "ana", Some("a@example.com")).await;
        cart_with_items(&app, &token).await;

        let (status, body) = send(
            &app.router,
            Method::GET,
            "/checkout/create-checkout-session",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let url = body["data"]["session_url"].as_str().unwrap();
        assert!(url.starts_with("https://checkout.memory.test/"));
        assert_eq!(body["data"]["session"]["customer_email"], "a@example.com");

        // Resolved prices were written back onto the cart
        let (_, body) = send(&app.router, Method::GET, "/checkout/get-cart", Some(&token), None).await;
        for item in body["data"]["cart"]["products"].as_array().unwrap() {
            assert!(item["externalPriceId"].as_str().is_some_and(|id| !id.is_empty()));
        }
        assert_eq!(app.gateway.calls().sessions, 1);
    }

    #[tokio::test]
    async fn test_checkout_empty_cart_is_bad_request() {
        let app = TestApp::new();
        let token = register_and_login(&app, "ana", None).await;
        send(
            &app.router,
            Method::POST,
            "/checkout/create-cart",
            Some(&token),
            Some(json!({"products": []})),
        )
        .await;

        let (status, body) = send(
            &app.router,
            Method::GET,
            "/checkout/create-checkout-session",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(app.gateway.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_checkout_requires_auth() {
        let app = TestApp::new();
        let (status, _) = send(
            &app.router,
            Method::GET,
            "/checkout/create-checkout-session",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_payments_disabled() {
        let app = TestApp::without_payments();
        let token = register_and_login(&app, "ana", None).await;
        cart_with_items(&app, &token).await;

        let (status, body) = send(
            &app.router,
            Method::GET,
            "/checkout/create-checkout-session",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);

        let (status, body) = send(&app.router, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["payments_configured"], false);
    }

    #[tokio::test]
    async fn test_anonymous_order_from_items() {
        let app = TestApp::new();
        let (status, body) = send(
            &app.router,
            Method::POST,
            "/checkout/create-order-from-items",
            None,
            Some(json!({"items": [{"name": "Tee", "price": 12}]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(body["url"].as_str().is_some());

        let sessions = app.gateway.sessions().await;
        assert_eq!(
            sessions[0].metadata.get("userId").map(String::as_str),
            Some(ANONYMOUS_USER)
        );
        assert_eq!(sessions[0].line_items[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_order_from_items_links_cart() {
        let app = TestApp::new();
        let token = register_and_login(&app, "ana", None).await;

        let (status, _) = send(
            &app.router,
            Method::POST,
            "/checkout/create-order-from-items",
            Some(&token),
            Some(json!({"items": [{"name": "Tee", "price": 12, "quantity": 3, "size": "L"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app.router, Method::GET, "/checkout/get-cart", Some(&token), None).await;
        let item = &body["data"]["cart"]["products"][0];
        assert_eq!(item["quantity"], 3);
        assert_eq!(item["sizeId"], "L");
        assert_eq!(item["category"], "general");
    }

    #[tokio::test]
    async fn test_order_from_items_without_items() {
        let app = TestApp::new();
        for payload in [json!({}), json!({"items": []})] {
            let (status, body) = send(
                &app.router,
                Method::POST,
                "/checkout/create-order-from-items",
                None,
                Some(payload),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["message"], "No items provided");
        }
        assert_eq!(app.gateway.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_oversized_price_is_bad_request() {
        let app = TestApp::new();
        let (status, body) = send(
            &app.router,
            Method::POST,
            "/checkout/create-order-from-items",
            None,
            Some(json!({"items": [{"name": "Tee", "price": 7e28}]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(app.gateway.calls().total(), 0);

        let (status, _) = send(
            &app.router,
            Method::POST,
            "/checkout/create-cart",
            None,
            Some(json!({"products": [{"name": "Tee", "price": 7e28, "sizeId": "M"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    fn charge_event(email: &str) -> Vec<u8> {
        json!({
            "id": "evt_1",
            "type": "charge.succeeded",
            "data": {"object": {
                "amount": 2599,
                "created": 1_700_000_000,
                "receipt_url": "https://pay.example.com/receipts/rc_123",
                "billing_details": {"email": email}
            }}
        })
        .to_string()
        .into_bytes()
    }

    async fn receipts_of(app: &TestApp, username: &str) -> usize {
        app.state
            .users
            .find_by_username(username)
            .await
            .unwrap()
            .map_or(0, |user| user.receipts.len())
    }

    #[tokio::test]
    async fn test_webhook_records_receipt() {
        let app = TestApp::new();
        register_and_login(&app, "ana", Some("a@example.com")).await;

        let body = charge_event("a@example.com");
        let signature = sign_payload(&body, TestApp::WEBHOOK_SECRET, chrono::Utc::now().timestamp()).unwrap();
        let (status, response) =
            send_raw(&app.router, "/checkout/create-order", Some(&signature), body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response, json!({"received": true}));
        assert_eq!(receipts_of(&app, "ana").await, 1);
    }

    #[tokio::test]
    async fn test_webhook_rejections() {
        let app = TestApp::new();
        register_and_login(&app, "ana", Some("a@example.com")).await;
        let body = charge_event("a@example.com");

        let (status, response) = send_raw(&app.router, "/checkout/create-order", None, body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["success"], false);

        let forged = sign_payload(&body, "whsec_forged", chrono::Utc::now().timestamp()).unwrap();
        let (status, _) = send_raw(&app.router, "/checkout/create-order", Some(&forged), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(receipts_of(&app, "ana").await, 0);
    }

    #[tokio::test]
    async fn test_webhook_for_unknown_payer_is_not_acknowledged() {
        let app = TestApp::new();
        let body = charge_event("ghost@example.com");
        let signature = sign_payload(&body, TestApp::WEBHOOK_SECRET, chrono::Utc::now().timestamp()).unwrap();
        let (status, _) = send_raw(&app.router, "/checkout/create-order", Some(&signature), body).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
