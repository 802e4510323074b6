//! Account handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use shop_core::{ProfileUpdate, ShopError, User};

use super::Envelope;
use crate::auth::{hash_password_blocking, verify_password_blocking, AuthError, AuthUser};
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
    #[serde(default)]
    pub genre: Option<String>,
    pub age: u32,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserData {
    pub user: User,
}

fn required(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Envelope<UserData>>), ApiError> {
    required(&payload.username, "username")?;
    required(&payload.password, "password")?;

    let password_hash = hash_password_blocking(payload.password).await?;
    let mut user = User::new(payload.username.trim(), password_hash, payload.age);
    user.email = payload.email.filter(|email| !email.trim().is_empty());
    user.genre = payload.genre;

    let user = state.users.insert(user).await?;
    tracing::info!(user_id = %user.id, username = %user.username, "Registered user");

    Ok((StatusCode::CREATED, Envelope::ok(UserData { user })))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = state
        .users
        .find_by_username(&payload.username)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    verify_password_blocking(payload.password, user.password_hash.clone()).await?;
    let token = state.auth.issue_token(&user.id)?;

    tracing::debug!(user_id = %user.id, "Issued token");
    Ok(Json(TokenResponse { token }))
}

pub async fn verify(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Envelope<UserData>>, ApiError> {
    let user = state
        .users
        .get(&user_id)
        .await?
        .ok_or_else(|| ShopError::not_found("User", &user_id))?;

    Ok(Envelope::ok(UserData { user }))
}

/// Change username, password or age. Cart and receipts are never touched.
pub async fn update(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<Json<Envelope<UserData>>, ApiError> {
    let username = match payload.username {
        Some(username) => {
            required(&username, "username")?;
            Some(username.trim().to_string())
        }
        None => None,
    };
    let password_hash = match payload.password {
        Some(password) => {
            required(&password, "password")?;
            Some(hash_password_blocking(password).await?)
        }
        None => None,
    };

    let update = ProfileUpdate {
        username,
        password_hash,
        age: payload.age,
    };
    let user = state
        .users
        .update_profile(&user_id, update)
        .await?
        .ok_or_else(|| ShopError::not_found("User", &user_id))?;

    tracing::info!(user_id = %user.id, "Updated user");
    Ok(Envelope::ok(UserData { user }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::routes::testing::{register_and_login, send, send_raw, TestApp};
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use shop_payments::signature::sign_payload;

    #[tokio::test]
    async fn test_register_hides_password() {
        let app = TestApp::new();
        let (status, body) = send(
            &app.router,
            Method::POST,
            "/users/register",
            None,
            Some(json!({"username": "ana", "password": "pw", "age": 30, "email": "a@example.com"})),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["user"]["username"], "ana");
        assert!(body["data"]["user"].get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let app = TestApp::new();
        let payload = json!({"username": "ana", "password": "pw", "age": 30});
        send(&app.router, Method::POST, "/users/register", None, Some(payload.clone())).await;
        let (status, body) = send(&app.router, Method::POST, "/users/register", None, Some(payload)).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_login_and_verify() {
        let app = TestApp::new();
        let token = register_and_login(&app, "ana", Some("a@example.com")).await;

        let (status, body) = send(&app.router, Method::GET, "/users/verify", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["user"]["email"], "a@example.com");
    }

    #[tokio::test]
    async fn test_bad_password_is_unauthorized() {
        let app = TestApp::new();
        register_and_login(&app, "ana", None).await;

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/users/login",
            None,
            Some(json!({"username": "ana", "password": "wrong"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = send(
            &app.router,
            Method::POST,
            "/users/login",
            None,
            Some(json!({"username": "nobody", "password": "pw"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_verify_requires_token() {
        let app = TestApp::new();
        let (status, _) = send(&app.router, Method::GET, "/users/verify", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app.router, Method::GET, "/users/verify", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_update_profile() {
        let app = TestApp::new();
        let token = register_and_login(&app, "ana", None).await;

        let (status, body) = send(
            &app.router,
            Method::PUT,
            "/users/update",
            Some(&token),
            Some(json!({"username": "ana2", "age": 31, "password": "new"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["user"]["username"], "ana2");
        assert_eq!(body["data"]["user"]["age"], 31);

        let (status, _) = send(
            &app.router,
            Method::POST,
            "/users/login",
            None,
            Some(json!({"username": "ana2", "password": "new"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_update_to_taken_username_conflicts() {
        let app = TestApp::new();
        register_and_login(&app, "bob", None).await;
        let token = register_and_login(&app, "ana", None).await;

        let (status, _) = send(
            &app.router,
            Method::PUT,
            "/users/update",
            Some(&token),
            Some(json!({"username": "bob"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_update_keeps_receipts_and_cart_written_meanwhile() {
        let app = TestApp::new();
        let token = register_and_login(&app, "ana", Some("a@example.com")).await;
        let (status, _) = send(
            &app.router,
            Method::POST,
            "/checkout/create-cart",
            Some(&token),
            Some(json!({"products": []})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        for round in 0..5 {
            let update = tokio::spawn({
                let router = app.router.clone();
                let token = token.clone();
                async move {
                    send(
                        &router,
                        Method::PUT,
                        "/users/update",
                        Some(&token),
                        Some(json!({"password": format!("pw{round}"), "age": 30 + round})),
                    )
                    .await
                }
            });
            tokio::time::sleep(Duration::from_millis(2)).await;

            let body = json!({
                "id": format!("evt_{round}"),
                "type": "charge.succeeded",
                "data": {"object": {
                    "amount": 2599,
                    "created": 1_700_000_000,
                    "receipt_url": format!("https://pay.example.com/receipts/rc_{round}"),
                    "billing_details": {"email": "a@example.com"}
                }}
            })
            .to_string()
            .into_bytes();
            let signature =
                sign_payload(&body, TestApp::WEBHOOK_SECRET, chrono::Utc::now().timestamp()).unwrap();
            let (status, _) =
                send_raw(&app.router, "/checkout/create-order", Some(&signature), body).await;
            assert_eq!(status, StatusCode::OK);

            let (status, _) = update.await.unwrap();
            assert_eq!(status, StatusCode::OK);
        }

        let user = app.state.users.find_by_username("ana").await.unwrap().unwrap();
        assert_eq!(user.receipts.len(), 5);
        assert!(user.cart.is_some());
        assert_eq!(user.age, 34);
    }
}
