//! API Error Envelope
//!
//! Every failure renders as `{success: false, message, error}`.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shop_core::ShopError;
use shop_payments::PaymentError;
use thiserror::Error;

use crate::auth::AuthError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Store(#[from] ShopError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Payments are not configured")]
    PaymentsDisabled,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    error: String,
}

fn store_status(error: &ShopError) -> StatusCode {
    match error {
        ShopError::Validation(_) => StatusCode::BAD_REQUEST,
        ShopError::NotFound { .. } => StatusCode::NOT_FOUND,
        ShopError::Conflict(_) => StatusCode::CONFLICT,
        ShopError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Payment(PaymentError::Storage(inner)) => store_status(inner),
            ApiError::Payment(e) if e.is_webhook_rejection() => StatusCode::BAD_REQUEST,
            ApiError::Payment(e) if e.is_retryable() => StatusCode::BAD_GATEWAY,
            ApiError::Payment(PaymentError::UserNotFound(_) | PaymentError::CartNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Payment(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(e) => store_status(e),
            ApiError::Auth(e) => match e {
                AuthError::MissingToken | AuthError::InvalidToken | AuthError::InvalidCredentials => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::PasswordHash | AuthError::TokenCreation(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PaymentsDisabled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Message safe to show to an end user
    fn message(&self) -> String {
        match self {
            ApiError::Payment(PaymentError::Storage(inner)) | ApiError::Store(inner) => {
                match inner {
                    ShopError::Storage(_) => "An error occurred processing your request.".into(),
                    other => other.to_string(),
                }
            }
            ApiError::Payment(e) => e.user_message().into(),
            ApiError::Auth(AuthError::PasswordHash | AuthError::TokenCreation(_)) => {
                "Authentication is temporarily unavailable.".into()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }

        let body = ErrorBody {
            success: false,
            message: self.message(),
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// `Json` whose rejection uses the error envelope
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}
