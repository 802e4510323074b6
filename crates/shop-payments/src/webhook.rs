//! Stripe Webhook Handling
//!
//! Verifies provider callbacks and records receipts for successful charges.
//!
//! ```text
//! Received ─▶ credentials? ─no─▶ Rejected(MissingCredentials)
//!                 │yes
//!                 ▼
//!          signature ok? ─no─▶ Rejected(BadSignature)
//!                 │yes
//!                 ▼
//!   charge.succeeded ─▶ append receipt     ┐
//!   checkout.session.completed ─▶ log link ├─▶ Acknowledged
//!   anything else ─▶ ignore                ┘
//! ```

use std::sync::Arc;

use serde::Serialize;
use shop_core::{Receipt, UserId, UserStore};

use crate::error::{PaymentError, Result};
use crate::event::WebhookEvent;
use crate::gateway::PaymentGateway;

/// What a handled event did
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// Receipt appended to the payer's account
    ReceiptRecorded { user_id: UserId, receipt: Receipt },

    /// Checkout finished. Linked back to user and cart, nothing persisted.
    CheckoutCompleted {
        session_id: String,
        user_id: Option<String>,
        cart_id: Option<String>,
    },

    /// Event type the storefront does not act on
    Ignored { event_type: String },
}

/// Webhook handler
pub struct WebhookHandler {
    gateway: Arc<dyn PaymentGateway>,
    users: Arc<dyn UserStore>,
}

impl WebhookHandler {
    pub fn new(gateway: Arc<dyn PaymentGateway>, users: Arc<dyn UserStore>) -> Self {
        Self { gateway, users }
    }

    /// Verify and handle a raw webhook delivery.
    ///
    /// Credentials are checked before any verification is attempted; no store
    /// is touched unless the signature matches.
    pub async fn ingest(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        secret: Option<&str>,
    ) -> Result<WebhookOutcome> {
        let (Some(signature), Some(secret)) = (
            signature.filter(|s| !s.is_empty()),
            secret.filter(|s| !s.is_empty()),
        ) else {
            tracing::warn!("Webhook rejected: missing signature header or signing secret");
            return Err(PaymentError::MissingWebhookCredentials);
        };

        let event = self
            .gateway
            .verify_webhook_signature(payload, signature, secret)
            .inspect_err(|e| tracing::warn!(error = %e, "Webhook rejected"))?;

        self.handle(event).await
    }

    /// Process a verified event
    pub async fn handle(&self, event: WebhookEvent) -> Result<WebhookOutcome> {
        tracing::info!(event_type = %event.event_type(), "Processing Stripe webhook");

        match event {
            WebhookEvent::ChargeSucceeded {
                event_id,
                email,
                receipt_url,
                amount,
                created,
            } => {
                let email = email.ok_or(PaymentError::MissingEmail)?;
                let receipt_url = receipt_url.ok_or_else(|| {
                    PaymentError::WebhookParse(format!("charge in {event_id} has no receipt_url"))
                })?;
                let receipt = Receipt::from_charge(receipt_url, amount, created).ok_or_else(|| {
                    PaymentError::WebhookParse(format!("receipt URL in {event_id} has no path segment"))
                })?;

                let user = self
                    .users
                    .append_receipt(&email, receipt.clone())
                    .await?
                    .ok_or_else(|| {
                        tracing::error!(%email, event_id, "Charge for unknown user");
                        PaymentError::UserNotFound(email.clone())
                    })?;

                tracing::info!(
                    user_id = %user.id,
                    receipt_id = %receipt.receipt_id,
                    amount,
                    "Recorded receipt"
                );

                Ok(WebhookOutcome::ReceiptRecorded {
                    user_id: user.id,
                    receipt,
                })
            }

            // Extension point: clearing the cart or creating an order record
            // would hang off this event.
            WebhookEvent::CheckoutCompleted {
                session_id,
                user_id,
                cart_id,
                ..
            } => {
                tracing::info!(
                    session_id = %session_id,
                    user_id = ?user_id,
                    cart_id = ?cart_id,
                    "Checkout completed"
                );
                Ok(WebhookOutcome::CheckoutCompleted {
                    session_id,
                    user_id,
                    cart_id,
                })
            }

            WebhookEvent::Other { event_type, .. } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
                Ok(WebhookOutcome::Ignored { event_type })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MemoryGateway;
    use crate::signature::sign_payload;
    use serde_json::json;
    use shop_core::{MemoryUserStore, User};

    const SECRET: &str = "whsec_test";

    async fn handler_with_users() -> (WebhookHandler, Arc<MemoryUserStore>, User, User) {
        let users = Arc::new(MemoryUserStore::new());
        let ana = users
            .insert(User::new("ana", "hash", 30).with_email("a@example.com"))
            .await
            .unwrap();
        let bob = users
            .insert(User::new("bob", "hash", 40).with_email("b@example.com"))
            .await
            .unwrap();
        let handler = WebhookHandler::new(Arc::new(MemoryGateway::new()), users.clone());
        (handler, users, ana, bob)
    }

    fn charge_body(email: Option<&str>) -> Vec<u8> {
        json!({
            "id": "evt_1",
            "type": "charge.succeeded",
            "created": 1_700_000_001,
            "data": {"object": {
                "id": "ch_1",
                "amount": 2599,
                "created": 1_700_000_000,
                "receipt_url": "https://pay.example.com/receipts/rc_123",
                "billing_details": {"email": email}
            }}
        })
        .to_string()
        .into_bytes()
    }

    fn signed(body: &[u8]) -> String {
        sign_payload(body, SECRET, chrono::Utc::now().timestamp()).unwrap()
    }

    #[tokio::test]
    async fn test_charge_appends_receipt_to_matching_user_only() {
        let (handler, users, ana, bob) = handler_with_users().await;
        let body = charge_body(Some("a@example.com"));

        let outcome = handler
            .ingest(&body, Some(&signed(&body)), Some(SECRET))
            .await
            .unwrap();

        let expected = Receipt {
            receipt_url: "https://pay.example.com/receipts/rc_123".into(),
            receipt_id: "rc_123".into(),
            date_created: 1_700_000_000,
            amount: 2599,
        };
        assert_eq!(
            outcome,
            WebhookOutcome::ReceiptRecorded {
                user_id: ana.id.clone(),
                receipt: expected.clone(),
            }
        );
        assert_eq!(users.get(&ana.id).await.unwrap().unwrap().receipts, vec![expected]);
        assert!(users.get(&bob.id).await.unwrap().unwrap().receipts.is_empty());
    }

    #[tokio::test]
    async fn test_bad_signature_mutates_nothing() {
        let (handler, users, ana, _) = handler_with_users().await;
        let body = charge_body(Some("a@example.com"));
        let forged = sign_payload(&body, "whsec_forged", chrono::Utc::now().timestamp()).unwrap();

        let err = handler.ingest(&body, Some(&forged), Some(SECRET)).await.unwrap_err();
        assert!(matches!(err, PaymentError::WebhookSignature(_)));
        assert!(err.is_webhook_rejection());
        assert!(users.get(&ana.id).await.unwrap().unwrap().receipts.is_empty());
    }

    #[tokio::test]
    async fn test_missing_credentials_checked_first() {
        let (handler, _, _, _) = handler_with_users().await;
        // Not even valid JSON: the credential check must fire before parsing.
        let result = handler.ingest(b"garbage", None, Some(SECRET)).await;
        assert!(matches!(result, Err(PaymentError::MissingWebhookCredentials)));

        let result = handler.ingest(b"garbage", Some("t=1,v1=00"), None).await;
        assert!(matches!(result, Err(PaymentError::MissingWebhookCredentials)));

        let result = handler.ingest(b"garbage", Some(""), Some(SECRET)).await;
        assert!(matches!(result, Err(PaymentError::MissingWebhookCredentials)));
    }

    #[tokio::test]
    async fn test_unknown_email_reports_user_not_found() {
        let (handler, users, ana, bob) = handler_with_users().await;
        let body = charge_body(Some("nobody@example.com"));

        let result = handler.ingest(&body, Some(&signed(&body)), Some(SECRET)).await;
        assert!(matches!(result, Err(PaymentError::UserNotFound(_))));
        for id in [&ana.id, &bob.id] {
            assert!(users.get(id).await.unwrap().unwrap().receipts.is_empty());
        }
    }

    #[tokio::test]
    async fn test_charge_without_email() {
        let (handler, _, _, _) = handler_with_users().await;
        let body = charge_body(None);
        let result = handler.ingest(&body, Some(&signed(&body)), Some(SECRET)).await;
        assert!(matches!(result, Err(PaymentError::MissingEmail)));
    }

    #[tokio::test]
    async fn test_checkout_completed_links_metadata() {
        let (handler, _, _, _) = handler_with_users().await;
        let outcome = handler
            .handle(WebhookEvent::CheckoutCompleted {
                event_id: "evt_2".into(),
                session_id: "cs_1".into(),
                user_id: Some("u1".into()),
                cart_id: Some("c1".into()),
            })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::CheckoutCompleted {
                session_id: "cs_1".into(),
                user_id: Some("u1".into()),
                cart_id: Some("c1".into()),
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_event_is_ignored() {
        let (handler, _, _, _) = handler_with_users().await;
        let body = json!({"id": "evt_3", "type": "payout.paid", "data": {"object": {}}})
            .to_string()
            .into_bytes();
        let outcome = handler
            .ingest(&body, Some(&signed(&body)), Some(SECRET))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored {
                event_type: "payout.paid".into()
            }
        );
    }
}
