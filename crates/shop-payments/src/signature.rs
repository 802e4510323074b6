//! Webhook Signatures
//!
//! Stripe signs `"{timestamp}.{raw body}"` with HMAC-SHA256 and sends
//! `Stripe-Signature: t=<timestamp>,v1=<hex>[,v1=<hex>...]`.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PaymentError, Result};
use crate::event::WebhookEvent;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum accepted age of a signature timestamp
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Verify the signature and parse the event
pub fn construct_event(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance_secs: i64,
) -> Result<WebhookEvent> {
    verify(payload, signature_header, secret, tolerance_secs, Utc::now().timestamp())?;
    WebhookEvent::from_slice(payload)
}

/// Check `signature_header` against `payload` as of `now` (epoch seconds)
pub fn verify(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<()> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        PaymentError::WebhookSignature("missing timestamp in signature header".into())
    })?;

    if signatures.is_empty() {
        return Err(PaymentError::WebhookSignature("no v1 signature found".into()));
    }

    if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(PaymentError::WebhookSignature(format!(
            "timestamp {timestamp} outside tolerance of {tolerance_secs}s"
        )));
    }

    let mac = signed_mac(payload, secret, timestamp)?;

    let matched = signatures.iter().any(|signature| {
        hex::decode(signature)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });

    if !matched {
        return Err(PaymentError::WebhookSignature(
            "no signature matches the expected signature for the payload".into(),
        ));
    }

    tracing::debug!(timestamp, "Webhook signature verified");
    Ok(())
}

/// Produce a signature header for `payload`, as the provider would
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
    let mac = signed_mac(payload, secret, timestamp)?;
    Ok(format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

fn signed_mac(payload: &[u8], secret: &str, timestamp: i64) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::WebhookSignature(format!("HMAC init error: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}
