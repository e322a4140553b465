//! Stripe webhook signature verification and event envelope.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use guidestore_core::error::{ApiError, ErrorCode};

type HmacSha256 = Hmac<Sha256>;

/// Verify a Stripe webhook signature.
///
/// `Stripe-Signature` header format: `t=<timestamp>,v1=<signature>`.
/// The signed payload is `"{timestamp}.{payload}"`, HMAC-SHA256 with the
/// webhook secret, hex-encoded, compared in constant time.
pub fn verify_webhook_signature(
    payload: &[u8],
    signature_header: &str,
    webhook_secret: &str,
) -> Result<(), ApiError> {
    let invalid = || ApiError::bad_request(ErrorCode::WebhookSignatureInvalid);

    let parts: std::collections::HashMap<&str, &str> = signature_header
        .split(',')
        .filter_map(|part| {
            let mut kv = part.splitn(2, '=');
            Some((kv.next()?, kv.next()?))
        })
        .collect();

    let timestamp = parts.get("t").ok_or_else(invalid)?;
    let signature = parts.get("v1").ok_or_else(invalid)?;

    let payload_str = std::str::from_utf8(payload).map_err(|_| invalid())?;
    let signed_payload = format!("{timestamp}.{payload_str}");

    let mut mac =
        HmacSha256::new_from_slice(webhook_secret.as_bytes()).map_err(|_| invalid())?;
    mac.update(signed_payload.as_bytes());

    let expected = hex::encode(mac.finalize().into_bytes());

    if subtle::ConstantTimeEq::ct_eq(expected.as_bytes(), signature.as_bytes()).into() {
        Ok(())
    } else {
        Err(invalid())
    }
}

/// Webhook event envelope. The `object` payload stays untyped; each handler
/// reads the fields it needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
    pub created: i64,
}

/// Webhook event data object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// Parse an event from the raw payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self, ApiError> {
        serde_json::from_slice(payload)
            .map_err(|_| ApiError::bad_request(ErrorCode::CouldNotParseBody))
    }
}

/// Event types the reconciler acts on. Anything else is acknowledged and
/// dropped.
pub const HANDLED_EVENTS: &[&str] = &[
    "checkout.session.completed",
    "charge.refunded",
    "customer.subscription.created",
    "customer.subscription.updated",
    "customer.subscription.deleted",
    "invoice.payment_failed",
    "invoice.payment_succeeded",
];

/// Check if a webhook event type is handled.
pub fn is_handled_event(event_type: &str) -> bool {
    HANDLED_EVENTS.contains(&event_type)
}
