//! HMAC-SHA256 signatures issued by the payment gateway.
//!
//! Checkout confirmations sign `gateway_order_id|gateway_payment_id` with the
//! API key secret; webhooks sign the raw request body with the webhook secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Payload the gateway signs when the client completes checkout.
pub fn checkout_payload(gateway_order_id: &str, gateway_payment_id: &str) -> String {
    format!("{}|{}", gateway_order_id, gateway_payment_id)
}

/// Hex-encoded HMAC-SHA256 of `payload`.
pub fn sign(payload: &[u8], secret: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("HMAC key rejected: {}", e)))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks `provided_signature` (hex) against the HMAC of `payload`.
///
/// Fails closed: an empty secret, an empty or non-hex signature all return
/// false. The digest comparison is constant-time.
pub fn verify(payload: &[u8], provided_signature: &str, secret: &str) -> bool {
    if secret.is_empty() {
        return false;
    }

    let Ok(provided) = hex::decode(provided_signature.trim()) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    let expected = mac.finalize().into_bytes();

    expected.len() == provided.len() && bool::from(expected.as_slice().ct_eq(&provided))
}
