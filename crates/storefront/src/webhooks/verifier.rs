//! Provider signature verification.
//!
//! The signature header has the form `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`.
//! Each `v1` is an HMAC-SHA256, keyed with the shared webhook secret, over
//! `"<t>.<raw body>"`. Several `v1` values appear while the provider is
//! rolling the secret; any one of them matching is enough.

use std::time::Duration;

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::debug;

use super::{CheckoutEvent, WebhookError};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the provider signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Verifies webhook signatures and parses authentic events.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: SecretString,
    tolerance: Duration,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"[REDACTED]")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<SignatureHeader, WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            return Err(WebhookError::MalformedHeader(format!(
                "expected key=value, got '{part}'"
            )));
        };
        match key {
            "t" => {
                let ts = value
                    .parse::<i64>()
                    .map_err(|_| WebhookError::MalformedHeader("invalid timestamp".to_owned()))?;
                timestamp = Some(ts);
            }
            // Undecodable candidates are skipped; they can never match.
            "v1" => {
                if let Ok(sig) = hex::decode(value) {
                    signatures.push(sig);
                }
            }
            // Other schemes (e.g. v0 test signatures) are ignored.
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| WebhookError::MalformedHeader("missing timestamp".to_owned()))?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader(
            "no v1 signature present".to_owned(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Produce a signature header for `payload`, as the provider would.
///
/// Used by the operator CLI to replay events locally, and by tests.
///
/// # Errors
///
/// Returns `InvalidLength` if the secret cannot key the MAC.
pub fn sign(secret: &str, payload: &[u8], timestamp: i64) -> Result<String, InvalidLength> {
    let signature = mac_for(secret, timestamp, payload)?.finalize().into_bytes();
    Ok(format!("t={timestamp},v1={}", hex::encode(signature)))
}

impl WebhookVerifier {
    #[must_use]
    pub const fn new(secret: SecretString, tolerance: Duration) -> Self {
        Self { secret, tolerance }
    }

    /// Verify `payload` against `header` using the current time.
    ///
    /// `payload` must be the raw request body, byte for byte.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError` if the header is malformed, the timestamp is
    /// outside the tolerance window, no signature matches, or the
    /// authenticated payload is not a readable event.
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<CheckoutEvent, WebhookError> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    /// Verify against an explicit clock reading (unix seconds).
    ///
    /// # Errors
    ///
    /// See [`WebhookVerifier::verify`].
    pub fn verify_at(
        &self,
        payload: &[u8],
        header: &str,
        now: i64,
    ) -> Result<CheckoutEvent, WebhookError> {
        let header = parse_header(header)?;

        let age_secs = now.saturating_sub(header.timestamp);
        let tolerance = i64::try_from(self.tolerance.as_secs()).unwrap_or(i64::MAX);
        if age_secs.abs() > tolerance {
            return Err(WebhookError::StaleTimestamp { age_secs });
        }

        let mac = mac_for(self.secret.expose_secret(), header.timestamp, payload)
            .map_err(|_| WebhookError::SignatureMismatch)?;
        let matched = header
            .signatures
            .iter()
            .any(|candidate| mac.clone().verify_slice(candidate).is_ok());
        if !matched {
            return Err(WebhookError::SignatureMismatch);
        }

        debug!("Webhook signature verified");
        CheckoutEvent::parse(payload)
    }
}
