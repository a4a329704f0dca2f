//! Local webhook testing.
//!
//! # Usage
//!
//! ```bash
//! mercato-cli webhook sign event.json
//! curl -X POST http://localhost:3000/webhooks/checkout \
//!     -H "stripe-signature: $(mercato-cli webhook sign event.json)" \
//!     --data-binary @event.json
//! ```
//!
//! # Environment Variables
//!
//! - `CHECKOUT_WEBHOOK_SECRET` - shared webhook signing secret

use std::path::Path;

use mercato_storefront::webhooks;

use super::CommandError;

/// Print a signature header for the raw bytes of `file`.
///
/// # Errors
///
/// Returns an error if the secret is unset or the file cannot be read.
pub fn sign_file(file: &Path, timestamp: Option<i64>) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let secret = std::env::var("CHECKOUT_WEBHOOK_SECRET")
        .map_err(|_| CommandError::MissingEnvVar("CHECKOUT_WEBHOOK_SECRET"))?;
    let payload = std::fs::read(file)?;
    let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp());

    let header = webhooks::sign(&secret, &payload, timestamp)
        .map_err(|_| "webhook secret cannot key HMAC-SHA256")?;
    tracing::debug!(bytes = payload.len(), timestamp, "Signed payload");

    #[allow(clippy::print_stdout)]
    {
        println!("{header}");
    }
    Ok(())
}
