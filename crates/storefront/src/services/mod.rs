//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `orders` - Order lifecycle manager (create, checkout, payment confirmation, status)
//! - `query` - Read-side order listing and lookup
//! - `webhooks` - Provider webhook intake and de-duplication
//! - `auth` - Bearer token verification

pub mod auth;
pub mod orders;
pub mod query;
pub mod webhooks;

pub use orders::{CheckoutSettings, CompletionOutcome, OrderError, OrderService};
pub use query::{AdminOrderView, ListParams, OrderPage, OrderQueryService, OrderScope};
pub use webhooks::{WebhookOutcome, WebhookService};
