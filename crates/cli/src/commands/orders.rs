//! Order maintenance commands.
//!
//! # Usage
//!
//! ```bash
//! mercato-cli orders show <ID>
//! mercato-cli orders set-status <ID> <STATUS>
//! ```
//!
//! Status updates go through the same lifecycle rules as the admin API:
//! forward-only, terminal states are final.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use mercato_core::OrderId;
use mercato_storefront::checkout::{
    CheckoutGateway, CheckoutSession, CheckoutSessionRequest, GatewayError,
};
use mercato_storefront::db::{OrderStore, PgOrderStore};
use mercato_storefront::services::{CheckoutSettings, OrderService};

use super::CommandError;

/// Stands in for the checkout provider; operator commands never open sessions.
struct NoCheckout;

#[async_trait]
impl CheckoutGateway for NoCheckout {
    async fn create_session(
        &self,
        _request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        Err(GatewayError::Response(
            "checkout is not available from the CLI".to_owned(),
        ))
    }
}

fn parse_id(id: &str) -> Result<OrderId, CommandError> {
    id.parse().map_err(|_| CommandError::InvalidArgument {
        what: "order id",
        value: id.to_owned(),
    })
}

fn print_json(value: &impl serde::Serialize) -> Result<(), Box<dyn std::error::Error>> {
    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}

/// Print an order as JSON.
///
/// # Errors
///
/// Returns an error if the id is invalid, the order does not exist, or the
/// database is unreachable.
pub async fn show(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id = parse_id(id)?;
    let store = PgOrderStore::new(super::connect().await?);

    let order = store
        .get_by_id(id)
        .await?
        .ok_or_else(|| format!("order {id} not found"))?;
    print_json(&order)
}

/// Apply an administrative status update.
///
/// # Errors
///
/// Returns an error if the status is unknown, the transition is not allowed,
/// or the database is unreachable.
pub async fn set_status(id: &str, status: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id = parse_id(id)?;
    let store = Arc::new(PgOrderStore::new(super::connect().await?));

    let unused = Url::parse("http://localhost/")?;
    let orders = OrderService::new(
        store,
        Arc::new(NoCheckout),
        CheckoutSettings {
            success_url: unused.clone(),
            cancel_url: unused,
            timeout: Duration::from_secs(1),
        },
    );

    let order = orders.update_order_status(id, status).await?;
    tracing::info!(order_id = %order.id, status = %order.status, version = order.version, "Status updated");
    print_json(&order)
}
