//! The order document and its creation input.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Email, Money, OrderId, OrderStatus, OwnerId, ProductId};
use crate::validation::ValidationErrors;

/// Metadata key holding the human-readable order reference.
pub const REFERENCE_KEY: &str = "reference";

/// Metadata keys the checkout session sets itself; callers may not supply them.
pub const RESERVED_METADATA_KEYS: [&str; 2] = ["order_id", "owner_id"];

/// One purchased product line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: u32,
    /// Price of a single unit, in minor units.
    pub unit_price: Money,
    #[serde(default)]
    pub images: Vec<String>,
}

impl LineItem {
    /// `unit_price * quantity`, or `None` on overflow.
    #[must_use]
    pub fn subtotal(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    pub country: String,
}

/// A persisted checkout attempt and its fulfillment progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Partition key in the order store.
    pub owner_id: OwnerId,
    pub items: Vec<LineItem>,
    pub shipping_address: ShippingAddress,
    pub status: OrderStatus,
    pub total: Money,
    /// Checkout session id; set once, after the gateway accepts the order.
    pub external_session_id: Option<String>,
    /// Hosted checkout page for `external_session_id`.
    pub checkout_url: Option<String>,
    pub customer_email: Email,
    pub metadata: BTreeMap<String, String>,
    /// Optimistic concurrency token; bumped by the store on every replace.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// The `ORD-XXXXXXXX` reference stored in metadata, falling back to the
    /// one derived from the id.
    #[must_use]
    pub fn reference(&self) -> String {
        self.metadata
            .get(REFERENCE_KEY)
            .cloned()
            .unwrap_or_else(|| self.id.reference())
    }

    /// Case-insensitive containment match of `needle` against the reference.
    #[must_use]
    pub fn reference_matches(&self, needle: &str) -> bool {
        self.reference()
            .to_lowercase()
            .contains(&needle.to_lowercase())
    }

    #[must_use]
    pub const fn has_session(&self) -> bool {
        self.external_session_id.is_some()
    }
}

/// Input to order creation, as submitted by the storefront client.
///
/// Nothing here is trusted. [`NewOrder::into_order`] checks every constraint
/// and reports all of them together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub items: Vec<LineItem>,
    pub shipping_address: ShippingAddress,
    pub customer_email: String,
    /// Caller-supplied total. Computed from the items when absent.
    #[serde(default)]
    pub total: Option<Money>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl NewOrder {
    /// Validate the input and build a `pending` order owned by `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] listing every violated constraint.
    pub fn into_order(
        self,
        id: OrderId,
        owner_id: OwnerId,
        now: DateTime<Utc>,
    ) -> Result<Order, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.items.is_empty() {
            errors.push("items", "must contain at least one item");
        }
        for (i, item) in self.items.iter().enumerate() {
            if item.quantity == 0 {
                errors.push(format!("items[{i}].quantity"), "must be greater than zero");
            }
            if item.unit_price.is_negative() {
                errors.push(format!("items[{i}].unit_price"), "must not be negative");
            }
            if item.name.trim().is_empty() {
                errors.push(format!("items[{i}].name"), "must not be empty");
            }
        }

        let address = &self.shipping_address;
        for (field, value) in [
            ("shipping_address.street", &address.street),
            ("shipping_address.city", &address.city),
            ("shipping_address.country", &address.country),
        ] {
            if value.trim().is_empty() {
                errors.push(field, "must not be empty");
            }
        }

        let email = match Email::parse(&self.customer_email) {
            Ok(email) => Some(email),
            Err(e) => {
                errors.push("customer_email", e.to_string());
                None
            }
        };

        for key in RESERVED_METADATA_KEYS {
            if self.metadata.contains_key(key) {
                errors.push(format!("metadata.{key}"), "is reserved");
            }
        }

        let total = match self.total {
            Some(total) if total.is_negative() => {
                errors.push("total", "must not be negative");
                None
            }
            Some(total) => Some(total),
            None => {
                let computed = self
                    .items
                    .iter()
                    .map(LineItem::subtotal)
                    .collect::<Option<Vec<_>>>()
                    .and_then(Money::checked_sum);
                if computed.is_none() {
                    errors.push("total", "order total is too large");
                }
                computed
            }
        };

        let (Some(customer_email), Some(total)) = (email, total) else {
            return Err(errors);
        };
        errors.into_result(())?;

        let mut metadata = self.metadata;
        metadata
            .entry(REFERENCE_KEY.to_owned())
            .or_insert_with(|| id.reference());

        Ok(Order {
            id,
            owner_id,
            items: self.items,
            shipping_address: self.shipping_address,
            status: OrderStatus::Pending,
            total,
            external_session_id: None,
            checkout_url: None,
            customer_email,
            metadata,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }
}
