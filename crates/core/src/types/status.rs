//! Status enums and the order status state machine.

use serde::{Deserialize, Serialize};

/// Fulfillment status of an order.
///
/// Statuses advance along
/// `pending -> confirmed -> processing -> out_for_delivery -> delivered`;
/// `cancelled` can be reached from any non-terminal status. `delivered` and
/// `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

/// Why a status change was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The order already sits in a terminal status.
    #[error("order is already {0} and cannot change status")]
    Terminal(OrderStatus),
    /// The target status is earlier in the progression than the current one.
    #[error("cannot move order from {from} back to {to}")]
    Backward {
        /// Current status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },
}

impl OrderStatus {
    /// Every status, in progression order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Confirmed,
        Self::Processing,
        Self::OutForDelivery,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Wire/storage name (`out_for_delivery`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Position on the fulfillment track. `None` for `cancelled`, which is off-track.
    const fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Confirmed => Some(1),
            Self::Processing => Some(2),
            Self::OutForDelivery => Some(3),
            Self::Delivered => Some(4),
            Self::Cancelled => None,
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether payment has been confirmed for an order in this status.
    ///
    /// True for `confirmed` and everything after it on the fulfillment track.
    /// A cancelled order counts as settled too: a late completion event must
    /// not resurrect it.
    #[must_use]
    pub const fn is_payment_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Check whether moving from `self` to `next` is allowed.
    ///
    /// Returns `Ok(false)` when `next` equals the current non-terminal status
    /// (a no-op), `Ok(true)` for a real forward move.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] for backward moves and for any change out
    /// of (or re-application of) a terminal status.
    pub fn check_transition(self, next: Self) -> Result<bool, TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Terminal(self));
        }
        if self == next {
            return Ok(false);
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) if to < from => Err(TransitionError::Backward {
                from: self,
                to: next,
            }),
            _ => Ok(true),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "invalid order status: {s} (expected one of: {})",
                    Self::ALL.map(|status| status.as_str()).join(", ")
                )
            })
    }
}

/// Role carried by an authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    /// A shopper; sees only their own orders.
    Customer,
    /// Store staff; sees and updates every order.
    Admin,
}

impl std::fmt::Display for AccountRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for AccountRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid account role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_every_status() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "shipped".parse::<OrderStatus>().unwrap_err();
        assert!(err.contains("out_for_delivery"));
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"out_for_delivery\"");
    }

    #[test]
    fn test_forward_moves_allowed() {
        use OrderStatus::*;
        assert_eq!(Pending.check_transition(Confirmed), Ok(true));
        assert_eq!(Pending.check_transition(Processing), Ok(true));
        assert_eq!(Confirmed.check_transition(OutForDelivery), Ok(true));
        assert_eq!(OutForDelivery.check_transition(Delivered), Ok(true));
    }

    #[test]
    fn test_cancel_from_non_terminal() {
        use OrderStatus::*;
        for from in [Pending, Confirmed, Processing, OutForDelivery] {
            assert_eq!(from.check_transition(Cancelled), Ok(true));
        }
    }

    #[test]
    fn test_backward_rejected() {
        use OrderStatus::*;
        assert_eq!(
            Processing.check_transition(Pending),
            Err(TransitionError::Backward {
                from: Processing,
                to: Pending
            })
        );
    }

    #[test]
    fn test_terminal_rejected() {
        use OrderStatus::*;
        assert_eq!(
            Delivered.check_transition(Pending),
            Err(TransitionError::Terminal(Delivered))
        );
        assert_eq!(
            Cancelled.check_transition(Cancelled),
            Err(TransitionError::Terminal(Cancelled))
        );
    }

    #[test]
    fn test_same_status_is_noop() {
        assert_eq!(
            OrderStatus::Processing.check_transition(OrderStatus::Processing),
            Ok(false)
        );
    }

    #[test]
    fn test_payment_settled() {
        assert!(!OrderStatus::Pending.is_payment_settled());
        assert!(OrderStatus::Confirmed.is_payment_settled());
        assert!(OrderStatus::Delivered.is_payment_settled());
        assert!(OrderStatus::Cancelled.is_payment_settled());
    }

    #[test]
    fn test_account_role_roundtrip() {
        assert_eq!("admin".parse::<AccountRole>().unwrap(), AccountRole::Admin);
        assert_eq!(AccountRole::Customer.to_string(), "customer");
        assert!("root".parse::<AccountRole>().is_err());
    }
}
