//! Order lifecycle status.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// Orders move strictly forward, one step at a time:
/// `Pending → Paid → Shipped → Delivered`. Only the payment webhook moves an
/// order out of `Pending`; `Shipped` and `Delivered` belong to fulfillment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Shipped,
    Delivered,
}

impl OrderStatus {
    /// Position in the lifecycle, starting at 0 for `Pending`.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Paid => 1,
            Self::Shipped => 2,
            Self::Delivered => 3,
        }
    }

    /// The status this one may advance to, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Paid),
            Self::Paid => Some(Self::Shipped),
            Self::Shipped => Some(Self::Delivered),
            Self::Delivered => None,
        }
    }

    /// Whether `target` is exactly one step ahead of `self`.
    #[must_use]
    pub fn can_advance_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }

    /// Whether `self` is already at or past `target`.
    ///
    /// Re-applying a transition that has already happened is a no-op.
    #[must_use]
    pub const fn has_reached(self, target: Self) -> bool {
        self.rank() >= target.rank()
    }

    /// Lowercase name, as stored and serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
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
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}
