//! Broker connection seam.
//!
//! The live venue session (connect/reconnect, account plumbing) is an external
//! collaborator; this module only defines the capability the execution state
//! machine consumes, plus an in-process paper implementation for dry runs.

pub mod paper;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{ContractDescriptor, OrderIntent};
use crate::error::Result;

pub use paper::PaperBroker;

/// Venue-reported order state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VenueStatus {
    Submitted,
    Filled,
    Cancelled,
    Error,
    Inactive,
}

impl VenueStatus {
    /// Terminal states admit no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VenueStatus::Filled | VenueStatus::Cancelled | VenueStatus::Error | VenueStatus::Inactive
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VenueStatus::Submitted => "Submitted",
            VenueStatus::Filled => "Filled",
            VenueStatus::Cancelled => "Cancelled",
            VenueStatus::Error => "Error",
            VenueStatus::Inactive => "Inactive",
        }
    }
}

impl std::fmt::Display for VenueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Handle to a working order at the venue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTicket {
    pub order_id: i64,
}

/// Point-in-time view of a working order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub status: VenueStatus,
    pub filled: Decimal,
    pub remaining: Decimal,
    pub avg_fill_price: Option<Decimal>,
}

/// Trading capability of the broker connection.
///
/// One shared session across flows; the venue serializes submissions as it
/// sees fit. Implementations must be reentrant.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Resolve an instrument reference into a tradable contract
    async fn qualify(&self, con_id: i64) -> Result<ContractDescriptor>;

    /// Submit an order, returning the venue handle
    async fn submit(&self, contract: &ContractDescriptor, intent: &OrderIntent)
        -> Result<OrderTicket>;

    /// Report the current state of a working order
    async fn status(&self, ticket: &OrderTicket) -> Result<OrderSnapshot>;

    /// Request cancellation of a working order
    async fn cancel(&self, ticket: &OrderTicket) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_submitted_is_non_terminal() {
        assert!(!VenueStatus::Submitted.is_terminal());
        for status in [
            VenueStatus::Filled,
            VenueStatus::Cancelled,
            VenueStatus::Error,
            VenueStatus::Inactive,
        ] {
            assert!(status.is_terminal(), "{status} should be terminal");
        }
    }
}
