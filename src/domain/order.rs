use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{OrdergateError, Result};

/// Order action (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderAction {
    Buy,
    Sell,
}

impl OrderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderAction::Buy => "BUY",
            OrderAction::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for OrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderAction {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            _ => Err("invalid action; expected BUY|SELL"),
        }
    }
}

/// Order kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderKind {
    Market,
    Limit,
}

impl OrderKind {
    /// Venue wire code for the order kind
    pub fn wire_code(&self) -> &'static str {
        match self {
            OrderKind::Market => "MKT",
            OrderKind::Limit => "LMT",
        }
    }
}

impl FromStr for OrderKind {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "MARKET" | "MKT" => Ok(Self::Market),
            "LIMIT" | "LMT" => Ok(Self::Limit),
            _ => Err("invalid order kind; expected MARKET|LIMIT"),
        }
    }
}

/// What the caller wants to do, before gating and submission.
///
/// Immutable once built; `validate` enforces the price/kind pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIntent {
    pub action: OrderAction,
    pub quantity: u32,
    pub kind: OrderKind,
    /// Required iff kind is Limit; ignored for market orders
    pub limit_price: Option<Decimal>,
}

impl OrderIntent {
    pub fn market(action: OrderAction, quantity: u32) -> Self {
        Self {
            action,
            quantity,
            kind: OrderKind::Market,
            limit_price: None,
        }
    }

    pub fn limit(action: OrderAction, quantity: u32, price: Decimal) -> Self {
        Self {
            action,
            quantity,
            kind: OrderKind::Limit,
            limit_price: Some(price),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.quantity == 0 {
            return Err(OrdergateError::Validation(
                "quantity must be positive".to_string(),
            ));
        }
        match (self.kind, self.limit_price) {
            (OrderKind::Limit, None) => Err(OrdergateError::Validation(
                "limit orders require a limit price".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Limit price when it applies to this order kind
    pub fn effective_limit_price(&self) -> Option<Decimal> {
        match self.kind {
            OrderKind::Limit => self.limit_price,
            OrderKind::Market => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn limit_intent_without_price_fails_validation() {
        let intent = OrderIntent {
            action: OrderAction::Buy,
            quantity: 100,
            kind: OrderKind::Limit,
            limit_price: None,
        };
        assert!(intent.validate().is_err());
    }

    #[test]
    fn zero_quantity_fails_validation() {
        let intent = OrderIntent::market(OrderAction::Sell, 0);
        assert!(intent.validate().is_err());
    }

    #[test]
    fn market_intent_ignores_limit_price() {
        let mut intent = OrderIntent::market(OrderAction::Buy, 10);
        intent.limit_price = Some(dec!(1.23));
        assert!(intent.validate().is_ok());
        assert_eq!(intent.effective_limit_price(), None);
    }

    #[test]
    fn action_parses_case_insensitively() {
        assert_eq!("buy".parse::<OrderAction>().unwrap(), OrderAction::Buy);
        assert_eq!("SELL".parse::<OrderAction>().unwrap(), OrderAction::Sell);
        assert!("hold".parse::<OrderAction>().is_err());
    }

    #[test]
    fn kind_accepts_wire_aliases() {
        assert_eq!("mkt".parse::<OrderKind>().unwrap(), OrderKind::Market);
        assert_eq!("LIMIT".parse::<OrderKind>().unwrap(), OrderKind::Limit);
    }
}
