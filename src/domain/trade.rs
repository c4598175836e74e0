use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::contract::ContractDescriptor;
use super::order::OrderIntent;

/// Venue status snapshot at the end of an order flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusReport {
    pub status: String,
    pub filled: Decimal,
    pub remaining: Decimal,
    pub avg_fill_price: Option<Decimal>,
}

/// A completed trade, captured once terminal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeDetail {
    pub contract: serde_json::Value,
    pub order: serde_json::Value,
    pub order_status: OrderStatusReport,
}

/// Result shape returned by the order execution state machine.
///
/// Exactly one of `trade` / `error` is populated. Callers never see an
/// exception out of the executor; every failure path lands here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub trade: Option<TradeDetail>,
    pub error: Option<String>,
}

impl TradeOutcome {
    pub fn filled(contract: &ContractDescriptor, intent: &OrderIntent, status: OrderStatusReport) -> Self {
        Self {
            trade: Some(TradeDetail {
                contract: contract.render(),
                order: serde_json::json!({
                    "action": intent.action.as_str(),
                    "totalQuantity": intent.quantity,
                    "orderType": intent.kind.wire_code(),
                    "lmtPrice": intent.effective_limit_price(),
                }),
                order_status: status,
            }),
            error: None,
        }
    }

    pub fn not_approved() -> Self {
        Self::errored("Order not approved")
    }

    pub fn not_filled() -> Self {
        Self::errored("Order not filled")
    }

    pub fn errored(message: impl Into<String>) -> Self {
        Self {
            trade: None,
            error: Some(message.into()),
        }
    }

    pub fn is_filled(&self) -> bool {
        self.trade.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderAction;
    use rust_decimal_macros::dec;

    #[test]
    fn denial_outcome_carries_no_trade_detail() {
        let outcome = TradeOutcome::not_approved();
        assert!(outcome.trade.is_none());
        assert_eq!(outcome.error.as_deref(), Some("Order not approved"));
    }

    #[test]
    fn filled_outcome_is_exclusive_with_error() {
        let contract = ContractDescriptor::stock(1, "AAPL");
        let intent = OrderIntent::limit(OrderAction::Buy, 100, dec!(150.75));
        let outcome = TradeOutcome::filled(
            &contract,
            &intent,
            OrderStatusReport {
                status: "Filled".to_string(),
                filled: dec!(100),
                remaining: dec!(0),
                avg_fill_price: Some(dec!(150.70)),
            },
        );
        assert!(outcome.is_filled());
        assert!(outcome.error.is_none());
        let trade = outcome.trade.unwrap();
        assert_eq!(trade.order["orderType"], "LMT");
        assert_eq!(trade.order_status.status, "Filled");
    }
}
