use serde::{Deserialize, Serialize};

use super::order::OrderAction;

/// One leg of a combo contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboLeg {
    pub con_id: i64,
    pub action: OrderAction,
    pub ratio: u32,
    pub symbol: Option<String>,
}

/// A tradable contract as the venue understands it.
///
/// Either a single qualified instrument, or a combo referencing several
/// underlying legs with their individual actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContractDescriptor {
    Single {
        con_id: i64,
        symbol: String,
        sec_type: String,
        exchange: String,
        currency: String,
    },
    Combo {
        symbol: String,
        exchange: String,
        currency: String,
        legs: Vec<ComboLeg>,
    },
}

impl ContractDescriptor {
    pub fn stock(con_id: i64, symbol: &str) -> Self {
        Self::Single {
            con_id,
            symbol: symbol.to_string(),
            sec_type: "STK".to_string(),
            exchange: "SMART".to_string(),
            currency: "USD".to_string(),
        }
    }

    /// Build a combo from qualified legs, one unit of each per combo unit
    pub fn combo(symbol: &str, exchange: &str, legs: Vec<ComboLeg>) -> Self {
        Self::Combo {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            currency: "USD".to_string(),
            legs,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::Single { symbol, .. } => symbol,
            Self::Combo { symbol, .. } => symbol,
        }
    }

    pub fn legs(&self) -> &[ComboLeg] {
        match self {
            Self::Single { .. } => &[],
            Self::Combo { legs, .. } => legs,
        }
    }

    /// Human-readable JSON used in approval prompts and trade results
    pub fn render(&self) -> serde_json::Value {
        match self {
            Self::Single {
                con_id,
                symbol,
                sec_type,
                exchange,
                currency,
            } => serde_json::json!({
                "conId": con_id,
                "symbol": symbol,
                "secType": sec_type,
                "exchange": exchange,
                "currency": currency,
            }),
            Self::Combo {
                symbol,
                exchange,
                currency,
                legs,
            } => serde_json::json!({
                "symbol": symbol,
                "secType": "BAG",
                "exchange": exchange,
                "currency": currency,
                "legs": legs.iter().map(|leg| serde_json::json!({
                    "conId": leg.con_id,
                    "symbol": leg.symbol,
                    "action": leg.action.as_str(),
                    "ratio": leg.ratio,
                })).collect::<Vec<_>>(),
            }),
        }
    }
}
