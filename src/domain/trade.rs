//! Share holdings and the trade log record.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// A long share position in portfolio mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub symbol: String,
    pub quantity: f64,
    /// Most recent price seen for the symbol, used when a step has no bar.
    pub last_price: f64,
}

impl Holding {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn mark(&mut self, price: f64) {
        self.last_price = price;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "BUY"),
            TradeAction::Sell => write!(f, "SELL"),
        }
    }
}

/// Immutable trade log entry. For sells `value` is the proceeds net of
/// cost; for buys it is the allocation before cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub date: NaiveDate,
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: f64,
    pub price: f64,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_holding() -> Holding {
        Holding {
            symbol: "SPY".into(),
            quantity: 12.5,
            last_price: 400.0,
        }
    }

    #[test]
    fn market_value_fractional_shares() {
        let h = sample_holding();
        assert!((h.market_value(410.0) - 5125.0).abs() < 1e-9);
    }

    #[test]
    fn mark_updates_last_price() {
        let mut h = sample_holding();
        h.mark(395.5);
        assert_eq!(h.last_price, 395.5);
    }

    #[test]
    fn trade_action_serializes_uppercase() {
        let trade = Trade {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            symbol: "TLT".into(),
            action: TradeAction::Sell,
            quantity: 3.0,
            price: 90.0,
            value: 269.73,
        };
        let json = serde_json::to_string(&trade).unwrap();
        assert!(json.contains("\"action\":\"SELL\""));
        assert!(json.contains("\"date\":\"2024-01-15\""));
        assert_eq!(TradeAction::Buy.to_string(), "BUY");
    }
}
