//! Portfolio state and equity tracking for the multi-asset simulator.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

use super::trade::{Holding, Trade, TradeAction};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// Net return of each consecutive pair, stamped with the later date.
pub fn equity_returns(curve: &[EquityPoint]) -> Vec<(NaiveDate, f64)> {
    curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            let r = if prev > 0.0 {
                w[1].equity / prev - 1.0
            } else {
                0.0
            };
            (w[1].date, r)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub holdings: HashMap<String, Holding>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            holdings: HashMap::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn is_held(&self, symbol: &str) -> bool {
        self.holdings.get(symbol).is_some_and(|h| h.quantity > 0.0)
    }

    pub fn holding_count(&self) -> usize {
        self.holdings.len()
    }

    /// Sell the whole holding at `price`; proceeds are reduced by `cost_rate`.
    pub fn liquidate(
        &mut self,
        symbol: &str,
        price: f64,
        date: NaiveDate,
        cost_rate: f64,
    ) -> Option<&Trade> {
        let holding = self.holdings.remove(symbol)?;
        let gross = holding.quantity * price;
        let proceeds = gross - gross * cost_rate;
        self.cash += proceeds;
        self.trades.push(Trade {
            date,
            symbol: holding.symbol,
            action: TradeAction::Sell,
            quantity: holding.quantity,
            price,
            value: proceeds,
        });
        self.trades.last()
    }

    /// Spend `allocation * (1 + cost_rate)` of cash on `allocation / price`
    /// shares. Returns `None` without changing state when cash is short.
    pub fn buy(
        &mut self,
        symbol: &str,
        allocation: f64,
        price: f64,
        date: NaiveDate,
        cost_rate: f64,
    ) -> Option<&Trade> {
        let required = allocation * (1.0 + cost_rate);
        if price <= 0.0 || allocation <= 0.0 || self.cash < required {
            return None;
        }
        let shares = allocation / price;
        self.cash -= required;

        let holding = self
            .holdings
            .entry(symbol.to_string())
            .or_insert_with(|| Holding {
                symbol: symbol.to_string(),
                quantity: 0.0,
                last_price: price,
            });
        holding.quantity += shares;
        holding.mark(price);

        self.trades.push(Trade {
            date,
            symbol: symbol.to_string(),
            action: TradeAction::Buy,
            quantity: shares,
            price,
            value: allocation,
        });
        self.trades.last()
    }

    pub fn record_equity(&mut self, date: NaiveDate, equity: f64) {
        self.equity_curve.push(EquityPoint { date, equity });
    }

    /// Update last seen prices from `price_map` and return total equity.
    pub fn mark_to_market(&mut self, price_map: &HashMap<String, f64>) -> f64 {
        for holding in self.holdings.values_mut() {
            if let Some(&price) = price_map.get(&holding.symbol) {
                holding.mark(price);
            }
        }
        self.total_equity(price_map)
    }

    /// Cash plus holdings marked at `price_map`, or at their last seen price.
    pub fn total_equity(&self, price_map: &HashMap<String, f64>) -> f64 {
        let holdings_value: f64 = self
            .holdings
            .values()
            .map(|h| {
                let price = price_map.get(&h.symbol).copied().unwrap_or(h.last_price);
                h.market_value(price)
            })
            .sum();
        self.cash + holdings_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[test]
    fn new_portfolio() {
        let portfolio = Portfolio::new(100000.0);
        assert!((portfolio.cash - 100000.0).abs() < f64::EPSILON);
        assert!((portfolio.initial_capital - 100000.0).abs() < f64::EPSILON);
        assert!(portfolio.holdings.is_empty());
        assert!(portfolio.trades.is_empty());
        assert!(portfolio.equity_curve.is_empty());
    }

    #[test]
    fn buy_deducts_cost_inclusive_amount() {
        let mut portfolio = Portfolio::new(10_000.0);
        let trade = portfolio.buy("SPY", 5_000.0, 100.0, date(), 0.001).cloned();

        let trade = trade.unwrap();
        assert_eq!(trade.action, TradeAction::Buy);
        assert!((trade.quantity - 50.0).abs() < 1e-12);
        assert!((trade.value - 5_000.0).abs() < 1e-12);
        assert!((portfolio.cash - (10_000.0 - 5_005.0)).abs() < 1e-9);
        assert!(portfolio.is_held("SPY"));
    }

    #[test]
    fn buy_skipped_when_cash_short() {
        let mut portfolio = Portfolio::new(1_000.0);
        assert!(portfolio.buy("SPY", 1_000.0, 10.0, date(), 0.01).is_none());
        assert_eq!(portfolio.cash, 1_000.0);
        assert!(portfolio.trades.is_empty());
        assert_eq!(portfolio.holding_count(), 0);
    }

    #[test]
    fn buy_adds_to_existing_holding() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.buy("SPY", 1_000.0, 100.0, date(), 0.0);
        portfolio.buy("SPY", 1_100.0, 110.0, date(), 0.0);
        let h = &portfolio.holdings["SPY"];
        assert!((h.quantity - 20.0).abs() < 1e-12);
        assert_eq!(h.last_price, 110.0);
    }

    #[test]
    fn liquidate_credits_net_proceeds() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.buy("TLT", 1_000.0, 100.0, date(), 0.0);
        let trade = portfolio.liquidate("TLT", 120.0, date(), 0.001).cloned().unwrap();

        assert_eq!(trade.action, TradeAction::Sell);
        assert!((trade.quantity - 10.0).abs() < 1e-12);
        assert!((trade.value - (1_200.0 - 1.2)).abs() < 1e-9);
        assert!((portfolio.cash - (9_000.0 + 1_198.8)).abs() < 1e-9);
        assert!(!portfolio.is_held("TLT"));
        assert_eq!(portfolio.trades.len(), 2);
    }

    #[test]
    fn liquidate_unknown_symbol() {
        let mut portfolio = Portfolio::new(100.0);
        assert!(portfolio.liquidate("XYZ", 1.0, date(), 0.0).is_none());
    }

    #[test]
    fn total_equity_uses_last_price_when_missing() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.buy("SPY", 1_000.0, 100.0, date(), 0.0);
        portfolio.buy("GLD", 1_000.0, 50.0, date(), 0.0);

        let mut price_map = HashMap::new();
        price_map.insert("SPY".to_string(), 110.0);

        // SPY 10 * 110, GLD 20 * 50 (last seen)
        let equity = portfolio.total_equity(&price_map);
        assert!((equity - (8_000.0 + 1_100.0 + 1_000.0)).abs() < 1e-9);
    }

    #[test]
    fn mark_to_market_remembers_prices() {
        let mut portfolio = Portfolio::new(1_000.0);
        portfolio.buy("SPY", 500.0, 50.0, date(), 0.0);

        let mut prices = HashMap::new();
        prices.insert("SPY".to_string(), 60.0);
        assert!((portfolio.mark_to_market(&prices) - 1_100.0).abs() < 1e-9);

        // no bar today: last seen price carries
        assert!((portfolio.mark_to_market(&HashMap::new()) - 1_100.0).abs() < 1e-9);
    }

    #[test]
    fn equity_returns_pairs() {
        let d1 = date();
        let d2 = d1.succ_opt().unwrap();
        let d3 = d2.succ_opt().unwrap();
        let curve = vec![
            EquityPoint { date: d1, equity: 100.0 },
            EquityPoint { date: d2, equity: 110.0 },
            EquityPoint { date: d3, equity: 99.0 },
        ];
        let r = equity_returns(&curve);
        assert_eq!(r.len(), 2);
        assert_eq!(r[0].0, d2);
        assert!((r[0].1 - 0.1).abs() < 1e-12);
        assert!((r[1].1 + 0.1).abs() < 1e-12);
    }
}
