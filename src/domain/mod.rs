//! Core domain types and logic.

pub mod ohlcv;
pub mod returns;
pub mod metrics;
pub mod sizing;
pub mod cost;
pub mod features;
pub mod model;
pub mod prediction;
pub mod backtest;
pub mod walk_forward;
pub mod trade;
pub mod portfolio;
pub mod asset_data;
pub mod simulator;
pub mod universe;
pub mod analysis;
pub mod config_validation;
pub mod error;
