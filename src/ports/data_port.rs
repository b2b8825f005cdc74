//! Price history access port.

use crate::domain::error::MarketLensError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `symbol` within `[start_date, end_date]`, in date order.
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, MarketLensError>;

    fn list_symbols(&self) -> Result<Vec<String>, MarketLensError>;

    /// First date, last date, and bar count over the whole stored history.
    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, MarketLensError>;
}
