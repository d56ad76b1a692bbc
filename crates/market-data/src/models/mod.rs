//! Market data models
//!
//! - `bar` - Raw daily OHLCV rows as returned by a source (PriceBar)
//! - `corporate_action` - Split, dividend and distribution series (CorporateActions)
//! - `range` - Inclusive calendar date range (DateRange)

mod bar;
mod corporate_action;
mod range;

pub use bar::PriceBar;
pub use corporate_action::{CorporateActions, Distribution, Dividend, Split};
pub use range::DateRange;
