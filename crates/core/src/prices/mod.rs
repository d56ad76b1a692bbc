//! Stored daily prices.

mod model;
mod store;

pub use model::{PriceRecord, DATA_SOURCE_YAHOO};
pub use store::{CoverageBounds, PriceStore, SymbolStateStore};
