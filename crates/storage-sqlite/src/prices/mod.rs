mod model;
mod repository;
mod state_repository;

pub use model::{PriceDB, SymbolStateDB};
pub use repository::PriceRepository;
pub use state_repository::SymbolStateRepository;
