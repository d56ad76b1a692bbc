mod model;
mod repository;

pub use model::FetchJobDB;
pub use repository::FetchJobRepository;
