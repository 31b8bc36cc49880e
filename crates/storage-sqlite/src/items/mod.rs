pub mod model;
pub mod repository;

pub use model::ItemDB;
pub use repository::ItemRepository;
