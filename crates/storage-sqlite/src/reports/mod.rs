pub mod model;
pub mod repository;

pub use model::ReportDB;
pub use repository::ReportRepository;
