//! Record domain: models, repository contracts and services.

mod item_service;
mod model;
mod report_service;
mod traits;

pub use item_service::*;
pub use model::*;
pub use report_service::*;
pub use traits::*;
