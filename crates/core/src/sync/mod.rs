//! Sync engine: queue models, ports and the single-flight manager.

mod manager;
mod ports;
mod queue_model;
mod scheduler;

pub use manager::*;
pub use ports::*;
pub use queue_model::*;
pub use scheduler::*;
