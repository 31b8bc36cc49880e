//! Ledgerly core: domain models, repository contracts and the offline-first
//! sync engine. Storage and transport implementations live in sibling crates.

pub mod errors;
pub mod records;
pub mod sync;

pub use errors::{Error, Result};
