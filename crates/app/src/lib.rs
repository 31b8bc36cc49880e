//! Application assembly: wires the SQLite stores, the HTTP gateway and the
//! sync engine into one context the host embeds.

pub mod context;

pub use context::ServiceContext;
