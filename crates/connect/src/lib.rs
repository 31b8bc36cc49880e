//! HTTP implementation of the remote gateway, plus the connectivity flag
//! the host application toggles.

pub mod client;
pub mod errors;
pub mod monitor;
pub(crate) mod types;

pub use client::ConnectClient;
pub use errors::ConnectError;
pub use monitor::SharedNetworkMonitor;
