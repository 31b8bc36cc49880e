//! Transport errors and their mapping onto the retry taxonomy.

use ledgerly_core::sync::{GatewayError, GatewayErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
}

/// 404 means the remote counterpart is gone. Timeouts, throttling and
/// server-side failures are worth retrying; the remaining 4xx family is
/// validation-class and will fail identically next time.
pub(crate) fn classify_status(status: u16) -> GatewayErrorKind {
    match status {
        404 => GatewayErrorKind::NotFound,
        408 | 429 => GatewayErrorKind::Transient,
        s if s >= 500 => GatewayErrorKind::Transient,
        _ => GatewayErrorKind::Rejected,
    }
}

impl From<ConnectError> for GatewayError {
    fn from(err: ConnectError) -> Self {
        let kind = match &err {
            ConnectError::Transport(_) => GatewayErrorKind::Transient,
            ConnectError::Api { status, .. } => classify_status(*status),
        };
        GatewayError {
            kind,
            message: err.to_string(),
        }
    }
}
