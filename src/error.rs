//! Error types for the outbound calls.
//!
//! Neither error ever reaches an ingress caller: relay errors are logged by the
//! detached task, display errors are logged by the reconciler and retried on the
//! next tick.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure forwarding a payload to the webhook endpoint.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned {0}")]
    Status(StatusCode),

    #[error("too many relay attempts in flight")]
    Saturated,
}

/// Failure talking to the display surface.
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("display request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("bot token is not a valid header value")]
    InvalidToken,

    #[error("display API returned {0}")]
    Status(StatusCode),

    #[error("unexpected display API response: {0}")]
    Decode(String),
}
