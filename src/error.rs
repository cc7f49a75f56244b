//! Error kinds the worker branches on.
//!
//! Everything else travels as `anyhow::Error` with context attached.

use thiserror::Error;

/// Failures of the OAuth exchanges against the accounts service.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token endpoint answered with a non-2xx status. The body is kept verbatim.
    #[error("token exchange failed (HTTP {status}): {body}")]
    Exchange { status: u16, body: String },

    /// Refresh was rejected for a grant/client reason; a fresh login is needed.
    #[error("refresh rejected, sign in again: {0}")]
    ReauthRequired(String),

    /// The redirect carried `error=...` instead of a code.
    #[error("authorization denied: {0}")]
    Denied(String),

    /// Loopback redirect listener could not be started or stopped early.
    #[error("redirect listener failed: {0}")]
    Callback(#[from] std::io::Error),

    #[error("invalid authorize URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("token endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token store: {0:#}")]
    Store(anyhow::Error),
}

impl AuthError {
    /// Whether the operator has to run the browser flow again.
    pub fn needs_login(&self) -> bool {
        matches!(self, AuthError::ReauthRequired(_) | AuthError::Denied(_))
    }
}

/// Failures of the currently-playing poll that are worth a retry next cycle.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("playback request failed: {0}")]
    Transient(#[from] reqwest::Error),

    #[error("playback response unreadable: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// OSC send failures. Logged by the caller, never retried within a cycle.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("failed to encode OSC message for {addr}: {reason}")]
    Encode { addr: String, reason: String },

    #[error("UDP send failed: {0}")]
    Io(#[from] std::io::Error),
}
