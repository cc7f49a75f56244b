//! Authentication module for the Spotify Web API
//!
//! Implements the OAuth2 authorization-code flow with PKCE for a public
//! client, backed by a throwaway loopback redirect listener, plus the
//! refresh state machine the poll loop runs every cycle.

pub mod callback;
pub mod oauth;
pub mod pkce;
pub mod tokens;

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

pub use oauth::{login, logout, status, AuthManager};
pub use tokens::{FileTokenStore, TokenRecord, TokenStore};

/// Loopback port registered as the redirect URI in the Spotify dashboard.
pub const REDIRECT_PORT: u16 = 57893;

/// Read-only access to the playback state is all we need.
pub const SCOPE: &str = "user-read-playback-state";

/// Spotify endpoints used by the auth flow and the poller.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub currently_playing_url: String,
    /// Address the redirect listener binds; must match the registered URI.
    pub redirect_addr: SocketAddr,
}

impl ProviderEndpoints {
    pub fn spotify() -> Self {
        Self {
            authorize_url: "https://accounts.spotify.com/authorize".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            currently_playing_url: "https://api.spotify.com/v1/me/player/currently-playing"
                .to_string(),
            redirect_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, REDIRECT_PORT)),
        }
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://{}/callback", self.redirect_addr)
    }
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self::spotify()
    }
}

/// Auth indicator shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStatus {
    Ok,
    /// Token present but due for refresh.
    Renew,
    #[default]
    Required,
    Failed,
}

impl AuthStatus {
    pub fn of(record: Option<&TokenRecord>) -> Self {
        match record {
            None => AuthStatus::Required,
            Some(r) if r.is_expired() => AuthStatus::Renew,
            Some(_) => AuthStatus::Ok,
        }
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthStatus::Ok => "ok",
            AuthStatus::Renew => "renew",
            AuthStatus::Required => "required",
            AuthStatus::Failed => "failed",
        })
    }
}
