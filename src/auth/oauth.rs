//! OAuth2 authorization-code + PKCE flow and token refresh for Spotify

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use url::Url;

use super::callback::CallbackListener;
use super::pkce::PkcePair;
use super::tokens::unix_now;
use super::{AuthStatus, FileTokenStore, ProviderEndpoints, TokenRecord, TokenStore, SCOPE};
use crate::config::{AppConfig, DataPaths};
use crate::error::AuthError;

/// Refresh failures carrying one of these mean the grant is dead.
const REAUTH_MARKERS: [&str; 3] = ["invalid_grant", "invalid_client", "invalid_request"];

const TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Token endpoint success payload. Refresh responses may omit any field.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    scope: Option<String>,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

/// Owns the token record and drives the authorize/refresh exchanges.
pub struct AuthManager<S: TokenStore> {
    http: reqwest::Client,
    endpoints: ProviderEndpoints,
    store: S,
    record: Option<TokenRecord>,
}

impl<S: TokenStore> AuthManager<S> {
    /// Build the manager and load whatever record the store holds.
    pub fn new(store: S, endpoints: ProviderEndpoints) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(TOKEN_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        let record = store.load()?;
        Ok(Self {
            http,
            endpoints,
            store,
            record,
        })
    }

    pub fn record(&self) -> Option<&TokenRecord> {
        self.record.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.record.as_ref()?.access_token.as_deref()
    }

    pub fn status(&self) -> AuthStatus {
        AuthStatus::of(self.record.as_ref())
    }

    pub fn endpoints(&self) -> &ProviderEndpoints {
        &self.endpoints
    }

    /// Authorization URL the browser is sent to.
    pub fn authorize_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        challenge: &str,
    ) -> Result<Url, AuthError> {
        let url = Url::parse_with_params(
            &self.endpoints.authorize_url,
            &[
                ("client_id", client_id),
                ("response_type", "code"),
                ("redirect_uri", redirect_uri),
                ("scope", SCOPE),
                ("code_challenge_method", "S256"),
                ("code_challenge", challenge),
                ("show_dialog", "true"),
            ],
        )?;
        Ok(url)
    }

    /// Run the browser flow: open the consent page, wait for the redirect,
    /// exchange the code and persist the new record.
    pub async fn authorize(&mut self, client_id: &str) -> Result<&TokenRecord, AuthError> {
        self.authorize_with(client_id, open_browser).await
    }

    /// Same as [`authorize`](Self::authorize) with a custom way of showing the URL.
    pub async fn authorize_with<F>(
        &mut self,
        client_id: &str,
        launch: F,
    ) -> Result<&TokenRecord, AuthError>
    where
        F: FnOnce(&Url),
    {
        let pkce = PkcePair::generate();
        let listener = CallbackListener::bind(self.endpoints.redirect_addr).await?;
        tracing::debug!("Redirect listener bound on {}", listener.local_addr());
        let redirect_uri = listener.redirect_uri();
        let url = self.authorize_url(client_id, &redirect_uri, &pkce.challenge)?;

        launch(&url);
        tracing::info!("Waiting for Spotify authorization...");
        let code = listener.wait_for_code().await?;

        tracing::debug!("Exchanging authorization code");
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("client_id", client_id),
            ("code_verifier", pkce.verifier.as_str()),
        ];
        let resp = self
            .http
            .post(&self.endpoints.token_url)
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Exchange {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let tokens: TokenResponse = serde_json::from_str(&body).map_err(|_| AuthError::Exchange {
            status: status.as_u16(),
            body: body.clone(),
        })?;
        let access_token = tokens.access_token.ok_or_else(|| AuthError::Exchange {
            status: status.as_u16(),
            body: body.clone(),
        })?;

        let record = TokenRecord {
            access_token: Some(access_token),
            token_type: tokens.token_type,
            scope: tokens.scope,
            expires_in: tokens.expires_in,
            refresh_token: tokens.refresh_token,
            client_id: Some(client_id.to_string()),
            obtained_at: Some(unix_now()),
        };
        tracing::info!("Spotify authorization complete");
        self.persist(record)
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Without a refresh token or client id this is a no-op. A re-issued
    /// refresh token replaces the stored one; an omitted one keeps it.
    pub async fn refresh(&mut self) -> Result<(), AuthError> {
        let Some(record) = self.record.clone() else {
            return Ok(());
        };
        let (Some(refresh_token), Some(client_id)) =
            (record.refresh_token.as_deref(), record.client_id.as_deref())
        else {
            return Ok(());
        };

        tracing::info!("Refreshing Spotify access token...");
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
        ];
        let resp = self
            .http
            .post(&self.endpoints.token_url)
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if status.as_u16() >= 400 && REAUTH_MARKERS.iter().any(|m| body.contains(m)) {
                return Err(AuthError::ReauthRequired(body));
            }
            return Err(AuthError::Exchange {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let tokens: TokenResponse = serde_json::from_str(&body).map_err(|_| AuthError::Exchange {
            status: status.as_u16(),
            body: body.clone(),
        })?;
        let mut updated = record;
        if let Some(access_token) = tokens.access_token {
            updated.access_token = Some(access_token);
        }
        if let Some(new_rt) = tokens.refresh_token {
            updated.refresh_token = Some(new_rt);
        }
        if tokens.expires_in.is_some() {
            updated.expires_in = tokens.expires_in;
        }
        if tokens.scope.is_some() {
            updated.scope = tokens.scope;
        }
        updated.obtained_at = Some(unix_now());

        self.persist(updated)?;
        tracing::info!("Token refreshed");
        Ok(())
    }

    /// Called once per poll cycle: refresh when the record is absent or stale.
    pub async fn ensure_valid(&mut self) -> Result<Option<&str>, AuthError> {
        let stale = self.record.as_ref().map_or(true, |r| r.is_expired());
        if stale {
            self.refresh().await?;
        }
        Ok(self.access_token())
    }

    /// Forget the record, on disk and in memory.
    pub fn clear(&mut self) -> Result<(), AuthError> {
        self.store.clear().map_err(AuthError::Store)?;
        self.record = None;
        Ok(())
    }

    fn persist(&mut self, record: TokenRecord) -> Result<&TokenRecord, AuthError> {
        self.store.save(&record).map_err(AuthError::Store)?;
        Ok(self.record.insert(record))
    }
}

fn open_browser(url: &Url) {
    println!();
    println!("Sign in to Spotify: {}", url);
    println!();
    if let Err(e) = open::that(url.as_str()) {
        tracing::warn!("Could not open a browser ({}); open the URL above manually", e);
    }
}

fn file_manager(paths: &DataPaths) -> Result<AuthManager<FileTokenStore>> {
    AuthManager::new(
        FileTokenStore::new(paths.token_file()),
        ProviderEndpoints::spotify(),
    )
}

/// Run the interactive browser login.
pub async fn login(paths: &DataPaths, client_id: Option<String>) -> Result<()> {
    let mut config = AppConfig::load(&paths.config_file())?;
    if let Some(cid) = client_id {
        config.client_id = cid.trim().to_string();
        config.save(&paths.config_file())?;
    }
    if config.client_id.is_empty() {
        bail!("Client ID missing. Pass --client-id or set client_id in the config file.");
    }

    let mut manager = file_manager(paths)?;
    println!(
        "Redirect URI: {} (must be registered for your Spotify app)",
        manager.endpoints().redirect_uri()
    );
    match manager.authorize(&config.client_id).await {
        Ok(_) => {
            println!("Spotify authorized.");
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e).context("Auth: failed")),
    }
}

/// Delete the stored token record.
pub async fn logout(paths: &DataPaths) -> Result<()> {
    let mut manager = file_manager(paths)?;
    manager.clear()?;
    println!("Tokens cleared.");
    Ok(())
}

/// Print the current auth state.
pub async fn status(paths: &DataPaths) -> Result<()> {
    let store = FileTokenStore::new(paths.token_file());
    let record = store.load()?;
    print_status(record.as_ref(), store.path());
    Ok(())
}

fn print_status(record: Option<&TokenRecord>, path: &Path) {
    println!("Auth:        {}", AuthStatus::of(record));
    match record {
        Some(r) => {
            if !r.is_valid() {
                println!("  record incomplete; log in again");
            }
            if let Some(exp) = r.expires_at() {
                println!("  expires_at: {}", exp);
            }
            println!(
                "Refresh tok: {}",
                match (r.refresh_token.is_some(), r.can_refresh()) {
                    (true, true) => "present",
                    (true, false) => "present (no client id, cannot refresh)",
                    (false, _) => "none",
                }
            );
        }
        None => {
            println!("Refresh tok: none");
            println!("\nRun 'vrc-spotify login' to authenticate.");
        }
    }
    println!("Token file:  {}", path.display());
}
