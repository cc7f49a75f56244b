//! Currently-playing poller

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;

use crate::error::PlaybackError;
use crate::models::{CurrentlyPlaying, PollOutcome};

const PLAYBACK_TIMEOUT: Duration = Duration::from_secs(15);

/// Read-only client for the currently-playing endpoint.
#[derive(Debug, Clone)]
pub struct PlaybackClient {
    http: reqwest::Client,
    url: String,
}

impl PlaybackClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(PLAYBACK_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    /// Poll once.
    ///
    /// 204 and unexpected statuses degrade to `Idle`; only transport and
    /// parse failures are errors.
    pub async fn fetch(&self, access_token: &str) -> Result<PollOutcome, PlaybackError> {
        tracing::debug!("Spotify GET {}", self.url);
        let resp = self
            .http
            .get(&self.url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = resp.status();
        match status {
            StatusCode::NO_CONTENT => Ok(PollOutcome::Idle),
            StatusCode::UNAUTHORIZED => Ok(PollOutcome::Unauthorized),
            StatusCode::OK => {
                let body = resp.bytes().await?;
                let playing: CurrentlyPlaying = serde_json::from_slice(&body)?;
                Ok(playing
                    .into_snapshot()
                    .map_or(PollOutcome::Idle, PollOutcome::Active))
            }
            other => {
                tracing::debug!("Playback poll returned HTTP {}, treating as idle", other.as_u16());
                Ok(PollOutcome::Idle)
            }
        }
    }
}
