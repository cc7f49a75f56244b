//! CLI entry points that drive the loop or its triggers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::watch;

use super::{Session, StatusHandle, Worker};
use crate::afk::SystemIdle;
use crate::api::PlaybackClient;
use crate::auth::{AuthManager, FileTokenStore, ProviderEndpoints};
use crate::config::{AppConfig, ConfigWatcher, DataPaths};
use crate::models::{PlaybackSnapshot, PollOutcome};
use crate::osc::{OscDispatcher, StatusSink, TypingPulse};

fn file_auth(paths: &DataPaths) -> Result<AuthManager<FileTokenStore>> {
    AuthManager::new(
        FileTokenStore::new(paths.token_file()),
        ProviderEndpoints::spotify(),
    )
}

async fn osc_for(cfg: &AppConfig) -> Result<OscDispatcher> {
    OscDispatcher::connect(&cfg.ip, cfg.osc_port()).await
}

/// One poll, for commands that render without the loop.
async fn current_snapshot(paths: &DataPaths) -> Result<Option<PlaybackSnapshot>> {
    let mut auth = file_auth(paths)?;
    let token = match auth.ensure_valid().await {
        Ok(Some(token)) => token.to_string(),
        Ok(None) => {
            tracing::warn!("Not signed in; rendering without playback");
            return Ok(None);
        }
        Err(e) => {
            tracing::warn!("Auth: {}; rendering without playback", e);
            return Ok(None);
        }
    };
    let client = PlaybackClient::new(&auth.endpoints().currently_playing_url)?;
    match client.fetch(&token).await {
        Ok(PollOutcome::Active(snapshot)) => Ok(Some(snapshot)),
        Ok(_) => Ok(None),
        Err(e) => {
            tracing::warn!("Playback poll failed: {}", e);
            Ok(None)
        }
    }
}

async fn composed(paths: &DataPaths, cfg: &AppConfig) -> Result<String> {
    let snapshot = current_snapshot(paths).await?;
    let mut session = Session::new(cfg, Box::new(SystemIdle), StatusHandle::default(), Instant::now());
    Ok(session.preview(cfg, snapshot).await)
}

/// Start the poll loop; Ctrl+C stops it after the current cycle.
pub async fn run(paths: &DataPaths) -> Result<()> {
    let config_path = paths.config_file();
    let cfg = AppConfig::load(&config_path)?;
    if cfg.client_id.is_empty() {
        tracing::warn!("No client_id configured; token refresh will not work");
    }

    let (tx, rx) = watch::channel(cfg);
    match ConfigWatcher::new(config_path) {
        Ok(watcher) => {
            tokio::spawn(watcher.run(tx));
        }
        Err(e) => tracing::warn!("Config hot reload disabled: {:#}", e),
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stopper = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Stopping...");
            stopper.store(true, Ordering::SeqCst);
        }
    });

    let auth = file_auth(paths)?;
    let playback = PlaybackClient::new(&auth.endpoints().currently_playing_url)?;
    Worker::new(auth, playback, rx, stop, Box::new(SystemIdle))
        .run()
        .await
}

/// Print the message the loop would send now.
pub async fn preview(paths: &DataPaths) -> Result<()> {
    let cfg = AppConfig::load(&paths.config_file())?;
    let message = composed(paths, &cfg).await?;
    if message.is_empty() {
        println!("(empty)");
    } else {
        println!("{}", message);
    }
    Ok(())
}

/// Send `text`, or the current preview, or "Test".
pub async fn send_test(paths: &DataPaths, text: Option<String>) -> Result<()> {
    let cfg = AppConfig::load(&paths.config_file())?;
    let text = match text {
        Some(text) => text,
        None => composed(paths, &cfg).await?,
    };
    let text = if text.trim().is_empty() {
        "Test".to_string()
    } else {
        text
    };
    let osc = osc_for(&cfg).await?;
    osc.send_chatbox(&text, cfg.chat_sound)
        .await
        .context("Chatbox send failed")?;
    println!("Sent to {}:\n{}", osc.target(), text);
    Ok(())
}

/// Show the typing indicator for `secs` seconds. Ctrl+C ends it early.
pub async fn typing(paths: &DataPaths, secs: u64) -> Result<()> {
    let cfg = AppConfig::load(&paths.config_file())?;
    let osc = osc_for(&cfg).await?;
    let mut pulse = TypingPulse::start(osc, Duration::from_secs(secs.max(1)));
    let interrupted = tokio::select! {
        _ = pulse.finished() => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        pulse.cancel().await;
    }
    Ok(())
}

/// Press and release jump once.
pub async fn jump(paths: &DataPaths) -> Result<()> {
    let cfg = AppConfig::load(&paths.config_file())?;
    let osc = osc_for(&cfg).await?;
    osc.send_jump().await.context("Jump failed")?;
    println!("Jump sent to {}", osc.target());
    Ok(())
}
