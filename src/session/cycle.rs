//! One poll cycle: render, decide, dispatch

use std::time::Instant;

use crate::afk::{self, IdleSource};
use crate::auth::AuthStatus;
use crate::config::AppConfig;
use crate::models::{PlaybackSnapshot, PlaybackState, PollOutcome};
use crate::osc::StatusSink;
use crate::render::{clock_line, compose_message, render_lines, Extras};
use crate::rotation::RotationScheduler;
use crate::specs::SpecsCollector;

use super::StatusHandle;

/// What a cycle ended up doing with the chatbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Rotation fired; the rotated message went out.
    Rotated,
    Sent,
    /// Text and track identical to last time, or nothing to show.
    Unchanged,
    /// Token rejected; nothing rendered.
    Skipped,
    /// The send itself failed.
    Failed,
}

/// Everything the loop carries between cycles.
pub struct Session {
    last_message: Option<String>,
    last_track_id: Option<String>,
    last_snapshot: Option<PlaybackSnapshot>,
    rotation: RotationScheduler,
    specs: SpecsCollector,
    idle: Box<dyn IdleSource>,
    next_keepalive: Instant,
    status: StatusHandle,
}

impl Session {
    pub fn new(cfg: &AppConfig, idle: Box<dyn IdleSource>, status: StatusHandle, now: Instant) -> Self {
        Self {
            last_message: None,
            last_track_id: None,
            last_snapshot: None,
            rotation: RotationScheduler::new(now),
            specs: SpecsCollector::new(),
            idle,
            next_keepalive: now + cfg.anti_afk_period(),
            status,
        }
    }

    pub fn status(&self) -> &StatusHandle {
        &self.status
    }

    #[cfg(test)]
    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    /// The full message for the last known playback state, as it would be
    /// sent right now.
    pub async fn compose(&mut self, cfg: &AppConfig) -> String {
        let rendered = render_lines(cfg, cfg.template(), self.last_snapshot.as_ref());
        let specs_line = self.specs.line(cfg).await;
        let clock = clock_line(cfg, chrono::Local::now().time());
        let afk_tag = afk::tag_for(cfg, self.idle.as_ref());
        compose_message(
            cfg,
            &rendered.main,
            &Extras {
                rotation: self.rotation.active_text(cfg),
                time_line: &rendered.time_line,
                specs_line: &specs_line,
                clock_line: &clock,
                afk_tag: afk_tag.as_deref(),
            },
        )
    }

    /// Compose against `snapshot` without sending anything.
    pub async fn preview(&mut self, cfg: &AppConfig, snapshot: Option<PlaybackSnapshot>) -> String {
        self.last_snapshot = snapshot;
        self.compose(cfg).await
    }

    /// Run one cycle against an already fetched `outcome`.
    pub async fn cycle<S: StatusSink>(
        &mut self,
        cfg: &AppConfig,
        outcome: PollOutcome,
        now: Instant,
        sink: &S,
    ) -> Dispatch {
        let dispatch = match outcome {
            PollOutcome::Unauthorized => {
                tracing::warn!("Spotify rejected the access token");
                self.status.update(|s| s.auth = AuthStatus::Required);
                Dispatch::Skipped
            }
            PollOutcome::Idle => {
                self.last_snapshot = None;
                self.render_and_send(cfg, now, sink).await
            }
            PollOutcome::Active(snapshot) => {
                self.last_snapshot = Some(snapshot);
                self.render_and_send(cfg, now, sink).await
            }
        };

        self.keepalive(cfg, now, sink).await;
        dispatch
    }

    async fn render_and_send<S: StatusSink>(&mut self, cfg: &AppConfig, now: Instant, sink: &S) -> Dispatch {
        let state = PlaybackState::of(self.last_snapshot.as_ref());
        let title = self.last_snapshot.as_ref().map(|s| s.title.clone());
        self.status.update(|s| {
            s.playback = state;
            s.track = title;
        });

        let rotated = self
            .rotation
            .tick(cfg, now, self.last_snapshot.as_ref())
            .is_some();
        let message = self.compose(cfg).await;
        let track_id = self.last_snapshot.as_ref().map(|s| s.track_id.clone());

        if rotated && message.is_empty() {
            return Dispatch::Unchanged;
        }
        let changed = self.last_message.as_deref() != Some(message.as_str())
            || self.last_track_id != track_id;
        if !rotated && cfg.only_changes && !changed {
            return Dispatch::Unchanged;
        }

        if let Err(e) = sink.send_chatbox(&message, cfg.chat_sound).await {
            tracing::warn!("Chatbox send failed: {}", e);
            return Dispatch::Failed;
        }
        tracing::debug!("Sent chatbox message {:?}", message);
        self.status.update(|s| s.last_message = message.clone());
        self.last_message = Some(message);
        self.last_track_id = track_id;

        if rotated {
            Dispatch::Rotated
        } else {
            Dispatch::Sent
        }
    }

    async fn keepalive<S: StatusSink>(&mut self, cfg: &AppConfig, now: Instant, sink: &S) {
        if !cfg.anti_afk_enabled || now < self.next_keepalive {
            return;
        }
        self.next_keepalive = now + cfg.anti_afk_period();
        match sink.send_jump().await {
            Ok(()) => tracing::debug!("Anti-AFK jump sent"),
            Err(e) => tracing::warn!("Anti-AFK jump failed: {}", e),
        }
    }
}
