//! Background poll loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::watch;

use super::{Session, StatusHandle};
use crate::afk::IdleSource;
use crate::api::PlaybackClient;
use crate::auth::{AuthManager, AuthStatus, TokenStore};
use crate::config::AppConfig;
use crate::models::PollOutcome;
use crate::osc::OscDispatcher;
use crate::presence;

/// Granularity at which the inter-cycle sleep notices the stop flag.
const STOP_POLL: Duration = Duration::from_millis(200);

/// Drives [`Session`] every poll interval until the stop flag is raised.
pub struct Worker<T: TokenStore> {
    auth: AuthManager<T>,
    playback: PlaybackClient,
    config: watch::Receiver<AppConfig>,
    stop: Arc<AtomicBool>,
    session: Session,
}

impl<T: TokenStore> Worker<T> {
    pub fn new(
        auth: AuthManager<T>,
        playback: PlaybackClient,
        config: watch::Receiver<AppConfig>,
        stop: Arc<AtomicBool>,
        idle: Box<dyn IdleSource>,
    ) -> Self {
        let status = StatusHandle::default();
        status.update(|s| s.auth = auth.status());
        let session = Session::new(&config.borrow(), idle, status, Instant::now());
        Self {
            auth,
            playback,
            config,
            stop,
            session,
        }
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusHandle {
        self.session.status().clone()
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Sleep up to `total`, returning early once stop is requested.
    async fn pause(&self, total: Duration) {
        let deadline = tokio::time::Instant::now() + total;
        while !self.stopped() {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep((deadline - now).min(STOP_POLL)).await;
        }
    }

    /// A valid access token, or `None` after recording why there is none.
    async fn token(&mut self) -> Option<String> {
        let result = self
            .auth
            .ensure_valid()
            .await
            .map(|t| t.map(str::to_string));
        let status = self.session.status().clone();
        match result {
            Ok(Some(token)) => {
                status.update(|s| s.auth = AuthStatus::Ok);
                Some(token)
            }
            Ok(None) => {
                if status.get().auth != AuthStatus::Required {
                    tracing::warn!("Auth: required. Run 'vrc-spotify login'.");
                }
                status.update(|s| s.auth = AuthStatus::Required);
                None
            }
            Err(e) => {
                let next = if e.needs_login() {
                    AuthStatus::Required
                } else {
                    AuthStatus::Failed
                };
                tracing::warn!("Auth: {} ({})", next, e);
                status.update(|s| s.auth = next);
                None
            }
        }
    }

    async fn reconnect(current: Option<OscDispatcher>, cfg: &AppConfig) -> Option<OscDispatcher> {
        match OscDispatcher::connect(&cfg.ip, cfg.osc_port()).await {
            Ok(osc) => {
                tracing::info!("OSC target {}", osc.target());
                Some(osc)
            }
            Err(e) => {
                tracing::warn!("OSC target unavailable: {:#}", e);
                current
            }
        }
    }

    /// Run until stopped. Recoverable failures only skip the cycle.
    pub async fn run(mut self) -> Result<()> {
        presence::log_presence().await;

        let mut target = (String::new(), 0u16);
        let mut osc: Option<OscDispatcher> = None;
        tracing::info!("Worker started");

        while !self.stopped() {
            let cfg = self.config.borrow_and_update().clone();

            let wanted = (cfg.ip.clone(), cfg.osc_port());
            if osc.is_none() || wanted != target {
                osc = Self::reconnect(osc, &cfg).await;
                target = wanted;
            }

            if let Some(token) = self.token().await {
                match self.playback.fetch(&token).await {
                    Ok(outcome) => {
                        let unauthorized = outcome == PollOutcome::Unauthorized;
                        if let Some(osc) = &osc {
                            self.session.cycle(&cfg, outcome, Instant::now(), osc).await;
                        }
                        if unauthorized {
                            if let Err(e) = self.auth.refresh().await {
                                tracing::warn!("Token refresh after 401 failed: {}", e);
                            }
                        }
                    }
                    Err(e) => tracing::warn!("Playback poll failed, skipping cycle: {}", e),
                }
            }

            self.pause(cfg.poll_interval()).await;
        }

        tracing::info!("Worker stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::afk::FixedIdle;
    use crate::auth::tokens::MemoryTokenStore;
    use crate::auth::{ProviderEndpoints, TokenRecord};
    use crate::osc::dispatcher::tests::{listener, recv};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use rosc::OscType;

    async fn fake_playing_api() -> String {
        let app = Router::new().route(
            "/playing",
            get(|| async {
                (
                    StatusCode::OK,
                    r#"{"is_playing":true,"progress_ms":65000,
                       "item":{"id":"t1","name":"Halo","duration_ms":261000,
                               "artists":[{"name":"Beyonce"}]}}"#,
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/playing", addr)
    }

    fn fresh_record() -> TokenRecord {
        TokenRecord {
            access_token: Some("at".into()),
            expires_in: Some(3600),
            obtained_at: Some(crate::auth::tokens::unix_now()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_runs_a_cycle_then_stops() {
        let (sock, port) = listener().await;
        let cfg = AppConfig {
            port: port.into(),
            rotation_enabled: false,
            ..Default::default()
        };
        let (_tx, rx) = watch::channel(cfg);
        let auth = AuthManager::new(
            MemoryTokenStore::with(fresh_record()),
            ProviderEndpoints::default(),
        )
        .unwrap();
        let playback = PlaybackClient::new(fake_playing_api().await).unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let worker = Worker::new(auth, playback, rx, stop.clone(), Box::new(FixedIdle(None)));
        let status = worker.status();

        let stopper = stop.clone();
        let run = async move { worker.run().await };
        let observe = async move {
            let msg = recv(&sock).await;
            stopper.store(true, Ordering::SeqCst);
            msg
        };
        let (result, msg) = tokio::join!(run, observe);

        result.unwrap();
        assert_eq!(msg.addr, "/chatbox/input");
        assert_eq!(
            msg.args[0],
            OscType::String("Spotify: Halo Beyonce [#####---------------] /\n1:05 / 4:21".into())
        );
        let seen = status.get();
        assert_eq!(seen.auth, AuthStatus::Ok);
        assert_eq!(seen.track.as_deref(), Some("Halo"));
    }

    #[tokio::test]
    async fn test_without_token_marks_required_and_keeps_looping() {
        let (_tx, rx) = watch::channel(AppConfig::default());
        let auth = AuthManager::new(MemoryTokenStore::default(), ProviderEndpoints::default()).unwrap();
        let playback = PlaybackClient::new("http://127.0.0.1:9/playing").unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let worker = Worker::new(auth, playback, rx, stop.clone(), Box::new(FixedIdle(None)));
        let status = worker.status();

        let stopper = stop.clone();
        let (result, _) = tokio::join!(worker.run(), async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            stopper.store(true, Ordering::SeqCst);
        });
        result.unwrap();
        assert_eq!(status.get().auth, AuthStatus::Required);
    }

    #[tokio::test]
    async fn test_stop_before_start_returns_immediately() {
        let (_tx, rx) = watch::channel(AppConfig::default());
        let auth = AuthManager::new(MemoryTokenStore::default(), ProviderEndpoints::default()).unwrap();
        let playback = PlaybackClient::new("http://127.0.0.1:9/playing").unwrap();
        let stop = Arc::new(AtomicBool::new(true));
        let worker = Worker::new(auth, playback, rx, stop, Box::new(FixedIdle(None)));
        tokio::time::timeout(Duration::from_secs(10), worker.run())
            .await
            .unwrap()
            .unwrap();
    }
}
