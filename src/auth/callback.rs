//! One-shot loopback listener for the OAuth redirect
//!
//! Binds before the browser is opened so the redirect can never race the
//! listener, serves `GET /callback` until a code (or an error) arrives,
//! then shuts itself down.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::error::AuthError;

const CONFIRMATION_PAGE: &str = "<html><body><h2>Spotify authorization complete.</h2>\
You can close this window.</body></html>";

/// What the redirect delivered.
#[derive(Debug)]
enum Redirect {
    Code(String),
    Denied(String),
}

type Slot = Arc<Mutex<Option<oneshot::Sender<Redirect>>>>;

/// A bound, not yet serving, redirect listener.
pub struct CallbackListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl CallbackListener {
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        Ok(Self { listener, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Redirect URI matching the bound address.
    pub fn redirect_uri(&self) -> String {
        format!("http://{}/callback", self.addr)
    }

    /// Serve until the first redirect, then tear the server down.
    ///
    /// There is no timeout: the caller is a user-initiated login.
    pub async fn wait_for_code(self) -> Result<String, AuthError> {
        let (tx, rx) = oneshot::channel();
        let slot: Slot = Arc::new(Mutex::new(Some(tx)));
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let app = Router::new()
            .route("/callback", get(handle_callback))
            .fallback(|| async { StatusCode::NOT_FOUND })
            .with_state(slot);

        tracing::debug!("Waiting for redirect on {}", self.addr);
        let listener = self.listener;
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = stop_rx.await;
                })
                .await
        });

        // If the server dies first, the router (and the sender) drop with it.
        let outcome = rx.await;
        let _ = stop_tx.send(());
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Redirect listener error: {}", e),
            Err(e) => tracing::warn!("Redirect listener task failed: {}", e),
        }

        match outcome {
            Ok(Redirect::Code(code)) => Ok(code),
            Ok(Redirect::Denied(reason)) => Err(AuthError::Denied(reason)),
            Err(_) => Err(AuthError::Callback(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "listener stopped before a code arrived",
            ))),
        }
    }
}

async fn handle_callback(
    State(slot): State<Slot>,
    Query(params): Query<HashMap<String, String>>,
) -> Html<&'static str> {
    let redirect = match (params.get("code"), params.get("error")) {
        (Some(code), _) if !code.is_empty() => Some(Redirect::Code(code.clone())),
        (_, Some(error)) => Some(Redirect::Denied(error.clone())),
        _ => None,
    };

    if let Some(redirect) = redirect {
        let sender = slot.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(tx) = sender {
            let _ = tx.send(redirect);
        }
    }

    Html(CONFIRMATION_PAGE)
}
