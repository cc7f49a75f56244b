//! The steady-state poll loop and the status it exposes

pub mod commands;
pub mod cycle;
pub mod worker;

pub use commands::{jump, preview, run, send_test, typing};
pub use cycle::Session;
pub use worker::Worker;

use std::sync::{Arc, Mutex};

use crate::auth::AuthStatus;
use crate::models::PlaybackState;

/// What an observer of the running loop can see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub auth: AuthStatus,
    pub playback: PlaybackState,
    pub track: Option<String>,
    pub last_message: String,
}

/// Shared view of [`SessionStatus`]. The worker writes, anyone may read.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle(Arc<Mutex<SessionStatus>>);

impl StatusHandle {
    pub fn get(&self) -> SessionStatus {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut SessionStatus)) {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_is_shared() {
        let a = StatusHandle::default();
        let b = a.clone();
        a.update(|s| {
            s.auth = AuthStatus::Ok;
            s.playback = PlaybackState::Paused;
        });
        let seen = b.get();
        assert_eq!(seen.auth, AuthStatus::Ok);
        assert_eq!(seen.playback, PlaybackState::Paused);
        assert_eq!(seen.last_message, "");
    }
}
