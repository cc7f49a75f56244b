//! Timed typing indicator

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::{OscDispatcher, StatusSink};

/// A typing indicator that switches itself off after a delay.
///
/// Dropping the handle does not stop the pulse; call [`TypingPulse::cancel`]
/// to switch the indicator off early.
pub struct TypingPulse {
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TypingPulse {
    /// Turn typing on now and off after `duration`.
    pub fn start(sink: OscDispatcher, duration: Duration) -> Self {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            if let Err(e) = sink.send_typing(true).await {
                tracing::warn!("Typing indicator on failed: {}", e);
            }
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = cancel_rx => tracing::debug!("Typing pulse cancelled"),
            }
            if let Err(e) = sink.send_typing(false).await {
                tracing::warn!("Typing indicator off failed: {}", e);
            }
        });
        Self {
            cancel: Some(cancel_tx),
            task,
        }
    }

    /// Switch the indicator off now.
    pub async fn cancel(mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
        if !self.task.is_finished() {
            let _ = self.task.await;
        }
    }

    /// Wait for the pulse to run its course.
    pub async fn finished(&mut self) {
        let _ = (&mut self.task).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use rosc::OscType;

    use super::super::dispatcher::tests::{listener, recv};
    use super::*;

    #[tokio::test]
    async fn test_pulse_runs_its_course() {
        let (sock, port) = listener().await;
        let osc = OscDispatcher::connect("127.0.0.1", port).await.unwrap();

        let started = Instant::now();
        TypingPulse::start(osc, Duration::from_millis(100))
            .finished()
            .await;
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(recv(&sock).await.args, vec![OscType::Bool(true)]);
        assert_eq!(recv(&sock).await.args, vec![OscType::Bool(false)]);
    }

    #[tokio::test]
    async fn test_cancel_turns_off_early() {
        let (sock, port) = listener().await;
        let osc = OscDispatcher::connect("127.0.0.1", port).await.unwrap();

        let started = Instant::now();
        let pulse = TypingPulse::start(osc, Duration::from_secs(30));
        assert_eq!(recv(&sock).await.args, vec![OscType::Bool(true)]);
        pulse.cancel().await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(recv(&sock).await.args, vec![OscType::Bool(false)]);
    }
}
