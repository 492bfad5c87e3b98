//! Progress relay — ordered channel from the compute thread to the registry.
//!
//! The compute engine runs on a blocking thread that must never touch
//! registry state directly. It emits `(message, percent)` pairs through a
//! [`ProgressSender`]; the executor's drain loop receives them in emission
//! order on the async side. The channel is unbounded so a slow drain can
//! never stall the compute thread.

use std::time::Duration;

use tokio::sync::mpsc;

/// One progress event emitted by the compute engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub message: String,
    /// Advisory percentage, 0–100.
    pub percent: u8,
}

/// Producer half, cheap to clone and safe to use from a blocking thread
/// (`send` on an unbounded channel never awaits).
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSender {
    /// Emit a progress event. Errors (receiver gone) are ignored; a
    /// finished drain loop simply stops caring about progress.
    pub fn emit(&self, message: &str, percent: u8) {
        let _ = self.tx.send(ProgressEvent {
            message: message.to_string(),
            percent: percent.min(100),
        });
    }
}

/// Outcome of one bounded poll of the relay.
#[derive(Debug)]
pub enum Polled {
    /// An event arrived within the wait window.
    Event(ProgressEvent),
    /// Nothing arrived; caller should check whether the producer finished.
    Idle,
    /// All senders dropped and the buffer is empty.
    Closed,
}

/// Consumer half, drained by the job executor.
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl ProgressReceiver {
    /// Wait up to `wait` for the next event.
    pub async fn poll(&mut self, wait: Duration) -> Polled {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Some(event)) => Polled::Event(event),
            Ok(None) => Polled::Closed,
            Err(_) => Polled::Idle,
        }
    }

    /// Take any residual buffered events without waiting. Called after the
    /// producer finished, so the terminal transition is recorded only once
    /// every in-flight progress event has been applied.
    pub fn drain(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Create a connected sender/receiver pair for one job.
pub fn progress_relay() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSender { tx }, ProgressReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_emission_order() {
        let (tx, mut rx) = progress_relay();
        for i in 0..5u8 {
            tx.emit(&format!("step {i}"), i * 20);
        }
        for i in 0..5u8 {
            match rx.poll(Duration::from_millis(50)).await {
                Polled::Event(event) => {
                    assert_eq!(event.message, format!("step {i}"));
                    assert_eq!(event.percent, i * 20);
                }
                other => panic!("expected event, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn poll_times_out_when_idle() {
        let (_tx, mut rx) = progress_relay();
        assert!(matches!(rx.poll(Duration::from_millis(10)).await, Polled::Idle));
    }

    #[tokio::test]
    async fn poll_reports_closed_after_sender_drop() {
        let (tx, mut rx) = progress_relay();
        drop(tx);
        assert!(matches!(
            rx.poll(Duration::from_millis(10)).await,
            Polled::Closed
        ));
    }

    #[tokio::test]
    async fn drain_takes_residual_events_in_order() {
        let (tx, mut rx) = progress_relay();
        tx.emit("a", 10);
        tx.emit("b", 20);
        drop(tx);
        let events = rx.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "a");
        assert_eq!(events[1].message, "b");
    }

    #[tokio::test]
    async fn percent_is_capped_at_100() {
        let (tx, mut rx) = progress_relay();
        tx.emit("over", 250);
        match rx.poll(Duration::from_millis(50)).await {
            Polled::Event(event) => assert_eq!(event.percent, 100),
            other => panic!("expected event, got {other:?}"),
        }
    }
}
