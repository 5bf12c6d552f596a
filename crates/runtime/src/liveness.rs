//! Connection health tracking.
//!
//! Every inbound frame and every transport-open event counts as activity.
//! If the inactivity window elapses in silence the connection is presumed
//! dead, which the session treats exactly like a dropped transport.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Health classification of the room transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Open,
    Closed,
    Timeout,
}

/// Sliding-window inactivity monitor publishing a [`ConnectionStatus`].
pub struct LivenessMonitor {
    status: watch::Sender<ConnectionStatus>,
    deadline: Mutex<Instant>,
    timeout: Duration,
}

impl LivenessMonitor {
    pub fn new(timeout: Duration) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Closed);
        Self {
            status,
            deadline: Mutex::new(Instant::now() + timeout),
            timeout,
        }
    }

    /// Resets the inactivity window.
    pub fn record_activity(&self) {
        *self.deadline.lock() = Instant::now() + self.timeout;
    }

    /// Marks the transport open, which also counts as activity.
    pub fn record_open(&self) {
        self.record_activity();
        self.status.send_replace(ConnectionStatus::Open);
    }

    /// Marks the transport closed.
    pub fn record_closed(&self) {
        self.status.send_replace(ConnectionStatus::Closed);
    }

    /// Marks the transport timed out.
    pub fn record_timeout(&self) {
        self.status.send_replace(ConnectionStatus::Timeout);
    }

    /// Current status snapshot.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Subscribes to status transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Resolves once the inactivity window elapses without a
    /// [`record_activity`](Self::record_activity) call. The deadline is
    /// re-read after every sleep, so activity while waiting pushes the
    /// expiry out.
    pub async fn expired(&self) {
        loop {
            let deadline = *self.deadline.lock();
            tokio::time::sleep_until(deadline).await;
            if *self.deadline.lock() <= Instant::now() {
                return;
            }
        }
    }
}
