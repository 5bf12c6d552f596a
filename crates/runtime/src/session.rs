//! Transport session: one reconnecting logical connection per room.
//!
//! The session binds a room id to a live transport, hiding reconnection
//! behind a stable publish/subscribe interface:
//!
//! - room changes supersede the current connection (and drop queued
//!   messages addressed to the old room),
//! - transport-level failures and liveness timeouts tear down and retry
//!   with a fixed backoff for as long as the room id stands,
//! - any other failure is logged and stops the link permanently; only an
//!   explicit room change re-establishes it,
//! - heartbeat frames are generated while open and filtered inbound.

use crate::config::Config;
use crate::error::Error;
use crate::liveness::{ConnectionStatus, LivenessMonitor};
use crate::queue::OutboundQueue;
use crate::transport::{Connector, TransportParts};
use lockstep_protocol::WireFrame;
use serde_json::Value;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Pacing knobs for a transport session.
#[derive(Debug, Clone)]
pub struct SessionTiming {
    pub liveness_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub reconnect_backoff: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            liveness_timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(10),
            reconnect_backoff: Duration::from_secs(1),
        }
    }
}

impl From<&Config> for SessionTiming {
    fn from(config: &Config) -> Self {
        Self {
            liveness_timeout: config.liveness_timeout,
            heartbeat_interval: config.heartbeat_interval,
            reconnect_backoff: config.reconnect_backoff,
        }
    }
}

/// A reconnecting room connection.
///
/// Created unbound; [`set_room`](TransportSession::set_room) attaches it
/// to a room. Inbound application messages (heartbeats excluded) arrive
/// on the receiver returned by [`TransportSession::new`] in receipt
/// order.
pub struct TransportSession {
    queue: Arc<OutboundQueue>,
    liveness: Arc<LivenessMonitor>,
    room: watch::Sender<Option<String>>,
    driver: JoinHandle<()>,
}

impl TransportSession {
    pub fn new(
        connector: Arc<dyn Connector>,
        timing: SessionTiming,
    ) -> (Self, mpsc::UnboundedReceiver<Value>) {
        let queue = Arc::new(OutboundQueue::new());
        let liveness = Arc::new(LivenessMonitor::new(timing.liveness_timeout));
        let (room, room_rx) = watch::channel(None);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let driver = tokio::spawn(drive(
            connector,
            Arc::clone(&queue),
            Arc::clone(&liveness),
            room_rx,
            inbound_tx,
            timing,
        ));

        (
            Self {
                queue,
                liveness,
                room,
                driver,
            },
            inbound_rx,
        )
    }

    /// Rebinds the session to `room_id`.
    ///
    /// A no-op when the id is unchanged (idempotent join). On change, the
    /// current transport is superseded, pending outbound messages are
    /// discarded, and a new transport opens for the new room if any.
    pub fn set_room(&self, room_id: Option<String>) {
        let changed = self.room.send_if_modified(|current| {
            if *current == room_id {
                false
            } else {
                *current = room_id;
                true
            }
        });
        if changed {
            // Messages addressed to the old room must not leak into the
            // new one.
            self.queue.detach();
            self.queue.empty();
            tracing::debug!(room = ?*self.room.borrow(), "room binding changed");
        }
    }

    /// Publishes a message into the current room, queueing it if no
    /// transport is open yet.
    pub fn publish(&self, message: Value) {
        self.queue.enqueue_or_send(WireFrame::Message(message));
    }

    /// Current room binding.
    pub fn room_id(&self) -> Option<String> {
        self.room.borrow().clone()
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.liveness.status()
    }

    /// Subscribes to connection status transitions.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.liveness.subscribe()
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// Top-level driver: follows the room binding, running one connect/retry
/// loop per bound room and cancelling it when the binding changes.
async fn drive(
    connector: Arc<dyn Connector>,
    queue: Arc<OutboundQueue>,
    liveness: Arc<LivenessMonitor>,
    mut room_rx: watch::Receiver<Option<String>>,
    inbound_tx: mpsc::UnboundedSender<Value>,
    timing: SessionTiming,
) {
    loop {
        let Some(room_id) = room_rx.borrow_and_update().clone() else {
            if room_rx.changed().await.is_err() {
                return;
            }
            continue;
        };

        tokio::select! {
            // Only returns on a fatal (non-transport) failure; park until
            // an explicit room change re-establishes the link.
            () = run_room(&room_id, &*connector, &queue, &liveness, &inbound_tx, &timing) => {
                if room_rx.changed().await.is_err() {
                    return;
                }
            }
            changed = room_rx.changed() => {
                queue.detach();
                liveness.record_closed();
                if changed.is_err() {
                    return;
                }
            }
        }
    }
}

/// Connect/retry loop for one room id. Loops forever on transport-level
/// failures; returns only when a failure is classified fatal.
async fn run_room(
    room_id: &str,
    connector: &dyn Connector,
    queue: &OutboundQueue,
    liveness: &LivenessMonitor,
    inbound_tx: &mpsc::UnboundedSender<Value>,
    timing: &SessionTiming,
) {
    loop {
        match connector.connect(room_id).await {
            Ok(parts) => {
                tracing::debug!(room_id, "transport open");
                match run_connection(parts, queue, liveness, inbound_tx, timing).await {
                    Ok(()) => {
                        tracing::debug!(room_id, "transport closed, reconnecting");
                        liveness.record_closed();
                    }
                    Err(error) if error.is_transport() => {
                        tracing::debug!(room_id, %error, "transport failed, reconnecting");
                        // A liveness timeout already set its own status.
                        if liveness.status() != ConnectionStatus::Timeout {
                            liveness.record_closed();
                        }
                    }
                    Err(error) => {
                        tracing::error!(
                            room_id,
                            %error,
                            "room link failed; not retrying until rejoin"
                        );
                        liveness.record_closed();
                        return;
                    }
                }
            }
            Err(error) if error.is_transport() => {
                tracing::debug!(room_id, %error, "connect failed, retrying");
            }
            Err(error) => {
                tracing::error!(room_id, %error, "connect failed fatally; not retrying");
                return;
            }
        }

        tokio::time::sleep(timing.reconnect_backoff).await;
    }
}

/// Runs one open connection until it closes, fails, or times out.
async fn run_connection(
    parts: TransportParts,
    queue: &OutboundQueue,
    liveness: &LivenessMonitor,
    inbound_tx: &mpsc::UnboundedSender<Value>,
    timing: &SessionTiming,
) -> crate::error::Result<()> {
    let TransportParts {
        mut sender,
        mut receiver,
        mut inbound,
    } = parts;

    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    queue.attach(out_tx.clone());
    liveness.record_open();

    let mut read = pin!(receiver.run());
    let mut heartbeat = tokio::time::interval_at(
        tokio::time::Instant::now() + timing.heartbeat_interval,
        timing.heartbeat_interval,
    );
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let result = loop {
        tokio::select! {
            frame = inbound.recv() => match frame {
                Some(frame) => {
                    liveness.record_activity();
                    // Heartbeat filler never reaches the router.
                    if let Some(message) = frame.into_message() {
                        if inbound_tx.send(message).is_err() {
                            break Err(Error::ChannelClosed);
                        }
                    }
                }
                None => break Ok(()),
            },
            res = &mut read => break res,
            () = liveness.expired() => {
                liveness.record_timeout();
                break Err(Error::Transport("liveness timeout".into()));
            }
            _ = heartbeat.tick() => {
                let _ = out_tx.send(WireFrame::Heartbeat);
            }
            Some(frame) = out_rx.recv() => {
                if let Err(error) = sender.send(frame).await {
                    break Err(error);
                }
            }
        }
    };

    queue.detach();
    result
}
