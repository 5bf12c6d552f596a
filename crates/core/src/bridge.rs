//! Cross-document frame bridge.
//!
//! A synchronized media element can live in a nested document that the
//! engine cannot reach directly. The bridge relays tab-channel traffic
//! across the document boundary over an unauthenticated broadcast
//! primitive:
//!
//! - the **host** side (in the document the engine talks to) polls the
//!   nested document with `FRAME_PING` until a `FRAME_PONG` proves a live
//!   peer, then relays messages both ways,
//! - the **guest** side (in the nested document) answers pings, applies
//!   relayed playback commands through a [`MediaObserver`], and reports
//!   local media events back up,
//! - every message carries the installation's runtime tag; wrong-tag and
//!   wrong-source traffic is discarded on both sides,
//! - `FRAME_DESTROY` tears the channel down; a freshly started guest
//!   announces one to its own document so a superseded instance stops.

use crate::surfaces::MediaObserver;
use lockstep_protocol::bridge::{self, BridgeControl};
use lockstep_protocol::{TabEnvelope, TabMessage};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Default cadence of the host's handshake polling.
pub const HANDSHAKE_INTERVAL: Duration = Duration::from_millis(100);

/// Identity of the document a message came from, as attributed by the
/// messaging primitive itself (not spoofable by message content).
pub type SourceId = u64;

/// Write access to one document's message channel.
pub trait MessagePort: Send + Sync + 'static {
    fn post(&self, message: Value);
}

/// One message received from the messaging primitive.
#[derive(Debug, Clone)]
pub struct PortEvent {
    pub source: SourceId,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Polling for a live peer (host) or waiting for the start signal
    /// (guest).
    Handshaking,
    Ready,
    Destroyed,
}

/// Validates provenance and strips the tag; `None` means discard.
fn accept(event: PortEvent, sources: &[SourceId], runtime_tag: &str) -> Option<Value> {
    if !sources.contains(&event.source) {
        return None;
    }
    let mut value = event.data;
    (bridge::take_tag(&mut value)? == runtime_tag).then_some(value)
}

/// Host side of the bridge.
///
/// Messages sent before the handshake completes are buffered and flushed
/// in order once the peer is live. Inbound non-control messages arrive on
/// the `inbound` channel with the tag already stripped.
pub struct FrameBridge {
    runtime_tag: String,
    peer: Arc<dyn MessagePort>,
    outbound: mpsc::UnboundedSender<Value>,
    state: Arc<watch::Sender<BridgeState>>,
    relay: JoinHandle<()>,
}

impl FrameBridge {
    pub fn connect(
        runtime_tag: impl Into<String>,
        peer: Arc<dyn MessagePort>,
        peer_source: SourceId,
        events: mpsc::UnboundedReceiver<PortEvent>,
        inbound: mpsc::UnboundedSender<Value>,
        poll_interval: Duration,
    ) -> Self {
        let runtime_tag = runtime_tag.into();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let state = Arc::new(watch::channel(BridgeState::Handshaking).0);
        let relay = tokio::spawn(run_host(
            runtime_tag.clone(),
            Arc::clone(&peer),
            peer_source,
            events,
            inbound,
            outbound_rx,
            Arc::clone(&state),
            poll_interval,
        ));
        Self {
            runtime_tag,
            peer,
            outbound: outbound_tx,
            state,
            relay,
        }
    }

    /// Sends a message to the peer document, buffering it until the
    /// handshake completes.
    pub fn send(&self, message: Value) {
        let _ = self.outbound.send(message);
    }

    pub fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<BridgeState> {
        self.state.subscribe()
    }

    /// Waits for the handshake to complete. Returns `false` when the
    /// bridge was destroyed instead.
    pub async fn ready(&self) -> bool {
        let mut state = self.state.subscribe();
        state
            .wait_for(|s| *s != BridgeState::Handshaking)
            .await
            .map(|s| *s == BridgeState::Ready)
            .unwrap_or(false)
    }

    /// Tears the channel down, telling the peer to stop.
    pub fn destroy(&self) {
        if self.state.send_replace(BridgeState::Destroyed) != BridgeState::Destroyed {
            self.peer.post(bridge::tag(
                BridgeControl::Destroy.message(),
                &self.runtime_tag,
            ));
        }
        self.relay.abort();
    }
}

impl Drop for FrameBridge {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_host(
    runtime_tag: String,
    peer: Arc<dyn MessagePort>,
    peer_source: SourceId,
    mut events: mpsc::UnboundedReceiver<PortEvent>,
    inbound: mpsc::UnboundedSender<Value>,
    mut outbound: mpsc::UnboundedReceiver<Value>,
    state: Arc<watch::Sender<BridgeState>>,
    poll_interval: Duration,
) {
    let sources = [peer_source];
    let mut backlog: Vec<Value> = Vec::new();
    let mut outbound_open = true;

    // Handshake: ping on a fixed cadence until the peer pongs.
    let mut poll = tokio::time::interval(poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = poll.tick() => {
                peer.post(bridge::tag(BridgeControl::Ping.message(), &runtime_tag));
            }
            event = events.recv() => match event {
                Some(event) => {
                    if let Some(value) = accept(event, &sources, &runtime_tag) {
                        if BridgeControl::parse(&value) == Some(BridgeControl::Pong) {
                            break;
                        }
                    }
                }
                None => {
                    state.send_replace(BridgeState::Destroyed);
                    return;
                }
            },
            message = outbound.recv(), if outbound_open => match message {
                Some(message) => backlog.push(message),
                None => outbound_open = false,
            },
        }
    }

    state.send_replace(BridgeState::Ready);
    for message in backlog.drain(..) {
        peer.post(bridge::tag(message, &runtime_tag));
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    let Some(value) = accept(event, &sources, &runtime_tag) else {
                        continue;
                    };
                    match BridgeControl::parse(&value) {
                        Some(BridgeControl::Destroy) => {
                            state.send_replace(BridgeState::Destroyed);
                            return;
                        }
                        // Stray handshake traffic.
                        Some(_) => {}
                        None => {
                            if inbound.send(value).is_err() {
                                state.send_replace(BridgeState::Destroyed);
                                return;
                            }
                        }
                    }
                }
                None => {
                    state.send_replace(BridgeState::Destroyed);
                    return;
                }
            },
            message = outbound.recv(), if outbound_open => match message {
                Some(message) => peer.post(bridge::tag(message, &runtime_tag)),
                None => outbound_open = false,
            },
        }
    }
}

/// The guest's write channels and the source identities it trusts.
pub struct GuestPorts {
    /// Posts to the hosting document.
    pub parent: Arc<dyn MessagePort>,
    /// Posts to the guest's own document.
    pub own: Arc<dyn MessagePort>,
    pub parent_source: SourceId,
    pub own_source: SourceId,
}

/// Guest side of the bridge, living in the nested document.
pub struct BridgeGuest {
    state: Arc<watch::Sender<BridgeState>>,
    relay: JoinHandle<()>,
}

impl BridgeGuest {
    /// Starts the guest. It first announces `FRAME_DESTROY` to its own
    /// document (stopping any superseded instance) and waits for that
    /// announcement to arrive back as its start signal, then serves the
    /// channel: pong for ping, playback commands into `observer`, local
    /// media events from `media_events` up to the host.
    pub fn spawn(
        runtime_tag: impl Into<String>,
        ports: GuestPorts,
        events: mpsc::UnboundedReceiver<PortEvent>,
        observer: Arc<dyn MediaObserver>,
        media_events: mpsc::UnboundedReceiver<TabEnvelope>,
    ) -> Self {
        let state = Arc::new(watch::channel(BridgeState::Handshaking).0);
        let relay = tokio::spawn(run_guest(
            runtime_tag.into(),
            ports,
            events,
            observer,
            media_events,
            Arc::clone(&state),
        ));
        Self { state, relay }
    }

    pub fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<BridgeState> {
        self.state.subscribe()
    }
}

impl Drop for BridgeGuest {
    fn drop(&mut self) {
        self.relay.abort();
    }
}

async fn run_guest(
    runtime_tag: String,
    ports: GuestPorts,
    mut events: mpsc::UnboundedReceiver<PortEvent>,
    observer: Arc<dyn MediaObserver>,
    mut media_events: mpsc::UnboundedReceiver<TabEnvelope>,
    state: Arc<watch::Sender<BridgeState>>,
) {
    let sources = [ports.parent_source, ports.own_source];

    // Stop any previous instance in this document; our own announcement
    // coming back is the signal to start serving.
    ports
        .own
        .post(bridge::tag(BridgeControl::Destroy.message(), &runtime_tag));
    loop {
        let Some(event) = events.recv().await else {
            state.send_replace(BridgeState::Destroyed);
            return;
        };
        if let Some(value) = accept(event, &sources, &runtime_tag) {
            if BridgeControl::parse(&value) == Some(BridgeControl::Destroy) {
                break;
            }
        }
    }
    state.send_replace(BridgeState::Ready);

    let mut media_open = true;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    let Some(value) = accept(event, &sources, &runtime_tag) else {
                        continue;
                    };
                    match BridgeControl::parse(&value) {
                        Some(BridgeControl::Ping) => {
                            ports.parent.post(bridge::tag(
                                BridgeControl::Pong.message(),
                                &runtime_tag,
                            ));
                        }
                        Some(BridgeControl::Destroy) => {
                            observer.unobserve().await;
                            state.send_replace(BridgeState::Destroyed);
                            return;
                        }
                        Some(BridgeControl::Pong) => {}
                        None => match serde_json::from_value::<TabEnvelope>(value) {
                            Ok(TabEnvelope::Message(TabMessage::ObserveMedia)) => {
                                observer.observe().await;
                            }
                            Ok(TabEnvelope::Message(TabMessage::UnobserveMedia)) => {
                                observer.unobserve().await;
                            }
                            Ok(envelope) => observer.apply(envelope).await,
                            Err(error) => {
                                tracing::debug!(%error, "skipping undecodable bridge message");
                            }
                        },
                    }
                }
                None => {
                    state.send_replace(BridgeState::Destroyed);
                    return;
                }
            },
            message = media_events.recv(), if media_open => match message {
                Some(message) => match serde_json::to_value(&message) {
                    Ok(value) => ports.parent.post(bridge::tag(value, &runtime_tag)),
                    Err(error) => {
                        tracing::warn!(%error, "dropping unserializable media event");
                    }
                },
                None => media_open = false,
            },
        }
    }
}
