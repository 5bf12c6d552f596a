//! Frame bridge handshake and relay behavior.

use async_trait::async_trait;
use lockstep_core::bridge::{
    BridgeGuest, BridgeState, FrameBridge, GuestPorts, MessagePort, PortEvent,
};
use lockstep_core::surfaces::MediaObserver;
use lockstep_protocol::bridge::RUNTIME_TAG_FIELD;
use lockstep_protocol::{TabEnvelope, TabMessage};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const TAG: &str = "install-1";
const FRAME: u64 = 3;
const PARENT: u64 = 1;
const SELF: u64 = 2;

fn tagged(message: Value) -> Value {
    lockstep_protocol::bridge::tag(message, TAG)
}

/// Port that hands posted messages to the test.
struct RecordingPort(mpsc::UnboundedSender<Value>);

impl MessagePort for RecordingPort {
    fn post(&self, message: Value) {
        let _ = self.0.send(message);
    }
}

fn port() -> (Arc<RecordingPort>, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(RecordingPort(tx)), rx)
}

struct HostHarness {
    bridge: FrameBridge,
    posted: mpsc::UnboundedReceiver<Value>,
    events: mpsc::UnboundedSender<PortEvent>,
    inbound: mpsc::UnboundedReceiver<Value>,
}

fn host() -> HostHarness {
    let (peer, posted) = port();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound) = mpsc::unbounded_channel();
    let bridge = FrameBridge::connect(
        TAG,
        peer,
        FRAME,
        events_rx,
        inbound_tx,
        Duration::from_millis(100),
    );
    HostHarness {
        bridge,
        posted,
        events: events_tx,
        inbound,
    }
}

fn is_control(message: &Value, name: &str) -> bool {
    message["type"] == name && message[RUNTIME_TAG_FIELD] == TAG
}

#[tokio::test(start_paused = true)]
async fn handshake_polls_until_a_valid_pong() {
    let mut h = host();

    // Polling on a fixed cadence.
    for _ in 0..3 {
        let ping = h.posted.recv().await.unwrap();
        assert!(is_control(&ping, "FRAME_PING"));
    }
    assert_eq!(h.bridge.state(), BridgeState::Handshaking);

    // Wrong source and wrong tag are both discarded.
    h.events
        .send(PortEvent {
            source: 99,
            data: tagged(json!({ "type": "FRAME_PONG" })),
        })
        .unwrap();
    h.events
        .send(PortEvent {
            source: FRAME,
            data: lockstep_protocol::bridge::tag(json!({ "type": "FRAME_PONG" }), "other-install"),
        })
        .unwrap();
    let next = h.posted.recv().await.unwrap();
    assert!(is_control(&next, "FRAME_PING"));

    h.events
        .send(PortEvent {
            source: FRAME,
            data: tagged(json!({ "type": "FRAME_PONG" })),
        })
        .unwrap();
    assert!(h.bridge.ready().await);

    // Polling stops once the peer is live.
    tokio::time::sleep(Duration::from_millis(500)).await;
    while let Ok(message) = h.posted.try_recv() {
        assert!(!is_control(&message, "FRAME_PING"));
    }
}

#[tokio::test(start_paused = true)]
async fn messages_sent_during_handshake_flush_in_order() {
    let mut h = host();
    h.bridge.send(json!({ "type": "OBSERVE_MEDIA" }));
    h.bridge.send(json!({ "type": "PAUSE", "currentTime": 1.0 }));

    h.events
        .send(PortEvent {
            source: FRAME,
            data: tagged(json!({ "type": "FRAME_PONG" })),
        })
        .unwrap();
    assert!(h.bridge.ready().await);

    let mut relayed = Vec::new();
    while relayed.len() < 2 {
        let message = h.posted.recv().await.unwrap();
        if !is_control(&message, "FRAME_PING") {
            relayed.push(message);
        }
    }
    assert_eq!(
        relayed,
        vec![
            tagged(json!({ "type": "OBSERVE_MEDIA" })),
            tagged(json!({ "type": "PAUSE", "currentTime": 1.0 })),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn inbound_messages_are_untagged_and_filtered() {
    let mut h = host();
    h.events
        .send(PortEvent {
            source: FRAME,
            data: tagged(json!({ "type": "FRAME_PONG" })),
        })
        .unwrap();
    assert!(h.bridge.ready().await);

    // Untagged chatter from the page is not ours.
    h.events
        .send(PortEvent {
            source: FRAME,
            data: json!({ "type": "PLAYING", "currentTime": 0.5 }),
        })
        .unwrap();
    h.events
        .send(PortEvent {
            source: FRAME,
            data: tagged(json!({ "type": "PLAYING", "currentTime": 4.0 })),
        })
        .unwrap();

    assert_eq!(
        h.inbound.recv().await.unwrap(),
        json!({ "type": "PLAYING", "currentTime": 4.0 })
    );
    assert!(h.inbound.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn destroy_tears_down_both_ways() {
    let mut h = host();
    h.events
        .send(PortEvent {
            source: FRAME,
            data: tagged(json!({ "type": "FRAME_PONG" })),
        })
        .unwrap();
    assert!(h.bridge.ready().await);

    h.bridge.destroy();
    assert_eq!(h.bridge.state(), BridgeState::Destroyed);
    let mut saw_destroy = false;
    while let Ok(message) = h.posted.try_recv() {
        saw_destroy |= is_control(&message, "FRAME_DESTROY");
    }
    assert!(saw_destroy);

    // A destroy from the peer has the same effect.
    let mut h = host();
    h.events
        .send(PortEvent {
            source: FRAME,
            data: tagged(json!({ "type": "FRAME_PONG" })),
        })
        .unwrap();
    assert!(h.bridge.ready().await);
    let mut state = h.bridge.subscribe_state();
    h.events
        .send(PortEvent {
            source: FRAME,
            data: tagged(json!({ "type": "FRAME_DESTROY" })),
        })
        .unwrap();
    state
        .wait_for(|s| *s == BridgeState::Destroyed)
        .await
        .unwrap();
}

#[derive(Debug, PartialEq)]
enum Observed {
    Observe,
    Unobserve,
    Apply(TabEnvelope),
}

struct RecordingObserver(mpsc::UnboundedSender<Observed>);

#[async_trait]
impl MediaObserver for RecordingObserver {
    async fn observe(&self) {
        let _ = self.0.send(Observed::Observe);
    }

    async fn unobserve(&self) {
        let _ = self.0.send(Observed::Unobserve);
    }

    async fn apply(&self, message: TabEnvelope) {
        let _ = self.0.send(Observed::Apply(message));
    }
}

struct GuestHarness {
    guest: BridgeGuest,
    to_parent: mpsc::UnboundedReceiver<Value>,
    to_own: mpsc::UnboundedReceiver<Value>,
    events: mpsc::UnboundedSender<PortEvent>,
    observed: mpsc::UnboundedReceiver<Observed>,
    media: mpsc::UnboundedSender<TabEnvelope>,
}

fn guest() -> GuestHarness {
    let (parent, to_parent) = port();
    let (own, to_own) = port();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (observed_tx, observed) = mpsc::unbounded_channel();
    let (media, media_rx) = mpsc::unbounded_channel();
    let guest = BridgeGuest::spawn(
        TAG,
        GuestPorts {
            parent,
            own,
            parent_source: PARENT,
            own_source: SELF,
        },
        events_rx,
        Arc::new(RecordingObserver(observed_tx)),
        media_rx,
    );
    GuestHarness {
        guest,
        to_parent,
        to_own,
        events: events_tx,
        observed,
        media,
    }
}

/// Delivers the guest's own destroy announcement back to it, as the
/// document's message channel would.
async fn start_guest(h: &mut GuestHarness) {
    let announce = h.to_own.recv().await.unwrap();
    assert!(is_control(&announce, "FRAME_DESTROY"));
    h.events
        .send(PortEvent {
            source: SELF,
            data: announce,
        })
        .unwrap();
    let mut state = h.guest.subscribe_state();
    state
        .wait_for(|s| *s == BridgeState::Ready)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn guest_answers_pings_and_applies_commands() {
    let mut h = guest();
    start_guest(&mut h).await;

    h.events
        .send(PortEvent {
            source: PARENT,
            data: tagged(json!({ "type": "FRAME_PING" })),
        })
        .unwrap();
    let pong = h.to_parent.recv().await.unwrap();
    assert!(is_control(&pong, "FRAME_PONG"));

    h.events
        .send(PortEvent {
            source: PARENT,
            data: tagged(json!({ "type": "OBSERVE_MEDIA" })),
        })
        .unwrap();
    h.events
        .send(PortEvent {
            source: PARENT,
            data: tagged(json!({ "type": "PAUSE", "currentTime": 3.0 })),
        })
        .unwrap();
    assert_eq!(h.observed.recv().await.unwrap(), Observed::Observe);
    assert_eq!(
        h.observed.recv().await.unwrap(),
        Observed::Apply(TabMessage::Pause { current_time: 3.0 }.into())
    );
}

#[tokio::test(start_paused = true)]
async fn guest_reports_media_events_upward() {
    let mut h = guest();
    start_guest(&mut h).await;

    h.media
        .send(
            TabMessage::Playing {
                current_time: 8.0,
                server_time: None,
            }
            .into(),
        )
        .unwrap();

    assert_eq!(
        h.to_parent.recv().await.unwrap(),
        tagged(json!({ "type": "PLAYING", "currentTime": 8.0 }))
    );
}

#[tokio::test(start_paused = true)]
async fn a_new_guest_instance_supersedes_the_old_one() {
    let mut h = guest();
    start_guest(&mut h).await;

    h.events
        .send(PortEvent {
            source: PARENT,
            data: tagged(json!({ "type": "OBSERVE_MEDIA" })),
        })
        .unwrap();
    assert_eq!(h.observed.recv().await.unwrap(), Observed::Observe);

    // A freshly injected instance announces itself on the same channel.
    h.events
        .send(PortEvent {
            source: SELF,
            data: tagged(json!({ "type": "FRAME_DESTROY" })),
        })
        .unwrap();

    assert_eq!(h.observed.recv().await.unwrap(), Observed::Unobserve);
    let mut state = h.guest.subscribe_state();
    state
        .wait_for(|s| *s == BridgeState::Destroyed)
        .await
        .unwrap();
}
