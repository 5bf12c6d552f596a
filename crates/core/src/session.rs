//! Per-tab room sessions.
//!
//! A [`RoomSession`] ties one tab to at most one room: it owns the
//! reconnecting transport, the channel to the tab's synchronization
//! script, the last observed media state, and a broadcast feed of status
//! changes for control surfaces. Inbound room traffic is dispatched by
//! the router (see the routing rules in `router.rs`).

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::router::MessageRouter;
use crate::surfaces::{IndicatorState, RoomAllocator, TabId, TabSurface};
use lockstep_protocol::{
    ControlCommand, ControlStatus, PlaybackState, RoomEnvelope, RoomMessage, TabEnvelope,
    TabMessage,
};
use lockstep_runtime::{ConnectionStatus, Connector, SessionTiming, TransportSession};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

/// Last observed playback state of the synchronized media.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaState {
    pub playback: PlaybackState,
    /// Playback position in seconds, if any has been observed.
    pub position: Option<f64>,
    /// Server timestamp (unix millis) the position was observed at.
    pub reference_time: Option<i64>,
    /// URL every participant of the room should be on.
    pub href: Option<String>,
}

/// Everything a session needs from its embedding host.
#[derive(Clone)]
pub struct SessionDeps {
    pub allocator: Arc<dyn RoomAllocator>,
    pub tabs: Arc<dyn TabSurface>,
    pub connector: Arc<dyn Connector>,
    pub clock: Arc<dyn Clock>,
    pub timing: SessionTiming,
}

impl SessionDeps {
    pub fn new(
        allocator: Arc<dyn RoomAllocator>,
        tabs: Arc<dyn TabSurface>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            allocator,
            tabs,
            connector,
            clock: Arc::new(SystemClock),
            timing: SessionTiming::default(),
        }
    }
}

pub(crate) struct SessionInner {
    pub(crate) tab_id: TabId,
    pub(crate) media: Mutex<MediaState>,
    pub(crate) transport: TransportSession,
    pub(crate) tab_port: Mutex<Option<mpsc::UnboundedSender<TabEnvelope>>>,
    pub(crate) control: broadcast::Sender<ControlStatus>,
    pub(crate) tabs: Arc<dyn TabSurface>,
    pub(crate) allocator: Arc<dyn RoomAllocator>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl SessionInner {
    pub(crate) fn publish_room(&self, message: RoomMessage) {
        match serde_json::to_value(&message) {
            Ok(value) => self.transport.publish(value),
            Err(error) => tracing::warn!(%error, "dropping unserializable room message"),
        }
    }

    /// Hands a message to the tab's script, if one is connected.
    pub(crate) fn forward_to_tab(&self, message: TabEnvelope) {
        let mut slot = self.tab_port.lock();
        if let Some(port) = slot.as_ref() {
            if port.send(message).is_err() {
                *slot = None;
            }
        }
    }

    pub(crate) fn notify_control(&self, status: ControlStatus) {
        // No control surface listening is the normal case.
        let _ = self.control.send(status);
    }

    /// Republishes a tab-originated message into the room, keeping the
    /// local URL bookkeeping in step.
    pub(crate) fn handle_tab_message(&self, message: TabEnvelope) {
        if let TabEnvelope::Message(TabMessage::Url { href }) = &message {
            self.media.lock().href = Some(href.clone());
        }
        match serde_json::to_value(&message) {
            Ok(value) => self.transport.publish(value),
            Err(error) => tracing::warn!(%error, "dropping unserializable tab message"),
        }
    }

    /// Applies latency compensation to a playback position reported at
    /// `server_time`.
    pub(crate) fn corrected_position(&self, position: f64, server_time: Option<i64>) -> f64 {
        match server_time {
            Some(reference) => {
                position + (self.clock.now_ms() - reference).max(0) as f64 / 1000.0
            }
            None => position,
        }
    }

    /// Tells the tab's script to start observing media, replaying the last
    /// known playback state so a late-injected script catches up.
    pub(crate) async fn observe_media(&self) {
        self.forward_to_tab(TabMessage::ObserveMedia.into());
        let media = self.media.lock().clone();
        if let Some(position) = media.position {
            let replay = match media.playback {
                PlaybackState::Playing => Some(TabMessage::Playing {
                    current_time: self.corrected_position(position, media.reference_time),
                    server_time: None,
                }),
                PlaybackState::Paused => Some(TabMessage::Pause {
                    current_time: position,
                }),
                PlaybackState::Unknown => None,
            };
            if let Some(message) = replay {
                self.forward_to_tab(message.into());
            }
        }
        self.tabs
            .set_status_indicator(self.tab_id, IndicatorState::Active)
            .await;
    }

    /// Re-checks origin permission, surfacing a warning indicator when it
    /// is missing. Returns whether permission is granted.
    pub(crate) async fn update_permission_indicator(&self) -> bool {
        let granted = self.tabs.has_origin_permission(self.tab_id).await;
        if !granted {
            self.tabs
                .set_status_indicator(self.tab_id, IndicatorState::PermissionRequired)
                .await;
        }
        granted
    }
}

/// One tab's participation in a room.
pub struct RoomSession {
    pub(crate) inner: Arc<SessionInner>,
    pump: JoinHandle<()>,
}

impl RoomSession {
    /// Creates an unbound session for `tab_id` and starts routing inbound
    /// room traffic.
    pub fn new(tab_id: TabId, deps: SessionDeps) -> Self {
        let (transport, inbound) = TransportSession::new(Arc::clone(&deps.connector), deps.timing);
        let (control, _) = broadcast::channel(16);
        let inner = Arc::new(SessionInner {
            tab_id,
            media: Mutex::new(MediaState::default()),
            transport,
            tab_port: Mutex::new(None),
            control,
            tabs: deps.tabs,
            allocator: deps.allocator,
            clock: deps.clock,
        });
        let pump = tokio::spawn(pump_inbound(Arc::downgrade(&inner), inbound));
        Self { inner, pump }
    }

    pub fn tab_id(&self) -> TabId {
        self.inner.tab_id
    }

    pub fn room_id(&self) -> Option<String> {
        self.inner.transport.room_id()
    }

    /// Snapshot of the last observed media state.
    pub fn media(&self) -> MediaState {
        self.inner.media.lock().clone()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.inner.transport.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.transport.subscribe_status()
    }

    /// Subscribes to status notifications addressed at control surfaces.
    pub fn subscribe_control(&self) -> broadcast::Receiver<ControlStatus> {
        self.inner.control.subscribe()
    }

    pub fn has_tab_port(&self) -> bool {
        self.inner.tab_port.lock().is_some()
    }

    /// Dispatches one command from a control surface.
    pub async fn handle_control(&self, command: ControlCommand) -> Result<()> {
        match command {
            ControlCommand::CreateRoom => {
                self.create_room().await?;
            }
            ControlCommand::JoinRoom { room_id } => self.join_room(room_id),
            ControlCommand::LeaveRoom => self.leave_room().await,
            ControlCommand::ResyncMedia => self.resync_media().await,
        }
        Ok(())
    }

    /// Allocates a fresh room and joins it. Allocation failures surface
    /// to the caller; the engine never retries them.
    pub async fn create_room(&self) -> Result<String> {
        let room_id = match self.inner.allocator.create_room().await {
            Ok(room_id) => room_id,
            Err(error) => {
                tracing::error!(tab = self.inner.tab_id, %error, "room allocation failed");
                return Err(error);
            }
        };
        self.join_room(room_id.clone());
        Ok(room_id)
    }

    /// Binds the session to `room_id`. Joining the room it is already in
    /// is a no-op; otherwise media state resets and the transport rebinds.
    pub fn join_room(&self, room_id: String) {
        if self.inner.transport.room_id().as_deref() == Some(&room_id) {
            return;
        }
        *self.inner.media.lock() = MediaState::default();
        self.inner.transport.set_room(Some(room_id.clone()));
        self.inner.notify_control(ControlStatus::JoinRoom { room_id });
    }

    /// Leaves the current room, stopping media observation in the tab.
    pub async fn leave_room(&self) {
        self.inner.transport.set_room(None);
        *self.inner.media.lock() = MediaState::default();
        self.inner.forward_to_tab(TabMessage::UnobserveMedia.into());
        self.inner
            .tabs
            .set_status_indicator(self.inner.tab_id, IndicatorState::Rest)
            .await;
        self.inner.notify_control(ControlStatus::LeaveRoom);
    }

    /// Re-establishes media observation: through the connected script when
    /// one is attached, by (re-)injecting it otherwise.
    pub async fn resync_media(&self) {
        if self.has_tab_port() {
            self.inner.observe_media().await;
        } else if let Err(error) = self
            .inner
            .tabs
            .inject_sync_script(self.inner.tab_id)
            .await
        {
            tracing::debug!(tab = self.inner.tab_id, %error, "sync script injection failed");
        }
        self.inner.update_permission_indicator().await;
    }

    /// Connects the tab's synchronization script.
    ///
    /// Messages from the script arrive on `from_tab` and are republished
    /// into the room; engine-to-script traffic goes out on `to_tab`. The
    /// script is told to start observing immediately, with the last known
    /// playback state replayed to it.
    pub async fn attach_tab_port(
        &self,
        to_tab: mpsc::UnboundedSender<TabEnvelope>,
        mut from_tab: mpsc::UnboundedReceiver<TabEnvelope>,
    ) {
        *self.inner.tab_port.lock() = Some(to_tab.clone());
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            while let Some(message) = from_tab.recv().await {
                let Some(inner) = weak.upgrade() else { return };
                inner.handle_tab_message(message);
            }
            // Port gone (tab navigated or closed). Clear the slot unless a
            // newer port already replaced it.
            if let Some(inner) = weak.upgrade() {
                let mut slot = inner.tab_port.lock();
                if slot.as_ref().is_some_and(|port| port.same_channel(&to_tab)) {
                    *slot = None;
                }
            }
        });
        self.inner.observe_media().await;
    }

    /// Routes one message received from the room. This is the entry point
    /// the inbound pump uses; it is public so hosts can feed messages from
    /// auxiliary channels through the same rules.
    pub async fn handle_room_message(&self, envelope: RoomEnvelope) {
        MessageRouter::new(Arc::clone(&self.inner))
            .handle(envelope)
            .await;
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Feeds inbound room messages through the router until the transport or
/// the session goes away.
async fn pump_inbound(inner: Weak<SessionInner>, mut inbound: mpsc::UnboundedReceiver<Value>) {
    while let Some(value) = inbound.recv().await {
        let Some(inner) = inner.upgrade() else { return };
        match serde_json::from_value::<RoomEnvelope>(value) {
            Ok(envelope) => MessageRouter::new(inner).handle(envelope).await,
            Err(error) => tracing::debug!(%error, "skipping undecodable room message"),
        }
    }
}
