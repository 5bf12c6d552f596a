//! Inbound room message routing.
//!
//! One router invocation per received room message, dispatching on the
//! message type:
//!
//! - `SYNCHRONIZE` reconciles the tab with the room's last known state:
//!   navigate if the room is elsewhere, otherwise announce this tab's URL
//!   to a fresh room and (re-)establish media observation.
//! - `URL` navigates the tab to wherever the room went.
//! - `PLAYING`/`PAUSE` record playback state and forward it to the tab's
//!   script, with `PLAYING` positions corrected for delivery latency.
//! - Anything unrecognized is forwarded to the script verbatim.

use crate::session::SessionInner;
use lockstep_protocol::{
    ControlStatus, PlaybackState, RoomEnvelope, RoomMessage, TabEnvelope, TabMessage,
};
use std::sync::Arc;

pub(crate) struct MessageRouter {
    inner: Arc<SessionInner>,
}

impl MessageRouter {
    pub(crate) fn new(inner: Arc<SessionInner>) -> Self {
        Self { inner }
    }

    pub(crate) async fn handle(&self, envelope: RoomEnvelope) {
        match envelope {
            RoomEnvelope::Message(RoomMessage::Synchronize {
                href,
                state,
                current_time,
            }) => self.handle_synchronize(href, state, current_time).await,
            RoomEnvelope::Message(RoomMessage::Url { href }) => self.handle_url(href).await,
            RoomEnvelope::Message(RoomMessage::Playing {
                current_time,
                server_time,
            }) => self.handle_playing(current_time, server_time),
            RoomEnvelope::Message(RoomMessage::Pause { current_time }) => {
                self.handle_pause(current_time)
            }
            RoomEnvelope::Other(value) => self.inner.forward_to_tab(TabEnvelope::Other(value)),
        }
    }

    async fn handle_synchronize(
        &self,
        href: Option<String>,
        state: Option<PlaybackState>,
        current_time: Option<f64>,
    ) {
        let inner = &self.inner;
        let Some(tab) = inner.tabs.get(inner.tab_id).await else {
            // Tab closed underneath us; the registry will reap the session.
            return;
        };

        {
            let mut media = inner.media.lock();
            media.href = Some(href.clone().unwrap_or_else(|| tab.url.clone()));
            if let Some(state) = state {
                media.playback = state;
            }
            if let Some(position) = current_time {
                media.position = Some(position);
            }
        }

        match href {
            // The room is on a different page; follow it. Observation
            // resumes once the re-injected script reconnects.
            Some(href) if href != tab.url => {
                inner.tabs.navigate(inner.tab_id, &href).await;
            }
            href => {
                if href.is_none() {
                    // Fresh room with no URL yet; this tab sets it.
                    inner.publish_room(RoomMessage::Url {
                        href: tab.url.clone(),
                    });
                }
                let granted = inner.update_permission_indicator().await;
                let script_connected = inner.tab_port.lock().is_some();
                if script_connected {
                    inner.observe_media().await;
                } else if granted {
                    if let Err(error) = inner.tabs.inject_sync_script(inner.tab_id).await {
                        tracing::debug!(tab = inner.tab_id, %error, "sync script injection failed");
                    }
                } else {
                    inner.notify_control(ControlStatus::PermissionRequired { origin: tab.url });
                }
            }
        }
    }

    async fn handle_url(&self, href: String) {
        let inner = &self.inner;
        let Some(tab) = inner.tabs.get(inner.tab_id).await else {
            return;
        };
        inner.media.lock().href = Some(href.clone());
        if tab.url != href {
            inner.tabs.navigate(inner.tab_id, &href).await;
        }
    }

    fn handle_playing(&self, current_time: f64, server_time: Option<i64>) {
        {
            let mut media = self.inner.media.lock();
            media.playback = PlaybackState::Playing;
            media.position = Some(current_time);
            media.reference_time = server_time;
        }
        // Forward with the position advanced by however long the message
        // spent in flight, so the tab lands where the sender is now.
        self.inner.forward_to_tab(
            TabMessage::Playing {
                current_time: self.inner.corrected_position(current_time, server_time),
                server_time: None,
            }
            .into(),
        );
    }

    fn handle_pause(&self, current_time: f64) {
        {
            let mut media = self.inner.media.lock();
            media.playback = PlaybackState::Paused;
            media.position = Some(current_time);
            media.reference_time = None;
        }
        self.inner
            .forward_to_tab(TabMessage::Pause { current_time }.into());
    }
}
