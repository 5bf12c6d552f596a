//! Tab-to-session bookkeeping.
//!
//! The registry owns one [`RoomSession`] per tab that has ever been asked
//! to synchronize, creates sessions on first use, and translates tab
//! lifecycle events from the host into session operations.

use crate::session::{RoomSession, SessionDeps};
use crate::surfaces::TabId;
use dashmap::DashMap;
use lockstep_protocol::{ControlStatus, RoomMessage};
use std::collections::HashMap;
use std::sync::Arc;

/// What changed about a tab, as reported by the host's tab-update event.
#[derive(Debug, Clone, Default)]
pub struct TabChange {
    /// New URL, present only when the tab navigated.
    pub url: Option<String>,
    /// Whether the tab is (re)loading a document.
    pub loading: bool,
}

pub struct SessionRegistry {
    sessions: DashMap<TabId, Arc<RoomSession>>,
    deps: SessionDeps,
}

impl SessionRegistry {
    pub fn new(deps: SessionDeps) -> Self {
        Self {
            sessions: DashMap::new(),
            deps,
        }
    }

    /// The session for `tab_id`, created on first use.
    pub fn session(&self, tab_id: TabId) -> Arc<RoomSession> {
        self.sessions
            .entry(tab_id)
            .or_insert_with(|| Arc::new(RoomSession::new(tab_id, self.deps.clone())))
            .clone()
    }

    pub fn get(&self, tab_id: TabId) -> Option<Arc<RoomSession>> {
        self.sessions.get(&tab_id).map(|entry| Arc::clone(&entry))
    }

    /// Drops the session for a closed tab, tearing down its room link.
    pub fn tab_removed(&self, tab_id: TabId) {
        self.sessions.remove(&tab_id);
    }

    /// Reacts to a tab update: re-checks permission, re-injects the
    /// synchronization script across page loads, and announces navigations
    /// to the room. Tabs not in a room are ignored.
    pub async fn tab_updated(&self, tab_id: TabId, change: TabChange) {
        let Some(session) = self.get(tab_id) else {
            return;
        };
        if session.room_id().is_none() {
            return;
        }

        let granted = session.inner.update_permission_indicator().await;
        if granted {
            // A page load tore the previous script down with the document.
            if change.loading && !session.has_tab_port() {
                if let Err(error) = self.deps.tabs.inject_sync_script(tab_id).await {
                    tracing::debug!(tab = tab_id, %error, "sync script injection failed");
                }
            }
        } else if let Some(url) = &change.url {
            session
                .inner
                .notify_control(ControlStatus::PermissionRequired { origin: url.clone() });
        }

        if let Some(url) = change.url {
            let mut media = session.inner.media.lock();
            if media.href.as_deref() != Some(url.as_str()) {
                media.href = Some(url.clone());
                drop(media);
                session.inner.publish_room(RoomMessage::Url { href: url });
            }
        }
    }

    /// Room membership per tracked tab, for control surfaces.
    pub fn control_snapshot(&self) -> HashMap<TabId, Option<String>> {
        self.sessions
            .iter()
            .map(|entry| (*entry.key(), entry.value().room_id()))
            .collect()
    }
}
