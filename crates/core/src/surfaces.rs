//! Collaborator contracts.
//!
//! The engine never talks to a browser or an HTTP API directly; it goes
//! through these traits. The embedding host supplies the real
//! implementations, tests supply recording fakes.

use crate::error::Result;
use async_trait::async_trait;
use lockstep_protocol::TabEnvelope;

/// Identifier of one browsing context (a tab).
pub type TabId = i32;

/// Snapshot of a tab as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
}

/// What the status indicator for a tab should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorState {
    /// Not synchronizing.
    Rest,
    /// Actively observing media in the tab.
    Active,
    /// The tab's origin lacks host permission; synchronization cannot
    /// proceed until it is granted.
    PermissionRequired,
}

/// Allocates fresh room ids from an external service.
#[async_trait]
pub trait RoomAllocator: Send + Sync + 'static {
    async fn create_room(&self) -> Result<String>;
}

/// Host-side tab operations.
#[async_trait]
pub trait TabSurface: Send + Sync + 'static {
    /// Looks a tab up; `None` when it no longer exists.
    async fn get(&self, tab_id: TabId) -> Option<TabInfo>;

    /// Navigates a tab and returns its updated snapshot.
    async fn navigate(&self, tab_id: TabId, url: &str) -> Option<TabInfo>;

    /// Injects the synchronization script into a tab.
    async fn inject_sync_script(&self, tab_id: TabId) -> Result<()>;

    /// Whether the host grants access to the tab's current origin.
    async fn has_origin_permission(&self, tab_id: TabId) -> bool;

    async fn set_status_indicator(&self, tab_id: TabId, state: IndicatorState);
}

/// Document-side media control, driven by the bridge guest.
#[async_trait]
pub trait MediaObserver: Send + Sync + 'static {
    /// Starts observing the document's media element.
    async fn observe(&self);

    /// Stops observing.
    async fn unobserve(&self);

    /// Applies a playback command relayed from the engine.
    async fn apply(&self, message: TabEnvelope);
}
