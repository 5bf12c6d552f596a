//! Lockstep synchronization engine.
//!
//! Keeps a group of viewers' media playback in lockstep: each
//! participating tab gets a [`RoomSession`] binding it to a shared room,
//! inbound room traffic is routed into tab navigation and playback
//! commands, and local media events are republished to the room. The
//! engine talks to its surroundings exclusively through the contracts in
//! [`surfaces`]; the transport underneath comes from `lockstep-runtime`.
//!
//! Entry points:
//!
//! - [`SessionRegistry`]: one engine instance, tracking sessions per tab
//!   and reacting to tab lifecycle events.
//! - [`RoomSession`]: a single tab's room membership and message flow.
//! - [`FrameBridge`]/[`BridgeGuest`]: relay for media nested in documents
//!   the engine cannot reach directly.

pub mod bridge;
pub mod clock;
pub mod error;
pub mod registry;
mod router;
pub mod session;
pub mod surfaces;

pub use bridge::{BridgeGuest, BridgeState, FrameBridge, GuestPorts, MessagePort, PortEvent};
pub use clock::{Clock, SystemClock};
pub use error::{Error, Result};
pub use registry::{SessionRegistry, TabChange};
pub use session::{MediaState, RoomSession, SessionDeps};
pub use surfaces::{
    IndicatorState, MediaObserver, RoomAllocator, TabId, TabInfo, TabSurface,
};
