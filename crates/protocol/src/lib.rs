//! Wire vocabulary for the lockstep synchronization protocol.
//!
//! Three message families cross process boundaries:
//!
//! - **Room messages**: published into and received from a room channel
//!   shared by every viewer of the same session ([`RoomMessage`]).
//! - **Tab messages**: exchanged with the script injected into a tab
//!   ([`TabMessage`]).
//! - **Control messages**: exchanged with a user-facing control surface
//!   ([`ControlCommand`], [`ControlStatus`]).
//!
//! All of them are JSON objects discriminated by a `type` field, using the
//! camelCase field names of the wire format. Message types this crate does
//! not know about must survive routing verbatim, so each family comes with
//! an untagged envelope carrying a raw-value fallback.
//!
//! The room channel additionally carries a reserved zero-length binary
//! frame used purely as heartbeat filler; see [`WireFrame`].

pub mod bridge;
mod messages;
mod wire;

pub use messages::{
    ControlCommand, ControlStatus, PlaybackState, RoomEnvelope, RoomMessage, TabEnvelope,
    TabMessage,
};
pub use wire::WireFrame;
