//! Lockstep runtime - room transport, liveness, and session management.
//!
//! This crate provides the connection infrastructure underneath the
//! synchronization engine:
//!
//! - **Transport**: bidirectional room channel over WebSocket (or any
//!   [`Connector`] implementation)
//! - **OutboundQueue**: FIFO buffering of outbound messages across
//!   connection gaps
//! - **LivenessMonitor**: inactivity-based connection health tracking
//! - **TransportSession**: one reconnecting logical connection per room,
//!   hiding retries behind a stable publish/subscribe interface
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ lockstep-core│  RoomSession / MessageRouter
//! └──────┬───────┘
//!        │ publish / inbound stream
//! ┌──────▼───────┐
//! │   Session    │  room binding, retry, heartbeat, liveness
//! │  ┌────────┐  │
//! │  │ Queue  │  │  FIFO buffering across reconnects
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │ Trans  │  │  WebSocket framing (text JSON + binary heartbeat)
//! │  └────────┘  │
//! └──────────────┘
//! ```

pub mod config;
pub mod error;
pub mod liveness;
pub mod queue;
pub mod session;
pub mod transport;

pub use config::Config;
pub use error::{Error, Result};
pub use liveness::{ConnectionStatus, LivenessMonitor};
pub use queue::OutboundQueue;
pub use session::{SessionTiming, TransportSession};
pub use transport::{Connector, TransportParts, TransportReceiver, TransportSender};
pub use transport::ws::WsConnector;
