//! Transport abstraction for room channels.
//!
//! A transport is split into a writing half, a reading half, and the
//! inbound frame stream the reading half feeds. The session owns all
//! three; swapping [`Connector`] implementations swaps the wire (the
//! production connector dials WebSockets, tests connect in-memory
//! channel pairs).

pub mod ws;

use crate::error::Result;
use async_trait::async_trait;
use lockstep_protocol::WireFrame;
use tokio::sync::mpsc;

/// Writing half of a room transport.
#[async_trait]
pub trait TransportSender: Send {
    /// Writes one frame to the wire.
    async fn send(&mut self, frame: WireFrame) -> Result<()>;
}

/// Reading half of a room transport.
#[async_trait]
pub trait TransportReceiver: Send {
    /// Drives the read loop, pushing frames into the inbound channel.
    ///
    /// Returns `Ok(())` on a clean close and a transport error when the
    /// channel itself failed.
    async fn run(&mut self) -> Result<()>;
}

/// The pieces of one opened transport.
pub struct TransportParts {
    pub sender: Box<dyn TransportSender>,
    pub receiver: Box<dyn TransportReceiver>,
    /// Frames produced by the receiver's read loop, in receipt order.
    pub inbound: mpsc::UnboundedReceiver<WireFrame>,
}

/// Opens transports scoped to a room id.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, room_id: &str) -> Result<TransportParts>;
}
