//! Outbound message queue.
//!
//! Buffers outbound room messages while no transport is attached and
//! replays them, in original order and exactly once, when one opens.

use lockstep_protocol::WireFrame;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::mpsc;

/// FIFO buffer for outbound frames across connection gaps.
///
/// While detached, [`enqueue_or_send`](OutboundQueue::enqueue_or_send)
/// appends to an internal backlog. [`attach`](OutboundQueue::attach)
/// flushes the backlog to the transport writer in submission order, after
/// which frames forward immediately. [`empty`](OutboundQueue::empty)
/// discards the backlog without forwarding, used on room changes so
/// messages addressed to the old room never reach the new one.
#[derive(Default)]
pub struct OutboundQueue {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    backlog: VecDeque<WireFrame>,
    sink: Option<mpsc::UnboundedSender<WireFrame>>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forwards `frame` immediately if a transport is attached, otherwise
    /// appends it to the backlog.
    pub fn enqueue_or_send(&self, frame: WireFrame) {
        let mut inner = self.inner.lock();
        match &inner.sink {
            Some(sink) => {
                if sink.send(frame).is_err() {
                    // Writer went away without a detach; fall back to
                    // buffering until the next attach.
                    tracing::debug!("outbound sink closed, resuming buffering");
                    inner.sink = None;
                }
            }
            None => inner.backlog.push_back(frame),
        }
    }

    /// Attaches a transport writer, draining the backlog to it in FIFO
    /// order. The backlog is flushed exactly once; subsequent frames
    /// forward directly.
    pub fn attach(&self, sink: mpsc::UnboundedSender<WireFrame>) {
        let mut inner = self.inner.lock();
        while let Some(frame) = inner.backlog.pop_front() {
            if sink.send(frame).is_err() {
                tracing::debug!("outbound sink closed during flush");
                return;
            }
        }
        inner.sink = Some(sink);
    }

    /// Returns to buffering mode.
    pub fn detach(&self) {
        self.inner.lock().sink = None;
    }

    /// Discards all pending frames without forwarding.
    pub fn empty(&self) {
        self.inner.lock().backlog.clear();
    }

    /// Number of frames waiting for a transport.
    pub fn pending(&self) -> usize {
        self.inner.lock().backlog.len()
    }
}
