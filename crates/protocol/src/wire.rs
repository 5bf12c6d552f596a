//! Room-channel framing.

use serde_json::Value;

/// A frame on the room transport.
///
/// Application messages travel as JSON text frames. The heartbeat is the
/// reserved zero-length binary payload exchanged purely to generate
/// traffic on idle links; it is filtered out before message routing and
/// never carries data.
#[derive(Debug, Clone, PartialEq)]
pub enum WireFrame {
    Heartbeat,
    Message(Value),
}

impl WireFrame {
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, WireFrame::Heartbeat)
    }

    /// Returns the JSON payload, or `None` for a heartbeat.
    pub fn into_message(self) -> Option<Value> {
        match self {
            WireFrame::Heartbeat => None,
            WireFrame::Message(value) => Some(value),
        }
    }
}

impl From<Value> for WireFrame {
    fn from(value: Value) -> Self {
        WireFrame::Message(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn heartbeat_carries_no_payload() {
        assert!(WireFrame::Heartbeat.is_heartbeat());
        assert_eq!(WireFrame::Heartbeat.into_message(), None);
    }

    #[test]
    fn message_frame_preserves_payload() {
        let frame = WireFrame::from(json!({ "type": "PAUSE", "currentTime": 3.0 }));
        assert!(!frame.is_heartbeat());
        assert_eq!(
            frame.into_message(),
            Some(json!({ "type": "PAUSE", "currentTime": 3.0 }))
        );
    }
}
