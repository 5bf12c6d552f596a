//! Cross-document bridge message format.
//!
//! Documents in different browsing contexts can only exchange serialized
//! messages over an unauthenticated broadcast primitive, so every bridge
//! message carries a `runtimeTag` field: an opaque identifier shared only
//! by instances of the same installation. Receivers discard anything
//! missing the tag or carrying somebody else's.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON field carrying the installation identifier.
pub const RUNTIME_TAG_FIELD: &str = "runtimeTag";

/// Bridge lifecycle messages.
///
/// `FRAME_PING`/`FRAME_PONG` form the handshake that establishes a live
/// channel; `FRAME_DESTROY` tears it down. Everything else on the bridge
/// is relayed verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeControl {
    #[serde(rename = "FRAME_PING")]
    Ping,
    #[serde(rename = "FRAME_PONG")]
    Pong,
    #[serde(rename = "FRAME_DESTROY")]
    Destroy,
}

impl BridgeControl {
    /// Parses a bridge control message from an (already untagged) payload.
    pub fn parse(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// The untagged message payload for this control.
    pub fn message(self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Attaches the runtime tag to an outbound bridge message.
///
/// The bridge only carries JSON objects; non-objects are returned
/// unchanged and will be discarded by the receiving side for lacking a
/// tag.
pub fn tag(mut message: Value, runtime_tag: &str) -> Value {
    if let Some(object) = message.as_object_mut() {
        object.insert(RUNTIME_TAG_FIELD.to_string(), Value::from(runtime_tag));
    }
    message
}

/// Removes and returns the runtime tag from an inbound bridge message.
pub fn take_tag(message: &mut Value) -> Option<String> {
    message
        .as_object_mut()?
        .remove(RUNTIME_TAG_FIELD)?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tag_roundtrip() {
        let tagged = tag(json!({ "type": "PLAYING", "currentTime": 1.0 }), "ext-1");
        assert_eq!(tagged[RUNTIME_TAG_FIELD], "ext-1");

        let mut inbound = tagged;
        assert_eq!(take_tag(&mut inbound).as_deref(), Some("ext-1"));
        assert_eq!(inbound, json!({ "type": "PLAYING", "currentTime": 1.0 }));
    }

    #[test]
    fn untagged_message_yields_none() {
        let mut message = json!({ "type": "PLAYING" });
        assert_eq!(take_tag(&mut message), None);
    }

    #[test]
    fn control_messages_parse_after_untagging() {
        let mut message = tag(json!({ "type": "FRAME_PONG" }), "ext-1");
        take_tag(&mut message);
        assert_eq!(BridgeControl::parse(&message), Some(BridgeControl::Pong));
        assert_eq!(
            BridgeControl::parse(&json!({ "type": "PLAYING", "currentTime": 0.0 })),
            None
        );
    }
}
