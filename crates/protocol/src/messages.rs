//! Message types for the room, tab, and control-surface channels.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Playback state of the synchronized media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    Unknown,
}

impl Default for PlaybackState {
    fn default() -> Self {
        PlaybackState::Unknown
    }
}

/// Messages exchanged over a room channel.
///
/// `SYNCHRONIZE` is sent by the server to a freshly subscribed participant
/// and carries the room's last known URL and playback state, all optional
/// for a brand-new room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RoomMessage {
    #[serde(rename = "SYNCHRONIZE")]
    Synchronize {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        href: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<PlaybackState>,
        #[serde(
            rename = "currentTime",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        current_time: Option<f64>,
    },
    #[serde(rename = "URL")]
    Url { href: String },
    #[serde(rename = "PLAYING")]
    Playing {
        #[serde(rename = "currentTime")]
        current_time: f64,
        /// Server timestamp (unix millis) at which `current_time` was
        /// observed. Used for latency compensation on delivery.
        #[serde(
            rename = "serverTime",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        server_time: Option<i64>,
    },
    #[serde(rename = "PAUSE")]
    Pause {
        #[serde(rename = "currentTime")]
        current_time: f64,
    },
}

/// A room-channel payload: a known [`RoomMessage`] or an unrecognized
/// message forwarded verbatim (forward-compatible catch-all).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoomEnvelope {
    Message(RoomMessage),
    Other(Value),
}

impl From<RoomMessage> for RoomEnvelope {
    fn from(message: RoomMessage) -> Self {
        RoomEnvelope::Message(message)
    }
}

/// Messages exchanged with the synchronization script injected into a tab.
///
/// The same vocabulary flows in both directions: the engine instructs the
/// script to observe or control playback, the script reports local media
/// events back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TabMessage {
    #[serde(rename = "OBSERVE_MEDIA")]
    ObserveMedia,
    #[serde(rename = "UNOBSERVE_MEDIA")]
    UnobserveMedia,
    #[serde(rename = "PLAYING")]
    Playing {
        #[serde(rename = "currentTime")]
        current_time: f64,
        #[serde(
            rename = "serverTime",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        server_time: Option<i64>,
    },
    #[serde(rename = "PAUSE")]
    Pause {
        #[serde(rename = "currentTime")]
        current_time: f64,
    },
    #[serde(rename = "URL")]
    Url { href: String },
}

/// A tab-channel payload with a verbatim fallback, mirroring
/// [`RoomEnvelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TabEnvelope {
    Message(TabMessage),
    Other(Value),
}

impl From<TabMessage> for TabEnvelope {
    fn from(message: TabMessage) -> Self {
        TabEnvelope::Message(message)
    }
}

/// Commands accepted from a control surface (popup UI).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlCommand {
    #[serde(rename = "CREATE_ROOM")]
    CreateRoom,
    #[serde(rename = "JOIN_ROOM")]
    JoinRoom {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    #[serde(rename = "LEAVE_ROOM")]
    LeaveRoom,
    #[serde(rename = "RESYNC_MEDIA")]
    ResyncMedia,
}

/// Status notifications emitted to a control surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlStatus {
    #[serde(rename = "JOIN_ROOM")]
    JoinRoom {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    #[serde(rename = "LEAVE_ROOM")]
    LeaveRoom,
    #[serde(rename = "PERMISSION_REQUIRED")]
    PermissionRequired { origin: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn room_message_wire_format() {
        let message = RoomMessage::Playing {
            current_time: 12.5,
            server_time: Some(1_700_000_000_000),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "PLAYING",
                "currentTime": 12.5,
                "serverTime": 1_700_000_000_000_i64,
            })
        );
    }

    #[test]
    fn synchronize_with_absent_fields() {
        let value = json!({ "type": "SYNCHRONIZE" });
        let message: RoomMessage = serde_json::from_value(value).unwrap();
        assert_eq!(
            message,
            RoomMessage::Synchronize {
                href: None,
                state: None,
                current_time: None,
            }
        );
    }

    #[test]
    fn unknown_room_message_survives_roundtrip() {
        let raw = json!({ "type": "CHAT", "text": "hi" });
        let envelope: RoomEnvelope = serde_json::from_value(raw.clone()).unwrap();
        match &envelope {
            RoomEnvelope::Other(value) => assert_eq!(value, &raw),
            other => panic!("expected passthrough, got {other:?}"),
        }
        assert_eq!(serde_json::to_value(&envelope).unwrap(), raw);
    }

    #[test]
    fn known_room_message_parses_as_envelope_message() {
        let raw = json!({ "type": "URL", "href": "https://example.com/v" });
        let envelope: RoomEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(
            envelope,
            RoomEnvelope::Message(RoomMessage::Url {
                href: "https://example.com/v".into()
            })
        );
    }

    #[test]
    fn control_command_tags() {
        let command: ControlCommand =
            serde_json::from_value(json!({ "type": "JOIN_ROOM", "roomId": "r42" })).unwrap();
        assert_eq!(
            command,
            ControlCommand::JoinRoom {
                room_id: "r42".into()
            }
        );

        let status = ControlStatus::PermissionRequired {
            origin: "https://x/y".into(),
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({ "type": "PERMISSION_REQUIRED", "origin": "https://x/y" })
        );
    }
}
