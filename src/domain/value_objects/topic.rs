//! Notification topics and lifecycle events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Broadcast destination for lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    Room(i64),
    Channel(i64),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Room(id) => write!(f, "room:{}", id),
            Topic::Channel(id) => write!(f, "channel:{}", id),
        }
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("invalid topic '{}'", s))?;
        let id: i64 = id
            .trim()
            .parse()
            .map_err(|_| format!("invalid topic id in '{}'", s))?;
        match kind.trim() {
            "room" => Ok(Topic::Room(id)),
            "channel" => Ok(Topic::Channel(id)),
            _ => Err(format!("unknown topic kind in '{}'", s)),
        }
    }
}

/// Events emitted by the write and delete paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "d")]
pub enum LifecycleEvent {
    #[serde(rename = "MESSAGE_CREATE")]
    MessageCreate {
        id: String,
        channel_id: String,
        room_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_id: Option<String>,
    },
    #[serde(rename = "MESSAGE_DELETE")]
    MessageDelete {
        id: String,
        channel_id: String,
        room_id: String,
        expired: bool,
    },
    #[serde(rename = "FILE_CREATE")]
    FileCreate {
        id: String,
        room_id: String,
        size_bytes: i64,
    },
    #[serde(rename = "FILE_DELETE")]
    FileDelete {
        id: String,
        room_id: String,
        expired: bool,
    },
    #[serde(rename = "CHANNEL_CREATE")]
    ChannelCreate {
        id: String,
        room_id: String,
        name: String,
        #[serde(rename = "type")]
        channel_type: String,
    },
    #[serde(rename = "MEMBER_ADD")]
    MemberAdd { room_id: String, user_id: String },
    #[serde(rename = "ROOM_UPDATE")]
    RoomUpdate { id: String },
    #[serde(rename = "ROOM_DELETE")]
    RoomDelete { id: String },
}

impl LifecycleEvent {
    /// Get the event name for dispatch
    pub fn event_type(&self) -> &'static str {
        match self {
            LifecycleEvent::MessageCreate { .. } => "MESSAGE_CREATE",
            LifecycleEvent::MessageDelete { .. } => "MESSAGE_DELETE",
            LifecycleEvent::FileCreate { .. } => "FILE_CREATE",
            LifecycleEvent::FileDelete { .. } => "FILE_DELETE",
            LifecycleEvent::ChannelCreate { .. } => "CHANNEL_CREATE",
            LifecycleEvent::MemberAdd { .. } => "MEMBER_ADD",
            LifecycleEvent::RoomUpdate { .. } => "ROOM_UPDATE",
            LifecycleEvent::RoomDelete { .. } => "ROOM_DELETE",
        }
    }

    /// Event body without the `t` tag.
    pub fn payload(&self) -> serde_json::Value {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(mut map)) => {
                map.remove("d").unwrap_or(serde_json::Value::Null)
            }
            _ => serde_json::Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_topic_display_and_parse() {
        assert_eq!(Topic::Room(7).to_string(), "room:7");
        assert_eq!("channel:42".parse::<Topic>().unwrap(), Topic::Channel(42));
        assert!("guild:1".parse::<Topic>().is_err());
        assert!("room:abc".parse::<Topic>().is_err());
    }

    #[test]
    fn test_event_payload_strips_tag() {
        let event = LifecycleEvent::MessageDelete {
            id: "1".into(),
            channel_id: "2".into(),
            room_id: "3".into(),
            expired: true,
        };
        assert_eq!(event.event_type(), "MESSAGE_DELETE");
        assert_eq!(
            event.payload(),
            serde_json::json!({"id": "1", "channel_id": "2", "room_id": "3", "expired": true})
        );
    }
}
