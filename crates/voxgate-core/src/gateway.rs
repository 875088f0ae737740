//! Gateway wire envelopes.
//!
//! The primary connection carries JSON control envelopes `{op, d, t?}`.
//! Op codes used by voxgate:
//!
//! - `10` — hello (payload includes `heartbeat_interval` in milliseconds)
//! - `1`  — heartbeat
//! - `11` — heartbeat ack
//! - `2`  — identify
//! - `0`  — dispatch event (named by `t`)
//! - `4`  — voice state update
//! - `3`  — presence update

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{VoxError, VoxResult};

pub const OP_DISPATCH: u8 = 0;
pub const OP_HEARTBEAT: u8 = 1;
pub const OP_IDENTIFY: u8 = 2;
pub const OP_PRESENCE_UPDATE: u8 = 3;
pub const OP_VOICE_STATE_UPDATE: u8 = 4;
pub const OP_HELLO: u8 = 10;
pub const OP_HEARTBEAT_ACK: u8 = 11;

pub const EVENT_READY: &str = "READY";
pub const EVENT_VOICE_STATE_UPDATE: &str = "VOICE_STATE_UPDATE";
pub const EVENT_STREAM_CREATE: &str = "STREAM_CREATE";
pub const EVENT_STREAM_DELETE: &str = "STREAM_DELETE";
pub const EVENT_VOICE_SERVER_UPDATE: &str = "VOICE_SERVER_UPDATE";

/// A single gateway control envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayFrame {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayFrame {
    pub fn encode(&self) -> VoxResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> VoxResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Heartbeat frame (op 1, null payload).
    pub fn heartbeat() -> Self {
        Self {
            op: OP_HEARTBEAT,
            d: Value::Null,
            t: None,
        }
    }

    /// Heartbeat acknowledgement (op 11). Sent by the server.
    pub fn heartbeat_ack() -> Self {
        Self {
            op: OP_HEARTBEAT_ACK,
            d: Value::Null,
            t: None,
        }
    }

    /// Identify payload (op 2) carrying the credential token.
    pub fn identify(token: &str) -> Self {
        Self {
            op: OP_IDENTIFY,
            d: json!({
                "token": token,
                "properties": {
                    "$os": "linux",
                    "$browser": "voxgate",
                    "$device": "desktop",
                },
            }),
            t: None,
        }
    }

    /// Presence update (op 3): online, no activities.
    pub fn presence_online() -> Self {
        Self {
            op: OP_PRESENCE_UPDATE,
            d: json!({
                "status": "online",
                "since": Value::Null,
                "activities": [],
                "afk": false,
            }),
            t: None,
        }
    }

    /// Voice state update (op 4). A null `channel_id` leaves voice.
    pub fn voice_state_update(
        guild_id: Option<&str>,
        channel_id: Option<&str>,
        self_mute: bool,
        self_deaf: bool,
        self_video: bool,
    ) -> Self {
        Self {
            op: OP_VOICE_STATE_UPDATE,
            d: json!({
                "guild_id": guild_id,
                "channel_id": channel_id,
                "self_mute": self_mute,
                "self_deaf": self_deaf,
                "self_video": self_video,
            }),
            t: None,
        }
    }

    /// Server hello (op 10). Used by tests standing in for the server.
    pub fn hello(heartbeat_interval_ms: u64) -> Self {
        Self {
            op: OP_HELLO,
            d: json!({ "heartbeat_interval": heartbeat_interval_ms }),
            t: None,
        }
    }

    /// Dispatch event (op 0) named by `t`. Used by tests standing in for the server.
    pub fn dispatch(event: &str, d: Value) -> Self {
        Self {
            op: OP_DISPATCH,
            d,
            t: Some(event.to_string()),
        }
    }

    /// The heartbeat interval from a hello frame, if this is one.
    pub fn hello_interval_ms(&self) -> Option<u64> {
        if self.op != OP_HELLO {
            return None;
        }
        self.d.get("heartbeat_interval").and_then(Value::as_u64)
    }

    /// Parse a dispatch envelope into a typed event.
    ///
    /// Returns `Ok(None)` for non-dispatch frames. Event names the client
    /// does not know map to `GatewayEvent::Unknown` rather than an error.
    pub fn event(&self) -> VoxResult<Option<GatewayEvent>> {
        if self.op != OP_DISPATCH {
            return Ok(None);
        }
        let name = match &self.t {
            Some(t) => t.as_str(),
            None => return Err(VoxError::Codec("dispatch frame without event name".into())),
        };

        let event = match name {
            EVENT_READY => GatewayEvent::Ready(serde_json::from_value(self.d.clone())?),
            EVENT_VOICE_STATE_UPDATE => {
                GatewayEvent::VoiceStateUpdate(serde_json::from_value(self.d.clone())?)
            }
            EVENT_STREAM_CREATE => {
                GatewayEvent::StreamCreate(serde_json::from_value(self.d.clone())?)
            }
            EVENT_STREAM_DELETE => {
                GatewayEvent::StreamDelete(serde_json::from_value(self.d.clone())?)
            }
            EVENT_VOICE_SERVER_UPDATE => GatewayEvent::VoiceServerUpdate,
            other => GatewayEvent::Unknown(other.to_string()),
        };
        Ok(Some(event))
    }
}

/// Typed dispatch events consumed from the primary connection.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Ready(ReadyEvent),
    VoiceStateUpdate(VoiceStateEvent),
    StreamCreate(StreamCreateEvent),
    StreamDelete(StreamDeleteEvent),
    /// Relevant only to media payload transport; the session ignores it.
    VoiceServerUpdate,
    Unknown(String),
}

/// READY: session id plus the authenticated identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyEvent {
    pub session_id: String,
    pub user: ReadyUser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
}

impl ReadyUser {
    /// Display name in `name#discriminator` form.
    pub fn display_name(&self) -> String {
        match &self.discriminator {
            Some(d) => format!("{}#{}", self.username, d),
            None => format!("{}#0", self.username),
        }
    }
}

/// VOICE_STATE_UPDATE: server-declared membership and flags for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceStateEvent {
    pub user_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub self_mute: bool,
    #[serde(default)]
    pub self_deaf: bool,
    #[serde(default)]
    pub self_stream: bool,
    #[serde(default)]
    pub self_video: bool,
}

/// STREAM_CREATE: a media stream came up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamCreateEvent {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub stream_key: Option<String>,
}

/// STREAM_DELETE: a media stream went away.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDeleteEvent {
    #[serde(default)]
    pub stream_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_heartbeat() {
        let frame = GatewayFrame::heartbeat();
        let raw = frame.encode().unwrap();
        assert!(raw.contains("\"op\":1"));
        let decoded = GatewayFrame::decode(&raw).unwrap();
        assert_eq!(decoded.op, OP_HEARTBEAT);
        assert!(decoded.d.is_null());
        assert!(decoded.t.is_none());
    }

    #[test]
    fn hello_interval() {
        let frame = GatewayFrame::hello(41250);
        assert_eq!(frame.hello_interval_ms(), Some(41250));
        assert_eq!(GatewayFrame::heartbeat().hello_interval_ms(), None);
    }

    #[test]
    fn identify_carries_token() {
        let frame = GatewayFrame::identify("secret-token");
        assert_eq!(frame.op, OP_IDENTIFY);
        assert_eq!(
            frame.d.get("token").and_then(Value::as_str),
            Some("secret-token")
        );
    }

    #[test]
    fn voice_state_update_null_channel() {
        let frame = GatewayFrame::voice_state_update(Some("10"), None, false, false, false);
        assert_eq!(frame.op, OP_VOICE_STATE_UPDATE);
        assert!(frame.d.get("channel_id").unwrap().is_null());
        assert_eq!(frame.d.get("guild_id").and_then(Value::as_str), Some("10"));
    }

    #[test]
    fn parse_ready_event() {
        let frame = GatewayFrame::dispatch(
            EVENT_READY,
            json!({
                "session_id": "abc123",
                "user": { "id": "42", "username": "alice", "discriminator": "0001" },
            }),
        );
        match frame.event().unwrap() {
            Some(GatewayEvent::Ready(ready)) => {
                assert_eq!(ready.session_id, "abc123");
                assert_eq!(ready.user.display_name(), "alice#0001");
            }
            other => panic!("expected READY, got {other:?}"),
        }
    }

    #[test]
    fn parse_voice_state_event_defaults() {
        let frame = GatewayFrame::dispatch(
            EVENT_VOICE_STATE_UPDATE,
            json!({ "user_id": "42", "channel_id": "20" }),
        );
        match frame.event().unwrap() {
            Some(GatewayEvent::VoiceStateUpdate(ev)) => {
                assert_eq!(ev.user_id, "42");
                assert_eq!(ev.channel_id.as_deref(), Some("20"));
                assert!(!ev.self_mute && !ev.self_deaf && !ev.self_video);
            }
            other => panic!("expected VOICE_STATE_UPDATE, got {other:?}"),
        }
    }

    #[test]
    fn unknown_event_is_not_an_error() {
        let frame = GatewayFrame::dispatch("GUILD_CREATE", json!({ "id": "1" }));
        match frame.event().unwrap() {
            Some(GatewayEvent::Unknown(name)) => assert_eq!(name, "GUILD_CREATE"),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn non_dispatch_has_no_event() {
        assert!(GatewayFrame::hello(1000).event().unwrap().is_none());
    }

    #[test]
    fn dispatch_without_name_is_codec_error() {
        let frame = GatewayFrame {
            op: OP_DISPATCH,
            d: Value::Null,
            t: None,
        };
        assert!(matches!(frame.event(), Err(VoxError::Codec(_))));
    }
}
