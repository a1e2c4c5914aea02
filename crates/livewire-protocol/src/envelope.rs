//! Event envelopes: the JSON objects carried by operation-5 frames.
//!
//! Every envelope has a `cmd` string naming the event and, usually, a
//! `data` object with the event's payload. Some events (danmaku) put
//! their payload in a top-level `info` array instead, so the whole JSON
//! body is kept alongside the parsed command.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

static NULL: Value = Value::Null;

// ---------------------------------------------------------------------------
// RoomId
// ---------------------------------------------------------------------------

/// A live room identifier.
///
/// Newtype over `u64` so a room id can't be mixed up with a user id or a
/// vote count. `#[serde(transparent)]` keeps it a plain number in JSON,
/// which is how the server sends `room_id` fields.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// The command tag of an envelope.
///
/// Known tags get their own variant so dispatch code matches on an enum
/// instead of comparing strings; anything else is kept verbatim in
/// [`Command::Unknown`]. Adding support for a new event means adding a
/// variant here and registering a handler for it, nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// A battle between two rooms started.
    BattleStart,
    /// The battle ended.
    BattleEnd,
    /// Members snapshot: every participant's votes and golds.
    BattleInfo,
    /// Process snapshot: both sides' current votes.
    BattleProcess,
    /// A chat comment.
    Danmaku,
    /// A gift notification.
    Gift,
    /// Listing of rooms that stopped broadcasting.
    StopLiveRoomList,
    /// Any other tag, including the empty tag of an envelope without `cmd`.
    Unknown(String),
}

impl Command {
    /// Returns the wire tag.
    pub fn as_str(&self) -> &str {
        match self {
            Self::BattleStart => "PK_BATTLE_START_NEW",
            Self::BattleEnd => "PK_BATTLE_END",
            Self::BattleInfo => "PK_INFO",
            Self::BattleProcess => "PK_BATTLE_PROCESS_NEW",
            Self::Danmaku => "DANMU_MSG",
            Self::Gift => "SEND_GIFT",
            Self::StopLiveRoomList => "STOP_LIVE_ROOM_LIST",
            Self::Unknown(tag) => tag,
        }
    }

    /// Returns `true` for the two tags that carry battle snapshots.
    pub fn is_battle_update(&self) -> bool {
        matches!(self, Self::BattleInfo | Self::BattleProcess)
    }
}

impl From<&str> for Command {
    fn from(tag: &str) -> Self {
        match tag {
            "PK_BATTLE_START_NEW" => Self::BattleStart,
            "PK_BATTLE_END" => Self::BattleEnd,
            "PK_INFO" => Self::BattleInfo,
            "PK_BATTLE_PROCESS_NEW" => Self::BattleProcess,
            "DANMU_MSG" => Self::Danmaku,
            "SEND_GIFT" => Self::Gift,
            "STOP_LIVE_ROOM_LIST" => Self::StopLiveRoomList,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One decoded event.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Parsed `cmd` tag.
    pub command: Command,
    /// The full JSON object as received (always a `Value::Object`).
    pub body: Value,
}

impl Envelope {
    /// Builds an envelope from a command and its `data` payload.
    ///
    /// Mostly useful in tests and for synthesizing events locally.
    pub fn new(command: Command, data: Value) -> Self {
        let body = serde_json::json!({ "cmd": command.as_str(), "data": data });
        Self { command, body }
    }

    /// Parses a frame payload into an envelope.
    ///
    /// # Errors
    /// - [`ProtocolError::Envelope`] if the bytes are not valid JSON.
    /// - [`ProtocolError::NotAnObject`] if the JSON is not an object.
    pub fn from_slice(payload: &[u8]) -> Result<Self, ProtocolError> {
        let body: Value =
            serde_json::from_slice(payload).map_err(ProtocolError::Envelope)?;
        Self::from_value(body)
    }

    /// Wraps an already-parsed JSON object.
    ///
    /// # Errors
    /// Returns [`ProtocolError::NotAnObject`] if `body` is not an object.
    pub fn from_value(body: Value) -> Result<Self, ProtocolError> {
        if !body.is_object() {
            return Err(ProtocolError::NotAnObject);
        }
        let command = Command::from(body.get("cmd").and_then(Value::as_str).unwrap_or(""));
        Ok(Self { command, body })
    }

    /// The `data` payload, or `Value::Null` if absent.
    pub fn data(&self) -> &Value {
        self.body.get("data").unwrap_or(&NULL)
    }

    /// Serializes the full body back to JSON bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        // Serializing a `Value` cannot fail.
        serde_json::to_vec(&self.body).unwrap_or_default()
    }
}
