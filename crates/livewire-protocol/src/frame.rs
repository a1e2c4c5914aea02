//! Frame header layout and the outbound frame encoder.
//!
//! Every unit on the wire starts with a big-endian header:
//!
//! ```text
//! offset  size  field
//!      0     4  total length (header + payload)
//!      4     2  header length
//!      6     2  protocol version
//!      8     4  operation code
//!     12     4  sequence (optional, covered by header length, unused)
//! ```
//!
//! The payload runs from `header length` to `total length`. A buffer can
//! hold any number of frames back to back, with no padding between them.

use std::fmt;

use serde::Serialize;

use crate::ProtocolError;

/// Smallest header that still carries all four required fields.
pub const MIN_HEADER_LEN: usize = 12;

/// Header length written by [`encode_frame`] (includes the sequence field).
pub const HEADER_LEN: usize = 16;

// ---------------------------------------------------------------------------
// ProtocolVersion
// ---------------------------------------------------------------------------

/// How a frame's payload is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// Version 0: plain JSON.
    Json,
    /// Version 1: plain payload, used by control frames (auth, heartbeat)
    /// but otherwise decoded exactly like version 0.
    Control,
    /// Version 2: zlib-compressed buffer of further frames.
    Zlib,
    /// Version 3: brotli-compressed buffer of further frames.
    Brotli,
    /// Anything else. Frames with an unknown version are skipped.
    Unknown(u16),
}

impl ProtocolVersion {
    /// Returns the raw wire value.
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Json => 0,
            Self::Control => 1,
            Self::Zlib => 2,
            Self::Brotli => 3,
            Self::Unknown(v) => v,
        }
    }

    /// Returns `true` for versions whose payload is itself a frame buffer.
    pub fn is_compressed(self) -> bool {
        matches!(self, Self::Zlib | Self::Brotli)
    }
}

impl From<u16> for ProtocolVersion {
    fn from(raw: u16) -> Self {
        match raw {
            0 => Self::Json,
            1 => Self::Control,
            2 => Self::Zlib,
            3 => Self::Brotli,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Control => write!(f, "control"),
            Self::Zlib => write!(f, "zlib"),
            Self::Brotli => write!(f, "brotli"),
            Self::Unknown(v) => write!(f, "version-{v}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// What a frame is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Client → server keep-alive (2).
    Heartbeat,
    /// Server → client keep-alive reply carrying the popularity gauge (3).
    HeartbeatReply,
    /// Server → client event envelope (5).
    Message,
    /// Client → server authentication (7).
    Auth,
    /// Server → client authentication result (8).
    AuthReply,
    /// Any other code. Ignored by the decoder.
    Other(u32),
}

impl Operation {
    /// Returns the raw wire value.
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Heartbeat => 2,
            Self::HeartbeatReply => 3,
            Self::Message => 5,
            Self::Auth => 7,
            Self::AuthReply => 8,
            Self::Other(op) => op,
        }
    }
}

impl From<u32> for Operation {
    fn from(raw: u32) -> Self {
        match raw {
            2 => Self::Heartbeat,
            3 => Self::HeartbeatReply,
            5 => Self::Message,
            7 => Self::Auth,
            8 => Self::AuthReply,
            other => Self::Other(other),
        }
    }
}

// ---------------------------------------------------------------------------
// FrameHeader
// ---------------------------------------------------------------------------

/// The parsed fixed part of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Length of the whole frame, header included.
    pub total_len: usize,
    /// Length of the header; the payload starts here.
    pub header_len: usize,
    pub version: ProtocolVersion,
    pub operation: Operation,
}

impl FrameHeader {
    /// Parses the header of the frame starting at `offset` in `buf`.
    ///
    /// Succeeds only if the whole frame (not just the header) fits in the
    /// buffer, so the caller can slice the payload without further checks.
    ///
    /// # Errors
    /// Returns [`ProtocolError::MalformedFrame`] if fewer than 12 bytes
    /// remain, if `header_len < 12`, if `total_len < header_len`, or if
    /// `total_len` runs past the end of the buffer.
    pub fn parse(buf: &[u8], offset: usize) -> Result<Self, ProtocolError> {
        let remaining = buf.len().saturating_sub(offset);
        let malformed = |reason: String| ProtocolError::MalformedFrame {
            offset,
            reason,
        };

        if remaining < MIN_HEADER_LEN {
            return Err(malformed(format!(
                "header needs {MIN_HEADER_LEN} bytes, {remaining} remain"
            )));
        }

        let h = &buf[offset..offset + MIN_HEADER_LEN];
        let total_len = u32::from_be_bytes([h[0], h[1], h[2], h[3]]) as usize;
        let header_len = u16::from_be_bytes([h[4], h[5]]) as usize;
        let version = u16::from_be_bytes([h[6], h[7]]);
        let operation = u32::from_be_bytes([h[8], h[9], h[10], h[11]]);

        // These two checks also guarantee forward progress: every
        // accepted frame advances the offset by at least 12 bytes.
        if header_len < MIN_HEADER_LEN {
            return Err(malformed(format!(
                "header length {header_len} below minimum {MIN_HEADER_LEN}"
            )));
        }
        if total_len < header_len {
            return Err(malformed(format!(
                "total length {total_len} shorter than header length {header_len}"
            )));
        }
        if total_len > remaining {
            return Err(malformed(format!(
                "total length {total_len} exceeds remaining {remaining} bytes"
            )));
        }

        Ok(Self {
            total_len,
            header_len,
            version: ProtocolVersion::from(version),
            operation: Operation::from(operation),
        })
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Encodes one frame with a 16-byte header (sequence field = 1).
///
/// The length field is 32 bits; bodies near 4 GiB are not supported.
pub fn encode_frame(
    version: ProtocolVersion,
    operation: Operation,
    body: &[u8],
) -> Vec<u8> {
    let total_len = (HEADER_LEN + body.len()) as u32;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&total_len.to_be_bytes());
    out.extend_from_slice(&(HEADER_LEN as u16).to_be_bytes());
    out.extend_from_slice(&version.as_u16().to_be_bytes());
    out.extend_from_slice(&operation.as_u32().to_be_bytes());
    out.extend_from_slice(&1u32.to_be_bytes());
    out.extend_from_slice(body);
    out
}

/// Body of the authentication frame sent right after connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthBody {
    /// Logged-in user id, 0 for anonymous.
    pub uid: u64,
    pub roomid: u64,
    /// Highest protocol version we accept back (3 = brotli).
    pub protover: u16,
    pub platform: String,
    #[serde(rename = "type")]
    pub kind: u8,
    /// Access token for this room's stream.
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buvid: Option<String>,
}

impl AuthBody {
    /// Builds the body the web client sends.
    pub fn new(uid: u64, room_id: u64, token: impl Into<String>) -> Self {
        Self {
            uid,
            roomid: room_id,
            protover: 3,
            platform: "web".to_string(),
            kind: 2,
            key: token.into(),
            buvid: None,
        }
    }
}

/// Encodes the authentication frame (version 1, operation 7).
///
/// # Errors
/// Returns [`ProtocolError::Encode`] if the body fails to serialize.
pub fn auth_packet(body: &AuthBody) -> Result<Vec<u8>, ProtocolError> {
    let json = serde_json::to_vec(body).map_err(ProtocolError::Encode)?;
    Ok(encode_frame(ProtocolVersion::Control, Operation::Auth, &json))
}

/// Encodes the empty heartbeat frame (version 1, operation 2).
pub fn heartbeat_packet() -> Vec<u8> {
    encode_frame(ProtocolVersion::Control, Operation::Heartbeat, &[])
}
