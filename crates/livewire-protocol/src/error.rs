//! Error types for the protocol layer.
//!
//! Each crate in Livewire defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is in the bytes the server sent
//! (or in turning our own packets into bytes), not in the network or in
//! a handler.

use crate::frame::ProtocolVersion;

/// Errors that can occur while decoding or encoding frames.
///
/// Decoding errors fall into two groups, and the decoder treats them
/// differently (see [`ProtocolError::aborts_buffer`]):
///
/// - **Buffer-level**: the frame structure itself is broken
///   (`MalformedFrame`, `Decompress`, `NestingTooDeep`). The remaining
///   bytes of that buffer can't be trusted, so decoding of it stops.
/// - **Frame-level**: the frame is intact but its JSON payload is not
///   (`Envelope`, `NotAnObject`). Only that one frame is skipped.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The header is truncated or describes lengths that don't fit the
    /// buffer.
    #[error("malformed frame at offset {offset}: {reason}")]
    MalformedFrame { offset: usize, reason: String },

    /// A compressed payload could not be inflated.
    #[error("{version} payload failed to decompress: {source}")]
    Decompress {
        version: ProtocolVersion,
        #[source]
        source: std::io::Error,
    },

    /// Compressed frames wrapped inside compressed frames, too many times.
    #[error("compression nested deeper than {0} layers")]
    NestingTooDeep(usize),

    /// The payload of an event frame is not valid UTF-8 JSON.
    #[error("envelope parse failed: {0}")]
    Envelope(#[source] serde_json::Error),

    /// The payload is valid JSON but not a JSON object.
    #[error("envelope is not a JSON object")]
    NotAnObject,

    /// Serializing an outbound packet body failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ProtocolError {
    /// Returns `true` if this error ends decoding of the buffer it
    /// occurred in, `false` if only the offending frame is skipped.
    pub fn aborts_buffer(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame { .. }
                | Self::Decompress { .. }
                | Self::NestingTooDeep(_)
        )
    }
}
