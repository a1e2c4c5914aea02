//! The frame decoder: raw bytes in, events out.
//!
//! [`FrameDecoder`] walks a buffer frame by frame and yields one item per
//! interesting frame. Compressed frames (versions 2 and 3) contain a whole
//! new buffer of frames; instead of recursing, the decoder keeps a stack
//! of buffers and pushes the inflated one on top. When the top buffer is
//! exhausted it pops back to where it left off in the enclosing one, so
//! events always come out in wire order.
//!
//! ```text
//! outer buffer:  [frame v0][frame v2 ─────────────][frame v0]
//!                            │ inflate
//!                            ▼
//! inner buffer:         [frame v0][frame v0][frame v0]
//!
//! yield order:   outer#1, inner#1, inner#2, inner#3, outer#3
//! ```
//!
//! # Failure behavior
//!
//! A structural error (bad header, corrupt compression) ends decoding of
//! the buffer it happened in: the decoder yields the error, drops that
//! buffer, and resumes in the enclosing buffer if there is one. A bad
//! JSON payload only skips its own frame. Items yielded before an error
//! stay valid either way.

use std::borrow::Cow;
use std::io::Read;
use std::iter::FusedIterator;

use crate::frame::{FrameHeader, Operation, ProtocolVersion};
use crate::{Envelope, ProtocolError};

/// How many compression layers may be nested inside each other.
pub const MAX_NESTING: usize = 8;

/// Largest buffer one compression layer may inflate to.
pub const MAX_INFLATED: usize = 16 * 1024 * 1024;

/// One decoded item.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// An event envelope (operation 5).
    Event(Envelope),
    /// The popularity gauge from a heartbeat reply (operation 3).
    Popularity(u32),
}

/// A buffer being decoded plus how far into it we are.
struct Level<'a> {
    buf: Cow<'a, [u8]>,
    offset: usize,
}

/// Lazy decoder over one inbound buffer.
///
/// Finite and not restartable: once it returns `None` it keeps returning
/// `None` (it implements [`FusedIterator`]).
///
/// ## Example
///
/// ```rust
/// use livewire_protocol::{encode_frame, Frame, FrameDecoder, Operation, ProtocolVersion};
///
/// let buf = encode_frame(
///     ProtocolVersion::Json,
///     Operation::Message,
///     br#"{"cmd":"SEND_GIFT","data":{}}"#,
/// );
///
/// let frames: Vec<Frame> = FrameDecoder::new(&buf).filter_map(Result::ok).collect();
/// assert_eq!(frames.len(), 1);
/// ```
pub struct FrameDecoder<'a> {
    stack: Vec<Level<'a>>,
}

impl<'a> FrameDecoder<'a> {
    /// Starts decoding `buf` from offset 0.
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            stack: vec![Level {
                buf: Cow::Borrowed(buf),
                offset: 0,
            }],
        }
    }
}

impl Iterator for FrameDecoder<'_> {
    type Item = Result<Frame, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let depth = self.stack.len();
            let level = self.stack.last_mut()?;

            if level.offset >= level.buf.len() {
                self.stack.pop();
                continue;
            }

            let offset = level.offset;
            let header = match FrameHeader::parse(&level.buf, offset) {
                Ok(header) => header,
                Err(e) => {
                    self.stack.pop();
                    return Some(Err(e));
                }
            };
            level.offset += header.total_len;
            let payload =
                &level.buf[offset + header.header_len..offset + header.total_len];

            match header.version {
                ProtocolVersion::Zlib | ProtocolVersion::Brotli => {
                    // `depth` counts the top-level buffer too.
                    if depth > MAX_NESTING {
                        self.stack.pop();
                        return Some(Err(ProtocolError::NestingTooDeep(MAX_NESTING)));
                    }
                    match decompress(header.version, payload) {
                        Ok(inner) => self.stack.push(Level {
                            buf: Cow::Owned(inner),
                            offset: 0,
                        }),
                        Err(e) => {
                            self.stack.pop();
                            return Some(Err(e));
                        }
                    }
                }
                ProtocolVersion::Json | ProtocolVersion::Control => {
                    match header.operation {
                        Operation::Message => {
                            return Some(Envelope::from_slice(payload).map(Frame::Event));
                        }
                        Operation::HeartbeatReply => {
                            return Some(Ok(Frame::Popularity(read_gauge(payload))));
                        }
                        _ => {}
                    }
                }
                ProtocolVersion::Unknown(_) => {}
            }
        }
    }
}

impl FusedIterator for FrameDecoder<'_> {}

/// Decodes a whole buffer eagerly, separating items from errors.
///
/// Convenient when the caller only wants to log failures.
pub fn decode_all(buf: &[u8]) -> (Vec<Frame>, Vec<ProtocolError>) {
    let mut frames = Vec::new();
    let mut errors = Vec::new();
    for item in FrameDecoder::new(buf) {
        match item {
            Ok(frame) => frames.push(frame),
            Err(e) => errors.push(e),
        }
    }
    (frames, errors)
}

/// Inflates a compressed payload into a new frame buffer, refusing to
/// produce more than [`MAX_INFLATED`] bytes.
fn decompress(
    version: ProtocolVersion,
    payload: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    // One byte past the cap tells "exactly at the cap" from "over it".
    let limit = MAX_INFLATED as u64 + 1;
    let mut out = Vec::new();
    let result = match version {
        ProtocolVersion::Zlib => flate2::read::ZlibDecoder::new(payload)
            .take(limit)
            .read_to_end(&mut out),
        _ => brotli::Decompressor::new(payload, 4096)
            .take(limit)
            .read_to_end(&mut out),
    };
    let source = match result {
        Ok(_) if out.len() > MAX_INFLATED => std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("inflated payload exceeds {MAX_INFLATED} bytes"),
        ),
        Ok(_) => return Ok(out),
        Err(e) => e,
    };
    Err(ProtocolError::Decompress { version, source })
}

/// Reads the big-endian gauge value of a heartbeat reply.
///
/// The server always sends 4 bytes; shorter payloads are read as a
/// shorter big-endian number rather than rejected.
fn read_gauge(payload: &[u8]) -> u32 {
    payload
        .iter()
        .take(4)
        .fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}
