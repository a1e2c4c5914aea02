//! Wire protocol for Livewire.
//!
//! This crate defines the "language" the live-event server speaks:
//!
//! - **Frames** ([`FrameHeader`], [`ProtocolVersion`], [`Operation`]):
//!   the length-prefixed binary units on the wire, and the encoder for
//!   the few frames we send ourselves ([`auth_packet`], [`heartbeat_packet`]).
//! - **Decoder** ([`FrameDecoder`]): turns an inbound buffer into a lazy
//!   sequence of [`Frame`]s, unwrapping zlib and brotli layers on the way.
//! - **Envelopes** ([`Envelope`], [`Command`]): the JSON events inside.
//! - **Errors** ([`ProtocolError`]): what can go wrong in all of the above.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the router
//! (handlers). It doesn't know about connections or battles: it is a
//! pure transformation with no side effects.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Router (handlers, battle)
//! ```

mod decoder;
mod envelope;
mod error;
mod frame;

pub use decoder::{decode_all, Frame, FrameDecoder, MAX_INFLATED, MAX_NESTING};
pub use envelope::{Command, Envelope, RoomId};
pub use error::ProtocolError;
pub use frame::{
    auth_packet, encode_frame, heartbeat_packet, AuthBody, FrameHeader,
    Operation, ProtocolVersion, HEADER_LEN, MIN_HEADER_LEN,
};
