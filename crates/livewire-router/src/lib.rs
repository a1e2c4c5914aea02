//! Envelope routing for Livewire.
//!
//! The router is the single place that decides what happens to a decoded
//! [`Envelope`](livewire_protocol::Envelope):
//!
//! - **Battle envelopes** start, feed, and end the current
//!   [`BattleSession`](livewire_battle::BattleSession).
//! - **Everything else** goes to a [`Handler`] registered for its
//!   command, either persistent (built once) or one-shot (built per
//!   envelope from a factory).
//!
//! The stock handlers ([`DanmakuHandler`], [`GiftHandler`],
//! [`LiveRoomListHandler`]) extract a few fields and hand them to a
//! [`Forwarder`]. They don't know how delivery works; the application
//! plugs in an HTTP client.
//!
//! # How it fits in the stack
//!
//! ```text
//! Client loop (above)    ← decodes frames, calls route() per envelope
//!     ↕
//! Router (this crate)    ← handler registry, battle slot
//!     ↕
//! Battle / Protocol      ← BattleSession, Envelope, Command
//! ```

mod error;
mod forward;
mod handlers;
mod router;

pub use error::HandlerError;
pub use forward::{Endpoints, ForwardContext, Forwarder, KeywordFilter};
pub use handlers::{DanmakuHandler, GiftHandler, LiveRoomListHandler};
pub use router::{Dispatch, EnvelopeRouter, Handler, HandlerFactory};
