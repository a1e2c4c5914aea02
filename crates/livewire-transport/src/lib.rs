//! Stream plumbing for Livewire.
//!
//! A live room pushes its events over one long-lived connection. This
//! crate hides what that connection is behind [`Connection`]: callers send
//! whole frames out and get whole binary messages back, and learn that the
//! room went away when [`Connection::recv`] yields `None`.
//!
//! # Feature Flags
//!
//! - `websocket` (default): [`WebSocketConnection`], a `ws://`/`wss://`
//!   client built on `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnection;

use std::fmt;

/// Identifies one connection in logs.
///
/// Ids are process-unique but carry no meaning beyond that; a reconnect
/// to the same room gets a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// One open stream to the live-event server.
///
/// Every method takes `&self`: the client parks in [`recv`](Self::recv)
/// while the heartbeat timer still needs to [`send`](Self::send), so an
/// implementation must allow both at once.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Writes one outbound packet (auth, heartbeat) as a single message.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Waits for the next inbound message.
    ///
    /// A message may hold several frames back to back. `Ok(None)` means
    /// the server ended the stream cleanly.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Ends the stream from our side. Closing an already closed stream is
    /// not an error.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}
