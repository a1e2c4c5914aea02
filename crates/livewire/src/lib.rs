//! # Livewire
//!
//! Client for a live room's event stream.
//!
//! Livewire connects to the room, decodes the binary frame stream
//! (including zlib and brotli layers), and routes every event: battles go
//! to a timer-driven decision engine, comments and gifts to stateless
//! forwarders, and everything worth keeping is posted to an HTTP
//! collector.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use livewire::prelude::*;
//!
//! # async fn run() -> Result<(), LivewireError> {
//! let config = livewire::config::load_from_file("livewire.yaml")?;
//! let mut client = LiveClient::new(config)?;
//! client.run().await
//! # }
//! ```
//!
//! ## Layers
//!
//! ```text
//! livewire-transport  → bytes on a WebSocket
//! livewire-protocol   → frames, decompression, envelopes
//! livewire-router     → handler registry, battle slot
//! livewire-battle     → deadlines and the decision rule
//! livewire (this)     → config, client loop, HTTP collector
//! ```

mod client;
mod collector;
pub mod config;
mod error;

pub use client::{LiveClient, MessageStats};
pub use collector::HttpCollector;
pub use config::{CollectorSection, FeaturesSection, LivewireConfig, StreamSection};
pub use error::{ConfigError, LivewireError};

pub use livewire_battle as battle;
pub use livewire_protocol as protocol;
pub use livewire_router as router;
pub use livewire_transport as transport;

/// The types most applications need.
pub mod prelude {
    pub use crate::{ConfigError, HttpCollector, LiveClient, LivewireConfig, LivewireError};
    pub use livewire_battle::{BattleCategory, BattleConfig, Decision, ResultReporter};
    pub use livewire_protocol::{Command, Envelope, RoomId};
    pub use livewire_router::{Dispatch, EnvelopeRouter, Forwarder, Handler, HandlerError};
}
