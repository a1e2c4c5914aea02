//! Battle decision engine for Livewire.
//!
//! When the room enters a battle, the router starts a [`BattleSession`].
//! The session:
//!
//! 1. **Collects** snapshots of the vote counters as the server sends
//!    them ([`BattleSession::update`]).
//! 2. **Checks** them at two deadlines: early (T1) and at the end (T2).
//! 3. **Decides** at most once, handing a [`Decision`] to a
//!    [`ResultReporter`].
//!
//! # How it fits in the stack
//!
//! ```text
//! Router (above)         ← owns the current session, feeds it envelopes
//!     ↕
//! Battle (this crate)    ← timers, snapshots, the decision rule
//!     ↕
//! Protocol (below)       ← provides Envelope, Command, RoomId
//! ```

mod config;
mod decision;
mod error;
mod session;
mod snapshot;

pub use config::{BattleCategory, BattleConfig};
pub use decision::{Decision, ResultReporter};
pub use error::BattleError;
pub use session::{BattleSession, BattleState};
pub use snapshot::{
    BattleSide, MembersSnapshot, Participant, ProcessSnapshot, Recorded, Snapshot, Votes,
};
