//! The battle session: two deadlines, one snapshot, at most one decision.
//!
//! A [`BattleSession`] is created when a battle starts and lives until it
//! either produces a [`Decision`] or is told the battle ended. In between
//! it just remembers the latest snapshot the server sent.
//!
//! ```text
//!            early check (T1)            end check (T2)
//!   Active ──────────────────→ Triggered ←──────────── Active
//!     │        own == 0 &&                   own == 0
//!     │        opposing > threshold
//!     └──(terminate)──→ Closed
//! ```
//!
//! # Concurrency
//!
//! Each deadline is its own tokio task sleeping until `start + T`. The
//! tasks and the inbound loop (calling [`update`](BattleSession::update)
//! and [`terminate`](BattleSession::terminate)) all go through one
//! `std::sync::Mutex`. The state check, the state change, and handing the
//! decision to the reporter happen under that lock, so two checks racing
//! each other can never both fire. The lock is never held across an
//! `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use livewire_protocol::{Command, Envelope, RoomId};
use serde::de::DeserializeOwned;
use tokio::task::AbortHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info};

use crate::snapshot::{MembersSnapshot, ProcessSnapshot, Recorded, Snapshot, Votes};
use crate::{BattleCategory, BattleConfig, BattleError, Decision, ResultReporter};

// ---------------------------------------------------------------------------
// BattleState
// ---------------------------------------------------------------------------

/// Where a session is in its lifecycle.
///
/// `Triggered` and `Closed` are terminal: nothing moves a session out
/// of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleState {
    /// Waiting for a deadline or an end signal.
    Active,
    /// A check fired and the decision was reported.
    Triggered,
    /// The battle ended before any check fired.
    Closed,
}

impl BattleState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// Which deadline is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Check {
    Early,
    End,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct Inner {
    state: BattleState,
    snapshot: Snapshot,
    timers: Vec<AbortHandle>,
}

impl Inner {
    fn cancel_timers(&mut self) {
        // Aborting a finished task (or the one currently running this
        // code, which has no `.await` left) does nothing.
        for timer in self.timers.drain(..) {
            timer.abort();
        }
    }
}

/// What the timer tasks and the session handle share.
struct Shared {
    room_id: RoomId,
    category: BattleCategory,
    threshold: u64,
    token: String,
    reporter: Arc<dyn ResultReporter>,
    inner: Mutex<Inner>,
}

impl Shared {
    /// A panic while holding the lock can't leave `Inner` half-updated
    /// in a way that matters, so a poisoned lock is simply reused.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_check(&self, check: Check) {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            debug!(room = %self.room_id, ?check, state = ?inner.state, "check skipped, session already terminal");
            return;
        }

        let votes = inner.snapshot.votes(self.category, self.room_id);
        let fire = match check {
            Check::Early => votes.own == 0 && votes.opposing > self.threshold,
            Check::End => votes.own == 0,
        };

        if !fire {
            info!(
                room = %self.room_id,
                ?check,
                own = votes.own,
                opposing = votes.opposing,
                "check passed, no decision"
            );
            return;
        }

        inner.state = BattleState::Triggered;
        inner.cancel_timers();

        let decision = Decision {
            category: self.category,
            room_id: self.room_id,
            data: inner.snapshot.decision_data(self.category),
            token: self.token.clone(),
        };
        info!(
            room = %self.room_id,
            category = %self.category,
            ?check,
            own = votes.own,
            opposing = votes.opposing,
            "decision triggered"
        );
        self.reporter.report(decision);
    }
}

// ---------------------------------------------------------------------------
// BattleSession
// ---------------------------------------------------------------------------

/// One battle, from start signal to terminal outcome.
///
/// Must be created inside a tokio runtime: construction spawns the two
/// deadline tasks. Dropping the session cancels them.
pub struct BattleSession {
    shared: Arc<Shared>,
}

impl BattleSession {
    /// Starts a session and its two deadlines, measured from now.
    pub fn start(
        room_id: RoomId,
        category: BattleCategory,
        config: BattleConfig,
        reporter: Arc<dyn ResultReporter>,
    ) -> Self {
        let config = config.validated();
        let shared = Arc::new(Shared {
            room_id,
            category,
            threshold: config.opponent_votes_threshold,
            token: config.token.clone(),
            reporter,
            inner: Mutex::new(Inner {
                state: BattleState::Active,
                snapshot: Snapshot::default(),
                timers: Vec::with_capacity(2),
            }),
        });

        let started = Instant::now();
        let timers = vec![
            spawn_check(&shared, started + config.early_check(), Check::Early),
            spawn_check(&shared, started + config.end_check(), Check::End),
        ];
        shared.lock().timers = timers;

        info!(
            room = %room_id,
            %category,
            early_secs = config.early_check_secs,
            end_secs = config.end_check_secs,
            "battle session started"
        );

        Self { shared }
    }

    pub fn room_id(&self) -> RoomId {
        self.shared.room_id
    }

    pub fn category(&self) -> BattleCategory {
        self.shared.category
    }

    pub fn state(&self) -> BattleState {
        self.shared.lock().state
    }

    /// A copy of what the session currently knows.
    pub fn snapshot(&self) -> Snapshot {
        self.shared.lock().snapshot.clone()
    }

    /// The votes the next check would see.
    pub fn votes(&self) -> Votes {
        self.shared
            .lock()
            .snapshot
            .votes(self.shared.category, self.shared.room_id)
    }

    /// Replaces the latest snapshot of the kind `envelope` carries.
    ///
    /// Never compares or reports anything. Once the session is terminal
    /// this is a no-op and returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// - [`BattleError::UnexpectedCommand`] if `envelope` is not a
    ///   battle update.
    /// - [`BattleError::MalformedUpdate`] if its `data` has the wrong
    ///   shape; the previous snapshot is kept.
    pub fn update(&self, envelope: &Envelope) -> Result<(), BattleError> {
        let mut inner = self.shared.lock();
        if inner.state.is_terminal() {
            debug!(room = %self.shared.room_id, command = %envelope.command, "update after terminal state ignored");
            return Ok(());
        }

        match &envelope.command {
            Command::BattleProcess => {
                inner.snapshot.process = Some(record::<ProcessSnapshot>(envelope)?);
            }
            Command::BattleInfo => {
                inner.snapshot.members = Some(record::<MembersSnapshot>(envelope)?);
            }
            other => return Err(BattleError::UnexpectedCommand(other.to_string())),
        }

        let votes = inner.snapshot.votes(self.shared.category, self.shared.room_id);
        debug!(
            room = %self.shared.room_id,
            command = %envelope.command,
            own = votes.own,
            opposing = votes.opposing,
            "battle snapshot updated"
        );
        Ok(())
    }

    /// Ends the session without a decision, unless one already fired.
    ///
    /// Cancels both deadlines. Safe to call any number of times.
    pub fn terminate(&self) -> BattleState {
        let mut inner = self.shared.lock();
        inner.cancel_timers();
        if inner.state == BattleState::Active {
            inner.state = BattleState::Closed;
            info!(room = %self.shared.room_id, "battle session closed");
        }
        inner.state
    }
}

impl Drop for BattleSession {
    fn drop(&mut self) {
        self.shared.lock().cancel_timers();
    }
}

impl std::fmt::Debug for BattleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BattleSession")
            .field("room_id", &self.shared.room_id)
            .field("category", &self.shared.category)
            .field("state", &self.state())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn spawn_check(shared: &Arc<Shared>, deadline: Instant, check: Check) -> AbortHandle {
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        time::sleep_until(deadline).await;
        shared.run_check(check);
    })
    .abort_handle()
}

fn record<T: DeserializeOwned>(envelope: &Envelope) -> Result<Recorded<T>, BattleError> {
    let raw = envelope.data().clone();
    let parsed = T::deserialize(&raw).map_err(|source| BattleError::MalformedUpdate {
        command: envelope.command.to_string(),
        source,
    })?;
    Ok(Recorded { parsed, raw })
}
