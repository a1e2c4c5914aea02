//! The envelope router: one envelope in, at most one handler invoked.
//!
//! Routing rules, checked in order:
//!
//! 1. Battle update (`PK_INFO`, `PK_BATTLE_PROCESS_NEW`) → the current
//!    battle session, if there is one. Otherwise dropped.
//! 2. Battle start → terminate the current session (if any), then start
//!    a new one.
//! 3. Battle end → terminate the current session and clear the slot.
//! 4. A persistent handler registered for the command, else a one-shot
//!    handler built fresh from its factory.
//! 5. Anything else is dropped.
//!
//! A failing handler never stops routing: the error is logged and
//! returned in [`Dispatch::Failed`] for whoever is interested.

use std::collections::HashMap;
use std::sync::Arc;

use livewire_battle::{BattleCategory, BattleConfig, BattleSession, BattleState, ResultReporter};
use livewire_protocol::{Command, Envelope, RoomId};
use tracing::{debug, info, trace, warn};

use crate::HandlerError;

/// Handles one kind of envelope.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, envelope: &Envelope) -> Result<(), HandlerError>;
}

/// Builds a fresh handler for every envelope of its command.
pub type HandlerFactory = Box<dyn Fn() -> Box<dyn Handler> + Send + Sync>;

/// What [`EnvelopeRouter::route`] did with an envelope.
#[derive(Debug)]
pub enum Dispatch {
    /// Stored in the current battle session.
    BattleUpdated,
    /// A new battle session was started.
    BattleStarted {
        category: BattleCategory,
        /// A previous session was still in the slot and got terminated.
        replaced: bool,
    },
    /// The current session was terminated; `None` if there was none.
    BattleEnded { state: Option<BattleState> },
    /// A persistent or one-shot handler ran successfully.
    Handled,
    /// A handler or the battle session rejected the envelope.
    Failed(HandlerError),
    /// Nobody wanted it.
    Dropped,
}

/// Maps command tags to handlers and owns the current battle session.
///
/// Driven from a single task (the inbound loop), so routing takes
/// `&mut self`. Battle timers run elsewhere but only ever touch the
/// session they belong to, never the slot.
pub struct EnvelopeRouter {
    room_id: RoomId,
    battle_config: BattleConfig,
    reporter: Arc<dyn ResultReporter>,
    persistent: HashMap<Command, Box<dyn Handler>>,
    one_shot: HashMap<Command, HandlerFactory>,
    battle: Option<BattleSession>,
}

impl EnvelopeRouter {
    /// Creates a router with no handlers and no battle.
    pub fn new(
        room_id: RoomId,
        battle_config: BattleConfig,
        reporter: Arc<dyn ResultReporter>,
    ) -> Self {
        Self {
            room_id,
            battle_config: battle_config.validated(),
            reporter,
            persistent: HashMap::new(),
            one_shot: HashMap::new(),
            battle: None,
        }
    }

    /// Builds a handler now and keeps it for the process lifetime.
    ///
    /// Replaces any handler (persistent or one-shot) already registered
    /// for `command`.
    pub fn register_persistent<H, F>(&mut self, command: Command, factory: F)
    where
        H: Handler,
        F: FnOnce() -> H,
    {
        debug!(%command, "persistent handler registered");
        self.one_shot.remove(&command);
        self.persistent.insert(command, Box::new(factory()));
    }

    /// Registers a factory; each matching envelope gets a new handler.
    ///
    /// Ignored for commands that already have a persistent handler,
    /// since those win at routing time anyway.
    pub fn register_one_shot<H, F>(&mut self, command: Command, factory: F)
    where
        H: Handler,
        F: Fn() -> H + Send + Sync + 'static,
    {
        debug!(%command, "one-shot handler registered");
        self.one_shot
            .insert(command, Box::new(move || Box::new(factory()) as Box<dyn Handler>));
    }

    /// The room this router works for.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// The current battle session, if any.
    pub fn battle(&self) -> Option<&BattleSession> {
        self.battle.as_ref()
    }

    /// Dispatches one envelope.
    pub fn route(&mut self, envelope: &Envelope) -> Dispatch {
        trace!(command = %envelope.command, "routing envelope");

        // Rule 1: battle updates go to the current session.
        if envelope.command.is_battle_update() {
            return match &self.battle {
                Some(session) => match session.update(envelope) {
                    Ok(()) => Dispatch::BattleUpdated,
                    Err(e) => self.failed(envelope, e.into()),
                },
                None => {
                    trace!(command = %envelope.command, "battle update without session dropped");
                    Dispatch::Dropped
                }
            };
        }

        match &envelope.command {
            // Rule 2
            Command::BattleStart => self.start_battle(envelope),
            // Rule 3
            Command::BattleEnd => {
                let state = self.battle.take().map(|session| session.terminate());
                info!(room = %self.room_id, ?state, "battle ended");
                Dispatch::BattleEnded { state }
            }
            // Rules 4 and 5
            command => {
                let result = if let Some(handler) = self.persistent.get(command) {
                    handler.handle(envelope)
                } else if let Some(factory) = self.one_shot.get(command) {
                    factory().handle(envelope)
                } else {
                    trace!(%command, "no handler, dropped");
                    return Dispatch::Dropped;
                };
                match result {
                    Ok(()) => Dispatch::Handled,
                    Err(e) => self.failed(envelope, e),
                }
            }
        }
    }

    fn start_battle(&mut self, envelope: &Envelope) -> Dispatch {
        let raw = envelope.data().get("battle_type");
        let category = BattleCategory::from_raw(raw);
        info!(
            room = %self.room_id,
            raw_battle_type = ?raw,
            %category,
            "battle start received"
        );

        let replaced = match self.battle.take() {
            Some(old) => {
                let state = old.terminate();
                debug!(room = %self.room_id, ?state, "previous battle session terminated");
                true
            }
            None => false,
        };

        self.battle = Some(BattleSession::start(
            self.room_id,
            category,
            self.battle_config.clone(),
            Arc::clone(&self.reporter),
        ));
        Dispatch::BattleStarted { category, replaced }
    }

    fn failed(&self, envelope: &Envelope, error: HandlerError) -> Dispatch {
        warn!(room = %self.room_id, command = %envelope.command, error = %error, "handler failed");
        Dispatch::Failed(error)
    }
}

impl std::fmt::Debug for EnvelopeRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeRouter")
            .field("room_id", &self.room_id)
            .field("persistent", &self.persistent.keys().collect::<Vec<_>>())
            .field("one_shot", &self.one_shot.keys().collect::<Vec<_>>())
            .field("battle", &self.battle)
            .finish()
    }
}
