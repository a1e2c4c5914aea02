//! Decisions and where they go.

use livewire_protocol::RoomId;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::warn;

use crate::BattleCategory;

/// The single result a battle session may produce.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub category: BattleCategory,
    pub room_id: RoomId,
    /// The latest snapshot, verbatim, or `{}` if none arrived.
    pub data: Value,
    pub token: String,
}

impl Decision {
    /// The JSON body posted to the result endpoint.
    pub fn to_payload(&self) -> Value {
        json!({
            "room_id": self.room_id,
            "battle_type": self.category.as_raw(),
            "pk_data": self.data,
            "token": self.token,
        })
    }
}

/// Receives decisions from battle sessions.
///
/// `report` is called with the session's lock held, so implementations
/// must return promptly: hand the decision to a channel or spawn the
/// delivery, never wait on the network.
pub trait ResultReporter: Send + Sync + 'static {
    fn report(&self, decision: Decision);
}

/// A channel is a reporter: the receiving side decides what to do.
impl ResultReporter for mpsc::UnboundedSender<Decision> {
    fn report(&self, decision: Decision) {
        if self.send(decision).is_err() {
            warn!("decision receiver dropped, decision lost");
        }
    }
}
