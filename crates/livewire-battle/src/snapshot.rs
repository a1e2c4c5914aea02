//! Battle snapshots and vote extraction.
//!
//! The server describes an ongoing battle with two kinds of update:
//!
//! - a **process** snapshot (`PK_BATTLE_PROCESS_NEW`) with exactly two
//!   sides, `init_info` and `match_info`;
//! - a **members** snapshot (`PK_INFO`) with a `members` list that may
//!   hold more than two participants.
//!
//! Which one matters depends on the [`BattleCategory`]. Both are kept as
//! typed structs for the vote arithmetic *and* as the raw JSON, because
//! the decision reported downstream carries the snapshot verbatim.

use livewire_protocol::RoomId;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::BattleCategory;

/// Own and opposing vote counts at one moment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Votes {
    pub own: u64,
    pub opposing: u64,
}

// ---------------------------------------------------------------------------
// Process snapshot (primary category)
// ---------------------------------------------------------------------------

/// One side of a two-sided process snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BattleSide {
    #[serde(default)]
    pub room_id: RoomId,
    #[serde(default)]
    pub votes: u64,
}

/// `data` of a `PK_BATTLE_PROCESS_NEW` envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProcessSnapshot {
    #[serde(default)]
    pub init_info: BattleSide,
    #[serde(default)]
    pub match_info: BattleSide,
}

impl ProcessSnapshot {
    /// Splits the two sides into ours and theirs.
    ///
    /// We are the `init_info` side if its room matches; otherwise we
    /// assume we are `match_info`, even if that room doesn't match either.
    pub fn votes_for(&self, room_id: RoomId) -> Votes {
        let (own, other) = if self.init_info.room_id == room_id {
            (&self.init_info, &self.match_info)
        } else {
            (&self.match_info, &self.init_info)
        };
        Votes {
            own: own.votes,
            opposing: other.votes,
        }
    }
}

// ---------------------------------------------------------------------------
// Members snapshot (secondary category)
// ---------------------------------------------------------------------------

/// One entry of a members snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Participant {
    #[serde(default)]
    pub room_id: RoomId,
    #[serde(default)]
    pub votes: u64,
    #[serde(default)]
    pub golds: u64,
}

/// `data` of a `PK_INFO` envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MembersSnapshot {
    #[serde(default)]
    pub members: Vec<Participant>,
}

impl MembersSnapshot {
    /// Our votes come from the member whose room matches, the opposing
    /// count from the *last* other member in list order. Both sides must
    /// be present; a list missing either one counts as no votes at all.
    pub fn votes_for(&self, room_id: RoomId) -> Votes {
        let own = self.members.iter().find(|m| m.room_id == room_id);
        let opponent = self.members.iter().rev().find(|m| m.room_id != room_id);
        match (own, opponent) {
            (Some(own), Some(opponent)) => Votes {
                own: own.votes,
                opposing: opponent.votes,
            },
            _ => Votes::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A parsed update plus the JSON it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded<T> {
    pub parsed: T,
    pub raw: Value,
}

/// Everything a session has learned about the battle so far.
///
/// Each kind of update replaces the previous one of the same kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub process: Option<Recorded<ProcessSnapshot>>,
    pub members: Option<Recorded<MembersSnapshot>>,
}

impl Snapshot {
    /// Vote counts the way `category` reads them.
    ///
    /// Without the snapshot kind the category needs, both counts are 0.
    pub fn votes(&self, category: BattleCategory, room_id: RoomId) -> Votes {
        match category {
            BattleCategory::Primary => self
                .process
                .as_ref()
                .map(|p| p.parsed.votes_for(room_id))
                .unwrap_or_default(),
            BattleCategory::Secondary => self
                .members
                .as_ref()
                .map(|m| m.parsed.votes_for(room_id))
                .unwrap_or_default(),
        }
    }

    /// The raw snapshot reported with a decision: the one `category`
    /// reads, or an empty object if it never arrived.
    pub fn decision_data(&self, category: BattleCategory) -> Value {
        let raw = match category {
            BattleCategory::Primary => self.process.as_ref().map(|p| &p.raw),
            BattleCategory::Secondary => self.members.as_ref().map(|m| &m.raw),
        };
        raw.cloned().unwrap_or_else(|| Value::Object(Map::new()))
    }
}
