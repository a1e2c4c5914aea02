//! Battle configuration and the two battle categories.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

// ---------------------------------------------------------------------------
// BattleConfig
// ---------------------------------------------------------------------------

/// Timings and thresholds for every battle session.
///
/// Passed to each [`BattleSession`](crate::BattleSession) at construction
/// instead of living in process-wide constants, so tests can shrink the
/// deadlines and a deployment can tune them from its config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BattleConfig {
    /// Seconds after battle start at which the early check runs (T1).
    pub early_check_secs: u64,

    /// Seconds after battle start at which the end check runs (T2).
    pub end_check_secs: u64,

    /// The early check fires only if the opposing side has strictly
    /// more votes than this while we have none.
    pub opponent_votes_threshold: u64,

    /// Fixed token sent along with every decision.
    pub token: String,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            early_check_secs: 170,
            end_check_secs: 290,
            opponent_votes_threshold: 100,
            token: "8096".to_string(),
        }
    }
}

impl BattleConfig {
    /// Fix out-of-order deadlines so the config is safe to use.
    ///
    /// Called automatically by [`BattleSession::start`](crate::BattleSession::start).
    /// The early check may coincide with the end check but never come
    /// after it: `early_check_secs` is clamped to `end_check_secs`.
    pub fn validated(mut self) -> Self {
        if self.early_check_secs > self.end_check_secs {
            warn!(
                early = self.early_check_secs,
                end = self.end_check_secs,
                "early check scheduled after end check, clamping"
            );
            self.early_check_secs = self.end_check_secs;
        }
        self
    }

    /// Delay from battle start to the early check.
    pub fn early_check(&self) -> Duration {
        Duration::from_secs(self.early_check_secs)
    }

    /// Delay from battle start to the end check.
    pub fn end_check(&self) -> Duration {
        Duration::from_secs(self.end_check_secs)
    }
}

// ---------------------------------------------------------------------------
// BattleCategory
// ---------------------------------------------------------------------------

/// The two kinds of battle the engine reasons about.
///
/// The server sends a numeric `battle_type`. Only `1` is the primary
/// category; every other value (including non-numeric ones) is folded
/// into `Secondary`. A missing `battle_type` means primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BattleCategory {
    /// `battle_type == 1`. Votes come from the two-sided process snapshot.
    Primary,
    /// Anything else. Votes come from the members snapshot.
    Secondary,
}

impl BattleCategory {
    /// Normalizes the raw `battle_type` field of a battle-start envelope.
    ///
    /// Only an absent field defaults to primary; an explicit `null` is
    /// just another value that is not 1. `1.0` counts as 1.
    pub fn from_raw(raw: Option<&Value>) -> Self {
        match raw {
            None => Self::Primary,
            Some(value) if value.as_f64() == Some(1.0) => Self::Primary,
            Some(_) => Self::Secondary,
        }
    }

    /// The normalized `battle_type` reported downstream (1 or 2).
    pub fn as_raw(self) -> u8 {
        match self {
            Self::Primary => 1,
            Self::Secondary => 2,
        }
    }
}

impl fmt::Display for BattleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
        }
    }
}
