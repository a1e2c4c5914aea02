//! Error types for the routing layer.

use livewire_battle::BattleError;

/// Errors a handler can report for one envelope.
///
/// The router catches every one of these, logs it, and moves on to the
/// next envelope.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The envelope lacks a field the handler needs, or it has the
    /// wrong type.
    #[error("{command}: missing or invalid `{field}`")]
    MissingField { command: String, field: &'static str },

    /// The forwarder couldn't accept the payload.
    #[error("forwarding to {endpoint} failed: {reason}")]
    Forward { endpoint: String, reason: String },

    /// The current battle session rejected an update.
    #[error(transparent)]
    Battle(#[from] BattleError),
}
