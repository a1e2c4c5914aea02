//! Error types for the battle layer.

/// Errors that can occur while feeding a battle session.
///
/// None of these are fatal: the router logs them and keeps going, and
/// the session keeps its previous snapshot.
#[derive(Debug, thiserror::Error)]
pub enum BattleError {
    /// The update's `data` doesn't have the shape its command promises
    /// (e.g. `init_info` is a string instead of an object).
    #[error("malformed {command} update: {source}")]
    MalformedUpdate {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    /// The envelope is not one of the two battle-update commands.
    #[error("{0} is not a battle update")]
    UnexpectedCommand(String),
}
