//! Unified error type for Livewire.

use livewire_battle::BattleError;
use livewire_protocol::ProtocolError;
use livewire_router::HandlerError;
use livewire_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `livewire` crate you deal with this single error type
/// instead of importing errors from each layer. `#[from]` on each variant
/// generates the `From` impls, so `?` converts layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum LivewireError {
    /// Connecting, sending, or receiving failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encoding or decoding a frame failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A battle session rejected an update.
    #[error(transparent)]
    Battle(#[from] BattleError),

    /// A handler rejected an envelope.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client for the collector could not be built.
    #[error("collector client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors from loading a [`LivewireConfig`](crate::LivewireConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The YAML is malformed, has a wrong type, or has an unknown key.
    #[error("invalid yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The YAML parsed but a value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}
