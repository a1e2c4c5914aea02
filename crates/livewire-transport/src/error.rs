/// Errors raised while talking to the live-event server.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The stream URL is not a usable `ws://` or `wss://` address.
    #[error("invalid stream url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// DNS, TCP, TLS or the WebSocket upgrade failed.
    #[error("connect to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// The stream is already closed; nothing more can be sent on it.
    #[error("stream closed: {0}")]
    Closed(String),

    /// Writing a frame to the stream failed.
    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),

    /// Reading from the stream failed mid-message.
    #[error("receive failed: {0}")]
    Receive(#[source] std::io::Error),
}
