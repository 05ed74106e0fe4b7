use thiserror::Error;

use crate::codec::CodecError;

/// Result type alias for brine operations
pub type Result<T> = std::result::Result<T, BrineError>;

/// Errors that can occur while configuring or running a brine node
#[derive(Error, Debug)]
pub enum BrineError {
    /// Configuration is invalid or could not be parsed
    #[error("configuration error: {0}")]
    Config(String),

    /// Payload encoding or decoding failed
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A transport operation (socket option, send, receive) failed
    #[error("transport error: {0}")]
    Transport(String),

    /// None of the configured ports could be bound
    #[error("no available ports to listen to advertisements (tried {ports:?})")]
    NoListenPort {
        /// Ports that were attempted, in order
        ports: Vec<u16>,
    },

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BrineError {
    /// Returns true if the error must stop the node
    ///
    /// Everything on the receive/update/announce path is recoverable; only
    /// a bad configuration or an exhausted port list prevents startup.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::NoListenPort { .. })
    }
}
