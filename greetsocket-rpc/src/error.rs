/// Result type for greetsocket-rpc.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for greetsocket-rpc.
///
/// These are transport failures. Failures of an individual call are reported as a
/// [`Status`](greetsocket_wire::Status) instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Standard IO error
    #[error("IO failure: {0}")]
    IoFailure(#[from] std::io::Error),
    /// The peer broke the framing rules
    #[error("Protocol failure: {0}")]
    ProtocolFailure(#[from] greetsocket_wire::Error),
}
