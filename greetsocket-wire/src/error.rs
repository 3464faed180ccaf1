/// Result type for greetsocket-wire.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for greetsocket-wire.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Standard IO error
    #[error("IO failure: {0}")]
    IoFailure(#[from] std::io::Error),
    /// The peer sent bytes that are not a frame
    #[error("Invalid frame: {0}")]
    InvalidFrame(#[from] prost::DecodeError),
    /// A frame could not be written into the outbound buffer
    #[error("Could not encode frame: {0}")]
    EncodeFailure(#[from] prost::EncodeError),
    /// A frame is larger than this side is willing to buffer
    #[error("Frame of {length} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Length of the offending frame
        length: usize,
        /// Configured limit
        max: usize,
    },
}
