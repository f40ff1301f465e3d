//! Error taxonomy shared by every component of a CORTEX run.
//!
//! Recovery policy lives with the caller, not the error: the scheduler and
//! protocol state machines decide whether a given variant is fatal to the
//! run. See the module docs on [`crate::scheduler`] and [`crate::protocol`]
//! for what each component does with each variant.

/// Unified error type for every fallible CORTEX operation.
#[derive(Debug, thiserror::Error)]
pub enum CortexError {
    /// Stream configuration or kernel capability validation failed.
    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    /// Underlying file or socket I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A `recv` call exceeded its deadline.
    #[error("timeout waiting for {0}")]
    Timeout(String),

    /// Bad magic, CRC mismatch, unexpected frame type, seq mismatch, or
    /// oversized payload. Fatal; no resynchronization is attempted.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// `init` returned a null handle or `CONFIG_ACK` carried a non-zero
    /// status.
    #[error("kernel rejected config: {0}")]
    KernelRejectedConfig(String),

    /// Observed as a transport reset from the adapter side.
    #[error("kernel crashed: {0}")]
    KernelCrash(String),

    /// Cooperative shutdown flag was observed; not a failure.
    #[error("cancelled")]
    Cancelled,
}

/// The frame-level decode failures of §4.1, reported independently of
/// [`CortexError`] so callers can distinguish "keep retrying" from "give up"
/// before they decide how to fold it into the run-level error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("invalid magic")]
    InvalidMagic,
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("crc mismatch")]
    CrcMismatch,
    #[error("truncated frame")]
    TruncatedFrame,
}

impl From<FrameError> for CortexError {
    fn from(e: FrameError) -> Self {
        CortexError::ProtocolViolation(e.to_string())
    }
}

/// Transport-level failures of §4.2, kept separate from [`CortexError`] for
/// the same reason as [`FrameError`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("connection reset")]
    ConnectionReset,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TransportError> for CortexError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout(d) => CortexError::Timeout(format!("{d:?}")),
            TransportError::ConnectionReset => {
                CortexError::ProtocolViolation("connection reset".to_string())
            }
            TransportError::Io(io) => CortexError::Io(io),
        }
    }
}
