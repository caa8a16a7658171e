//! Error types for MBPU driver operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, MdlxError>;

/// Errors that can occur while driving an MBPU unit.
///
/// Inside a worker, any [`ShortIo`](MdlxError::ShortIo), framing, or
/// slot-routing error is terminal for the device: the worker transitions to
/// emergency and fails every pending and future request with status −1.
/// [`TableFull`](MdlxError::TableFull) is the one transient kind; the pusher
/// retries it.
#[derive(Debug, Error)]
pub enum MdlxError {
    /// A device node is missing from /dev.
    #[error("Device node not found: {path}")]
    DeviceNotFound {
        /// Path that was checked.
        path: PathBuf,
    },

    /// Initialization failed before any worker started.
    #[error("Setup failed: {reason}")]
    Setup {
        /// Reason for failure.
        reason: String,
    },

    /// I/O error during device communication.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A transfer moved fewer bytes than the frame or register requires.
    #[error("Short {op} on {node}: {got} of {expected} bytes")]
    ShortIo {
        /// Operation that came up short.
        op: &'static str,
        /// Device node involved.
        node: &'static str,
        /// Bytes the transfer had to move.
        expected: usize,
        /// Bytes actually moved.
        got: usize,
    },

    /// A response frame had the wrong length.
    #[error("Wrong response frame size: {got} bytes")]
    WrongResponseSize {
        /// Length of the rejected buffer.
        got: usize,
    },

    /// A metric register block had the wrong length.
    #[error("Wrong metric block size: {got} bytes")]
    WrongMetricSize {
        /// Length of the rejected buffer.
        got: usize,
    },

    /// A `control` register did not carry its channel-ready signature.
    #[error("{channel} channel unavailable")]
    ChannelUnavailable {
        /// Which channel failed the probe.
        channel: &'static str,
    },

    /// A request field is longer than one 32-byte field element.
    #[error("Field {field} is {len} bytes, at most 32 allowed")]
    OversizedField {
        /// Name of the offending field.
        field: &'static str,
        /// Length supplied by the caller.
        len: usize,
    },

    /// Every slot holds a pending request.
    #[error("Slot table full")]
    TableFull,

    /// A completion carried a slot id past the table.
    #[error("Slot {slot} out of range (capacity {capacity})")]
    SlotOutOfRange {
        /// Slot id from the frame.
        slot: u64,
        /// Configured `max_pending`.
        capacity: usize,
    },

    /// A completion arrived for a slot with no pending request.
    #[error("Slot {slot} is vacant")]
    SlotVacant {
        /// Slot id from the frame.
        slot: u64,
    },

    /// `init` was called while a manager is live.
    #[error("Manager is already initialized")]
    AlreadyInitialized,

    /// The process-wide manager is not running.
    #[error("Manager is not initialized")]
    NotInitialized,

    /// The OS entropy source failed.
    #[error("Entropy source failed: {reason}")]
    Entropy {
        /// Reason for failure.
        reason: String,
    },

    /// The metric server thread outlived its stop protocol.
    #[error("Metric server did not stop within {waited_s} s")]
    MetricHung {
        /// Seconds the stop protocol observed the thread.
        waited_s: u64,
    },
}

impl MdlxError {
    /// Create a setup error.
    pub fn setup(reason: impl Into<String>) -> Self {
        Self::Setup {
            reason: reason.into(),
        }
    }

    /// Create a device-not-found error.
    pub fn device_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DeviceNotFound { path: path.into() }
    }
}
