//! Error types for the tracker wire codecs.

use thiserror::Error;

/// Errors raised while building or validating tracker messages.
///
/// Every validation error is raised before any output buffer is produced,
/// so a failed build never yields a partial frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Device identity is not 15 or 16 ASCII digits.
    #[error("Invalid device identity {0:?}: expected 15 or 16 decimal digits")]
    InvalidIdentity(String),

    /// A BCD byte carried a nibble outside 0-9.
    #[error("Invalid BCD byte 0x{0:02X}")]
    InvalidBcd(u8),

    /// Trajectory sample is outside the encodable range.
    #[error("Invalid trajectory sample: {0}")]
    InvalidSample(String),

    /// Frame start or end marker is wrong.
    #[error("Invalid frame marker: expected {expected:02X?}, got {actual:02X?}")]
    InvalidMarker { expected: [u8; 2], actual: [u8; 2] },

    /// Embedded CRC does not match the CRC recomputed over the body.
    #[error("Checksum mismatch: frame carries 0x{expected:04X}, body computes 0x{actual:04X}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// Frame is shorter than its length field announces.
    #[error("Incomplete frame: expected {expected} bytes, got {actual}")]
    IncompleteFrame { expected: usize, actual: usize },

    /// Payload does not fit the one-byte length field.
    #[error("Frame too large: {0} payload bytes (max: {1})")]
    FrameTooLarge(usize, usize),

    /// Length field is smaller than the fixed frame overhead.
    #[error("Invalid length field: {0}")]
    InvalidLength(u8),

    /// Text field contains a delimiter or is otherwise unusable.
    #[error("Invalid record field {name}: {value:?}")]
    InvalidField { name: &'static str, value: String },

    /// Text record is not terminated or not ASCII.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),
}
