//! Domain-specific error types for the elevsim protocol.
//!
//! All fallible codec operations return `Result<T, ElevsimError>`.
//! No panics on malformed input: every error is typed and recoverable,
//! and none of them tears down the connection on its own.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ElevsimError>;

/// The canonical error type for the elevsim protocol.
#[derive(Debug, Error)]
pub enum ElevsimError {
    // ── Framing Errors ───────────────────────────────────────────
    /// The buffer does not begin with `E0 EA 0A 08`.
    #[error("invalid start marker")]
    InvalidStartMarker,

    /// The buffer does not end with `FF FF FF FF`.
    #[error("invalid end marker")]
    InvalidEndMarker,

    /// The declared payload length does not match the buffer size.
    #[error("invalid frame length: declared payload {declared} bytes, frame is {actual} bytes")]
    InvalidLength { declared: u64, actual: usize },

    /// A field read ran past the end of the payload.
    #[error("payload underrun: needed {needed} bytes, {remaining} remaining")]
    PayloadUnderrun { needed: usize, remaining: usize },

    /// The opcode's fields were read but payload bytes remain.
    #[error("trailing payload: {remaining} unread bytes")]
    TrailingPayload { remaining: usize },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    // ── Integrity Errors ─────────────────────────────────────────
    /// The transmitted checksum does not match the recomputed one.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    InvalidChecksum { expected: u32, actual: u32 },

    // ── Encoding Errors ──────────────────────────────────────────
    /// A number does not fit the 4-byte wire integer.
    #[error("number out of range for wire integer: {0}")]
    NumberOutOfRange(String),

    /// A string is longer than the length prefix can describe.
    #[error("string too long: {0} characters")]
    StringTooLong(usize),

    /// A character cannot be written as a single byte.
    #[error("character {0:?} is not representable in one byte")]
    UnencodableChar(char),

    /// A command could not be built from the given arguments.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    // ── Forward Compatibility ────────────────────────────────────
    /// The frame carries an opcode this build does not know.
    #[error("unknown opcode: {0}")]
    UnknownOpcode(u32),

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value}")]
    UnknownVariant { type_name: &'static str, value: u32 },

    /// The frame's opcode is valid but not expected in this direction.
    #[error("unexpected opcode {0} for this direction")]
    UnexpectedOpcode(u32),

    // ── Transport Errors ─────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of an [`ElevsimError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad sentinel or length; the frame is unusable and dropped.
    Framing,
    /// Checksum mismatch; treated as transmission corruption.
    Integrity,
    /// A value could not be encoded; the command is never sent.
    Encoding,
    /// The opcode (or a discriminant inside it) is unknown.
    UnknownOpcode,
    /// I/O or channel failure.
    Transport,
    /// Anything else.
    Other,
}

impl ElevsimError {
    /// Classify this error into the protocol's error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidStartMarker
            | Self::InvalidEndMarker
            | Self::InvalidLength { .. }
            | Self::PayloadUnderrun { .. }
            | Self::TrailingPayload { .. }
            | Self::PayloadTooLarge { .. } => ErrorKind::Framing,
            Self::InvalidChecksum { .. } => ErrorKind::Integrity,
            Self::NumberOutOfRange(_)
            | Self::StringTooLong(_)
            | Self::UnencodableChar(_)
            | Self::InvalidCommand(_) => ErrorKind::Encoding,
            Self::UnknownOpcode(_) | Self::UnknownVariant { .. } | Self::UnexpectedOpcode(_) => {
                ErrorKind::UnknownOpcode
            }
            Self::Connection(_) | Self::ChannelClosed => ErrorKind::Transport,
            Self::Other(_) => ErrorKind::Other,
        }
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for ElevsimError {
    fn from(s: String) -> Self {
        ElevsimError::Other(s)
    }
}

impl From<&str> for ElevsimError {
    fn from(s: &str) -> Self {
        ElevsimError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for ElevsimError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        ElevsimError::ChannelClosed
    }
}
