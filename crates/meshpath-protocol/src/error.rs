//! Error types for the protocol layer.
//!
//! Decoding untrusted bytes can fail in many small ways, so the failures
//! are split by stage: [`DecodeError`] for the value serializer,
//! [`FrameError`] for the stream framer, and [`ProtocolError`] for the
//! message codec that sits on top of both.

/// The serializer rejected a byte buffer.
///
/// Every variant means "discard this input". None of them can be produced
/// by reading past the end of the buffer: lengths are checked before any
/// slice is taken.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// A length field claims more bytes than the buffer holds.
    #[error("buffer too short: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// Bytes remain after the top-level value was fully consumed.
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    /// The type tag is not one of the six known tags.
    #[error("unknown type tag {0}")]
    UnknownTag(u8),

    /// A boolean payload that is not exactly `b"1"` or `b"0"`.
    #[error("invalid boolean payload")]
    InvalidBool,

    /// A string payload that is not valid UTF-8.
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// The same key appears twice in one mapping.
    #[error("duplicate mapping key")]
    DuplicateKey,

    /// Containers nested deeper than the decoder accepts.
    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),
}

/// The serializer could not represent a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// A payload is longer than the 4-byte length field can express.
    #[error("encoded length {0} does not fit in a 4-byte length field")]
    TooLarge(usize),
}

/// The framer saw a length prefix no well-behaved peer would send.
///
/// Unlike a [`DecodeError`], which costs one frame, a `FrameError` means
/// the stream itself can no longer be trusted and the connection must be
/// closed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The declared frame length is below the smallest possible frame.
    #[error("declared frame length {len} is below the minimum {min}")]
    TooShort { len: usize, min: usize },

    /// The declared frame length exceeds the configured ceiling.
    #[error("declared frame length {len} exceeds the maximum {max}")]
    TooLong { len: usize, max: usize },
}

/// Errors that can occur in the message codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a message into bytes).
    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),

    /// Deserialization failed (turning bytes into a value).
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// The message was built for another protocol version.
    #[error("protocol version mismatch: expected {expected}, got {found}")]
    VersionMismatch { expected: u32, found: String },

    /// The bytes decoded to a value that is not a message.
    ///
    /// For example a sequence of the wrong arity, or an address that is
    /// an integer instead of a string.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
