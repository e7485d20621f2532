//! Codec error types

use thiserror::Error;

/// Errors produced while encoding or decoding protocol frames
#[derive(Error, Debug)]
pub enum CodecError {
    /// Buffer ended before the announced field
    #[error("truncated buffer: need {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes the current field requires
        needed: usize,
        /// Bytes left in the buffer
        remaining: usize,
    },

    /// A wire string held invalid UTF-8
    #[error("invalid UTF-8 in wire string")]
    InvalidUtf8,

    /// Inet address length was not 4 or 16
    #[error("invalid inet address length: {length}")]
    InvalidInetLength {
        /// Length byte as read
        length: usize,
    },

    /// Negative length prefix where the null sentinel is not allowed
    #[error("negative length prefix: {length}")]
    NegativeLength {
        /// Length as read
        length: i32,
    },

    /// Version byte not recognized
    #[error("unsupported protocol version: {version:#x}")]
    UnsupportedVersion {
        /// Version byte (direction bit cleared)
        version: u8,
    },

    /// Opcode byte not recognized
    #[error("unknown opcode: {opcode:#x}")]
    UnknownOpcode {
        /// Opcode byte as read
        opcode: u8,
    },

    /// Frame flags byte carried reserved bits
    #[error("invalid frame flags: {flags:#x}")]
    InvalidFlags {
        /// Flags byte as read
        flags: u8,
    },

    /// ERROR frame carried an unknown error code
    #[error("unknown error code: {code:#x}")]
    UnknownErrorCode {
        /// Error code as read
        code: i32,
    },

    /// RESULT frame carried an unknown kind
    #[error("unknown result kind: {kind:#x}")]
    UnknownResultKind {
        /// Result kind as read
        kind: i32,
    },

    /// EVENT frame carried an unknown event type
    #[error("unknown event type: {event_type:?}")]
    UnknownEventType {
        /// Event type string as read
        event_type: String,
    },

    /// Column metadata carried an unknown type code
    #[error("unknown data type code: {code:#x}")]
    UnknownTypeCode {
        /// Type code as read
        code: u16,
    },

    /// Segment header failed its CRC24 check
    #[error("segment header CRC mismatch: expected {expected:#x}, got {actual:#x}")]
    HeaderCrcMismatch {
        /// CRC read from the wire
        expected: u32,
        /// CRC computed over the header
        actual: u32,
    },

    /// Segment payload failed its CRC32 check
    #[error("segment payload CRC mismatch: expected {expected:#x}, got {actual:#x}")]
    PayloadCrcMismatch {
        /// CRC read from the wire
        expected: u32,
        /// CRC computed over the payload
        actual: u32,
    },

    /// Segment payload exceeds the 17-bit length field
    #[error("segment payload too large: {size} bytes (max {max})")]
    SegmentTooLarge {
        /// Payload size
        size: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Message cannot be represented under the negotiated version
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What could not be represented
        message: String,
    },

    /// No codec registered for the opcode under this version
    #[error("no codec registered for opcode {opcode:#x}")]
    UnregisteredOpcode {
        /// Opcode byte looked up
        opcode: u8,
    },

    /// COMPRESSED flag set but no compressor is configured
    #[error("compressed frame received but no compressor configured")]
    MissingCompressor,

    /// Compression adapter failed
    #[error("compression failed: {0}")]
    Compression(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Abstract error kinds, used by transports to pick a recovery strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed bytes; the connection must be closed
    Protocol,
    /// Encode-time rejection; surfaced to the originating call
    InvalidArgument,
    /// Opcode or sub-kind not registered for this version
    UnsupportedFeature,
    /// Compression adapter failure
    Compression,
}

impl CodecError {
    /// Classify this error into the abstract taxonomy
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::UnregisteredOpcode { .. } => ErrorKind::UnsupportedFeature,
            Self::Compression(_) => ErrorKind::Compression,
            _ => ErrorKind::Protocol,
        }
    }

    /// Whether the connection that produced this error must be closed
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Protocol
    }

    /// Shorthand for an encode-time rejection
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CodecError>;
