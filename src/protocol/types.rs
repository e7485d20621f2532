//! Protocol versions, opcodes, frame flags, and wire-string constants

use std::fmt;

/// Native protocol versions understood by this crate.
///
/// The DSE dialects share the OSS wire format but negotiate their own
/// version bytes and feature sets: `Dse1` tracks the v4 feature set,
/// `Dse2` adds the v5-era query parameters (int flags, keyspace).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// OSS protocol v3
    V3,
    /// OSS protocol v4
    V4,
    /// OSS protocol v5
    V5,
    /// DSE dialect v1 (0x41)
    Dse1,
    /// DSE dialect v2 (0x42)
    Dse2,
}

impl ProtocolVersion {
    /// Convert from the low bits of the frame version byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x03 => Some(Self::V3),
            0x04 => Some(Self::V4),
            0x05 => Some(Self::V5),
            0x41 => Some(Self::Dse1),
            0x42 => Some(Self::Dse2),
            _ => None,
        }
    }

    /// Convert to the wire version byte (direction bit clear)
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::V3 => 0x03,
            Self::V4 => 0x04,
            Self::V5 => 0x05,
            Self::Dse1 => 0x41,
            Self::Dse2 => 0x42,
        }
    }

    /// FUNCTION and AGGREGATE schema-change targets exist from v4 on
    #[must_use]
    pub const fn supports_function_targets(self) -> bool {
        !matches!(self, Self::V3)
    }

    /// Query-parameter flags widen from `[byte]` to `[int]` in v5
    #[must_use]
    pub const fn uses_int_query_flags(self) -> bool {
        matches!(self, Self::V5 | Self::Dse2)
    }

    /// Per-query keyspace parameter (QUERY/PREPARE/BATCH)
    #[must_use]
    pub const fn supports_keyspace_parameter(self) -> bool {
        matches!(self, Self::V5 | Self::Dse2)
    }

    /// NOW_IN_SECONDS query parameter
    #[must_use]
    pub const fn supports_now_in_seconds(self) -> bool {
        matches!(self, Self::V5)
    }

    /// Result-metadata ids on EXECUTE and in Prepared results
    #[must_use]
    pub const fn supports_result_metadata_id(self) -> bool {
        matches!(self, Self::V5)
    }

    /// Replica reason maps replace the failure count in v5
    #[must_use]
    pub const fn supports_reason_maps(self) -> bool {
        matches!(self, Self::V5)
    }

    /// METADATA_CHANGED flag in Rows metadata
    #[must_use]
    pub const fn supports_metadata_changed(self) -> bool {
        matches!(self, Self::V5)
    }

    /// Partition-key indices in Prepared variable metadata (v4+)
    #[must_use]
    pub const fn supports_pk_indices(self) -> bool {
        !matches!(self, Self::V3)
    }

    /// Custom-payload and warnings frame envelopes (v4+)
    #[must_use]
    pub const fn supports_frame_envelopes(self) -> bool {
        !matches!(self, Self::V3)
    }

    /// Self-delimiting checksummed segments after STARTUP (v5 only)
    #[must_use]
    pub const fn supports_segments(self) -> bool {
        matches!(self, Self::V5)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::V3 => "v3",
            Self::V4 => "v4",
            Self::V5 => "v5",
            Self::Dse1 => "dse-v1",
            Self::Dse2 => "dse-v2",
        };
        write!(f, "{name}")
    }
}

/// Whether a peer encodes requests or responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Encodes requests, decodes responses
    Client,
    /// Encodes responses, decodes requests
    Server,
}

/// Frame opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Server error response
    Error = 0x00,
    /// Connection initialization options
    Startup = 0x01,
    /// Connection is ready for queries
    Ready = 0x02,
    /// Server requires authentication
    Authenticate = 0x03,
    /// Ask for supported STARTUP options
    Options = 0x05,
    /// Supported STARTUP options
    Supported = 0x06,
    /// Raw CQL query
    Query = 0x07,
    /// Query/prepare/execute outcome
    Result = 0x08,
    /// Prepare a statement
    Prepare = 0x09,
    /// Execute a prepared statement
    Execute = 0x0A,
    /// Subscribe to server events
    Register = 0x0B,
    /// Server push event
    Event = 0x0C,
    /// Batch of queries
    Batch = 0x0D,
    /// SASL challenge
    AuthChallenge = 0x0E,
    /// SASL response
    AuthResponse = 0x0F,
    /// Authentication succeeded
    AuthSuccess = 0x10,
}

impl Opcode {
    /// Convert from the header opcode byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Error),
            0x01 => Some(Self::Startup),
            0x02 => Some(Self::Ready),
            0x03 => Some(Self::Authenticate),
            0x05 => Some(Self::Options),
            0x06 => Some(Self::Supported),
            0x07 => Some(Self::Query),
            0x08 => Some(Self::Result),
            0x09 => Some(Self::Prepare),
            0x0A => Some(Self::Execute),
            0x0B => Some(Self::Register),
            0x0C => Some(Self::Event),
            0x0D => Some(Self::Batch),
            0x0E => Some(Self::AuthChallenge),
            0x0F => Some(Self::AuthResponse),
            0x10 => Some(Self::AuthSuccess),
            _ => None,
        }
    }

    /// Convert to the header opcode byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Opcodes sent by clients
    #[must_use]
    pub const fn is_request(self) -> bool {
        matches!(
            self,
            Self::Startup
                | Self::Options
                | Self::Query
                | Self::Prepare
                | Self::Execute
                | Self::Register
                | Self::Batch
                | Self::AuthResponse
        )
    }

    /// Opcodes sent by servers
    #[must_use]
    pub const fn is_response(self) -> bool {
        !self.is_request()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Error => "ERROR",
            Self::Startup => "STARTUP",
            Self::Ready => "READY",
            Self::Authenticate => "AUTHENTICATE",
            Self::Options => "OPTIONS",
            Self::Supported => "SUPPORTED",
            Self::Query => "QUERY",
            Self::Result => "RESULT",
            Self::Prepare => "PREPARE",
            Self::Execute => "EXECUTE",
            Self::Register => "REGISTER",
            Self::Event => "EVENT",
            Self::Batch => "BATCH",
            Self::AuthChallenge => "AUTH_CHALLENGE",
            Self::AuthResponse => "AUTH_RESPONSE",
            Self::AuthSuccess => "AUTH_SUCCESS",
        };
        write!(f, "{name}")
    }
}

/// Frame header flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// Body is compressed with the negotiated algorithm
    pub const COMPRESSED: u8 = 0x01;
    /// Tracing requested (request) or tracing id present (response)
    pub const TRACING: u8 = 0x02;
    /// Custom-payload envelope present
    pub const CUSTOM_PAYLOAD: u8 = 0x04;
    /// Warnings envelope present
    pub const WARNING: u8 = 0x08;
    /// Frame uses a beta protocol version
    pub const USE_BETA: u8 = 0x10;

    /// Valid flag bits
    pub const VALID_MASK: u8 =
        Self::COMPRESSED | Self::TRACING | Self::CUSTOM_PAYLOAD | Self::WARNING | Self::USE_BETA;

    /// Create empty flags
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Create from the header flags byte
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        if value & !Self::VALID_MASK == 0 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Convert to the header flags byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Set a flag
    #[must_use]
    pub const fn with(mut self, flag: u8) -> Self {
        self.0 |= flag;
        self
    }

    /// Check if a flag is set
    #[must_use]
    pub const fn has(self, flag: u8) -> bool {
        (self.0 & flag) != 0
    }

    /// Check if the body is compressed
    #[must_use]
    pub const fn is_compressed(self) -> bool {
        self.has(Self::COMPRESSED)
    }

    /// Check if tracing is flagged
    #[must_use]
    pub const fn has_tracing(self) -> bool {
        self.has(Self::TRACING)
    }

    /// Check if a custom payload is present
    #[must_use]
    pub const fn has_custom_payload(self) -> bool {
        self.has(Self::CUSTOM_PAYLOAD)
    }

    /// Check if warnings are present
    #[must_use]
    pub const fn has_warnings(self) -> bool {
        self.has(Self::WARNING)
    }
}

impl fmt::Display for FrameFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.is_compressed() {
            parts.push("COMPRESSED");
        }
        if self.has_tracing() {
            parts.push("TRACING");
        }
        if self.has_custom_payload() {
            parts.push("CUSTOM_PAYLOAD");
        }
        if self.has_warnings() {
            parts.push("WARNING");
        }
        if self.has(Self::USE_BETA) {
            parts.push("USE_BETA");
        }
        if parts.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", parts.join(" | "))
        }
    }
}

/// Server error codes carried by ERROR frames
pub mod error_code {
    /// Unexpected server-side failure
    pub const SERVER_ERROR: i32 = 0x0000;
    /// Client violated the protocol
    pub const PROTOCOL_ERROR: i32 = 0x000A;
    /// Authentication failed
    pub const AUTH_ERROR: i32 = 0x0100;
    /// Not enough live replicas
    pub const UNAVAILABLE: i32 = 0x1000;
    /// Coordinator is overloaded
    pub const OVERLOADED: i32 = 0x1001;
    /// Coordinator is bootstrapping
    pub const IS_BOOTSTRAPPING: i32 = 0x1002;
    /// Truncation failed
    pub const TRUNCATE_ERROR: i32 = 0x1003;
    /// Write timed out
    pub const WRITE_TIMEOUT: i32 = 0x1100;
    /// Read timed out
    pub const READ_TIMEOUT: i32 = 0x1200;
    /// Replica failures during a read
    pub const READ_FAILURE: i32 = 0x1300;
    /// User-defined function failed
    pub const FUNCTION_FAILURE: i32 = 0x1400;
    /// Replica failures during a write
    pub const WRITE_FAILURE: i32 = 0x1500;
    /// CDC space exhausted (v5)
    pub const CDC_WRITE_FAILURE: i32 = 0x1600;
    /// CQL syntax error
    pub const SYNTAX_ERROR: i32 = 0x2000;
    /// User is not authorized
    pub const UNAUTHORIZED: i32 = 0x2100;
    /// Query is invalid
    pub const INVALID: i32 = 0x2200;
    /// Invalid query option
    pub const CONFIG_ERROR: i32 = 0x2300;
    /// Schema object already exists
    pub const ALREADY_EXISTS: i32 = 0x2400;
    /// Prepared id unknown to the coordinator
    pub const UNPREPARED: i32 = 0x2500;
}

/// RESULT payload kinds
pub mod result_kind {
    /// No result data
    pub const VOID: i32 = 0x0001;
    /// Row set
    pub const ROWS: i32 = 0x0002;
    /// USE keyspace outcome
    pub const SET_KEYSPACE: i32 = 0x0003;
    /// Prepared statement handle
    pub const PREPARED: i32 = 0x0004;
    /// DDL outcome
    pub const SCHEMA_CHANGE: i32 = 0x0005;
}

/// EVENT type strings
pub mod event_type {
    /// Node added or removed
    pub const TOPOLOGY_CHANGE: &str = "TOPOLOGY_CHANGE";
    /// Node went up or down
    pub const STATUS_CHANGE: &str = "STATUS_CHANGE";
    /// Schema object changed
    pub const SCHEMA_CHANGE: &str = "SCHEMA_CHANGE";
}

/// TOPOLOGY_CHANGE event kinds
pub mod topology_change_type {
    /// Node joined the ring
    pub const NEW_NODE: &str = "NEW_NODE";
    /// Node left the ring
    pub const REMOVED_NODE: &str = "REMOVED_NODE";
}

/// STATUS_CHANGE event kinds
pub mod status_change_type {
    /// Node is up
    pub const UP: &str = "UP";
    /// Node is down
    pub const DOWN: &str = "DOWN";
}

/// Schema-change kinds shared by RESULT and EVENT payloads
pub mod schema_change_type {
    /// Object was created
    pub const CREATED: &str = "CREATED";
    /// Object was altered
    pub const UPDATED: &str = "UPDATED";
    /// Object was dropped
    pub const DROPPED: &str = "DROPPED";
}

/// Schema-change targets
pub mod schema_change_target {
    /// Whole keyspace
    pub const KEYSPACE: &str = "KEYSPACE";
    /// Table in a keyspace
    pub const TABLE: &str = "TABLE";
    /// User-defined type
    pub const TYPE: &str = "TYPE";
    /// User-defined function (v4+)
    pub const FUNCTION: &str = "FUNCTION";
    /// User-defined aggregate (v4+)
    pub const AGGREGATE: &str = "AGGREGATE";
}

/// STARTUP option keys
pub mod startup_option {
    /// Mandatory CQL version option
    pub const CQL_VERSION: &str = "CQL_VERSION";
    /// Negotiated compression algorithm
    pub const COMPRESSION: &str = "COMPRESSION";
    /// Disable legacy compact storage semantics
    pub const NO_COMPACT: &str = "NO_COMPACT";
    /// Ask the server to throw instead of shedding load
    pub const THROW_ON_OVERLOAD: &str = "THROW_ON_OVERLOAD";
}

/// Write types reported by write timeout/failure errors
pub mod write_type {
    /// Non-batched, non-counter write
    pub const SIMPLE: &str = "SIMPLE";
    /// Logged batch write
    pub const BATCH: &str = "BATCH";
    /// Unlogged batch write
    pub const UNLOGGED_BATCH: &str = "UNLOGGED_BATCH";
    /// Counter write
    pub const COUNTER: &str = "COUNTER";
    /// Batch-log write
    pub const BATCH_LOG: &str = "BATCH_LOG";
    /// Materialized-view update
    pub const VIEW: &str = "VIEW";
    /// CDC write
    pub const CDC: &str = "CDC";
}
