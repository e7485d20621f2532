//! cqlwire - Version-aware codec for the CQL native wire protocol
//!
//! This library translates between in-memory message values and the
//! frame payloads of the CQL native protocol (v3, v4, v5, and the DSE
//! dialects). It is purely translational: no networking, no query
//! execution, no value interpretation beyond raw bytes.
//!
//! # Quick Start
//!
//! ```rust
//! use bytes::BytesMut;
//! use cqlwire::{Frame, FrameCodec, Message, ProtocolVersion};
//! use cqlwire::message::Query;
//!
//! let client: FrameCodec<BytesMut> = FrameCodec::client(ProtocolVersion::V4);
//! let server: FrameCodec<BytesMut> = FrameCodec::server(ProtocolVersion::V4);
//!
//! let frame = Frame::new(
//!     ProtocolVersion::V4,
//!     1,
//!     Message::Query(Query::new("SELECT * FROM system.local")),
//! );
//!
//! let mut bytes = client.encode(&frame)?;
//! let decoded = server.decode(&mut bytes)?;
//! assert_eq!(decoded, frame);
//! # Ok::<(), cqlwire::CodecError>(())
//! ```
//!
//! # Design
//!
//! - **Buffer-agnostic** - codecs consume the
//!   [`WireBuf`](protocol::primitive::WireBuf) capability and never
//!   name a concrete buffer type
//! - **Per-version instances** - version-conditional layouts are
//!   resolved when a codec is built, keeping each instance straight-line
//! - **Registry dispatch** - one codec per opcode, with inner
//!   registries for the sub-tagged RESULT / ERROR / EVENT payloads
//! - **v5 segments** - checksummed self-delimiting segment framing with
//!   CRC24 headers and CRC32 payloads

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

pub mod protocol;

pub use protocol::message;
pub use protocol::{
    CodecError, CodecRegistry, Compressor, Direction, ErrorKind, Frame, FrameCodec, FrameFlags,
    Message, MessageCodec, MockWireBuf, Opcode, OrderedMap, ProtocolVersion, Result, Segment,
    SegmentAccumulator, SegmentCodec, WireBuf, DEFAULT_PORT, HEADER_SIZE, MAX_SEGMENT_PAYLOAD,
};

#[cfg(feature = "lz4")]
pub use protocol::compression::Lz4Compressor;
#[cfg(feature = "snappy")]
pub use protocol::compression::SnappyCompressor;
