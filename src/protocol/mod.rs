//! CQL native protocol core
//!
//! This module provides the wire primitives, message types, and frame
//! codec for the protocol. Everything is parametric over the
//! [`WireBuf`](primitive::WireBuf) buffer capability; `BytesMut` is the
//! network backend and [`mock::MockWireBuf`] the test backend.

pub mod collection;
pub mod compression;
pub mod error;
pub mod frame;
pub mod message;
pub mod mock;
pub mod primitive;
pub mod registry;
pub mod segment;
pub mod types;

pub use collection::OrderedMap;
pub use compression::Compressor;
pub use error::{CodecError, ErrorKind, Result};
pub use frame::{Frame, FrameCodec, FrameCodecBuilder, HEADER_SIZE};
pub use message::{Message, MessageCodec};
pub use mock::MockWireBuf;
pub use primitive::WireBuf;
pub use registry::{CodecRegistry, RegistryBuilder, REQUEST_OPCODES, RESPONSE_OPCODES};
pub use segment::{Segment, SegmentAccumulator, SegmentCodec, MAX_SEGMENT_PAYLOAD};
pub use types::{Direction, FrameFlags, Opcode, ProtocolVersion};

/// Default CQL native transport port
pub const DEFAULT_PORT: u16 = 9042;
