//! Frame model and codec
//!
//! # Wire Format
//!
//! ```text
//!  0         8        16                32        40
//! +---------+---------+--------+--------+---------+-----------------+
//! | version |  flags  |     stream id   | opcode  | length (int)    |
//! +---------+---------+--------+--------+---------+-----------------+
//! | body: [tracing id] [warnings] [custom payload] message payload  |
//! +------------------------------------------------------------------+
//! ```
//!
//! The high bit of the version byte carries the direction (set for
//! responses). When the COMPRESSED flag is set, everything after the
//! nine-byte header (envelopes included) is one compressed region.
//! Envelopes appear in decode order: tracing id, warnings, custom
//! payload.

use std::sync::Arc;

use bytes::Bytes;
use tracing::trace;
use uuid::Uuid;

use super::collection::OrderedMap;
use super::compression::Compressor;
use super::error::{CodecError, Result};
use super::message::Message;
use super::primitive::{sizes, WireBuf};
use super::registry::{CodecRegistry, RegistryBuilder};
use super::types::{Direction, FrameFlags, Opcode, ProtocolVersion};

/// Size of the frame header in bytes
pub const HEADER_SIZE: usize = 9;

/// Direction bit of the version byte
const RESPONSE_BIT: u8 = 0x80;

/// One protocol frame: header fields, envelopes, and the message
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Protocol version the frame is encoded under
    pub version: ProtocolVersion,
    /// Stream id multiplexing requests; negative ids are
    /// server-initiated (events use -1)
    pub stream_id: i16,
    /// Request-side flag asking the server to trace execution
    pub tracing: bool,
    /// Response-side tracing session id
    pub tracing_id: Option<Uuid>,
    /// Response-side warnings (v4+)
    pub warnings: Vec<String>,
    /// Opaque key/value payload (v4+); null values allowed
    pub custom_payload: OrderedMap<String, Option<Bytes>>,
    /// The message this frame carries
    pub message: Message,
}

impl Frame {
    /// Create a frame with no envelopes
    #[must_use]
    pub fn new(version: ProtocolVersion, stream_id: i16, message: Message) -> Self {
        Self {
            version,
            stream_id,
            tracing: false,
            tracing_id: None,
            warnings: Vec::new(),
            custom_payload: OrderedMap::new(),
            message,
        }
    }
}

/// Frame encoder/decoder for one protocol version and direction.
///
/// Immutable after build; a connection typically owns one instance and
/// shares it across its read and write halves.
pub struct FrameCodec<B: WireBuf> {
    registry: CodecRegistry<B>,
    compressor: Option<Arc<dyn Compressor<B>>>,
    allow_beta: bool,
}

/// Builder assembling a [`FrameCodec`]
pub struct FrameCodecBuilder<B: WireBuf> {
    registry: RegistryBuilder<B>,
    compressor: Option<Arc<dyn Compressor<B>>>,
    allow_beta: bool,
}

impl<B: WireBuf + 'static> FrameCodecBuilder<B> {
    /// Use a compressor for frame bodies
    #[must_use]
    pub fn with_compressor(mut self, compressor: Arc<dyn Compressor<B>>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    /// Set the USE_BETA flag on encoded frames
    #[must_use]
    pub fn allow_beta(mut self, allow: bool) -> Self {
        self.allow_beta = allow;
        self
    }

    /// Add an encoder beyond the default set
    #[must_use]
    pub fn with_encoder(
        mut self,
        codec: Arc<dyn super::message::MessageCodec<B>>,
    ) -> Self {
        self.registry = self.registry.with_encoder(codec);
        self
    }

    /// Add a decoder beyond the default set
    #[must_use]
    pub fn with_decoder(
        mut self,
        codec: Arc<dyn super::message::MessageCodec<B>>,
    ) -> Self {
        self.registry = self.registry.with_decoder(codec);
        self
    }

    /// Validate the codec set and build the frame codec
    pub fn build(self) -> Result<FrameCodec<B>> {
        Ok(FrameCodec {
            registry: self.registry.build()?,
            compressor: self.compressor,
            allow_beta: self.allow_beta,
        })
    }
}

impl<B: WireBuf + 'static> FrameCodec<B> {
    /// Start building a frame codec with the default codec set
    #[must_use]
    pub fn builder(version: ProtocolVersion, direction: Direction) -> FrameCodecBuilder<B> {
        FrameCodecBuilder {
            registry: CodecRegistry::builder(version, direction).with_defaults(),
            compressor: None,
            allow_beta: false,
        }
    }

    /// Standard client-side codec, no compression
    #[must_use]
    pub fn client(version: ProtocolVersion) -> Self {
        Self {
            registry: CodecRegistry::client(version),
            compressor: None,
            allow_beta: false,
        }
    }

    /// Standard server-side codec, no compression
    #[must_use]
    pub fn server(version: ProtocolVersion) -> Self {
        Self {
            registry: CodecRegistry::server(version),
            compressor: None,
            allow_beta: false,
        }
    }

    /// Protocol version this codec was built for
    #[must_use]
    pub fn version(&self) -> ProtocolVersion {
        self.registry.version()
    }

    fn check_frame(&self, frame: &Frame) -> Result<()> {
        if frame.version != self.version() {
            return Err(CodecError::invalid(format!(
                "frame version {} does not match codec version {}",
                frame.version,
                self.version()
            )));
        }
        if frame.message.opcode().is_response() && frame.tracing {
            return Err(CodecError::invalid(
                "responses carry a tracing id, not the tracing flag",
            ));
        }
        if !frame.version.supports_frame_envelopes()
            && (!frame.warnings.is_empty() || !frame.custom_payload.is_empty())
        {
            return Err(CodecError::invalid(format!(
                "warnings and custom payloads are not supported in {}",
                frame.version
            )));
        }
        Ok(())
    }

    fn body_size(&self, frame: &Frame) -> Result<usize> {
        let encoder = self.registry.encoder(frame.message.opcode())?;
        let mut size = encoder.encoded_size(&frame.message)?;
        if frame.tracing_id.is_some() {
            size += sizes::UUID;
        }
        if !frame.warnings.is_empty() {
            size += sizes::of_string_list(&frame.warnings);
        }
        if !frame.custom_payload.is_empty() {
            size += sizes::of_bytes_map(&frame.custom_payload);
        }
        Ok(size)
    }

    /// Exact encoded size of the frame before compression
    pub fn encoded_size(&self, frame: &Frame) -> Result<usize> {
        self.check_frame(frame)?;
        Ok(HEADER_SIZE + self.body_size(frame)?)
    }

    /// Encode a frame into a fresh buffer
    pub fn encode(&self, frame: &Frame) -> Result<B> {
        let mut dst = B::allocate(HEADER_SIZE);
        self.encode_into(frame, &mut dst)?;
        Ok(dst)
    }

    /// Encode a frame, appending to `dst`.
    ///
    /// The body is staged in a scratch buffer first, so on error `dst`
    /// has not been advanced.
    pub fn encode_into(&self, frame: &Frame, dst: &mut B) -> Result<()> {
        self.check_frame(frame)?;
        let opcode = frame.message.opcode();
        let encoder = self.registry.encoder(opcode)?;

        let mut body = B::allocate(self.body_size(frame)?);
        if let Some(tracing_id) = frame.tracing_id {
            body.write_uuid(tracing_id);
        }
        if !frame.warnings.is_empty() {
            body.write_string_list(&frame.warnings);
        }
        if !frame.custom_payload.is_empty() {
            body.write_bytes_map(&frame.custom_payload);
        }
        encoder.encode(&frame.message, &mut body)?;

        let mut flags = FrameFlags::new();
        if frame.tracing || frame.tracing_id.is_some() {
            flags = flags.with(FrameFlags::TRACING);
        }
        if !frame.warnings.is_empty() {
            flags = flags.with(FrameFlags::WARNING);
        }
        if !frame.custom_payload.is_empty() {
            flags = flags.with(FrameFlags::CUSTOM_PAYLOAD);
        }
        if self.allow_beta {
            flags = flags.with(FrameFlags::USE_BETA);
        }

        // compression is negotiated by STARTUP, so STARTUP and OPTIONS
        // themselves always travel uncompressed
        if let Some(compressor) = &self.compressor {
            if !matches!(opcode, Opcode::Startup | Opcode::Options) {
                body = compressor.compress(body)?;
                flags = flags.with(FrameFlags::COMPRESSED);
            }
        }

        let mut version_byte = frame.version.as_u8();
        if opcode.is_response() {
            version_byte |= RESPONSE_BIT;
        }
        dst.write_u8(version_byte);
        dst.write_u8(flags.as_u8());
        dst.write_u16(frame.stream_id as u16);
        dst.write_u8(opcode.as_u8());
        dst.write_i32(body.remaining() as i32);
        dst.write_retained(&body);
        Ok(())
    }

    /// Decode one frame from `src`.
    ///
    /// The buffer must hold the complete frame; the surrounding
    /// transport delimits frames (v5 segments are self-delimiting,
    /// earlier versions read the header length first).
    pub fn decode(&self, src: &mut B) -> Result<Frame> {
        let version_byte = src.read_u8()?;
        let version = ProtocolVersion::from_u8(version_byte & !RESPONSE_BIT).ok_or(
            CodecError::UnsupportedVersion {
                version: version_byte & !RESPONSE_BIT,
            },
        )?;
        if version != self.version() {
            return Err(CodecError::UnsupportedVersion {
                version: version.as_u8(),
            });
        }

        let flags_byte = src.read_u8()?;
        let flags =
            FrameFlags::from_u8(flags_byte).ok_or(CodecError::InvalidFlags { flags: flags_byte })?;
        if !version.supports_frame_envelopes()
            && (flags.has_warnings() || flags.has_custom_payload())
        {
            return Err(CodecError::InvalidFlags { flags: flags_byte });
        }

        let stream_id = src.read_u16()? as i16;
        let opcode_byte = src.read_u8()?;
        let opcode =
            Opcode::from_u8(opcode_byte).ok_or(CodecError::UnknownOpcode { opcode: opcode_byte })?;
        let decoder = self.registry.decoder(opcode)?;

        let length = src.read_i32()?;
        if length < 0 {
            return Err(CodecError::NegativeLength { length });
        }
        let mut body = src.read_retained(length as usize)?;

        if flags.is_compressed() {
            let compressor = self.compressor.as_ref().ok_or(CodecError::MissingCompressor)?;
            body = compressor.decompress(body)?;
        }

        let (tracing, tracing_id) = if flags.has_tracing() {
            if opcode.is_response() {
                (false, Some(body.read_uuid()?))
            } else {
                (true, None)
            }
        } else {
            (false, None)
        };
        let warnings = if flags.has_warnings() {
            body.read_string_list()?
        } else {
            Vec::new()
        };
        let custom_payload = if flags.has_custom_payload() {
            body.read_bytes_map()?
        } else {
            OrderedMap::new()
        };

        let message = decoder.decode(&mut body)?;
        if body.remaining() > 0 {
            trace!(
                opcode = %opcode,
                stream_id,
                leftover = body.remaining(),
                "frame body not fully consumed"
            );
        }

        Ok(Frame {
            version,
            stream_id,
            tracing,
            tracing_id,
            warnings,
            custom_payload,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::{Query, Startup, SupportedCodec};
    use crate::protocol::mock::MockWireBuf;
    use bytes::BytesMut;

    #[test]
    fn test_request_frame_roundtrip() {
        let client: FrameCodec<BytesMut> = FrameCodec::client(ProtocolVersion::V4);
        let server: FrameCodec<BytesMut> = FrameCodec::server(ProtocolVersion::V4);

        let frame = Frame::new(
            ProtocolVersion::V4,
            42,
            Message::Query(Query::new("SELECT * FROM system.local")),
        );
        let mut encoded = client.encode(&frame).unwrap();
        assert_eq!(
            WireBuf::remaining(&encoded),
            client.encoded_size(&frame).unwrap()
        );

        let decoded = server.decode(&mut encoded).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(WireBuf::remaining(&encoded), 0);
    }

    #[test]
    fn test_header_layout() {
        let client: FrameCodec<BytesMut> = FrameCodec::client(ProtocolVersion::V4);
        let frame = Frame::new(ProtocolVersion::V4, -1, Message::Options);
        let encoded = client.encode(&frame).unwrap();

        assert_eq!(encoded[0], 0x04); // request direction bit clear
        assert_eq!(encoded[1], 0x00); // no flags
        assert_eq!(&encoded[2..4], &(-1i16).to_be_bytes()[..]);
        assert_eq!(encoded[4], Opcode::Options.as_u8());
        assert_eq!(&encoded[5..9], &0i32.to_be_bytes()[..]);
        assert_eq!(encoded.len(), HEADER_SIZE);
    }

    #[test]
    fn test_response_carries_direction_bit_and_envelopes() {
        let server: FrameCodec<BytesMut> = FrameCodec::server(ProtocolVersion::V4);
        let client: FrameCodec<BytesMut> = FrameCodec::client(ProtocolVersion::V4);

        let mut frame = Frame::new(
            ProtocolVersion::V4,
            7,
            Message::Result(crate::protocol::message::ResultBody::Void),
        );
        frame.tracing_id = Some(Uuid::new_v4());
        frame.warnings = vec!["aggregation without partition key".into()];
        frame
            .custom_payload
            .insert("probe".into(), Some(Bytes::from_static(b"\x01")));

        let mut encoded = server.encode(&frame).unwrap();
        assert_eq!(encoded[0], 0x84);
        let flags = FrameFlags::from_u8(encoded[1]).unwrap();
        assert!(flags.has_tracing());
        assert!(flags.has_warnings());
        assert!(flags.has_custom_payload());

        let decoded = client.decode(&mut encoded).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_envelopes_rejected_in_v3() {
        let server: FrameCodec<BytesMut> = FrameCodec::server(ProtocolVersion::V3);
        let mut frame = Frame::new(
            ProtocolVersion::V3,
            0,
            Message::Result(crate::protocol::message::ResultBody::Void),
        );
        frame.warnings = vec!["nope".into()];
        assert!(matches!(
            server.encode(&frame),
            Err(CodecError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let client: FrameCodec<BytesMut> = FrameCodec::client(ProtocolVersion::V4);
        let frame = Frame::new(ProtocolVersion::V3, 0, Message::Options);
        assert!(client.encode(&frame).is_err());

        // decoding a v3 frame with a v4 codec fails on the version byte
        let v3_client: FrameCodec<BytesMut> = FrameCodec::client(ProtocolVersion::V3);
        let v4_server: FrameCodec<BytesMut> = FrameCodec::server(ProtocolVersion::V4);
        let mut encoded = v3_client
            .encode(&Frame::new(ProtocolVersion::V3, 0, Message::Options))
            .unwrap();
        assert!(matches!(
            v4_server.decode(&mut encoded),
            Err(CodecError::UnsupportedVersion { version: 0x03 })
        ));
    }

    #[test]
    fn test_unknown_opcode_rejected() {
        let server: FrameCodec<BytesMut> = FrameCodec::server(ProtocolVersion::V4);
        let mut buf = BytesMut::new();
        buf.write_u8(0x04);
        buf.write_u8(0x00);
        buf.write_u16(0);
        buf.write_u8(0x42);
        buf.write_i32(0);
        assert!(matches!(
            server.decode(&mut buf),
            Err(CodecError::UnknownOpcode { opcode: 0x42 })
        ));
    }

    #[test]
    fn test_truncated_body_rejected() {
        let server: FrameCodec<BytesMut> = FrameCodec::server(ProtocolVersion::V4);
        let mut buf = BytesMut::new();
        buf.write_u8(0x04);
        buf.write_u8(0x00);
        buf.write_u16(0);
        buf.write_u8(Opcode::Query.as_u8());
        buf.write_i32(100); // announces more than is present
        buf.write_slice(b"short");
        assert!(matches!(
            server.decode(&mut buf),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_works_over_the_mock_buffer() {
        let client: FrameCodec<MockWireBuf> = FrameCodec::client(ProtocolVersion::V4);
        let server: FrameCodec<MockWireBuf> = FrameCodec::server(ProtocolVersion::V4);

        let frame = Frame::new(
            ProtocolVersion::V4,
            1,
            Message::Startup(Startup::with_compression("lz4")),
        );
        let mut encoded = client.encode(&frame).unwrap();
        assert_eq!(server.decode(&mut encoded).unwrap(), frame);
    }

    #[cfg(feature = "lz4")]
    #[test]
    fn test_compressed_roundtrip() {
        use crate::protocol::compression::Lz4Compressor;

        let compressor = Arc::new(Lz4Compressor);
        let client: FrameCodec<BytesMut> =
            FrameCodec::builder(ProtocolVersion::V4, Direction::Client)
                .with_compressor(compressor.clone())
                .build()
                .unwrap();
        let server: FrameCodec<BytesMut> =
            FrameCodec::builder(ProtocolVersion::V4, Direction::Server)
                .with_compressor(compressor)
                .build()
                .unwrap();

        let frame = Frame::new(
            ProtocolVersion::V4,
            3,
            Message::Query(Query::new(
                "SELECT keyspace_name, table_name FROM system_schema.tables \
                 WHERE keyspace_name = 'system_schema'",
            )),
        );
        let mut encoded = client.encode(&frame).unwrap();
        assert!(FrameFlags::from_u8(encoded[1]).unwrap().is_compressed());
        assert_eq!(server.decode(&mut encoded).unwrap(), frame);
    }

    #[cfg(feature = "lz4")]
    #[test]
    fn test_startup_never_compressed() {
        use crate::protocol::compression::Lz4Compressor;

        let client: FrameCodec<BytesMut> =
            FrameCodec::builder(ProtocolVersion::V4, Direction::Client)
                .with_compressor(Arc::new(Lz4Compressor))
                .build()
                .unwrap();

        let frame = Frame::new(
            ProtocolVersion::V4,
            0,
            Message::Startup(Startup::with_compression("lz4")),
        );
        let encoded = client.encode(&frame).unwrap();
        assert!(!FrameFlags::from_u8(encoded[1]).unwrap().is_compressed());
    }

    #[test]
    fn test_compressed_flag_without_compressor_rejected() {
        let server: FrameCodec<BytesMut> = FrameCodec::server(ProtocolVersion::V4);
        let mut buf = BytesMut::new();
        buf.write_u8(0x04);
        buf.write_u8(FrameFlags::COMPRESSED);
        buf.write_u16(0);
        buf.write_u8(Opcode::Query.as_u8());
        buf.write_i32(0);
        assert!(matches!(
            server.decode(&mut buf),
            Err(CodecError::MissingCompressor)
        ));
    }

    #[test]
    fn test_custom_decoder_via_builder() {
        // a server that also decodes SUPPORTED (e.g. a proxy)
        let codec: FrameCodec<BytesMut> =
            FrameCodec::builder(ProtocolVersion::V4, Direction::Server)
                .with_decoder(Arc::new(SupportedCodec::new()))
                .build()
                .unwrap();

        let peer: FrameCodec<BytesMut> = FrameCodec::server(ProtocolVersion::V4);
        let frame = Frame::new(
            ProtocolVersion::V4,
            0,
            Message::Supported(crate::protocol::message::Supported::default()),
        );
        let mut encoded = peer.encode(&frame).unwrap();
        assert_eq!(codec.decode(&mut encoded).unwrap(), frame);
    }
}
