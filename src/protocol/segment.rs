//! v5 segment framing
//!
//! From v5 on (after STARTUP), frames travel inside self-delimiting
//! checksummed segments:
//!
//! ```text
//! +---------------+-------+---------------------+-------+
//! | packed header | crc24 | payload             | crc32 |
//! | 3 or 5 bytes  |   3   | <= 128 KiB - 1      |   4   |
//! +---------------+-------+---------------------+-------+
//! ```
//!
//! The packed header is little-endian (unlike the big-endian frame
//! body): 17 bits of payload length and a self-contained bit; with
//! compression enabled it widens to 5 bytes, adding 17 bits of
//! uncompressed length (0 means the payload was sent uncompressed).
//! CRC24 covers the packed header bytes, CRC32 covers the payload as
//! it appears on the wire. A self-contained segment holds one or more
//! complete frames; larger frames are sliced across consecutive
//! non-self-contained segments and reassembled by concatenation until
//! the inner frame header's length is satisfied. Either CRC failing is
//! fatal for the connection.
//!
//! This layer sits at the transport boundary and works on byte
//! buffers directly.

use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tracing::trace;

use super::compression::Compressor;
use super::error::{CodecError, Result};
use super::frame::HEADER_SIZE;

/// Maximum segment payload (17-bit length field)
pub const MAX_SEGMENT_PAYLOAD: usize = (1 << 17) - 1;

const UNCOMPRESSED_HEADER_SIZE: usize = 3;
const COMPRESSED_HEADER_SIZE: usize = 5;
const CRC24_SIZE: usize = 3;
const CRC32_SIZE: usize = 4;

const CRC24_INIT: u32 = 0x0087_5060;
const CRC24_POLY: u32 = 0x0197_4F0B;

/// CRC32 of a segment payload is seeded with this fixed prefix
const CRC32_INIT_BYTES: [u8; 4] = [0xFA, 0x2D, 0x55, 0xCA];

fn crc24(bytes: &[u8]) -> u32 {
    let mut crc = CRC24_INIT;
    for byte in bytes {
        crc ^= u32::from(*byte) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24_POLY;
            }
        }
    }
    crc & 0x00FF_FFFF
}

fn crc32(payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&CRC32_INIT_BYTES);
    hasher.update(payload);
    hasher.finalize()
}

/// One segment: a payload slice and whether it is self-contained
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Uncompressed segment payload
    pub payload: BytesMut,
    /// Whether the payload holds only complete frames
    pub self_contained: bool,
}

impl Segment {
    /// Slice encoded frame bytes into segments: one self-contained
    /// segment when they fit, a run of slices otherwise
    #[must_use]
    pub fn wrap(mut frames: BytesMut) -> Vec<Self> {
        if frames.len() <= MAX_SEGMENT_PAYLOAD {
            return vec![Self {
                payload: frames,
                self_contained: true,
            }];
        }
        let mut slices = Vec::with_capacity(frames.len() / MAX_SEGMENT_PAYLOAD + 1);
        while !frames.is_empty() {
            let take = frames.len().min(MAX_SEGMENT_PAYLOAD);
            slices.push(Self {
                payload: frames.split_to(take),
                self_contained: false,
            });
        }
        slices
    }
}

/// Segment encoder/decoder, optionally compressing payloads
#[derive(Default)]
pub struct SegmentCodec {
    compressor: Option<Arc<dyn Compressor<BytesMut>>>,
}

impl SegmentCodec {
    /// Codec for uncompressed segments
    #[must_use]
    pub fn new() -> Self {
        Self { compressor: None }
    }

    /// Codec compressing payloads with the negotiated algorithm
    #[must_use]
    pub fn with_compressor(compressor: Arc<dyn Compressor<BytesMut>>) -> Self {
        Self {
            compressor: Some(compressor),
        }
    }

    fn header_size(&self) -> usize {
        if self.compressor.is_some() {
            COMPRESSED_HEADER_SIZE
        } else {
            UNCOMPRESSED_HEADER_SIZE
        }
    }

    /// Encode one segment, appending to `dst`
    pub fn encode(&self, segment: Segment, dst: &mut BytesMut) -> Result<()> {
        let uncompressed_len = segment.payload.len();
        if uncompressed_len > MAX_SEGMENT_PAYLOAD {
            return Err(CodecError::SegmentTooLarge {
                size: uncompressed_len,
                max: MAX_SEGMENT_PAYLOAD,
            });
        }

        let header_size = self.header_size();
        let (payload, header_value) = match &self.compressor {
            None => {
                let mut value = uncompressed_len as u64;
                if segment.self_contained {
                    value |= 1 << 17;
                }
                (segment.payload, value)
            }
            Some(compressor) => {
                let compressed = compressor.compress_raw(segment.payload.clone())?;
                // an incompressible payload travels as-is, signalled by
                // an uncompressed-length field of zero
                let (payload, uncompressed_field) = if compressed.len() < uncompressed_len {
                    (compressed, uncompressed_len as u64)
                } else {
                    (segment.payload, 0)
                };
                let mut value = payload.len() as u64 | (uncompressed_field << 17);
                if segment.self_contained {
                    value |= 1 << 34;
                }
                (payload, value)
            }
        };

        let header_bytes = &header_value.to_le_bytes()[..header_size];
        dst.extend_from_slice(header_bytes);
        dst.extend_from_slice(&crc24(header_bytes).to_le_bytes()[..CRC24_SIZE]);
        dst.extend_from_slice(&payload);
        dst.extend_from_slice(&crc32(&payload).to_le_bytes());
        Ok(())
    }

    /// Decode one segment from `src`.
    ///
    /// Returns `Ok(None)` when the buffer does not yet hold a complete
    /// segment; CRC failures are fatal errors.
    pub fn decode(&self, src: &mut BytesMut) -> Result<Option<Segment>> {
        let header_size = self.header_size();
        if src.len() < header_size + CRC24_SIZE {
            return Ok(None);
        }

        let header_bytes = &src[..header_size];
        let mut value = [0u8; 8];
        value[..header_size].copy_from_slice(header_bytes);
        let header_value = u64::from_le_bytes(value);

        let mut crc_bytes = [0u8; 4];
        crc_bytes[..CRC24_SIZE].copy_from_slice(&src[header_size..header_size + CRC24_SIZE]);
        let expected_crc24 = u32::from_le_bytes(crc_bytes);
        let actual_crc24 = crc24(header_bytes);
        if actual_crc24 != expected_crc24 {
            return Err(CodecError::HeaderCrcMismatch {
                expected: expected_crc24,
                actual: actual_crc24,
            });
        }

        let (wire_len, uncompressed_len, self_contained) = if self.compressor.is_some() {
            (
                (header_value & 0x1FFFF) as usize,
                ((header_value >> 17) & 0x1FFFF) as usize,
                header_value & (1 << 34) != 0,
            )
        } else {
            ((header_value & 0x1FFFF) as usize, 0, header_value & (1 << 17) != 0)
        };

        let total = header_size + CRC24_SIZE + wire_len + CRC32_SIZE;
        if src.len() < total {
            return Ok(None);
        }

        src.advance(header_size + CRC24_SIZE);
        let payload = src.split_to(wire_len);
        let mut crc_bytes = [0u8; CRC32_SIZE];
        crc_bytes.copy_from_slice(&src[..CRC32_SIZE]);
        src.advance(CRC32_SIZE);
        let expected_crc32 = u32::from_le_bytes(crc_bytes);
        let actual_crc32 = crc32(&payload);
        if actual_crc32 != expected_crc32 {
            return Err(CodecError::PayloadCrcMismatch {
                expected: expected_crc32,
                actual: actual_crc32,
            });
        }

        let payload = match &self.compressor {
            Some(compressor) if uncompressed_len > 0 => {
                compressor.decompress_raw(payload, uncompressed_len)?
            }
            _ => payload,
        };

        Ok(Some(Segment {
            payload,
            self_contained,
        }))
    }
}

/// Reassembles frames from a stream of decoded segments
#[derive(Debug, Default)]
pub struct SegmentAccumulator {
    pending: BytesMut,
}

impl SegmentAccumulator {
    /// Create an empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one segment; returns the complete frames it finished
    pub fn push(&mut self, segment: Segment) -> Result<Vec<BytesMut>> {
        if segment.self_contained {
            if !self.pending.is_empty() {
                return Err(CodecError::invalid(
                    "self-contained segment arrived inside a sliced frame",
                ));
            }
            return split_frames(segment.payload);
        }

        self.pending.extend_from_slice(&segment.payload);
        if let Some(total) = frame_length(&self.pending) {
            if self.pending.len() >= total {
                let frame = self.pending.split_to(total);
                if !self.pending.is_empty() {
                    return Err(CodecError::invalid(
                        "sliced frame carried trailing bytes past the frame boundary",
                    ));
                }
                return Ok(vec![frame]);
            }
        }
        trace!(pending = self.pending.len(), "frame slice buffered");
        Ok(Vec::new())
    }
}

fn frame_length(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < HEADER_SIZE {
        return None;
    }
    let body_len = i32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
    if body_len < 0 {
        return None;
    }
    Some(HEADER_SIZE + body_len as usize)
}

fn split_frames(mut payload: BytesMut) -> Result<Vec<BytesMut>> {
    let mut frames = Vec::new();
    while !payload.is_empty() {
        let Some(total) = frame_length(&payload) else {
            return Err(CodecError::Truncated {
                needed: HEADER_SIZE,
                remaining: payload.len(),
            });
        };
        if payload.len() < total {
            return Err(CodecError::Truncated {
                needed: total,
                remaining: payload.len(),
            });
        }
        frames.push(payload.split_to(total));
    }
    Ok(frames)
}
