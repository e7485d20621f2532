//! Body compression adapters
//!
//! The codec core only knows the [`Compressor`] contract; concrete
//! algorithms live behind cargo features so hosts pull in exactly the
//! codecs they negotiate. Compression always applies to the frame body
//! (envelopes included), never to the nine-byte header.
//!
//! Two wire conventions exist. Pre-v5 frame bodies are self-describing:
//! lz4 prepends the uncompressed length as a big-endian `[int]`, snappy
//! embeds it in its own format. v5 segments carry the uncompressed
//! length in the segment header instead, so the segment layer uses the
//! `*_raw` methods.

#[allow(unused_imports)]
use super::error::CodecError;
use super::error::Result;

#[cfg(feature = "lz4")]
use bytes::{Buf, BufMut, BytesMut};
#[cfg(all(feature = "snappy", not(feature = "lz4")))]
use bytes::{BufMut, BytesMut};

/// Wraps and unwraps frame bodies for one negotiated algorithm.
///
/// Parametric over the buffer handle like every codec in this crate;
/// the bundled implementations cover `BytesMut`.
pub trait Compressor<B>: Send + Sync {
    /// Algorithm name as negotiated in STARTUP (`lz4`, `snappy`)
    fn algorithm(&self) -> &'static str;

    /// Compress a pre-v5 frame body (self-describing output)
    fn compress(&self, body: B) -> Result<B>;

    /// Decompress a pre-v5 frame body
    fn decompress(&self, body: B) -> Result<B>;

    /// Compress a v5 segment payload (no embedded length)
    fn compress_raw(&self, payload: B) -> Result<B>;

    /// Decompress a v5 segment payload whose uncompressed length is
    /// carried by the segment header
    fn decompress_raw(&self, payload: B, uncompressed_len: usize) -> Result<B>;
}

#[cfg(any(feature = "lz4", feature = "snappy"))]
fn adapter_error(err: impl std::error::Error + Send + Sync + 'static) -> CodecError {
    CodecError::Compression(Box::new(err))
}

/// LZ4 block compression with a big-endian length prefix
#[cfg(feature = "lz4")]
#[derive(Debug, Default, Clone, Copy)]
pub struct Lz4Compressor;

#[cfg(feature = "lz4")]
impl Compressor<BytesMut> for Lz4Compressor {
    fn algorithm(&self) -> &'static str {
        "lz4"
    }

    fn compress(&self, body: BytesMut) -> Result<BytesMut> {
        let compressed = lz4_flex::block::compress(&body);
        let mut out = BytesMut::with_capacity(4 + compressed.len());
        out.put_i32(body.len() as i32);
        out.put_slice(&compressed);
        Ok(out)
    }

    fn decompress(&self, mut body: BytesMut) -> Result<BytesMut> {
        if body.len() < 4 {
            return Err(CodecError::Truncated {
                needed: 4,
                remaining: body.len(),
            });
        }
        let uncompressed_len = body.get_i32();
        if uncompressed_len < 0 {
            return Err(CodecError::NegativeLength {
                length: uncompressed_len,
            });
        }
        self.decompress_raw(body, uncompressed_len as usize)
    }

    fn compress_raw(&self, payload: BytesMut) -> Result<BytesMut> {
        Ok(BytesMut::from(&lz4_flex::block::compress(&payload)[..]))
    }

    fn decompress_raw(&self, payload: BytesMut, uncompressed_len: usize) -> Result<BytesMut> {
        let decompressed =
            lz4_flex::block::decompress(&payload, uncompressed_len).map_err(adapter_error)?;
        Ok(BytesMut::from(&decompressed[..]))
    }
}

/// Snappy raw-block compression
#[cfg(feature = "snappy")]
#[derive(Debug, Default)]
pub struct SnappyCompressor;

#[cfg(feature = "snappy")]
impl Compressor<BytesMut> for SnappyCompressor {
    fn algorithm(&self) -> &'static str {
        "snappy"
    }

    fn compress(&self, body: BytesMut) -> Result<BytesMut> {
        let compressed = snap::raw::Encoder::new()
            .compress_vec(&body)
            .map_err(adapter_error)?;
        let mut out = BytesMut::with_capacity(compressed.len());
        out.put_slice(&compressed);
        Ok(out)
    }

    fn decompress(&self, body: BytesMut) -> Result<BytesMut> {
        let decompressed = snap::raw::Decoder::new()
            .decompress_vec(&body)
            .map_err(adapter_error)?;
        Ok(BytesMut::from(&decompressed[..]))
    }

    fn compress_raw(&self, payload: BytesMut) -> Result<BytesMut> {
        self.compress(payload)
    }

    fn decompress_raw(&self, payload: BytesMut, uncompressed_len: usize) -> Result<BytesMut> {
        let decompressed = self.decompress(payload)?;
        if decompressed.len() != uncompressed_len {
            return Err(CodecError::Truncated {
                needed: uncompressed_len,
                remaining: decompressed.len(),
            });
        }
        Ok(decompressed)
    }
}
