//! Buffer-agnostic primitive layer
//!
//! Every codec in this crate reads and writes through [`WireBuf`], a
//! capability trait over an opaque buffer handle. The handle carries its
//! own position and bounds; codecs never see a concrete buffer type. The
//! network implementation is [`bytes::BytesMut`]; codec tests use the
//! token-recording [`MockWireBuf`](crate::protocol::mock::MockWireBuf).
//!
//! Wire primitives (big-endian throughout):
//!
//! ```text
//! [short]        unsigned 16-bit
//! [int]          signed 32-bit
//! [long]         signed 64-bit
//! [string]       [short] length + UTF-8 bytes
//! [long string]  [int] length + UTF-8 bytes
//! [bytes]        [int] length + bytes, length -1 encodes null
//! [short bytes]  [short] length + bytes
//! [uuid]         16 bytes
//! [inet]         length byte (4|16) + address + [int] port
//! [inetaddr]     length byte (4|16) + address, no port
//! ```
//!
//! Every write has a size function in [`sizes`] that must agree with it
//! byte-for-byte.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

use super::collection::OrderedMap;
use super::error::{CodecError, Result};

/// Capability interface over an opaque buffer handle.
///
/// Required methods are the raw byte operations a backend must supply;
/// the wire primitives are provided on top of them. A backend that does
/// not store raw bytes (like the mock token buffer) overrides the
/// provided methods instead.
pub trait WireBuf: Sized {
    /// Bytes (or token-equivalent bytes) left to read
    fn remaining(&self) -> usize;

    /// Allocate a fresh buffer for an encode pass
    fn allocate(capacity: usize) -> Self;

    /// Read one byte
    fn read_u8(&mut self) -> Result<u8>;

    /// Read `len` raw bytes
    fn read_slice(&mut self, len: usize) -> Result<Bytes>;

    /// Split off the next `len` bytes as a buffer of the same type,
    /// without copying the content
    fn read_retained(&mut self, len: usize) -> Result<Self>;

    /// Write one byte
    fn write_u8(&mut self, value: u8);

    /// Write raw bytes
    fn write_slice(&mut self, value: &[u8]);

    /// Append the readable content of another buffer of the same type
    fn write_retained(&mut self, src: &Self);

    /// Read an unsigned `[short]`
    fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_slice(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Write an unsigned `[short]`
    fn write_u16(&mut self, value: u16) {
        self.write_slice(&value.to_be_bytes());
    }

    /// Read a signed `[int]`
    fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.read_slice(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Write a signed `[int]`
    fn write_i32(&mut self, value: i32) {
        self.write_slice(&value.to_be_bytes());
    }

    /// Read a signed `[long]`
    fn read_i64(&mut self) -> Result<i64> {
        let bytes = self.read_slice(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes);
        Ok(i64::from_be_bytes(raw))
    }

    /// Write a signed `[long]`
    fn write_i64(&mut self, value: i64) {
        self.write_slice(&value.to_be_bytes());
    }

    /// Read a `[string]`
    fn read_string(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_slice(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    /// Write a `[string]`
    fn write_string(&mut self, value: &str) {
        self.write_u16(value.len() as u16);
        self.write_slice(value.as_bytes());
    }

    /// Read a `[long string]`
    fn read_long_string(&mut self) -> Result<String> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(CodecError::NegativeLength { length: len });
        }
        let bytes = self.read_slice(len as usize)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    /// Write a `[long string]`
    fn write_long_string(&mut self, value: &str) {
        self.write_i32(value.len() as i32);
        self.write_slice(value.as_bytes());
    }

    /// Read `[bytes]`; any negative length decodes to null
    fn read_bytes(&mut self) -> Result<Option<Bytes>> {
        let len = self.read_i32()?;
        if len < 0 {
            return Ok(None);
        }
        Ok(Some(self.read_slice(len as usize)?))
    }

    /// Write `[bytes]`; null encodes as length -1
    fn write_bytes(&mut self, value: Option<&[u8]>) {
        match value {
            Some(bytes) => {
                self.write_i32(bytes.len() as i32);
                self.write_slice(bytes);
            }
            None => self.write_i32(-1),
        }
    }

    /// Read `[short bytes]`
    fn read_short_bytes(&mut self) -> Result<Bytes> {
        let len = self.read_u16()? as usize;
        self.read_slice(len)
    }

    /// Write `[short bytes]`
    fn write_short_bytes(&mut self, value: &[u8]) {
        self.write_u16(value.len() as u16);
        self.write_slice(value);
    }

    /// Read a `[uuid]`
    fn read_uuid(&mut self) -> Result<Uuid> {
        let bytes = self.read_slice(16)?;
        let mut raw = [0u8; 16];
        raw.copy_from_slice(&bytes);
        Ok(Uuid::from_bytes(raw))
    }

    /// Write a `[uuid]`
    fn write_uuid(&mut self, value: Uuid) {
        self.write_slice(value.as_bytes());
    }

    /// Read an `[inetaddr]` (no port)
    fn read_inetaddr(&mut self) -> Result<IpAddr> {
        let len = self.read_u8()? as usize;
        match len {
            4 => {
                let bytes = self.read_slice(4)?;
                let mut octets = [0u8; 4];
                octets.copy_from_slice(&bytes);
                Ok(IpAddr::V4(Ipv4Addr::from(octets)))
            }
            16 => {
                let bytes = self.read_slice(16)?;
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&bytes);
                Ok(IpAddr::V6(Ipv6Addr::from(octets)))
            }
            other => Err(CodecError::InvalidInetLength { length: other }),
        }
    }

    /// Write an `[inetaddr]` (no port)
    fn write_inetaddr(&mut self, value: &IpAddr) {
        match value {
            IpAddr::V4(v4) => {
                self.write_u8(4);
                self.write_slice(&v4.octets());
            }
            IpAddr::V6(v6) => {
                self.write_u8(16);
                self.write_slice(&v6.octets());
            }
        }
    }

    /// Read an `[inet]` (address + port)
    fn read_inet(&mut self) -> Result<SocketAddr> {
        let ip = self.read_inetaddr()?;
        let port = self.read_i32()?;
        Ok(SocketAddr::new(ip, port as u16))
    }

    /// Write an `[inet]` (address + port)
    fn write_inet(&mut self, value: &SocketAddr) {
        self.write_inetaddr(&value.ip());
        self.write_i32(i32::from(value.port()));
    }

    /// Read a `[string list]`
    fn read_string_list(&mut self) -> Result<Vec<String>> {
        let count = self.read_u16()? as usize;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(self.read_string()?);
        }
        Ok(items)
    }

    /// Write a `[string list]`
    fn write_string_list(&mut self, values: &[String]) {
        self.write_u16(values.len() as u16);
        for value in values {
            self.write_string(value);
        }
    }

    /// Read a `[string map]`
    fn read_string_map(&mut self) -> Result<OrderedMap<String, String>> {
        let count = self.read_u16()? as usize;
        let mut map = OrderedMap::with_capacity(count);
        for _ in 0..count {
            let key = self.read_string()?;
            let value = self.read_string()?;
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Write a `[string map]`
    fn write_string_map(&mut self, map: &OrderedMap<String, String>) {
        self.write_u16(map.len() as u16);
        for (key, value) in map.iter() {
            self.write_string(key);
            self.write_string(value);
        }
    }

    /// Read a `[string multimap]`
    fn read_string_multimap(&mut self) -> Result<OrderedMap<String, Vec<String>>> {
        let count = self.read_u16()? as usize;
        let mut map = OrderedMap::with_capacity(count);
        for _ in 0..count {
            let key = self.read_string()?;
            let values = self.read_string_list()?;
            map.insert(key, values);
        }
        Ok(map)
    }

    /// Write a `[string multimap]`
    fn write_string_multimap(&mut self, map: &OrderedMap<String, Vec<String>>) {
        self.write_u16(map.len() as u16);
        for (key, values) in map.iter() {
            self.write_string(key);
            self.write_string_list(values);
        }
    }

    /// Read a `[bytes map]`; null values are preserved
    fn read_bytes_map(&mut self) -> Result<OrderedMap<String, Option<Bytes>>> {
        let count = self.read_u16()? as usize;
        let mut map = OrderedMap::with_capacity(count);
        for _ in 0..count {
            let key = self.read_string()?;
            let value = self.read_bytes()?;
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Write a `[bytes map]`
    fn write_bytes_map(&mut self, map: &OrderedMap<String, Option<Bytes>>) {
        self.write_u16(map.len() as u16);
        for (key, value) in map.iter() {
            self.write_string(key);
            self.write_bytes(value.as_deref());
        }
    }
}

impl WireBuf for BytesMut {
    fn remaining(&self) -> usize {
        self.len()
    }

    fn allocate(capacity: usize) -> Self {
        BytesMut::with_capacity(capacity)
    }

    fn read_u8(&mut self) -> Result<u8> {
        if self.is_empty() {
            return Err(CodecError::Truncated {
                needed: 1,
                remaining: 0,
            });
        }
        Ok(self.get_u8())
    }

    fn read_slice(&mut self, len: usize) -> Result<Bytes> {
        if self.len() < len {
            return Err(CodecError::Truncated {
                needed: len,
                remaining: self.len(),
            });
        }
        Ok(self.split_to(len).freeze())
    }

    fn read_retained(&mut self, len: usize) -> Result<Self> {
        if self.len() < len {
            return Err(CodecError::Truncated {
                needed: len,
                remaining: self.len(),
            });
        }
        Ok(self.split_to(len))
    }

    fn write_u8(&mut self, value: u8) {
        self.put_u8(value);
    }

    fn write_slice(&mut self, value: &[u8]) {
        self.put_slice(value);
    }

    fn write_retained(&mut self, src: &Self) {
        self.put_slice(src);
    }
}

/// Exact byte counts for every wire primitive.
///
/// Each function here is the size-accounting pair of the corresponding
/// [`WireBuf`] write; the two must agree for every input.
pub mod sizes {
    use std::net::{IpAddr, SocketAddr};

    use bytes::Bytes;

    use crate::protocol::collection::OrderedMap;

    /// Size of a `[byte]`
    pub const BYTE: usize = 1;
    /// Size of a `[short]`
    pub const SHORT: usize = 2;
    /// Size of an `[int]`
    pub const INT: usize = 4;
    /// Size of a `[long]`
    pub const LONG: usize = 8;
    /// Size of a `[uuid]`
    pub const UUID: usize = 16;

    /// Size of a `[string]`
    #[must_use]
    pub fn of_string(value: &str) -> usize {
        SHORT + value.len()
    }

    /// Size of a `[long string]`
    #[must_use]
    pub fn of_long_string(value: &str) -> usize {
        INT + value.len()
    }

    /// Size of `[bytes]`
    #[must_use]
    pub fn of_bytes(value: Option<&[u8]>) -> usize {
        INT + value.map_or(0, <[u8]>::len)
    }

    /// Size of `[short bytes]`
    #[must_use]
    pub fn of_short_bytes(value: &[u8]) -> usize {
        SHORT + value.len()
    }

    /// Size of an `[inetaddr]` (no port)
    #[must_use]
    pub fn of_inetaddr(value: &IpAddr) -> usize {
        BYTE + match value {
            IpAddr::V4(_) => 4,
            IpAddr::V6(_) => 16,
        }
    }

    /// Size of an `[inet]` (address + port)
    #[must_use]
    pub fn of_inet(value: &SocketAddr) -> usize {
        of_inetaddr(&value.ip()) + INT
    }

    /// Size of a `[string list]`
    #[must_use]
    pub fn of_string_list(values: &[String]) -> usize {
        SHORT + values.iter().map(|v| of_string(v)).sum::<usize>()
    }

    /// Size of a `[string map]`
    #[must_use]
    pub fn of_string_map(map: &OrderedMap<String, String>) -> usize {
        SHORT
            + map
                .iter()
                .map(|(k, v)| of_string(k) + of_string(v))
                .sum::<usize>()
    }

    /// Size of a `[string multimap]`
    #[must_use]
    pub fn of_string_multimap(map: &OrderedMap<String, Vec<String>>) -> usize {
        SHORT
            + map
                .iter()
                .map(|(k, v)| of_string(k) + of_string_list(v))
                .sum::<usize>()
    }

    /// Size of a `[bytes map]`
    #[must_use]
    pub fn of_bytes_map(map: &OrderedMap<String, Option<Bytes>>) -> usize {
        SHORT
            + map
                .iter()
                .map(|(k, v)| of_string(k) + of_bytes(v.as_deref()))
                .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_buf() -> BytesMut {
        BytesMut::new()
    }

    #[test]
    fn test_integer_roundtrip() {
        let mut buf = roundtrip_buf();
        buf.write_u8(0xAB);
        buf.write_u16(0xCAFE);
        buf.write_i32(-42);
        buf.write_i64(i64::MIN);

        assert_eq!(buf.read_u8().unwrap(), 0xAB);
        assert_eq!(buf.read_u16().unwrap(), 0xCAFE);
        assert_eq!(buf.read_i32().unwrap(), -42);
        assert_eq!(buf.read_i64().unwrap(), i64::MIN);
        assert_eq!(WireBuf::remaining(&buf), 0);
    }

    #[test]
    fn test_string_roundtrip_and_size() {
        let mut buf = roundtrip_buf();
        buf.write_string("keyspace");
        assert_eq!(WireBuf::remaining(&buf), sizes::of_string("keyspace"));
        assert_eq!(buf.read_string().unwrap(), "keyspace");
    }

    #[test]
    fn test_long_string_negative_length() {
        let mut buf = roundtrip_buf();
        buf.write_i32(-3);
        assert!(matches!(
            buf.read_long_string(),
            Err(CodecError::NegativeLength { length: -3 })
        ));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut buf = roundtrip_buf();
        buf.write_u16(2);
        buf.write_slice(&[0xFF, 0xFE]);
        assert!(matches!(buf.read_string(), Err(CodecError::InvalidUtf8)));
    }

    #[test]
    fn test_bytes_null_sentinel() {
        let mut buf = roundtrip_buf();
        buf.write_bytes(None);
        buf.write_bytes(Some(b""));
        buf.write_bytes(Some(b"xy"));

        assert_eq!(buf.read_bytes().unwrap(), None);
        assert_eq!(buf.read_bytes().unwrap(), Some(Bytes::new()));
        assert_eq!(buf.read_bytes().unwrap(), Some(Bytes::from_static(b"xy")));
    }

    #[test]
    fn test_uuid_roundtrip() {
        let id = Uuid::new_v4();
        let mut buf = roundtrip_buf();
        buf.write_uuid(id);
        assert_eq!(WireBuf::remaining(&buf), sizes::UUID);
        assert_eq!(buf.read_uuid().unwrap(), id);
    }

    #[test]
    fn test_inet_roundtrip() {
        let v4: SocketAddr = "127.0.0.1:9042".parse().unwrap();
        let v6: SocketAddr = "[::1]:9042".parse().unwrap();

        for addr in [v4, v6] {
            let mut buf = roundtrip_buf();
            buf.write_inet(&addr);
            assert_eq!(WireBuf::remaining(&buf), sizes::of_inet(&addr));
            assert_eq!(buf.read_inet().unwrap(), addr);
        }
    }

    #[test]
    fn test_inetaddr_invalid_length() {
        let mut buf = roundtrip_buf();
        buf.write_u8(7);
        buf.write_slice(&[0; 7]);
        assert!(matches!(
            buf.read_inetaddr(),
            Err(CodecError::InvalidInetLength { length: 7 })
        ));
    }

    #[test]
    fn test_empty_collections() {
        let mut buf = roundtrip_buf();
        buf.write_string_list(&[]);
        assert_eq!(WireBuf::remaining(&buf), sizes::SHORT);
        assert!(buf.read_string_list().unwrap().is_empty());

        let mut buf = roundtrip_buf();
        buf.write_string_map(&OrderedMap::new());
        assert_eq!(WireBuf::remaining(&buf), sizes::SHORT);
        assert!(buf.read_string_map().unwrap().is_empty());
    }

    #[test]
    fn test_string_multimap_roundtrip() {
        let mut map = OrderedMap::new();
        map.insert("CQL_VERSION".to_string(), vec!["3.0.0".to_string()]);
        map.insert(
            "COMPRESSION".to_string(),
            vec!["lz4".to_string(), "snappy".to_string()],
        );

        let mut buf = roundtrip_buf();
        buf.write_string_multimap(&map);
        assert_eq!(WireBuf::remaining(&buf), sizes::of_string_multimap(&map));
        assert_eq!(buf.read_string_multimap().unwrap(), map);
    }

    #[test]
    fn test_bytes_map_preserves_nulls() {
        let mut map = OrderedMap::new();
        map.insert("a".to_string(), Some(Bytes::from_static(b"1")));
        map.insert("b".to_string(), None);

        let mut buf = roundtrip_buf();
        buf.write_bytes_map(&map);
        assert_eq!(WireBuf::remaining(&buf), sizes::of_bytes_map(&map));
        assert_eq!(buf.read_bytes_map().unwrap(), map);
    }

    #[test]
    fn test_truncated_read() {
        let mut buf = roundtrip_buf();
        buf.write_u16(10);
        buf.write_slice(b"abc");
        assert!(matches!(
            buf.read_string(),
            Err(CodecError::Truncated {
                needed: 10,
                remaining: 3
            })
        ));
    }

    #[test]
    fn test_read_retained_splits() {
        let mut buf = roundtrip_buf();
        buf.write_slice(b"headbody");
        let mut head = buf.read_retained(4).unwrap();
        assert_eq!(head.read_slice(4).unwrap(), Bytes::from_static(b"head"));
        assert_eq!(buf.read_slice(4).unwrap(), Bytes::from_static(b"body"));
    }
}
