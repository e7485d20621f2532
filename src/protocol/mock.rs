//! Token-recording buffer for codec tests
//!
//! [`MockWireBuf`] implements [`WireBuf`] over an ordered sequence of
//! typed tokens instead of raw bytes. Tests build the expected wire
//! content with the chaining constructors and compare buffers for
//! equality, which pins down the logical layout of an encoding without
//! asserting on raw byte dumps. It exists alongside the `BytesMut`
//! implementation as the second canonical buffer backend.

use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};

use bytes::Bytes;
use uuid::Uuid;

use super::error::{CodecError, Result};
use super::primitive::{sizes, WireBuf};

/// One typed wire primitive recorded by [`MockWireBuf`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `[byte]`
    Byte(u8),
    /// `[short]`
    Short(u16),
    /// `[int]`
    Int(i32),
    /// `[long]`
    Long(i64),
    /// `[string]`
    String(String),
    /// `[long string]`
    LongString(String),
    /// `[bytes]`
    Bytes(Option<Bytes>),
    /// `[short bytes]`
    ShortBytes(Bytes),
    /// `[uuid]`
    Uuid(Uuid),
    /// `[inet]`
    Inet(SocketAddr),
    /// `[inetaddr]`
    InetAddr(IpAddr),
    /// Raw untyped bytes
    Raw(Bytes),
}

impl Token {
    /// Bytes this token would occupy on the wire
    #[must_use]
    pub fn wire_size(&self) -> usize {
        match self {
            Self::Byte(_) => sizes::BYTE,
            Self::Short(_) => sizes::SHORT,
            Self::Int(_) => sizes::INT,
            Self::Long(_) => sizes::LONG,
            Self::String(s) => sizes::of_string(s),
            Self::LongString(s) => sizes::of_long_string(s),
            Self::Bytes(b) => sizes::of_bytes(b.as_deref()),
            Self::ShortBytes(b) => sizes::of_short_bytes(b),
            Self::Uuid(_) => sizes::UUID,
            Self::Inet(addr) => sizes::of_inet(addr),
            Self::InetAddr(ip) => sizes::of_inetaddr(ip),
            Self::Raw(b) => b.len(),
        }
    }
}

/// Ordered token sequence implementing [`WireBuf`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockWireBuf {
    tokens: VecDeque<Token>,
}

impl MockWireBuf {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `[byte]` token
    #[must_use]
    pub fn byte(mut self, value: u8) -> Self {
        self.tokens.push_back(Token::Byte(value));
        self
    }

    /// Append a `[short]` token
    #[must_use]
    pub fn short(mut self, value: u16) -> Self {
        self.tokens.push_back(Token::Short(value));
        self
    }

    /// Append an `[int]` token
    #[must_use]
    pub fn int(mut self, value: i32) -> Self {
        self.tokens.push_back(Token::Int(value));
        self
    }

    /// Append a `[long]` token
    #[must_use]
    pub fn long(mut self, value: i64) -> Self {
        self.tokens.push_back(Token::Long(value));
        self
    }

    /// Append a `[string]` token
    #[must_use]
    pub fn string(mut self, value: &str) -> Self {
        self.tokens.push_back(Token::String(value.into()));
        self
    }

    /// Append a `[long string]` token
    #[must_use]
    pub fn long_string(mut self, value: &str) -> Self {
        self.tokens.push_back(Token::LongString(value.into()));
        self
    }

    /// Append a `[bytes]` token
    #[must_use]
    pub fn bytes(mut self, value: Option<&[u8]>) -> Self {
        self.tokens
            .push_back(Token::Bytes(value.map(|b| Bytes::copy_from_slice(b))));
        self
    }

    /// Append a `[short bytes]` token
    #[must_use]
    pub fn short_bytes(mut self, value: &[u8]) -> Self {
        self.tokens
            .push_back(Token::ShortBytes(Bytes::copy_from_slice(value)));
        self
    }

    /// Append a `[uuid]` token
    #[must_use]
    pub fn uuid(mut self, value: Uuid) -> Self {
        self.tokens.push_back(Token::Uuid(value));
        self
    }

    /// Append an `[inet]` token
    #[must_use]
    pub fn inet(mut self, value: SocketAddr) -> Self {
        self.tokens.push_back(Token::Inet(value));
        self
    }

    /// Append an `[inetaddr]` token
    #[must_use]
    pub fn inetaddr(mut self, value: IpAddr) -> Self {
        self.tokens.push_back(Token::InetAddr(value));
        self
    }

    /// Append a raw byte token
    #[must_use]
    pub fn raw(mut self, value: &[u8]) -> Self {
        self.tokens
            .push_back(Token::Raw(Bytes::copy_from_slice(value)));
        self
    }

    /// Tokens still unread, in order
    #[must_use]
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }

    fn pop(&mut self, expected: &'static str) -> Result<Token> {
        self.tokens.pop_front().ok_or_else(|| {
            CodecError::invalid(format!("mock buffer exhausted, expected {expected}"))
        })
    }

    fn mismatch(expected: &'static str, found: &Token) -> CodecError {
        CodecError::invalid(format!("mock buffer: expected {expected}, found {found:?}"))
    }
}

impl WireBuf for MockWireBuf {
    fn remaining(&self) -> usize {
        self.tokens.iter().map(Token::wire_size).sum()
    }

    fn allocate(_capacity: usize) -> Self {
        Self::new()
    }

    fn read_u8(&mut self) -> Result<u8> {
        match self.pop("byte")? {
            Token::Byte(value) => Ok(value),
            other => Err(Self::mismatch("byte", &other)),
        }
    }

    fn read_slice(&mut self, len: usize) -> Result<Bytes> {
        match self.pop("raw")? {
            Token::Raw(bytes) if bytes.len() == len => Ok(bytes),
            other => Err(Self::mismatch("raw", &other)),
        }
    }

    fn read_retained(&mut self, len: usize) -> Result<Self> {
        let mut taken = VecDeque::new();
        let mut size = 0usize;
        while size < len {
            let Some(token) = self.tokens.pop_front() else {
                return Err(CodecError::Truncated {
                    needed: len,
                    remaining: size,
                });
            };
            size += token.wire_size();
            taken.push_back(token);
        }
        if size != len {
            return Err(CodecError::invalid(format!(
                "mock buffer: split at {len} lands inside a token (reached {size})"
            )));
        }
        Ok(Self { tokens: taken })
    }

    fn write_u8(&mut self, value: u8) {
        self.tokens.push_back(Token::Byte(value));
    }

    fn write_slice(&mut self, value: &[u8]) {
        self.tokens
            .push_back(Token::Raw(Bytes::copy_from_slice(value)));
    }

    fn write_retained(&mut self, src: &Self) {
        self.tokens.extend(src.tokens.iter().cloned());
    }

    fn read_u16(&mut self) -> Result<u16> {
        match self.pop("short")? {
            Token::Short(value) => Ok(value),
            other => Err(Self::mismatch("short", &other)),
        }
    }

    fn write_u16(&mut self, value: u16) {
        self.tokens.push_back(Token::Short(value));
    }

    fn read_i32(&mut self) -> Result<i32> {
        match self.pop("int")? {
            Token::Int(value) => Ok(value),
            other => Err(Self::mismatch("int", &other)),
        }
    }

    fn write_i32(&mut self, value: i32) {
        self.tokens.push_back(Token::Int(value));
    }

    fn read_i64(&mut self) -> Result<i64> {
        match self.pop("long")? {
            Token::Long(value) => Ok(value),
            other => Err(Self::mismatch("long", &other)),
        }
    }

    fn write_i64(&mut self, value: i64) {
        self.tokens.push_back(Token::Long(value));
    }

    fn read_string(&mut self) -> Result<String> {
        match self.pop("string")? {
            Token::String(value) => Ok(value),
            other => Err(Self::mismatch("string", &other)),
        }
    }

    fn write_string(&mut self, value: &str) {
        self.tokens.push_back(Token::String(value.into()));
    }

    fn read_long_string(&mut self) -> Result<String> {
        match self.pop("long string")? {
            Token::LongString(value) => Ok(value),
            other => Err(Self::mismatch("long string", &other)),
        }
    }

    fn write_long_string(&mut self, value: &str) {
        self.tokens.push_back(Token::LongString(value.into()));
    }

    fn read_bytes(&mut self) -> Result<Option<Bytes>> {
        match self.pop("bytes")? {
            Token::Bytes(value) => Ok(value),
            other => Err(Self::mismatch("bytes", &other)),
        }
    }

    fn write_bytes(&mut self, value: Option<&[u8]>) {
        self.tokens
            .push_back(Token::Bytes(value.map(Bytes::copy_from_slice)));
    }

    fn read_short_bytes(&mut self) -> Result<Bytes> {
        match self.pop("short bytes")? {
            Token::ShortBytes(value) => Ok(value),
            other => Err(Self::mismatch("short bytes", &other)),
        }
    }

    fn write_short_bytes(&mut self, value: &[u8]) {
        self.tokens
            .push_back(Token::ShortBytes(Bytes::copy_from_slice(value)));
    }

    fn read_uuid(&mut self) -> Result<Uuid> {
        match self.pop("uuid")? {
            Token::Uuid(value) => Ok(value),
            other => Err(Self::mismatch("uuid", &other)),
        }
    }

    fn write_uuid(&mut self, value: Uuid) {
        self.tokens.push_back(Token::Uuid(value));
    }

    fn read_inet(&mut self) -> Result<SocketAddr> {
        match self.pop("inet")? {
            Token::Inet(value) => Ok(value),
            other => Err(Self::mismatch("inet", &other)),
        }
    }

    fn write_inet(&mut self, value: &SocketAddr) {
        self.tokens.push_back(Token::Inet(*value));
    }

    fn read_inetaddr(&mut self) -> Result<IpAddr> {
        match self.pop("inetaddr")? {
            Token::InetAddr(value) => Ok(value),
            other => Err(Self::mismatch("inetaddr", &other)),
        }
    }

    fn write_inetaddr(&mut self, value: &IpAddr) {
        self.tokens.push_back(Token::InetAddr(*value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_roundtrip() {
        let mut buf = MockWireBuf::new();
        buf.write_string("SCHEMA_CHANGE");
        buf.write_u16(2);
        buf.write_i32(-1);

        assert_eq!(
            buf,
            MockWireBuf::new().string("SCHEMA_CHANGE").short(2).int(-1)
        );
        assert_eq!(buf.read_string().unwrap(), "SCHEMA_CHANGE");
        assert_eq!(buf.read_u16().unwrap(), 2);
        assert_eq!(buf.read_i32().unwrap(), -1);
    }

    #[test]
    fn test_remaining_counts_wire_bytes() {
        let buf = MockWireBuf::new().string("test").int(0).byte(1);
        // 2+4 string, 4 int, 1 byte
        assert_eq!(buf.remaining(), 11);
    }

    #[test]
    fn test_token_mismatch() {
        let mut buf = MockWireBuf::new().int(7);
        assert!(buf.read_string().is_err());
    }

    #[test]
    fn test_read_retained_on_token_boundary() {
        let mut buf = MockWireBuf::new().string("ab").int(1).byte(9);
        let mut head = buf.read_retained(8).unwrap();
        assert_eq!(head.read_string().unwrap(), "ab");
        assert_eq!(head.read_i32().unwrap(), 1);
        assert_eq!(buf.read_u8().unwrap(), 9);
    }

    #[test]
    fn test_read_retained_inside_token_fails() {
        let mut buf = MockWireBuf::new().string("abcd");
        assert!(buf.read_retained(3).is_err());
    }
}
