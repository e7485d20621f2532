//! QUERY message and the shared query-parameters block
//!
//! The parameters block is reused by EXECUTE, and its trailing options
//! (serial consistency, timestamp, keyspace, now-in-seconds) by BATCH.
//! Optional fields are gated by flag bits and written in strict
//! flag-bit order. Flags are a `[byte]` below v5 and an `[int]` from v5
//! on; the codec picks the width at construction time.

use bytes::Bytes;

use crate::protocol::collection::OrderedMap;
use crate::protocol::error::{CodecError, Result};
use crate::protocol::message::{wrong_message, Message, MessageCodec};
use crate::protocol::primitive::{sizes, WireBuf};
use crate::protocol::types::{Opcode, ProtocolVersion};

/// Flag bits of the query-parameters block
pub mod query_flags {
    /// Positional or named values follow
    pub const VALUES: u32 = 0x01;
    /// Skip result metadata in the response
    pub const SKIP_METADATA: u32 = 0x02;
    /// Page size follows
    pub const PAGE_SIZE: u32 = 0x04;
    /// Paging state follows
    pub const PAGING_STATE: u32 = 0x08;
    /// Serial consistency follows
    pub const SERIAL_CONSISTENCY: u32 = 0x10;
    /// Default timestamp follows
    pub const DEFAULT_TIMESTAMP: u32 = 0x20;
    /// Values are named rather than positional
    pub const VALUE_NAMES: u32 = 0x40;
    /// Keyspace follows (v5 / DSE v2)
    pub const KEYSPACE: u32 = 0x80;
    /// Now-in-seconds follows (v5)
    pub const NOW_IN_SECONDS: u32 = 0x100;
}

/// Bound values attached to a statement
#[derive(Debug, Clone, Default, PartialEq)]
pub enum QueryValues {
    /// No values
    #[default]
    None,
    /// Positional values; nulls encode as `[bytes]` length -1
    Positional(Vec<Option<Bytes>>),
    /// Named values, in wire order
    Named(OrderedMap<String, Option<Bytes>>),
}

impl QueryValues {
    /// Whether any values are present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::None => true,
            Self::Positional(values) => values.is_empty(),
            Self::Named(values) => values.is_empty(),
        }
    }
}

/// The query-parameters block shared by QUERY and EXECUTE
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    /// Consistency level as a raw `[short]`
    pub consistency: u16,
    /// Bound values
    pub values: QueryValues,
    /// Ask the server to omit result metadata
    pub skip_metadata: bool,
    /// Page size in rows
    pub page_size: Option<i32>,
    /// Paging state from a previous Rows result
    pub paging_state: Option<Bytes>,
    /// Serial consistency for LWT reads
    pub serial_consistency: Option<u16>,
    /// Client-provided mutation timestamp (microseconds)
    pub default_timestamp: Option<i64>,
    /// Per-query keyspace (v5 / DSE v2)
    pub keyspace: Option<String>,
    /// Client-provided "now" in epoch seconds (v5)
    pub now_in_seconds: Option<i32>,
}

/// Consistency level ONE, the protocol default
const CONSISTENCY_ONE: u16 = 0x0001;

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            consistency: CONSISTENCY_ONE,
            values: QueryValues::None,
            skip_metadata: false,
            page_size: None,
            paging_state: None,
            serial_consistency: None,
            default_timestamp: None,
            keyspace: None,
            now_in_seconds: None,
        }
    }
}

impl QueryParams {
    fn flags(&self) -> u32 {
        let mut flags = 0;
        match &self.values {
            QueryValues::None => {}
            QueryValues::Positional(_) => flags |= query_flags::VALUES,
            QueryValues::Named(_) => flags |= query_flags::VALUES | query_flags::VALUE_NAMES,
        }
        if self.skip_metadata {
            flags |= query_flags::SKIP_METADATA;
        }
        if self.page_size.is_some() {
            flags |= query_flags::PAGE_SIZE;
        }
        if self.paging_state.is_some() {
            flags |= query_flags::PAGING_STATE;
        }
        if self.serial_consistency.is_some() {
            flags |= query_flags::SERIAL_CONSISTENCY;
        }
        if self.default_timestamp.is_some() {
            flags |= query_flags::DEFAULT_TIMESTAMP;
        }
        if self.keyspace.is_some() {
            flags |= query_flags::KEYSPACE;
        }
        if self.now_in_seconds.is_some() {
            flags |= query_flags::NOW_IN_SECONDS;
        }
        flags
    }

    pub(crate) fn check_encodable(&self, version: ProtocolVersion) -> Result<()> {
        if self.keyspace.is_some() && !version.supports_keyspace_parameter() {
            return Err(CodecError::invalid(format!(
                "per-query keyspace is not supported in {version}"
            )));
        }
        if self.now_in_seconds.is_some() && !version.supports_now_in_seconds() {
            return Err(CodecError::invalid(format!(
                "now-in-seconds is not supported in {version}"
            )));
        }
        Ok(())
    }

    pub(crate) fn encode<B: WireBuf>(&self, version: ProtocolVersion, dst: &mut B) -> Result<()> {
        self.check_encodable(version)?;
        dst.write_u16(self.consistency);
        let flags = self.flags();
        if version.uses_int_query_flags() {
            dst.write_i32(flags as i32);
        } else {
            dst.write_u8(flags as u8);
        }
        match &self.values {
            QueryValues::None => {}
            QueryValues::Positional(values) => {
                dst.write_u16(values.len() as u16);
                for value in values {
                    dst.write_bytes(value.as_deref());
                }
            }
            QueryValues::Named(values) => {
                dst.write_u16(values.len() as u16);
                for (name, value) in values.iter() {
                    dst.write_string(name);
                    dst.write_bytes(value.as_deref());
                }
            }
        }
        if let Some(page_size) = self.page_size {
            dst.write_i32(page_size);
        }
        if let Some(paging_state) = &self.paging_state {
            dst.write_bytes(Some(paging_state));
        }
        if let Some(serial_consistency) = self.serial_consistency {
            dst.write_u16(serial_consistency);
        }
        if let Some(default_timestamp) = self.default_timestamp {
            dst.write_i64(default_timestamp);
        }
        if let Some(keyspace) = &self.keyspace {
            dst.write_string(keyspace);
        }
        if let Some(now_in_seconds) = self.now_in_seconds {
            dst.write_i32(now_in_seconds);
        }
        Ok(())
    }

    pub(crate) fn encoded_size(&self, version: ProtocolVersion) -> Result<usize> {
        self.check_encodable(version)?;
        let mut size = sizes::SHORT;
        size += if version.uses_int_query_flags() {
            sizes::INT
        } else {
            sizes::BYTE
        };
        match &self.values {
            QueryValues::None => {}
            QueryValues::Positional(values) => {
                size += sizes::SHORT;
                size += values
                    .iter()
                    .map(|v| sizes::of_bytes(v.as_deref()))
                    .sum::<usize>();
            }
            QueryValues::Named(values) => {
                size += sizes::SHORT;
                size += values
                    .iter()
                    .map(|(name, v)| sizes::of_string(name) + sizes::of_bytes(v.as_deref()))
                    .sum::<usize>();
            }
        }
        if self.page_size.is_some() {
            size += sizes::INT;
        }
        if let Some(paging_state) = &self.paging_state {
            size += sizes::of_bytes(Some(paging_state));
        }
        if self.serial_consistency.is_some() {
            size += sizes::SHORT;
        }
        if self.default_timestamp.is_some() {
            size += sizes::LONG;
        }
        if let Some(keyspace) = &self.keyspace {
            size += sizes::of_string(keyspace);
        }
        if self.now_in_seconds.is_some() {
            size += sizes::INT;
        }
        Ok(size)
    }

    pub(crate) fn decode<B: WireBuf>(version: ProtocolVersion, src: &mut B) -> Result<Self> {
        let consistency = src.read_u16()?;
        let flags = if version.uses_int_query_flags() {
            src.read_i32()? as u32
        } else {
            u32::from(src.read_u8()?)
        };

        let values = if flags & query_flags::VALUES != 0 {
            let count = src.read_u16()? as usize;
            if flags & query_flags::VALUE_NAMES != 0 {
                let mut named = OrderedMap::with_capacity(count);
                for _ in 0..count {
                    let name = src.read_string()?;
                    let value = src.read_bytes()?;
                    named.insert(name, value);
                }
                QueryValues::Named(named)
            } else {
                let mut positional = Vec::with_capacity(count);
                for _ in 0..count {
                    positional.push(src.read_bytes()?);
                }
                QueryValues::Positional(positional)
            }
        } else {
            QueryValues::None
        };

        let skip_metadata = flags & query_flags::SKIP_METADATA != 0;
        let page_size = if flags & query_flags::PAGE_SIZE != 0 {
            Some(src.read_i32()?)
        } else {
            None
        };
        let paging_state = if flags & query_flags::PAGING_STATE != 0 {
            src.read_bytes()?
        } else {
            None
        };
        let serial_consistency = if flags & query_flags::SERIAL_CONSISTENCY != 0 {
            Some(src.read_u16()?)
        } else {
            None
        };
        let default_timestamp = if flags & query_flags::DEFAULT_TIMESTAMP != 0 {
            Some(src.read_i64()?)
        } else {
            None
        };
        let keyspace = if flags & query_flags::KEYSPACE != 0 {
            Some(src.read_string()?)
        } else {
            None
        };
        let now_in_seconds = if flags & query_flags::NOW_IN_SECONDS != 0 {
            Some(src.read_i32()?)
        } else {
            None
        };

        Ok(Self {
            consistency,
            values,
            skip_metadata,
            page_size,
            paging_state,
            serial_consistency,
            default_timestamp,
            keyspace,
            now_in_seconds,
        })
    }
}

/// Raw CQL query with its parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// CQL text
    pub query: String,
    /// Parameters block
    pub params: QueryParams,
}

impl Query {
    /// Create a query with default parameters
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            params: QueryParams::default(),
        }
    }
}

/// Codec for [`Query`] under one protocol version
#[derive(Debug)]
pub struct QueryCodec {
    version: ProtocolVersion,
}

impl QueryCodec {
    /// Create the codec for a version
    #[must_use]
    pub fn new(version: ProtocolVersion) -> Self {
        Self { version }
    }
}

impl<B: WireBuf> MessageCodec<B> for QueryCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Query
    }

    fn encode(&self, message: &Message, dst: &mut B) -> Result<()> {
        let Message::Query(query) = message else {
            return Err(wrong_message(Opcode::Query, message));
        };
        query.params.check_encodable(self.version)?;
        dst.write_long_string(&query.query);
        query.params.encode(self.version, dst)
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Query(query) = message else {
            return Err(wrong_message(Opcode::Query, message));
        };
        Ok(sizes::of_long_string(&query.query) + query.params.encoded_size(self.version)?)
    }

    fn decode(&self, src: &mut B) -> Result<Message> {
        let query = src.read_long_string()?;
        let params = QueryParams::decode(self.version, src)?;
        Ok(Message::Query(Query { query, params }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mock::MockWireBuf;

    #[test]
    fn test_bare_query_v4() {
        let codec = QueryCodec::new(ProtocolVersion::V4);
        let message = Message::Query(Query::new("SELECT * FROM system.local"));

        let mut buf = MockWireBuf::new();
        codec.encode(&message, &mut buf).unwrap();
        assert_eq!(
            buf,
            MockWireBuf::new()
                .long_string("SELECT * FROM system.local")
                .short(CONSISTENCY_ONE)
                .byte(0)
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), message);
    }

    #[test]
    fn test_flags_widen_to_int_in_v5() {
        let codec = QueryCodec::new(ProtocolVersion::V5);
        let message = Message::Query(Query::new("SELECT now() FROM system.local"));

        let mut buf = MockWireBuf::new();
        codec.encode(&message, &mut buf).unwrap();
        assert_eq!(
            buf,
            MockWireBuf::new()
                .long_string("SELECT now() FROM system.local")
                .short(CONSISTENCY_ONE)
                .int(0)
        );
    }

    #[test]
    fn test_positional_values_in_flag_order() {
        let codec = QueryCodec::new(ProtocolVersion::V4);
        let mut query = Query::new("UPDATE t SET a = ? WHERE k = ?");
        query.params.values =
            QueryValues::Positional(vec![Some(Bytes::from_static(b"\x2A")), None]);
        query.params.page_size = Some(100);
        let message = Message::Query(query);

        let mut buf = MockWireBuf::new();
        codec.encode(&message, &mut buf).unwrap();
        assert_eq!(
            buf,
            MockWireBuf::new()
                .long_string("UPDATE t SET a = ? WHERE k = ?")
                .short(CONSISTENCY_ONE)
                .byte((query_flags::VALUES | query_flags::PAGE_SIZE) as u8)
                .short(2)
                .bytes(Some(b"\x2A"))
                .bytes(None)
                .int(100)
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), message);
    }

    #[test]
    fn test_named_values_roundtrip() {
        let codec = QueryCodec::new(ProtocolVersion::V4);
        let mut named = OrderedMap::new();
        named.insert("k".to_string(), Some(Bytes::from_static(b"\x01")));
        named.insert("v".to_string(), None);

        let mut query = Query::new("UPDATE t SET v = :v WHERE k = :k");
        query.params.values = QueryValues::Named(named);
        let message = Message::Query(query);

        let mut buf = MockWireBuf::new();
        codec.encode(&message, &mut buf).unwrap();
        assert_eq!(codec.decode(&mut buf).unwrap(), message);
    }

    #[test]
    fn test_all_options_v5_roundtrip_and_size() {
        let codec = QueryCodec::new(ProtocolVersion::V5);
        let mut query = Query::new("SELECT * FROM t");
        query.params = QueryParams {
            consistency: 0x0006, // LOCAL_QUORUM
            values: QueryValues::Positional(vec![Some(Bytes::from_static(b"x"))]),
            skip_metadata: true,
            page_size: Some(5000),
            paging_state: Some(Bytes::from_static(b"state")),
            serial_consistency: Some(0x0009),
            default_timestamp: Some(1_234_567),
            keyspace: Some("ks".into()),
            now_in_seconds: Some(42),
        };
        let message = Message::Query(query);

        let mut buf = MockWireBuf::new();
        codec.encode(&message, &mut buf).unwrap();
        assert_eq!(
            <QueryCodec as MessageCodec<MockWireBuf>>::encoded_size(&codec, &message).unwrap(),
            crate::protocol::primitive::WireBuf::remaining(&buf)
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), message);
    }

    #[test]
    fn test_keyspace_rejected_below_v5() {
        let codec = QueryCodec::new(ProtocolVersion::V4);
        let mut query = Query::new("SELECT * FROM t");
        query.params.keyspace = Some("ks".into());
        let message = Message::Query(query);

        let mut buf = MockWireBuf::new();
        let err = codec.encode(&message, &mut buf).unwrap_err();
        assert!(matches!(err, CodecError::InvalidArgument { .. }));
        // nothing was written
        assert_eq!(buf, MockWireBuf::new());
    }

    #[test]
    fn test_now_in_seconds_rejected_in_dse_v2() {
        let codec = QueryCodec::new(ProtocolVersion::Dse2);
        let mut query = Query::new("SELECT * FROM t");
        query.params.now_in_seconds = Some(7);
        let message = Message::Query(query);

        assert!(
            <QueryCodec as MessageCodec<MockWireBuf>>::encoded_size(&codec, &message).is_err()
        );
    }
}
