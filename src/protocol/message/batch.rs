//! BATCH message

use bytes::Bytes;

use crate::protocol::error::{CodecError, Result};
use crate::protocol::message::query::query_flags;
use crate::protocol::message::{wrong_message, Message, MessageCodec};
use crate::protocol::primitive::{sizes, WireBuf};
use crate::protocol::types::{Opcode, ProtocolVersion};

/// BATCH kinds
pub mod batch_type {
    /// Atomic through the batch log
    pub const LOGGED: u8 = 0;
    /// No batch-log atomicity
    pub const UNLOGGED: u8 = 1;
    /// Counter mutations
    pub const COUNTER: u8 = 2;
}

/// One statement inside a batch, raw CQL or a prepared id
#[derive(Debug, Clone, PartialEq)]
pub enum BatchStatement {
    /// Raw CQL with positional values
    Query {
        /// CQL text
        query: String,
        /// Positional values
        values: Vec<Option<Bytes>>,
    },
    /// Prepared id with positional values
    Prepared {
        /// Prepared statement id
        id: Bytes,
        /// Positional values
        values: Vec<Option<Bytes>>,
    },
}

/// Batch of statements executed as one request.
///
/// The wire format requires at least one statement; encoding an empty
/// batch is rejected before any bytes are written.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Batch kind (see [`batch_type`])
    pub kind: u8,
    /// Statements, in execution order
    pub statements: Vec<BatchStatement>,
    /// Consistency level as a raw `[short]`
    pub consistency: u16,
    /// Serial consistency for LWT batches
    pub serial_consistency: Option<u16>,
    /// Client-provided mutation timestamp (microseconds)
    pub default_timestamp: Option<i64>,
    /// Per-batch keyspace (v5 / DSE v2)
    pub keyspace: Option<String>,
    /// Client-provided "now" in epoch seconds (v5)
    pub now_in_seconds: Option<i32>,
}

impl Batch {
    /// Create a logged batch with default options
    #[must_use]
    pub fn logged(statements: Vec<BatchStatement>) -> Self {
        Self {
            kind: batch_type::LOGGED,
            statements,
            consistency: 0x0001,
            serial_consistency: None,
            default_timestamp: None,
            keyspace: None,
            now_in_seconds: None,
        }
    }

    fn flags(&self) -> u32 {
        let mut flags = 0;
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

    fn check_encodable(&self, version: ProtocolVersion) -> Result<()> {
        if self.statements.is_empty() {
            return Err(CodecError::invalid("a batch requires at least one statement"));
        }
        if self.keyspace.is_some() && !version.supports_keyspace_parameter() {
            return Err(CodecError::invalid(format!(
                "per-batch keyspace is not supported in {version}"
            )));
        }
        if self.now_in_seconds.is_some() && !version.supports_now_in_seconds() {
            return Err(CodecError::invalid(format!(
                "now-in-seconds is not supported in {version}"
            )));
        }
        Ok(())
    }
}

const STATEMENT_KIND_QUERY: u8 = 0;
const STATEMENT_KIND_PREPARED: u8 = 1;

fn write_values<B: WireBuf>(values: &[Option<Bytes>], dst: &mut B) {
    dst.write_u16(values.len() as u16);
    for value in values {
        dst.write_bytes(value.as_deref());
    }
}

fn read_values<B: WireBuf>(src: &mut B) -> Result<Vec<Option<Bytes>>> {
    let count = src.read_u16()? as usize;
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(src.read_bytes()?);
    }
    Ok(values)
}

fn size_of_values(values: &[Option<Bytes>]) -> usize {
    sizes::SHORT
        + values
            .iter()
            .map(|v| sizes::of_bytes(v.as_deref()))
            .sum::<usize>()
}

/// Codec for [`Batch`] under one protocol version
#[derive(Debug)]
pub struct BatchCodec {
    version: ProtocolVersion,
}

impl BatchCodec {
    /// Create the codec for a version
    #[must_use]
    pub fn new(version: ProtocolVersion) -> Self {
        Self { version }
    }
}

impl<B: WireBuf> MessageCodec<B> for BatchCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Batch
    }

    fn encode(&self, message: &Message, dst: &mut B) -> Result<()> {
        let Message::Batch(batch) = message else {
            return Err(wrong_message(Opcode::Batch, message));
        };
        batch.check_encodable(self.version)?;

        dst.write_u8(batch.kind);
        dst.write_u16(batch.statements.len() as u16);
        for statement in &batch.statements {
            match statement {
                BatchStatement::Query { query, values } => {
                    dst.write_u8(STATEMENT_KIND_QUERY);
                    dst.write_long_string(query);
                    write_values(values, dst);
                }
                BatchStatement::Prepared { id, values } => {
                    dst.write_u8(STATEMENT_KIND_PREPARED);
                    dst.write_short_bytes(id);
                    write_values(values, dst);
                }
            }
        }

        dst.write_u16(batch.consistency);
        let flags = batch.flags();
        if self.version.uses_int_query_flags() {
            dst.write_i32(flags as i32);
        } else {
            dst.write_u8(flags as u8);
        }
        if let Some(serial_consistency) = batch.serial_consistency {
            dst.write_u16(serial_consistency);
        }
        if let Some(default_timestamp) = batch.default_timestamp {
            dst.write_i64(default_timestamp);
        }
        if let Some(keyspace) = &batch.keyspace {
            dst.write_string(keyspace);
        }
        if let Some(now_in_seconds) = batch.now_in_seconds {
            dst.write_i32(now_in_seconds);
        }
        Ok(())
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Batch(batch) = message else {
            return Err(wrong_message(Opcode::Batch, message));
        };
        batch.check_encodable(self.version)?;

        let mut size = sizes::BYTE + sizes::SHORT;
        for statement in &batch.statements {
            size += sizes::BYTE;
            size += match statement {
                BatchStatement::Query { query, values } => {
                    sizes::of_long_string(query) + size_of_values(values)
                }
                BatchStatement::Prepared { id, values } => {
                    sizes::of_short_bytes(id) + size_of_values(values)
                }
            };
        }
        size += sizes::SHORT;
        size += if self.version.uses_int_query_flags() {
            sizes::INT
        } else {
            sizes::BYTE
        };
        if batch.serial_consistency.is_some() {
            size += sizes::SHORT;
        }
        if batch.default_timestamp.is_some() {
            size += sizes::LONG;
        }
        if let Some(keyspace) = &batch.keyspace {
            size += sizes::of_string(keyspace);
        }
        if batch.now_in_seconds.is_some() {
            size += sizes::INT;
        }
        Ok(size)
    }

    fn decode(&self, src: &mut B) -> Result<Message> {
        let kind = src.read_u8()?;
        let count = src.read_u16()? as usize;
        let mut statements = Vec::with_capacity(count);
        for _ in 0..count {
            let statement_kind = src.read_u8()?;
            let statement = match statement_kind {
                STATEMENT_KIND_QUERY => BatchStatement::Query {
                    query: src.read_long_string()?,
                    values: read_values(src)?,
                },
                STATEMENT_KIND_PREPARED => BatchStatement::Prepared {
                    id: src.read_short_bytes()?,
                    values: read_values(src)?,
                },
                other => {
                    return Err(CodecError::invalid(format!(
                        "unknown batch statement kind: {other}"
                    )))
                }
            };
            statements.push(statement);
        }

        let consistency = src.read_u16()?;
        let flags = if self.version.uses_int_query_flags() {
            src.read_i32()? as u32
        } else {
            u32::from(src.read_u8()?)
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

        Ok(Message::Batch(Batch {
            kind,
            statements,
            consistency,
            serial_consistency,
            default_timestamp,
            keyspace,
            now_in_seconds,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mock::MockWireBuf;

    fn sample_batch() -> Batch {
        Batch::logged(vec![
            BatchStatement::Query {
                query: "INSERT INTO t (k) VALUES (?)".into(),
                values: vec![Some(Bytes::from_static(b"\x01"))],
            },
            BatchStatement::Prepared {
                id: Bytes::from_static(b"\xAB\xCD"),
                values: vec![None],
            },
        ])
    }

    #[test]
    fn test_v4_layout() {
        let codec = BatchCodec::new(ProtocolVersion::V4);
        let message = Message::Batch(sample_batch());

        let mut buf = MockWireBuf::new();
        codec.encode(&message, &mut buf).unwrap();
        assert_eq!(
            buf,
            MockWireBuf::new()
                .byte(batch_type::LOGGED)
                .short(2)
                .byte(0)
                .long_string("INSERT INTO t (k) VALUES (?)")
                .short(1)
                .bytes(Some(b"\x01"))
                .byte(1)
                .short_bytes(b"\xAB\xCD")
                .short(1)
                .bytes(None)
                .short(0x0001)
                .byte(0)
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), message);
    }

    #[test]
    fn test_empty_batch_rejected() {
        let codec = BatchCodec::new(ProtocolVersion::V4);
        let message = Message::Batch(Batch::logged(vec![]));

        let mut buf = MockWireBuf::new();
        assert!(matches!(
            codec.encode(&message, &mut buf),
            Err(CodecError::InvalidArgument { .. })
        ));
        assert_eq!(buf, MockWireBuf::new());
    }

    #[test]
    fn test_v5_options_roundtrip_and_size() {
        let codec = BatchCodec::new(ProtocolVersion::V5);
        let mut batch = sample_batch();
        batch.serial_consistency = Some(0x0009);
        batch.default_timestamp = Some(1_630_000_000_000);
        batch.keyspace = Some("ks".into());
        batch.now_in_seconds = Some(1_630_000_000);
        let message = Message::Batch(batch);

        let mut buf = MockWireBuf::new();
        codec.encode(&message, &mut buf).unwrap();
        assert_eq!(
            <BatchCodec as MessageCodec<MockWireBuf>>::encoded_size(&codec, &message).unwrap(),
            crate::protocol::primitive::WireBuf::remaining(&buf)
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), message);
    }

    #[test]
    fn test_unknown_statement_kind_rejected() {
        let codec = BatchCodec::new(ProtocolVersion::V4);
        let mut buf = MockWireBuf::new().byte(batch_type::LOGGED).short(1).byte(9);
        assert!(codec.decode(&mut buf).is_err());
    }
}
