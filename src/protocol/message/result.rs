//! RESULT message and its per-kind sub-codecs
//!
//! The payload opens with an `[int]` kind; the codec dispatches a
//! second lookup in an inner registry of function pairs keyed by that
//! kind. Sub-entries are installed per version at construction, so each
//! instance's wire layout is fixed up front.

use std::collections::HashMap;

use bytes::Bytes;

use crate::protocol::error::{CodecError, Result};
use crate::protocol::message::metadata::{PreparedMetadata, RowsMetadata};
use crate::protocol::message::schema::SchemaChange;
use crate::protocol::message::{wrong_message, Message, MessageCodec};
use crate::protocol::primitive::{sizes, WireBuf};
use crate::protocol::types::{result_kind, Opcode, ProtocolVersion};

/// A page of rows with its metadata; cell values stay opaque `[bytes]`
#[derive(Debug, Clone, PartialEq)]
pub struct Rows {
    /// Result metadata
    pub metadata: RowsMetadata,
    /// Row-major cell data, `row_count x column_count`
    pub data: Vec<Vec<Option<Bytes>>>,
}

/// Prepared-statement handle returned by PREPARE
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    /// Prepared statement id
    pub id: Bytes,
    /// Result metadata id to echo on EXECUTE (v5)
    pub result_metadata_id: Option<Bytes>,
    /// Metadata of the bind variables
    pub variables_metadata: PreparedMetadata,
    /// Metadata of the result set
    pub result_metadata: RowsMetadata,
}

/// RESULT payload, tagged by kind
#[derive(Debug, Clone, PartialEq)]
pub enum ResultBody {
    /// Statement produced no result data
    Void,
    /// Page of rows
    Rows(Rows),
    /// USE keyspace outcome
    SetKeyspace(String),
    /// Prepared statement handle
    Prepared(Prepared),
    /// DDL outcome
    SchemaChange(SchemaChange),
}

impl ResultBody {
    /// The wire kind of this payload
    #[must_use]
    pub fn kind(&self) -> i32 {
        match self {
            Self::Void => result_kind::VOID,
            Self::Rows(_) => result_kind::ROWS,
            Self::SetKeyspace(_) => result_kind::SET_KEYSPACE,
            Self::Prepared(_) => result_kind::PREPARED,
            Self::SchemaChange(_) => result_kind::SCHEMA_CHANGE,
        }
    }
}

struct ResultSub<B: WireBuf> {
    encode: fn(&ResultBody, ProtocolVersion, &mut B) -> Result<()>,
    encoded_size: fn(&ResultBody, ProtocolVersion) -> Result<usize>,
    decode: fn(ProtocolVersion, &mut B) -> Result<ResultBody>,
}

/// Codec for [`ResultBody`] under one protocol version
pub struct ResultCodec<B: WireBuf> {
    version: ProtocolVersion,
    subs: HashMap<i32, ResultSub<B>>,
}

impl<B: WireBuf> ResultCodec<B> {
    /// Create the codec for a version, installing every kind
    #[must_use]
    pub fn new(version: ProtocolVersion) -> Self {
        let mut subs = HashMap::new();
        subs.insert(
            result_kind::VOID,
            ResultSub {
                encode: void_encode,
                encoded_size: void_size,
                decode: void_decode,
            },
        );
        subs.insert(
            result_kind::ROWS,
            ResultSub {
                encode: rows_encode,
                encoded_size: rows_size,
                decode: rows_decode,
            },
        );
        subs.insert(
            result_kind::SET_KEYSPACE,
            ResultSub {
                encode: set_keyspace_encode,
                encoded_size: set_keyspace_size,
                decode: set_keyspace_decode,
            },
        );
        subs.insert(
            result_kind::PREPARED,
            ResultSub {
                encode: prepared_encode,
                encoded_size: prepared_size,
                decode: prepared_decode,
            },
        );
        subs.insert(
            result_kind::SCHEMA_CHANGE,
            ResultSub {
                encode: schema_change_encode,
                encoded_size: schema_change_size,
                decode: schema_change_decode,
            },
        );
        Self { version, subs }
    }

    fn sub(&self, kind: i32) -> Result<&ResultSub<B>> {
        self.subs
            .get(&kind)
            .ok_or(CodecError::UnknownResultKind { kind })
    }
}

impl<B: WireBuf> MessageCodec<B> for ResultCodec<B> {
    fn opcode(&self) -> Opcode {
        Opcode::Result
    }

    fn encode(&self, message: &Message, dst: &mut B) -> Result<()> {
        let Message::Result(body) = message else {
            return Err(wrong_message(Opcode::Result, message));
        };
        let sub = self.sub(body.kind())?;
        (sub.encoded_size)(body, self.version)?;
        dst.write_i32(body.kind());
        (sub.encode)(body, self.version, dst)
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Result(body) = message else {
            return Err(wrong_message(Opcode::Result, message));
        };
        let sub = self.sub(body.kind())?;
        Ok(sizes::INT + (sub.encoded_size)(body, self.version)?)
    }

    fn decode(&self, src: &mut B) -> Result<Message> {
        let kind = src.read_i32()?;
        let sub = self.sub(kind)?;
        Ok(Message::Result((sub.decode)(self.version, src)?))
    }
}

// Void carries no body; its size is zero.

fn void_encode<B: WireBuf>(
    _body: &ResultBody,
    _version: ProtocolVersion,
    _dst: &mut B,
) -> Result<()> {
    Ok(())
}

fn void_size(_body: &ResultBody, _version: ProtocolVersion) -> Result<usize> {
    Ok(0)
}

fn void_decode<B: WireBuf>(_version: ProtocolVersion, _src: &mut B) -> Result<ResultBody> {
    Ok(ResultBody::Void)
}

fn rows_encode<B: WireBuf>(body: &ResultBody, version: ProtocolVersion, dst: &mut B) -> Result<()> {
    let ResultBody::Rows(rows) = body else {
        return Err(CodecError::invalid("expected a Rows result"));
    };
    rows.metadata.encode(version, dst)?;
    dst.write_i32(rows.data.len() as i32);
    for row in &rows.data {
        for cell in row {
            dst.write_bytes(cell.as_deref());
        }
    }
    Ok(())
}

fn rows_size(body: &ResultBody, version: ProtocolVersion) -> Result<usize> {
    let ResultBody::Rows(rows) = body else {
        return Err(CodecError::invalid("expected a Rows result"));
    };
    let mut size = rows.metadata.encoded_size(version)? + sizes::INT;
    for row in &rows.data {
        for cell in row {
            size += sizes::of_bytes(cell.as_deref());
        }
    }
    Ok(size)
}

fn rows_decode<B: WireBuf>(version: ProtocolVersion, src: &mut B) -> Result<ResultBody> {
    let metadata = RowsMetadata::decode(version, src)?;
    let row_count = src.read_i32()?;
    if row_count < 0 {
        return Err(CodecError::NegativeLength { length: row_count });
    }
    let column_count = metadata.column_count as usize;
    let mut data = Vec::with_capacity(row_count as usize);
    for _ in 0..row_count {
        let mut row = Vec::with_capacity(column_count);
        for _ in 0..column_count {
            row.push(src.read_bytes()?);
        }
        data.push(row);
    }
    Ok(ResultBody::Rows(Rows { metadata, data }))
}

fn set_keyspace_encode<B: WireBuf>(
    body: &ResultBody,
    _version: ProtocolVersion,
    dst: &mut B,
) -> Result<()> {
    let ResultBody::SetKeyspace(keyspace) = body else {
        return Err(CodecError::invalid("expected a SetKeyspace result"));
    };
    dst.write_string(keyspace);
    Ok(())
}

fn set_keyspace_size(body: &ResultBody, _version: ProtocolVersion) -> Result<usize> {
    let ResultBody::SetKeyspace(keyspace) = body else {
        return Err(CodecError::invalid("expected a SetKeyspace result"));
    };
    Ok(sizes::of_string(keyspace))
}

fn set_keyspace_decode<B: WireBuf>(_version: ProtocolVersion, src: &mut B) -> Result<ResultBody> {
    Ok(ResultBody::SetKeyspace(src.read_string()?))
}

fn prepared_encode<B: WireBuf>(
    body: &ResultBody,
    version: ProtocolVersion,
    dst: &mut B,
) -> Result<()> {
    let ResultBody::Prepared(prepared) = body else {
        return Err(CodecError::invalid("expected a Prepared result"));
    };
    check_prepared(prepared, version)?;
    dst.write_short_bytes(&prepared.id);
    if let Some(result_metadata_id) = &prepared.result_metadata_id {
        dst.write_short_bytes(result_metadata_id);
    }
    prepared.variables_metadata.encode(version, dst)?;
    prepared.result_metadata.encode(version, dst)
}

fn prepared_size(body: &ResultBody, version: ProtocolVersion) -> Result<usize> {
    let ResultBody::Prepared(prepared) = body else {
        return Err(CodecError::invalid("expected a Prepared result"));
    };
    check_prepared(prepared, version)?;
    let mut size = sizes::of_short_bytes(&prepared.id);
    if let Some(result_metadata_id) = &prepared.result_metadata_id {
        size += sizes::of_short_bytes(result_metadata_id);
    }
    size += prepared.variables_metadata.encoded_size(version)?;
    Ok(size + prepared.result_metadata.encoded_size(version)?)
}

fn prepared_decode<B: WireBuf>(version: ProtocolVersion, src: &mut B) -> Result<ResultBody> {
    let id = src.read_short_bytes()?;
    let result_metadata_id = if version.supports_result_metadata_id() {
        Some(src.read_short_bytes()?)
    } else {
        None
    };
    let variables_metadata = PreparedMetadata::decode(version, src)?;
    let result_metadata = RowsMetadata::decode(version, src)?;
    Ok(ResultBody::Prepared(Prepared {
        id,
        result_metadata_id,
        variables_metadata,
        result_metadata,
    }))
}

fn check_prepared(prepared: &Prepared, version: ProtocolVersion) -> Result<()> {
    if version.supports_result_metadata_id() {
        if prepared.result_metadata_id.is_none() {
            return Err(CodecError::invalid(format!(
                "Prepared requires a result metadata id in {version}"
            )));
        }
    } else if prepared.result_metadata_id.is_some() {
        return Err(CodecError::invalid(format!(
            "Prepared result metadata ids are not supported in {version}"
        )));
    }
    Ok(())
}

fn schema_change_encode<B: WireBuf>(
    body: &ResultBody,
    version: ProtocolVersion,
    dst: &mut B,
) -> Result<()> {
    let ResultBody::SchemaChange(change) = body else {
        return Err(CodecError::invalid("expected a SchemaChange result"));
    };
    change.encode(version, dst)
}

fn schema_change_size(body: &ResultBody, version: ProtocolVersion) -> Result<usize> {
    let ResultBody::SchemaChange(change) = body else {
        return Err(CodecError::invalid("expected a SchemaChange result"));
    };
    change.encoded_size(version)
}

fn schema_change_decode<B: WireBuf>(version: ProtocolVersion, src: &mut B) -> Result<ResultBody> {
    Ok(ResultBody::SchemaChange(SchemaChange::decode(version, src)?))
}
