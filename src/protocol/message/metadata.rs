//! Result-set metadata: column specs and the CQL type tree
//!
//! Row and column *values* stay opaque `[bytes]` in this crate; the
//! type tree is decoded only because it is part of the metadata wire
//! layout that Rows and Prepared results carry.

use bytes::Bytes;

use crate::protocol::error::{CodecError, Result};
use crate::protocol::primitive::{sizes, WireBuf};
use crate::protocol::types::ProtocolVersion;

/// Flag bits of Rows metadata
pub(crate) mod rows_flags {
    /// All columns share one (keyspace, table) spec
    pub const GLOBAL_TABLES_SPEC: i32 = 0x01;
    /// Paging state follows
    pub const HAS_MORE_PAGES: i32 = 0x02;
    /// Column specs omitted
    pub const NO_METADATA: i32 = 0x04;
    /// New result metadata id follows (v5)
    pub const METADATA_CHANGED: i32 = 0x08;
}

mod type_code {
    pub const CUSTOM: u16 = 0x0000;
    pub const ASCII: u16 = 0x0001;
    pub const BIGINT: u16 = 0x0002;
    pub const BLOB: u16 = 0x0003;
    pub const BOOLEAN: u16 = 0x0004;
    pub const COUNTER: u16 = 0x0005;
    pub const DECIMAL: u16 = 0x0006;
    pub const DOUBLE: u16 = 0x0007;
    pub const FLOAT: u16 = 0x0008;
    pub const INT: u16 = 0x0009;
    pub const TIMESTAMP: u16 = 0x000B;
    pub const UUID: u16 = 0x000C;
    pub const VARCHAR: u16 = 0x000D;
    pub const VARINT: u16 = 0x000E;
    pub const TIMEUUID: u16 = 0x000F;
    pub const INET: u16 = 0x0010;
    pub const DATE: u16 = 0x0011;
    pub const TIME: u16 = 0x0012;
    pub const SMALLINT: u16 = 0x0013;
    pub const TINYINT: u16 = 0x0014;
    pub const DURATION: u16 = 0x0015;
    pub const LIST: u16 = 0x0020;
    pub const MAP: u16 = 0x0021;
    pub const SET: u16 = 0x0022;
    pub const UDT: u16 = 0x0030;
    pub const TUPLE: u16 = 0x0031;
}

/// A CQL data type as carried in column specs
#[derive(Debug, Clone, PartialEq)]
pub enum RawType {
    /// Server-defined type, by class name
    Custom(String),
    /// `ascii`
    Ascii,
    /// `bigint`
    Bigint,
    /// `blob`
    Blob,
    /// `boolean`
    Boolean,
    /// `counter`
    Counter,
    /// `decimal`
    Decimal,
    /// `double`
    Double,
    /// `float`
    Float,
    /// `int`
    Int,
    /// `timestamp`
    Timestamp,
    /// `uuid`
    Uuid,
    /// `varchar` / `text`
    Varchar,
    /// `varint`
    Varint,
    /// `timeuuid`
    Timeuuid,
    /// `inet`
    Inet,
    /// `date`
    Date,
    /// `time`
    Time,
    /// `smallint`
    Smallint,
    /// `tinyint`
    Tinyint,
    /// `duration` (v5)
    Duration,
    /// `list<T>`
    List(Box<RawType>),
    /// `map<K, V>`
    Map(Box<RawType>, Box<RawType>),
    /// `set<T>`
    Set(Box<RawType>),
    /// User-defined type
    Udt {
        /// Keyspace the type is defined in
        keyspace: String,
        /// Type name
        name: String,
        /// Field names and types, in definition order
        fields: Vec<(String, RawType)>,
    },
    /// `tuple<...>`
    Tuple(Vec<RawType>),
}

impl RawType {
    pub(crate) fn decode<B: WireBuf>(src: &mut B) -> Result<Self> {
        let code = src.read_u16()?;
        match code {
            type_code::CUSTOM => Ok(Self::Custom(src.read_string()?)),
            type_code::ASCII => Ok(Self::Ascii),
            type_code::BIGINT => Ok(Self::Bigint),
            type_code::BLOB => Ok(Self::Blob),
            type_code::BOOLEAN => Ok(Self::Boolean),
            type_code::COUNTER => Ok(Self::Counter),
            type_code::DECIMAL => Ok(Self::Decimal),
            type_code::DOUBLE => Ok(Self::Double),
            type_code::FLOAT => Ok(Self::Float),
            type_code::INT => Ok(Self::Int),
            type_code::TIMESTAMP => Ok(Self::Timestamp),
            type_code::UUID => Ok(Self::Uuid),
            type_code::VARCHAR => Ok(Self::Varchar),
            type_code::VARINT => Ok(Self::Varint),
            type_code::TIMEUUID => Ok(Self::Timeuuid),
            type_code::INET => Ok(Self::Inet),
            type_code::DATE => Ok(Self::Date),
            type_code::TIME => Ok(Self::Time),
            type_code::SMALLINT => Ok(Self::Smallint),
            type_code::TINYINT => Ok(Self::Tinyint),
            type_code::DURATION => Ok(Self::Duration),
            type_code::LIST => Ok(Self::List(Box::new(Self::decode(src)?))),
            type_code::MAP => {
                let key = Self::decode(src)?;
                let value = Self::decode(src)?;
                Ok(Self::Map(Box::new(key), Box::new(value)))
            }
            type_code::SET => Ok(Self::Set(Box::new(Self::decode(src)?))),
            type_code::UDT => {
                let keyspace = src.read_string()?;
                let name = src.read_string()?;
                let count = src.read_u16()? as usize;
                let mut fields = Vec::with_capacity(count);
                for _ in 0..count {
                    let field_name = src.read_string()?;
                    let field_type = Self::decode(src)?;
                    fields.push((field_name, field_type));
                }
                Ok(Self::Udt {
                    keyspace,
                    name,
                    fields,
                })
            }
            type_code::TUPLE => {
                let count = src.read_u16()? as usize;
                let mut elements = Vec::with_capacity(count);
                for _ in 0..count {
                    elements.push(Self::decode(src)?);
                }
                Ok(Self::Tuple(elements))
            }
            other => Err(CodecError::UnknownTypeCode { code: other }),
        }
    }

    pub(crate) fn encode<B: WireBuf>(&self, dst: &mut B) {
        match self {
            Self::Custom(class) => {
                dst.write_u16(type_code::CUSTOM);
                dst.write_string(class);
            }
            Self::Ascii => dst.write_u16(type_code::ASCII),
            Self::Bigint => dst.write_u16(type_code::BIGINT),
            Self::Blob => dst.write_u16(type_code::BLOB),
            Self::Boolean => dst.write_u16(type_code::BOOLEAN),
            Self::Counter => dst.write_u16(type_code::COUNTER),
            Self::Decimal => dst.write_u16(type_code::DECIMAL),
            Self::Double => dst.write_u16(type_code::DOUBLE),
            Self::Float => dst.write_u16(type_code::FLOAT),
            Self::Int => dst.write_u16(type_code::INT),
            Self::Timestamp => dst.write_u16(type_code::TIMESTAMP),
            Self::Uuid => dst.write_u16(type_code::UUID),
            Self::Varchar => dst.write_u16(type_code::VARCHAR),
            Self::Varint => dst.write_u16(type_code::VARINT),
            Self::Timeuuid => dst.write_u16(type_code::TIMEUUID),
            Self::Inet => dst.write_u16(type_code::INET),
            Self::Date => dst.write_u16(type_code::DATE),
            Self::Time => dst.write_u16(type_code::TIME),
            Self::Smallint => dst.write_u16(type_code::SMALLINT),
            Self::Tinyint => dst.write_u16(type_code::TINYINT),
            Self::Duration => dst.write_u16(type_code::DURATION),
            Self::List(element) => {
                dst.write_u16(type_code::LIST);
                element.encode(dst);
            }
            Self::Map(key, value) => {
                dst.write_u16(type_code::MAP);
                key.encode(dst);
                value.encode(dst);
            }
            Self::Set(element) => {
                dst.write_u16(type_code::SET);
                element.encode(dst);
            }
            Self::Udt {
                keyspace,
                name,
                fields,
            } => {
                dst.write_u16(type_code::UDT);
                dst.write_string(keyspace);
                dst.write_string(name);
                dst.write_u16(fields.len() as u16);
                for (field_name, field_type) in fields {
                    dst.write_string(field_name);
                    field_type.encode(dst);
                }
            }
            Self::Tuple(elements) => {
                dst.write_u16(type_code::TUPLE);
                dst.write_u16(elements.len() as u16);
                for element in elements {
                    element.encode(dst);
                }
            }
        }
    }

    pub(crate) fn encoded_size(&self) -> usize {
        sizes::SHORT
            + match self {
                Self::Custom(class) => sizes::of_string(class),
                Self::List(element) | Self::Set(element) => element.encoded_size(),
                Self::Map(key, value) => key.encoded_size() + value.encoded_size(),
                Self::Udt {
                    keyspace,
                    name,
                    fields,
                } => {
                    sizes::of_string(keyspace)
                        + sizes::of_string(name)
                        + sizes::SHORT
                        + fields
                            .iter()
                            .map(|(field_name, field_type)| {
                                sizes::of_string(field_name) + field_type.encoded_size()
                            })
                            .sum::<usize>()
                }
                Self::Tuple(elements) => {
                    sizes::SHORT
                        + elements
                            .iter()
                            .map(Self::encoded_size)
                            .sum::<usize>()
                }
                _ => 0,
            }
    }
}

/// One column of a result set
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    /// Keyspace of the column's table
    pub keyspace: String,
    /// Table the column belongs to
    pub table: String,
    /// Column name
    pub name: String,
    /// Column CQL type
    pub data_type: RawType,
}

/// Metadata block of a Rows result.
///
/// `column_count` stays meaningful when `no_metadata` suppresses the
/// specs; otherwise it must equal `column_specs.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct RowsMetadata {
    /// Number of columns per row
    pub column_count: i32,
    /// Column specs omitted (SKIP_METADATA responses)
    pub no_metadata: bool,
    /// Shared (keyspace, table) when all columns agree
    pub global_table_spec: Option<(String, String)>,
    /// Per-column specs, empty when `no_metadata`
    pub column_specs: Vec<ColumnSpec>,
    /// Paging state to resume the query
    pub paging_state: Option<Bytes>,
    /// Replacement result metadata id (v5)
    pub new_metadata_id: Option<Bytes>,
}

impl Default for RowsMetadata {
    fn default() -> Self {
        Self {
            column_count: 0,
            no_metadata: false,
            global_table_spec: None,
            column_specs: Vec::new(),
            paging_state: None,
            new_metadata_id: None,
        }
    }
}

impl RowsMetadata {
    fn flags(&self) -> i32 {
        let mut flags = 0;
        if self.global_table_spec.is_some() {
            flags |= rows_flags::GLOBAL_TABLES_SPEC;
        }
        if self.paging_state.is_some() {
            flags |= rows_flags::HAS_MORE_PAGES;
        }
        if self.no_metadata {
            flags |= rows_flags::NO_METADATA;
        }
        if self.new_metadata_id.is_some() {
            flags |= rows_flags::METADATA_CHANGED;
        }
        flags
    }

    fn check_encodable(&self, version: ProtocolVersion) -> Result<()> {
        if self.new_metadata_id.is_some() && !version.supports_metadata_changed() {
            return Err(CodecError::invalid(format!(
                "result metadata ids are not supported in {version}"
            )));
        }
        if !self.no_metadata && self.column_specs.len() != self.column_count as usize {
            return Err(CodecError::invalid(format!(
                "column count {} does not match {} column specs",
                self.column_count,
                self.column_specs.len()
            )));
        }
        Ok(())
    }

    pub(crate) fn encode<B: WireBuf>(&self, version: ProtocolVersion, dst: &mut B) -> Result<()> {
        self.check_encodable(version)?;
        dst.write_i32(self.flags());
        dst.write_i32(self.column_count);
        if let Some(paging_state) = &self.paging_state {
            dst.write_bytes(Some(paging_state));
        }
        if let Some(new_metadata_id) = &self.new_metadata_id {
            dst.write_short_bytes(new_metadata_id);
        }
        if !self.no_metadata {
            write_column_specs(&self.global_table_spec, &self.column_specs, dst);
        }
        Ok(())
    }

    pub(crate) fn encoded_size(&self, version: ProtocolVersion) -> Result<usize> {
        self.check_encodable(version)?;
        let mut size = sizes::INT + sizes::INT;
        if let Some(paging_state) = &self.paging_state {
            size += sizes::of_bytes(Some(paging_state));
        }
        if let Some(new_metadata_id) = &self.new_metadata_id {
            size += sizes::of_short_bytes(new_metadata_id);
        }
        if !self.no_metadata {
            size += size_of_column_specs(&self.global_table_spec, &self.column_specs);
        }
        Ok(size)
    }

    pub(crate) fn decode<B: WireBuf>(version: ProtocolVersion, src: &mut B) -> Result<Self> {
        let flags = src.read_i32()?;
        let column_count = src.read_i32()?;
        if column_count < 0 {
            return Err(CodecError::NegativeLength {
                length: column_count,
            });
        }
        let paging_state = if flags & rows_flags::HAS_MORE_PAGES != 0 {
            src.read_bytes()?
        } else {
            None
        };
        let new_metadata_id = if flags & rows_flags::METADATA_CHANGED != 0 {
            if !version.supports_metadata_changed() {
                return Err(CodecError::invalid(format!(
                    "result metadata ids are not supported in {version}"
                )));
            }
            Some(src.read_short_bytes()?)
        } else {
            None
        };

        let no_metadata = flags & rows_flags::NO_METADATA != 0;
        let (global_table_spec, column_specs) = if no_metadata {
            (None, Vec::new())
        } else {
            read_column_specs(flags, column_count as usize, src)?
        };

        Ok(Self {
            column_count,
            no_metadata,
            global_table_spec,
            column_specs,
            paging_state,
            new_metadata_id,
        })
    }
}

/// Metadata block of a Prepared result's bind variables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedMetadata {
    /// Indices of bind variables that form the partition key (v4+)
    pub pk_indices: Vec<u16>,
    /// Shared (keyspace, table) when all variables agree
    pub global_table_spec: Option<(String, String)>,
    /// Per-variable specs
    pub column_specs: Vec<ColumnSpec>,
}

impl PreparedMetadata {
    fn flags(&self) -> i32 {
        if self.global_table_spec.is_some() {
            rows_flags::GLOBAL_TABLES_SPEC
        } else {
            0
        }
    }

    fn check_encodable(&self, version: ProtocolVersion) -> Result<()> {
        if !self.pk_indices.is_empty() && !version.supports_pk_indices() {
            return Err(CodecError::invalid(format!(
                "partition key indices are not supported in {version}"
            )));
        }
        Ok(())
    }

    pub(crate) fn encode<B: WireBuf>(&self, version: ProtocolVersion, dst: &mut B) -> Result<()> {
        self.check_encodable(version)?;
        dst.write_i32(self.flags());
        dst.write_i32(self.column_specs.len() as i32);
        if version.supports_pk_indices() {
            dst.write_i32(self.pk_indices.len() as i32);
            for index in &self.pk_indices {
                dst.write_u16(*index);
            }
        }
        write_column_specs(&self.global_table_spec, &self.column_specs, dst);
        Ok(())
    }

    pub(crate) fn encoded_size(&self, version: ProtocolVersion) -> Result<usize> {
        self.check_encodable(version)?;
        let mut size = sizes::INT + sizes::INT;
        if version.supports_pk_indices() {
            size += sizes::INT + sizes::SHORT * self.pk_indices.len();
        }
        Ok(size + size_of_column_specs(&self.global_table_spec, &self.column_specs))
    }

    pub(crate) fn decode<B: WireBuf>(version: ProtocolVersion, src: &mut B) -> Result<Self> {
        let flags = src.read_i32()?;
        let column_count = src.read_i32()?;
        if column_count < 0 {
            return Err(CodecError::NegativeLength {
                length: column_count,
            });
        }
        let pk_indices = if version.supports_pk_indices() {
            let count = src.read_i32()?;
            if count < 0 {
                return Err(CodecError::NegativeLength { length: count });
            }
            let mut indices = Vec::with_capacity(count as usize);
            for _ in 0..count {
                indices.push(src.read_u16()?);
            }
            indices
        } else {
            Vec::new()
        };
        let (global_table_spec, column_specs) =
            read_column_specs(flags, column_count as usize, src)?;

        Ok(Self {
            pk_indices,
            global_table_spec,
            column_specs,
        })
    }
}

fn write_column_specs<B: WireBuf>(
    global_table_spec: &Option<(String, String)>,
    column_specs: &[ColumnSpec],
    dst: &mut B,
) {
    if let Some((keyspace, table)) = global_table_spec {
        dst.write_string(keyspace);
        dst.write_string(table);
    }
    for spec in column_specs {
        if global_table_spec.is_none() {
            dst.write_string(&spec.keyspace);
            dst.write_string(&spec.table);
        }
        dst.write_string(&spec.name);
        spec.data_type.encode(dst);
    }
}

fn size_of_column_specs(
    global_table_spec: &Option<(String, String)>,
    column_specs: &[ColumnSpec],
) -> usize {
    let mut size = 0;
    if let Some((keyspace, table)) = global_table_spec {
        size += sizes::of_string(keyspace) + sizes::of_string(table);
    }
    for spec in column_specs {
        if global_table_spec.is_none() {
            size += sizes::of_string(&spec.keyspace) + sizes::of_string(&spec.table);
        }
        size += sizes::of_string(&spec.name) + spec.data_type.encoded_size();
    }
    size
}

fn read_column_specs<B: WireBuf>(
    flags: i32,
    column_count: usize,
    src: &mut B,
) -> Result<(Option<(String, String)>, Vec<ColumnSpec>)> {
    let global_table_spec = if flags & rows_flags::GLOBAL_TABLES_SPEC != 0 {
        Some((src.read_string()?, src.read_string()?))
    } else {
        None
    };
    let mut column_specs = Vec::with_capacity(column_count);
    for _ in 0..column_count {
        let (keyspace, table) = match &global_table_spec {
            Some((keyspace, table)) => (keyspace.clone(), table.clone()),
            None => (src.read_string()?, src.read_string()?),
        };
        let name = src.read_string()?;
        let data_type = RawType::decode(src)?;
        column_specs.push(ColumnSpec {
            keyspace,
            table,
            name,
            data_type,
        });
    }
    Ok((global_table_spec, column_specs))
}
