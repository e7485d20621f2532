//! Schema-change payload shared by RESULT and EVENT
//!
//! Both outer codecs delegate here, so a schema change produces
//! identical wire bytes whichever frame carries it. FUNCTION and
//! AGGREGATE targets only exist from v4 on; a v3 codec refuses them on
//! both paths before touching the buffer.

use crate::protocol::error::{CodecError, Result};
use crate::protocol::primitive::{sizes, WireBuf};
use crate::protocol::types::{schema_change_target, ProtocolVersion};

/// A DDL outcome: what changed, where, and for which object
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaChange {
    /// CREATED, UPDATED, or DROPPED
    pub change_type: String,
    /// KEYSPACE, TABLE, TYPE, FUNCTION, or AGGREGATE
    pub target: String,
    /// Keyspace the change happened in
    pub keyspace: String,
    /// Object name; absent for KEYSPACE targets
    pub object: Option<String>,
    /// Argument types; only for FUNCTION and AGGREGATE targets
    pub arguments: Option<Vec<String>>,
}

impl SchemaChange {
    /// A keyspace-level change
    #[must_use]
    pub fn keyspace(change_type: &str, keyspace: &str) -> Self {
        Self {
            change_type: change_type.into(),
            target: schema_change_target::KEYSPACE.into(),
            keyspace: keyspace.into(),
            object: None,
            arguments: None,
        }
    }

    fn object(&self) -> Result<&str> {
        self.object.as_deref().ok_or_else(|| {
            CodecError::invalid(format!(
                "schema change target {} requires an object name",
                self.target
            ))
        })
    }

    fn arguments(&self) -> Result<&[String]> {
        self.arguments.as_deref().ok_or_else(|| {
            CodecError::invalid(format!(
                "schema change target {} requires argument types",
                self.target
            ))
        })
    }

    fn check_target(target: &str, version: ProtocolVersion) -> Result<()> {
        match target {
            schema_change_target::KEYSPACE
            | schema_change_target::TABLE
            | schema_change_target::TYPE => Ok(()),
            schema_change_target::FUNCTION | schema_change_target::AGGREGATE => {
                if version.supports_function_targets() {
                    Ok(())
                } else {
                    Err(CodecError::invalid(format!(
                        "schema change target {target} is not supported in {version}"
                    )))
                }
            }
            other => Err(CodecError::invalid(format!(
                "unknown schema change target: {other}"
            ))),
        }
    }

    pub(crate) fn encode<B: WireBuf>(&self, version: ProtocolVersion, dst: &mut B) -> Result<()> {
        // size computation doubles as the pre-write validation pass
        self.encoded_size(version)?;
        dst.write_string(&self.change_type);
        dst.write_string(&self.target);
        dst.write_string(&self.keyspace);
        match self.target.as_str() {
            schema_change_target::KEYSPACE => {}
            schema_change_target::TABLE | schema_change_target::TYPE => {
                dst.write_string(self.object()?);
            }
            _ => {
                dst.write_string(self.object()?);
                dst.write_string_list(self.arguments()?);
            }
        }
        Ok(())
    }

    pub(crate) fn encoded_size(&self, version: ProtocolVersion) -> Result<usize> {
        Self::check_target(&self.target, version)?;
        let mut size = sizes::of_string(&self.change_type)
            + sizes::of_string(&self.target)
            + sizes::of_string(&self.keyspace);
        match self.target.as_str() {
            schema_change_target::KEYSPACE => {}
            schema_change_target::TABLE | schema_change_target::TYPE => {
                size += sizes::of_string(self.object()?);
            }
            _ => {
                size += sizes::of_string(self.object()?);
                size += sizes::of_string_list(self.arguments()?);
            }
        }
        Ok(size)
    }

    pub(crate) fn decode<B: WireBuf>(version: ProtocolVersion, src: &mut B) -> Result<Self> {
        let change_type = src.read_string()?;
        let target = src.read_string()?;
        let keyspace = src.read_string()?;
        Self::check_target(&target, version)?;

        let (object, arguments) = match target.as_str() {
            schema_change_target::KEYSPACE => (None, None),
            schema_change_target::TABLE | schema_change_target::TYPE => {
                (Some(src.read_string()?), None)
            }
            _ => (Some(src.read_string()?), Some(src.read_string_list()?)),
        };

        Ok(Self {
            change_type,
            target,
            keyspace,
            object,
            arguments,
        })
    }
}
