//! PREPARE message

use crate::protocol::error::{CodecError, Result};
use crate::protocol::message::{wrong_message, Message, MessageCodec};
use crate::protocol::primitive::{sizes, WireBuf};
use crate::protocol::types::{Opcode, ProtocolVersion};

/// PREPARE flag gating the keyspace field (v5 / DSE v2)
const WITH_KEYSPACE: i32 = 0x01;

/// Statement to prepare
#[derive(Debug, Clone, PartialEq)]
pub struct Prepare {
    /// CQL text
    pub query: String,
    /// Keyspace to prepare against (v5 / DSE v2)
    pub keyspace: Option<String>,
}

impl Prepare {
    /// Prepare a statement without an explicit keyspace
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            keyspace: None,
        }
    }
}

/// Codec for [`Prepare`] under one protocol version
#[derive(Debug)]
pub struct PrepareCodec {
    version: ProtocolVersion,
}

impl PrepareCodec {
    /// Create the codec for a version
    #[must_use]
    pub fn new(version: ProtocolVersion) -> Self {
        Self { version }
    }

    fn check_encodable(&self, prepare: &Prepare) -> Result<()> {
        if prepare.keyspace.is_some() && !self.version.supports_keyspace_parameter() {
            return Err(CodecError::invalid(format!(
                "PREPARE keyspace is not supported in {}",
                self.version
            )));
        }
        Ok(())
    }
}

impl<B: WireBuf> MessageCodec<B> for PrepareCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Prepare
    }

    fn encode(&self, message: &Message, dst: &mut B) -> Result<()> {
        let Message::Prepare(prepare) = message else {
            return Err(wrong_message(Opcode::Prepare, message));
        };
        self.check_encodable(prepare)?;
        dst.write_long_string(&prepare.query);
        if self.version.supports_keyspace_parameter() {
            match &prepare.keyspace {
                Some(keyspace) => {
                    dst.write_i32(WITH_KEYSPACE);
                    dst.write_string(keyspace);
                }
                None => dst.write_i32(0),
            }
        }
        Ok(())
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Prepare(prepare) = message else {
            return Err(wrong_message(Opcode::Prepare, message));
        };
        self.check_encodable(prepare)?;
        let mut size = sizes::of_long_string(&prepare.query);
        if self.version.supports_keyspace_parameter() {
            size += sizes::INT;
            if let Some(keyspace) = &prepare.keyspace {
                size += sizes::of_string(keyspace);
            }
        }
        Ok(size)
    }

    fn decode(&self, src: &mut B) -> Result<Message> {
        let query = src.read_long_string()?;
        let keyspace = if self.version.supports_keyspace_parameter() {
            let flags = src.read_i32()?;
            if flags & WITH_KEYSPACE != 0 {
                Some(src.read_string()?)
            } else {
                None
            }
        } else {
            None
        };
        Ok(Message::Prepare(Prepare { query, keyspace }))
    }
}
