//! EXECUTE message

use bytes::Bytes;

use crate::protocol::error::{CodecError, Result};
use crate::protocol::message::query::QueryParams;
use crate::protocol::message::{wrong_message, Message, MessageCodec};
use crate::protocol::primitive::{sizes, WireBuf};
use crate::protocol::types::{Opcode, ProtocolVersion};

/// Execution of a prepared statement
#[derive(Debug, Clone, PartialEq)]
pub struct Execute {
    /// Prepared statement id
    pub id: Bytes,
    /// Id of the result metadata the client holds (v5)
    pub result_metadata_id: Option<Bytes>,
    /// Parameters block
    pub params: QueryParams,
}

impl Execute {
    /// Execute a prepared id with default parameters
    #[must_use]
    pub fn new(id: Bytes) -> Self {
        Self {
            id,
            result_metadata_id: None,
            params: QueryParams::default(),
        }
    }
}

/// Codec for [`Execute`] under one protocol version
#[derive(Debug)]
pub struct ExecuteCodec {
    version: ProtocolVersion,
}

impl ExecuteCodec {
    /// Create the codec for a version
    #[must_use]
    pub fn new(version: ProtocolVersion) -> Self {
        Self { version }
    }

    fn check_encodable(&self, execute: &Execute) -> Result<()> {
        if self.version.supports_result_metadata_id() {
            if execute.result_metadata_id.is_none() {
                return Err(CodecError::invalid(format!(
                    "EXECUTE requires a result metadata id in {}",
                    self.version
                )));
            }
        } else if execute.result_metadata_id.is_some() {
            return Err(CodecError::invalid(format!(
                "EXECUTE result metadata id is not supported in {}",
                self.version
            )));
        }
        Ok(())
    }
}

impl<B: WireBuf> MessageCodec<B> for ExecuteCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Execute
    }

    fn encode(&self, message: &Message, dst: &mut B) -> Result<()> {
        let Message::Execute(execute) = message else {
            return Err(wrong_message(Opcode::Execute, message));
        };
        self.check_encodable(execute)?;
        execute.params.check_encodable(self.version)?;
        dst.write_short_bytes(&execute.id);
        if let Some(result_metadata_id) = &execute.result_metadata_id {
            dst.write_short_bytes(result_metadata_id);
        }
        execute.params.encode(self.version, dst)
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Execute(execute) = message else {
            return Err(wrong_message(Opcode::Execute, message));
        };
        self.check_encodable(execute)?;
        let mut size = sizes::of_short_bytes(&execute.id);
        if let Some(result_metadata_id) = &execute.result_metadata_id {
            size += sizes::of_short_bytes(result_metadata_id);
        }
        Ok(size + execute.params.encoded_size(self.version)?)
    }

    fn decode(&self, src: &mut B) -> Result<Message> {
        let id = src.read_short_bytes()?;
        let result_metadata_id = if self.version.supports_result_metadata_id() {
            Some(src.read_short_bytes()?)
        } else {
            None
        };
        let params = QueryParams::decode(self.version, src)?;
        Ok(Message::Execute(Execute {
            id,
            result_metadata_id,
            params,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mock::MockWireBuf;

    #[test]
    fn test_v4_layout() {
        let codec = ExecuteCodec::new(ProtocolVersion::V4);
        let message = Message::Execute(Execute::new(Bytes::from_static(b"\xCA\xFE")));

        let mut buf = MockWireBuf::new();
        codec.encode(&message, &mut buf).unwrap();
        assert_eq!(
            buf,
            MockWireBuf::new()
                .short_bytes(b"\xCA\xFE")
                .short(0x0001)
                .byte(0)
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), message);
    }

    #[test]
    fn test_v5_requires_result_metadata_id() {
        let codec = ExecuteCodec::new(ProtocolVersion::V5);
        let without_id = Message::Execute(Execute::new(Bytes::from_static(b"\x01")));
        assert!(matches!(
            <ExecuteCodec as MessageCodec<MockWireBuf>>::encoded_size(&codec, &without_id),
            Err(CodecError::InvalidArgument { .. })
        ));

        let message = Message::Execute(Execute {
            id: Bytes::from_static(b"\x01"),
            result_metadata_id: Some(Bytes::from_static(b"\x02")),
            params: QueryParams::default(),
        });
        let mut buf = MockWireBuf::new();
        codec.encode(&message, &mut buf).unwrap();
        assert_eq!(
            buf,
            MockWireBuf::new()
                .short_bytes(b"\x01")
                .short_bytes(b"\x02")
                .short(0x0001)
                .int(0)
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), message);
    }

    #[test]
    fn test_metadata_id_rejected_below_v5() {
        let codec = ExecuteCodec::new(ProtocolVersion::V3);
        let message = Message::Execute(Execute {
            id: Bytes::from_static(b"\x01"),
            result_metadata_id: Some(Bytes::from_static(b"\x02")),
            params: QueryParams::default(),
        });
        assert!(
            <ExecuteCodec as MessageCodec<MockWireBuf>>::encoded_size(&codec, &message).is_err()
        );
    }
}
