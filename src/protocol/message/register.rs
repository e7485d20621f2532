//! REGISTER message

use crate::protocol::error::Result;
use crate::protocol::message::{wrong_message, Message, MessageCodec};
use crate::protocol::primitive::{sizes, WireBuf};
use crate::protocol::types::{event_type, Opcode};

/// Subscription to server push events
#[derive(Debug, Clone, PartialEq)]
pub struct Register {
    /// Event type strings to subscribe to
    pub event_types: Vec<String>,
}

impl Register {
    /// Subscribe to every event type this crate understands
    #[must_use]
    pub fn all() -> Self {
        Self {
            event_types: vec![
                event_type::TOPOLOGY_CHANGE.to_string(),
                event_type::STATUS_CHANGE.to_string(),
                event_type::SCHEMA_CHANGE.to_string(),
            ],
        }
    }
}

/// Codec for [`Register`]
#[derive(Debug, Default)]
pub struct RegisterCodec;

impl RegisterCodec {
    /// Create the codec
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<B: WireBuf> MessageCodec<B> for RegisterCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Register
    }

    fn encode(&self, message: &Message, dst: &mut B) -> Result<()> {
        let Message::Register(register) = message else {
            return Err(wrong_message(Opcode::Register, message));
        };
        dst.write_string_list(&register.event_types);
        Ok(())
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Register(register) = message else {
            return Err(wrong_message(Opcode::Register, message));
        };
        Ok(sizes::of_string_list(&register.event_types))
    }

    fn decode(&self, src: &mut B) -> Result<Message> {
        let event_types = src.read_string_list()?;
        Ok(Message::Register(Register { event_types }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mock::MockWireBuf;

    #[test]
    fn test_register_all_roundtrip() {
        let codec = RegisterCodec::new();
        let message = Message::Register(Register::all());

        let mut buf = MockWireBuf::new();
        codec.encode(&message, &mut buf).unwrap();
        assert_eq!(
            buf,
            MockWireBuf::new()
                .short(3)
                .string("TOPOLOGY_CHANGE")
                .string("STATUS_CHANGE")
                .string("SCHEMA_CHANGE")
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), message);
    }

    #[test]
    fn test_empty_subscription() {
        let codec = RegisterCodec::new();
        let message = Message::Register(Register { event_types: vec![] });
        assert_eq!(
            <RegisterCodec as MessageCodec<MockWireBuf>>::encoded_size(&codec, &message).unwrap(),
            sizes::SHORT
        );
    }
}
