//! OPTIONS and SUPPORTED messages

use crate::protocol::collection::OrderedMap;
use crate::protocol::error::Result;
use crate::protocol::message::{wrong_message, Message, MessageCodec};
use crate::protocol::primitive::{sizes, WireBuf};
use crate::protocol::types::Opcode;

/// STARTUP options the server supports, keyed by option name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Supported {
    /// Option name to accepted values, in wire order
    pub options: OrderedMap<String, Vec<String>>,
}

/// Codec for the body-less OPTIONS request
#[derive(Debug, Default)]
pub struct OptionsCodec;

impl OptionsCodec {
    /// Create the codec
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<B: WireBuf> MessageCodec<B> for OptionsCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Options
    }

    fn encode(&self, message: &Message, _dst: &mut B) -> Result<()> {
        match message {
            Message::Options => Ok(()),
            other => Err(wrong_message(Opcode::Options, other)),
        }
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        match message {
            Message::Options => Ok(0),
            other => Err(wrong_message(Opcode::Options, other)),
        }
    }

    fn decode(&self, _src: &mut B) -> Result<Message> {
        Ok(Message::Options)
    }
}

/// Codec for [`Supported`]
#[derive(Debug, Default)]
pub struct SupportedCodec;

impl SupportedCodec {
    /// Create the codec
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<B: WireBuf> MessageCodec<B> for SupportedCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Supported
    }

    fn encode(&self, message: &Message, dst: &mut B) -> Result<()> {
        let Message::Supported(supported) = message else {
            return Err(wrong_message(Opcode::Supported, message));
        };
        dst.write_string_multimap(&supported.options);
        Ok(())
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Supported(supported) = message else {
            return Err(wrong_message(Opcode::Supported, message));
        };
        Ok(sizes::of_string_multimap(&supported.options))
    }

    fn decode(&self, src: &mut B) -> Result<Message> {
        let options = src.read_string_multimap()?;
        Ok(Message::Supported(Supported { options }))
    }
}
