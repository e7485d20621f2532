//! STARTUP message

use crate::protocol::collection::OrderedMap;
use crate::protocol::error::Result;
use crate::protocol::message::{wrong_message, Message, MessageCodec};
use crate::protocol::primitive::{sizes, WireBuf};
use crate::protocol::types::{startup_option, Opcode};

/// Default CQL version advertised when none is given
const DEFAULT_CQL_VERSION: &str = "3.0.0";

/// Connection initialization options.
///
/// The option map must carry `CQL_VERSION`; `COMPRESSION`, `NO_COMPACT`
/// and `THROW_ON_OVERLOAD` are optional.
#[derive(Debug, Clone, PartialEq)]
pub struct Startup {
    /// STARTUP option map, in wire order
    pub options: OrderedMap<String, String>,
}

impl Startup {
    /// Create a STARTUP with the default CQL version and no compression
    #[must_use]
    pub fn new() -> Self {
        let mut options = OrderedMap::new();
        options.insert(
            startup_option::CQL_VERSION.to_string(),
            DEFAULT_CQL_VERSION.to_string(),
        );
        Self { options }
    }

    /// Create a STARTUP negotiating a compression algorithm
    #[must_use]
    pub fn with_compression(algorithm: &str) -> Self {
        let mut startup = Self::new();
        startup.options.insert(
            startup_option::COMPRESSION.to_string(),
            algorithm.to_string(),
        );
        startup
    }

    /// The negotiated compression algorithm, if any
    #[must_use]
    pub fn compression(&self) -> Option<&str> {
        self.options
            .get(startup_option::COMPRESSION)
            .map(String::as_str)
    }
}

impl Default for Startup {
    fn default() -> Self {
        Self::new()
    }
}

/// Codec for [`Startup`]; the layout is identical across versions
#[derive(Debug, Default)]
pub struct StartupCodec;

impl StartupCodec {
    /// Create the codec
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<B: WireBuf> MessageCodec<B> for StartupCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Startup
    }

    fn encode(&self, message: &Message, dst: &mut B) -> Result<()> {
        let Message::Startup(startup) = message else {
            return Err(wrong_message(Opcode::Startup, message));
        };
        dst.write_string_map(&startup.options);
        Ok(())
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Startup(startup) = message else {
            return Err(wrong_message(Opcode::Startup, message));
        };
        Ok(sizes::of_string_map(&startup.options))
    }

    fn decode(&self, src: &mut B) -> Result<Message> {
        let options = src.read_string_map()?;
        Ok(Message::Startup(Startup { options }))
    }
}
