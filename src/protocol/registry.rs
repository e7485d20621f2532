//! Per-version opcode registry
//!
//! A [`CodecRegistry`] owns one codec instance per opcode for each side
//! of the wire: the encode side covers what this peer sends, the decode
//! side what it receives. The builder seeds the standard codec set for
//! a `(version, direction)` pair, accepts extra codecs, and validates
//! on build that every mandatory opcode is covered exactly once.
//! Lookup is O(1) on the opcode byte; the registry is immutable after
//! build and safe to share.

use std::collections::HashMap;
use std::sync::Arc;

use super::error::{CodecError, Result};
use super::message::{
    AuthChallengeCodec, AuthResponseCodec, AuthSuccessCodec, AuthenticateCodec, BatchCodec,
    ErrorCodec, EventCodec, ExecuteCodec, MessageCodec, OptionsCodec, PrepareCodec, QueryCodec,
    ReadyCodec, RegisterCodec, ResultCodec, StartupCodec, SupportedCodec,
};
use super::primitive::WireBuf;
use super::types::{Direction, Opcode, ProtocolVersion};

/// Opcodes every client must be able to encode (and server decode)
pub const REQUEST_OPCODES: [Opcode; 8] = [
    Opcode::Startup,
    Opcode::Options,
    Opcode::Query,
    Opcode::Prepare,
    Opcode::Execute,
    Opcode::Register,
    Opcode::Batch,
    Opcode::AuthResponse,
];

/// Opcodes every server must be able to encode (and client decode)
pub const RESPONSE_OPCODES: [Opcode; 8] = [
    Opcode::Error,
    Opcode::Ready,
    Opcode::Authenticate,
    Opcode::Supported,
    Opcode::Result,
    Opcode::Event,
    Opcode::AuthChallenge,
    Opcode::AuthSuccess,
];

fn request_codecs<B: WireBuf + 'static>(
    version: ProtocolVersion,
) -> Vec<Arc<dyn MessageCodec<B>>> {
    vec![
        Arc::new(StartupCodec::new()),
        Arc::new(OptionsCodec::new()),
        Arc::new(QueryCodec::new(version)),
        Arc::new(PrepareCodec::new(version)),
        Arc::new(ExecuteCodec::new(version)),
        Arc::new(RegisterCodec::new()),
        Arc::new(BatchCodec::new(version)),
        Arc::new(AuthResponseCodec::new()),
    ]
}

fn response_codecs<B: WireBuf + 'static>(
    version: ProtocolVersion,
) -> Vec<Arc<dyn MessageCodec<B>>> {
    vec![
        Arc::new(ErrorCodec::new(version)),
        Arc::new(ReadyCodec::new()),
        Arc::new(AuthenticateCodec::new()),
        Arc::new(SupportedCodec::new()),
        Arc::new(ResultCodec::new(version)),
        Arc::new(EventCodec::new(version)),
        Arc::new(AuthChallengeCodec::new()),
        Arc::new(AuthSuccessCodec::new()),
    ]
}

/// Immutable opcode-to-codec mappings for one protocol version
pub struct CodecRegistry<B: WireBuf> {
    version: ProtocolVersion,
    encoders: HashMap<u8, Arc<dyn MessageCodec<B>>>,
    decoders: HashMap<u8, Arc<dyn MessageCodec<B>>>,
}

impl<B: WireBuf + 'static> CodecRegistry<B> {
    /// Start building a registry
    #[must_use]
    pub fn builder(version: ProtocolVersion, direction: Direction) -> RegistryBuilder<B> {
        RegistryBuilder {
            version,
            direction,
            encoders: Vec::new(),
            decoders: Vec::new(),
        }
    }

    /// Standard client-side registry for a version
    #[must_use]
    pub fn client(version: ProtocolVersion) -> Self {
        Self::builder(version, Direction::Client)
            .with_defaults()
            .build()
            .expect("default codec set covers every mandatory opcode")
    }

    /// Standard server-side registry for a version
    #[must_use]
    pub fn server(version: ProtocolVersion) -> Self {
        Self::builder(version, Direction::Server)
            .with_defaults()
            .build()
            .expect("default codec set covers every mandatory opcode")
    }

    /// Protocol version this registry was built for
    #[must_use]
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Codec for encoding the given opcode
    pub fn encoder(&self, opcode: Opcode) -> Result<&dyn MessageCodec<B>> {
        self.encoders
            .get(&opcode.as_u8())
            .map(AsRef::as_ref)
            .ok_or(CodecError::UnregisteredOpcode {
                opcode: opcode.as_u8(),
            })
    }

    /// Codec for decoding the given opcode
    pub fn decoder(&self, opcode: Opcode) -> Result<&dyn MessageCodec<B>> {
        self.decoders
            .get(&opcode.as_u8())
            .map(AsRef::as_ref)
            .ok_or(CodecError::UnregisteredOpcode {
                opcode: opcode.as_u8(),
            })
    }
}

/// Builder validating and assembling a [`CodecRegistry`]
pub struct RegistryBuilder<B: WireBuf> {
    version: ProtocolVersion,
    direction: Direction,
    encoders: Vec<Arc<dyn MessageCodec<B>>>,
    decoders: Vec<Arc<dyn MessageCodec<B>>>,
}

impl<B: WireBuf + 'static> RegistryBuilder<B> {
    /// Add the standard codec set for this version and direction
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        let (outgoing, incoming) = match self.direction {
            Direction::Client => (
                request_codecs(self.version),
                response_codecs(self.version),
            ),
            Direction::Server => (
                response_codecs(self.version),
                request_codecs(self.version),
            ),
        };
        self.encoders.extend(outgoing);
        self.decoders.extend(incoming);
        self
    }

    /// Add an encoder for an additional or replacement-free opcode
    #[must_use]
    pub fn with_encoder(mut self, codec: Arc<dyn MessageCodec<B>>) -> Self {
        self.encoders.push(codec);
        self
    }

    /// Add a decoder for an additional or replacement-free opcode
    #[must_use]
    pub fn with_decoder(mut self, codec: Arc<dyn MessageCodec<B>>) -> Self {
        self.decoders.push(codec);
        self
    }

    /// Validate and build the registry
    pub fn build(self) -> Result<CodecRegistry<B>> {
        let encoders = index_codecs(self.encoders)?;
        let decoders = index_codecs(self.decoders)?;

        let (encode_side, decode_side) = match self.direction {
            Direction::Client => (&REQUEST_OPCODES, &RESPONSE_OPCODES),
            Direction::Server => (&RESPONSE_OPCODES, &REQUEST_OPCODES),
        };
        for opcode in encode_side {
            if !encoders.contains_key(&opcode.as_u8()) {
                return Err(CodecError::invalid(format!(
                    "missing encoder for mandatory opcode {opcode}"
                )));
            }
        }
        for opcode in decode_side {
            if !decoders.contains_key(&opcode.as_u8()) {
                return Err(CodecError::invalid(format!(
                    "missing decoder for mandatory opcode {opcode}"
                )));
            }
        }

        Ok(CodecRegistry {
            version: self.version,
            encoders,
            decoders,
        })
    }
}

fn index_codecs<B: WireBuf>(
    codecs: Vec<Arc<dyn MessageCodec<B>>>,
) -> Result<HashMap<u8, Arc<dyn MessageCodec<B>>>> {
    let mut indexed = HashMap::with_capacity(codecs.len());
    for codec in codecs {
        let opcode = codec.opcode();
        if indexed.insert(opcode.as_u8(), codec).is_some() {
            return Err(CodecError::invalid(format!(
                "duplicate codec for opcode {opcode}"
            )));
        }
    }
    Ok(indexed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mock::MockWireBuf;

    #[test]
    fn test_client_registry_covers_both_sides() {
        let registry: CodecRegistry<MockWireBuf> = CodecRegistry::client(ProtocolVersion::V4);
        assert_eq!(registry.version(), ProtocolVersion::V4);

        for opcode in REQUEST_OPCODES {
            assert!(registry.encoder(opcode).is_ok(), "missing encoder for {opcode}");
            assert!(registry.decoder(opcode).is_err());
        }
        for opcode in RESPONSE_OPCODES {
            assert!(registry.decoder(opcode).is_ok(), "missing decoder for {opcode}");
            assert!(registry.encoder(opcode).is_err());
        }
    }

    #[test]
    fn test_server_registry_mirrors_client() {
        let registry: CodecRegistry<MockWireBuf> = CodecRegistry::server(ProtocolVersion::V5);
        assert!(registry.encoder(Opcode::Result).is_ok());
        assert!(registry.decoder(Opcode::Query).is_ok());
        assert!(registry.encoder(Opcode::Query).is_err());
    }

    #[test]
    fn test_duplicate_codec_rejected() {
        let result = CodecRegistry::<MockWireBuf>::builder(ProtocolVersion::V4, Direction::Client)
            .with_defaults()
            .with_encoder(Arc::new(StartupCodec::new()))
            .build();
        assert!(matches!(result, Err(CodecError::InvalidArgument { .. })));
    }

    #[test]
    fn test_missing_mandatory_codec_rejected() {
        let result = CodecRegistry::<MockWireBuf>::builder(ProtocolVersion::V4, Direction::Client)
            .with_encoder(Arc::new(StartupCodec::new()))
            .build();
        assert!(matches!(result, Err(CodecError::InvalidArgument { .. })));
    }

    #[test]
    fn test_unregistered_lookup_fails() {
        let registry: CodecRegistry<MockWireBuf> = CodecRegistry::client(ProtocolVersion::V3);
        assert!(matches!(
            registry.encoder(Opcode::Event),
            Err(CodecError::UnregisteredOpcode { opcode: 0x0C })
        ));
    }
}
