//! Message types and per-opcode codecs
//!
//! A [`Message`] is one tagged variant per opcode. Codecs are immutable
//! instances constructed once per `(protocol version, opcode)` pair at
//! registry build time; each implements [`MessageCodec`] over any
//! [`WireBuf`] backend. RESULT, ERROR, and EVENT install inner
//! registries keyed by their secondary discriminator.

mod auth;
mod batch;
mod error;
mod event;
mod execute;
mod metadata;
mod options;
mod prepare;
mod query;
mod register;
mod result;
mod schema;
mod startup;

pub use auth::{
    AuthChallenge, AuthChallengeCodec, AuthResponse, AuthResponseCodec, AuthSuccess,
    AuthSuccessCodec, Authenticate, AuthenticateCodec, ReadyCodec,
};
pub use batch::{batch_type, Batch, BatchCodec, BatchStatement};
pub use error::{ErrorCodec, ErrorDetail, ErrorResponse};
pub use event::{Event, EventCodec};
pub use execute::{Execute, ExecuteCodec};
pub use metadata::{ColumnSpec, PreparedMetadata, RawType, RowsMetadata};
pub use options::{OptionsCodec, Supported, SupportedCodec};
pub use prepare::{Prepare, PrepareCodec};
pub use query::{query_flags, Query, QueryCodec, QueryParams, QueryValues};
pub use register::{Register, RegisterCodec};
pub use result::{Prepared, ResultBody, ResultCodec, Rows};
pub use schema::SchemaChange;
pub use startup::{Startup, StartupCodec};

use super::error::{CodecError, Result};
use super::primitive::WireBuf;
use super::types::Opcode;

/// One protocol message, tagged by opcode
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// ERROR response
    Error(ErrorResponse),
    /// STARTUP request
    Startup(Startup),
    /// READY response
    Ready,
    /// AUTHENTICATE response
    Authenticate(Authenticate),
    /// OPTIONS request
    Options,
    /// SUPPORTED response
    Supported(Supported),
    /// QUERY request
    Query(Query),
    /// RESULT response
    Result(ResultBody),
    /// PREPARE request
    Prepare(Prepare),
    /// EXECUTE request
    Execute(Execute),
    /// REGISTER request
    Register(Register),
    /// EVENT push
    Event(Event),
    /// BATCH request
    Batch(Batch),
    /// AUTH_CHALLENGE response
    AuthChallenge(AuthChallenge),
    /// AUTH_RESPONSE request
    AuthResponse(AuthResponse),
    /// AUTH_SUCCESS response
    AuthSuccess(AuthSuccess),
}

impl Message {
    /// The opcode this message is framed under
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Error(_) => Opcode::Error,
            Self::Startup(_) => Opcode::Startup,
            Self::Ready => Opcode::Ready,
            Self::Authenticate(_) => Opcode::Authenticate,
            Self::Options => Opcode::Options,
            Self::Supported(_) => Opcode::Supported,
            Self::Query(_) => Opcode::Query,
            Self::Result(_) => Opcode::Result,
            Self::Prepare(_) => Opcode::Prepare,
            Self::Execute(_) => Opcode::Execute,
            Self::Register(_) => Opcode::Register,
            Self::Event(_) => Opcode::Event,
            Self::Batch(_) => Opcode::Batch,
            Self::AuthChallenge(_) => Opcode::AuthChallenge,
            Self::AuthResponse(_) => Opcode::AuthResponse,
            Self::AuthSuccess(_) => Opcode::AuthSuccess,
        }
    }
}

/// Encoder/decoder for one opcode under one protocol version.
///
/// Implementations are stateless after construction and safe to share
/// across threads.
pub trait MessageCodec<B: WireBuf>: Send + Sync {
    /// Opcode this codec serves
    fn opcode(&self) -> Opcode;

    /// Write the message payload (no frame header)
    fn encode(&self, message: &Message, dst: &mut B) -> Result<()>;

    /// Exact byte count [`encode`](Self::encode) will write
    fn encoded_size(&self, message: &Message) -> Result<usize>;

    /// Read the message payload (no frame header)
    fn decode(&self, src: &mut B) -> Result<Message>;
}

/// Rejection for a message handed to the wrong codec
pub(crate) fn wrong_message(expected: Opcode, got: &Message) -> CodecError {
    CodecError::invalid(format!(
        "expected a {expected} message, got {}",
        got.opcode()
    ))
}
