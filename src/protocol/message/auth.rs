//! READY and the SASL authentication messages
//!
//! AUTHENTICATE, AUTH_CHALLENGE, AUTH_RESPONSE, and AUTH_SUCCESS carry
//! opaque SASL tokens as `[bytes]`; the codec never interprets them.
//! Token null-ness is meaningful to some SASL mechanisms, so it is
//! preserved across the wire.

use bytes::Bytes;

use crate::protocol::error::Result;
use crate::protocol::message::{wrong_message, Message, MessageCodec};
use crate::protocol::primitive::{sizes, WireBuf};
use crate::protocol::types::Opcode;

/// Server demand for authentication, naming the authenticator class
#[derive(Debug, Clone, PartialEq)]
pub struct Authenticate {
    /// Fully qualified authenticator name
    pub authenticator: String,
}

/// SASL challenge token
#[derive(Debug, Clone, PartialEq)]
pub struct AuthChallenge {
    /// Opaque challenge bytes
    pub token: Option<Bytes>,
}

/// SASL response token
#[derive(Debug, Clone, PartialEq)]
pub struct AuthResponse {
    /// Opaque response bytes
    pub token: Option<Bytes>,
}

/// Authentication success, with an optional final token
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSuccess {
    /// Opaque final bytes
    pub token: Option<Bytes>,
}

/// Codec for the body-less READY response
#[derive(Debug, Default)]
pub struct ReadyCodec;

impl ReadyCodec {
    /// Create the codec
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<B: WireBuf> MessageCodec<B> for ReadyCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Ready
    }

    fn encode(&self, message: &Message, _dst: &mut B) -> Result<()> {
        match message {
            Message::Ready => Ok(()),
            other => Err(wrong_message(Opcode::Ready, other)),
        }
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        match message {
            Message::Ready => Ok(0),
            other => Err(wrong_message(Opcode::Ready, other)),
        }
    }

    fn decode(&self, _src: &mut B) -> Result<Message> {
        Ok(Message::Ready)
    }
}

/// Codec for [`Authenticate`]
#[derive(Debug, Default)]
pub struct AuthenticateCodec;

impl AuthenticateCodec {
    /// Create the codec
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<B: WireBuf> MessageCodec<B> for AuthenticateCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Authenticate
    }

    fn encode(&self, message: &Message, dst: &mut B) -> Result<()> {
        let Message::Authenticate(authenticate) = message else {
            return Err(wrong_message(Opcode::Authenticate, message));
        };
        dst.write_string(&authenticate.authenticator);
        Ok(())
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Authenticate(authenticate) = message else {
            return Err(wrong_message(Opcode::Authenticate, message));
        };
        Ok(sizes::of_string(&authenticate.authenticator))
    }

    fn decode(&self, src: &mut B) -> Result<Message> {
        let authenticator = src.read_string()?;
        Ok(Message::Authenticate(Authenticate { authenticator }))
    }
}

macro_rules! token_codec {
    ($codec:ident, $variant:ident, $opcode:expr) => {
        /// Codec for the token-bearing message of the same name
        #[derive(Debug, Default)]
        pub struct $codec;

        impl $codec {
            /// Create the codec
            #[must_use]
            pub fn new() -> Self {
                Self
            }
        }

        impl<B: WireBuf> MessageCodec<B> for $codec {
            fn opcode(&self) -> Opcode {
                $opcode
            }

            fn encode(&self, message: &Message, dst: &mut B) -> Result<()> {
                let Message::$variant(inner) = message else {
                    return Err(wrong_message($opcode, message));
                };
                dst.write_bytes(inner.token.as_deref());
                Ok(())
            }

            fn encoded_size(&self, message: &Message) -> Result<usize> {
                let Message::$variant(inner) = message else {
                    return Err(wrong_message($opcode, message));
                };
                Ok(sizes::of_bytes(inner.token.as_deref()))
            }

            fn decode(&self, src: &mut B) -> Result<Message> {
                let token = src.read_bytes()?;
                Ok(Message::$variant($variant { token }))
            }
        }
    };
}

token_codec!(AuthChallengeCodec, AuthChallenge, Opcode::AuthChallenge);
token_codec!(AuthResponseCodec, AuthResponse, Opcode::AuthResponse);
token_codec!(AuthSuccessCodec, AuthSuccess, Opcode::AuthSuccess);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mock::MockWireBuf;

    #[test]
    fn test_ready_has_no_body() {
        let codec = ReadyCodec::new();
        let mut encoded = MockWireBuf::new();
        codec.encode(&Message::Ready, &mut encoded).unwrap();
        assert_eq!(encoded, MockWireBuf::new());
        assert_eq!(
            <ReadyCodec as MessageCodec<MockWireBuf>>::encoded_size(&codec, &Message::Ready)
                .unwrap(),
            0
        );
        assert_eq!(codec.decode(&mut MockWireBuf::new()).unwrap(), Message::Ready);
    }

    #[test]
    fn test_authenticate_roundtrip() {
        let codec = AuthenticateCodec::new();
        let message = Message::Authenticate(Authenticate {
            authenticator: "org.apache.cassandra.auth.PasswordAuthenticator".into(),
        });

        let mut buf = MockWireBuf::new();
        codec.encode(&message, &mut buf).unwrap();
        assert_eq!(codec.decode(&mut buf).unwrap(), message);
    }

    #[test]
    fn test_null_token_distinct_from_empty() {
        let codec = AuthResponseCodec::new();

        let null_token = Message::AuthResponse(AuthResponse { token: None });
        let mut buf = MockWireBuf::new();
        codec.encode(&null_token, &mut buf).unwrap();
        assert_eq!(buf, MockWireBuf::new().bytes(None));
        assert_eq!(codec.decode(&mut buf).unwrap(), null_token);

        let empty_token = Message::AuthResponse(AuthResponse {
            token: Some(Bytes::new()),
        });
        let mut buf = MockWireBuf::new();
        codec.encode(&empty_token, &mut buf).unwrap();
        assert_eq!(buf, MockWireBuf::new().bytes(Some(b"")));
        assert_eq!(codec.decode(&mut buf).unwrap(), empty_token);
    }

    #[test]
    fn test_challenge_and_success_roundtrip() {
        let challenge = Message::AuthChallenge(AuthChallenge {
            token: Some(Bytes::from_static(b"nonce")),
        });
        let mut buf = MockWireBuf::new();
        AuthChallengeCodec::new().encode(&challenge, &mut buf).unwrap();
        assert_eq!(AuthChallengeCodec::new().decode(&mut buf).unwrap(), challenge);

        let success = Message::AuthSuccess(AuthSuccess { token: None });
        let mut buf = MockWireBuf::new();
        AuthSuccessCodec::new().encode(&success, &mut buf).unwrap();
        assert_eq!(AuthSuccessCodec::new().decode(&mut buf).unwrap(), success);
    }
}
