//! ERROR message and its per-code sub-codecs
//!
//! The payload opens with an `[int]` error code and a `[string]`
//! message; code-specific fields follow. The codec dispatches on the
//! code through an inner registry of function pairs. Read and write
//! failures change shape in v5 (replica reason maps replace the bare
//! failure count), so those entries are selected per version at
//! construction.

use std::collections::HashMap;
use std::net::IpAddr;

use bytes::Bytes;

use crate::protocol::collection::OrderedMap;
use crate::protocol::error::{CodecError, Result};
use crate::protocol::message::{wrong_message, Message, MessageCodec};
use crate::protocol::primitive::{sizes, WireBuf};
use crate::protocol::types::{error_code, Opcode, ProtocolVersion};

/// Server-reported error
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    /// Error code (see [`error_code`])
    pub code: i32,
    /// Human-readable message
    pub message: String,
    /// Code-specific fields
    pub detail: ErrorDetail,
}

impl ErrorResponse {
    /// Build an error for a code that carries no extra fields
    #[must_use]
    pub fn simple(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: ErrorDetail::Simple,
        }
    }
}

/// Code-specific fields of an [`ErrorResponse`]
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetail {
    /// Codes that carry only the message
    Simple,
    /// UNAVAILABLE
    Unavailable {
        /// Consistency level of the failed query
        consistency: u16,
        /// Replicas the consistency level requires
        required: i32,
        /// Replicas known alive
        alive: i32,
    },
    /// WRITE_TIMEOUT
    WriteTimeout {
        /// Consistency level of the failed query
        consistency: u16,
        /// Replicas that acknowledged
        received: i32,
        /// Replicas required to acknowledge
        block_for: i32,
        /// Kind of write that timed out
        write_type: String,
    },
    /// READ_TIMEOUT
    ReadTimeout {
        /// Consistency level of the failed query
        consistency: u16,
        /// Replicas that answered
        received: i32,
        /// Replicas required to answer
        block_for: i32,
        /// Whether the data replica responded
        data_present: bool,
    },
    /// READ_FAILURE
    ReadFailure {
        /// Consistency level of the failed query
        consistency: u16,
        /// Replicas that answered
        received: i32,
        /// Replicas required to answer
        block_for: i32,
        /// Replicas that failed; equals the reason map size in v5
        num_failures: i32,
        /// Failing replica to reason code (v5, empty below)
        reason_map: OrderedMap<IpAddr, u16>,
        /// Whether the data replica responded
        data_present: bool,
    },
    /// WRITE_FAILURE
    WriteFailure {
        /// Consistency level of the failed query
        consistency: u16,
        /// Replicas that acknowledged
        received: i32,
        /// Replicas required to acknowledge
        block_for: i32,
        /// Replicas that failed; equals the reason map size in v5
        num_failures: i32,
        /// Failing replica to reason code (v5, empty below)
        reason_map: OrderedMap<IpAddr, u16>,
        /// Kind of write that failed
        write_type: String,
    },
    /// FUNCTION_FAILURE
    FunctionFailure {
        /// Keyspace of the function
        keyspace: String,
        /// Function name
        function: String,
        /// Argument CQL types
        arg_types: Vec<String>,
    },
    /// ALREADY_EXISTS; an empty table means a keyspace-level collision
    AlreadyExists {
        /// Keyspace of the colliding object
        keyspace: String,
        /// Colliding table, empty for keyspaces
        table: String,
    },
    /// UNPREPARED
    Unprepared {
        /// Prepared id the coordinator does not know
        id: Bytes,
    },
}

struct ErrorSub<B: WireBuf> {
    encode: fn(&ErrorResponse, &mut B) -> Result<()>,
    encoded_size: fn(&ErrorResponse) -> Result<usize>,
    decode: fn(i32, &mut B) -> Result<ErrorResponse>,
}

/// Codec for [`ErrorResponse`] under one protocol version
pub struct ErrorCodec<B: WireBuf> {
    subs: HashMap<i32, ErrorSub<B>>,
}

const SIMPLE_CODES: [i32; 11] = [
    error_code::SERVER_ERROR,
    error_code::PROTOCOL_ERROR,
    error_code::AUTH_ERROR,
    error_code::OVERLOADED,
    error_code::IS_BOOTSTRAPPING,
    error_code::TRUNCATE_ERROR,
    error_code::SYNTAX_ERROR,
    error_code::UNAUTHORIZED,
    error_code::INVALID,
    error_code::CONFIG_ERROR,
    error_code::CDC_WRITE_FAILURE,
];

impl<B: WireBuf> ErrorCodec<B> {
    /// Create the codec for a version, installing every code
    #[must_use]
    pub fn new(version: ProtocolVersion) -> Self {
        let mut subs = HashMap::new();
        for code in SIMPLE_CODES {
            subs.insert(
                code,
                ErrorSub {
                    encode: simple_encode,
                    encoded_size: simple_size,
                    decode: simple_decode,
                },
            );
        }
        subs.insert(
            error_code::UNAVAILABLE,
            ErrorSub {
                encode: unavailable_encode,
                encoded_size: unavailable_size,
                decode: unavailable_decode,
            },
        );
        subs.insert(
            error_code::WRITE_TIMEOUT,
            ErrorSub {
                encode: write_timeout_encode,
                encoded_size: write_timeout_size,
                decode: write_timeout_decode,
            },
        );
        subs.insert(
            error_code::READ_TIMEOUT,
            ErrorSub {
                encode: read_timeout_encode,
                encoded_size: read_timeout_size,
                decode: read_timeout_decode,
            },
        );
        if version.supports_reason_maps() {
            subs.insert(
                error_code::READ_FAILURE,
                ErrorSub {
                    encode: read_failure_encode_v5,
                    encoded_size: read_failure_size_v5,
                    decode: read_failure_decode_v5,
                },
            );
            subs.insert(
                error_code::WRITE_FAILURE,
                ErrorSub {
                    encode: write_failure_encode_v5,
                    encoded_size: write_failure_size_v5,
                    decode: write_failure_decode_v5,
                },
            );
        } else {
            subs.insert(
                error_code::READ_FAILURE,
                ErrorSub {
                    encode: read_failure_encode_legacy,
                    encoded_size: read_failure_size_legacy,
                    decode: read_failure_decode_legacy,
                },
            );
            subs.insert(
                error_code::WRITE_FAILURE,
                ErrorSub {
                    encode: write_failure_encode_legacy,
                    encoded_size: write_failure_size_legacy,
                    decode: write_failure_decode_legacy,
                },
            );
        }
        subs.insert(
            error_code::FUNCTION_FAILURE,
            ErrorSub {
                encode: function_failure_encode,
                encoded_size: function_failure_size,
                decode: function_failure_decode,
            },
        );
        subs.insert(
            error_code::ALREADY_EXISTS,
            ErrorSub {
                encode: already_exists_encode,
                encoded_size: already_exists_size,
                decode: already_exists_decode,
            },
        );
        subs.insert(
            error_code::UNPREPARED,
            ErrorSub {
                encode: unprepared_encode,
                encoded_size: unprepared_size,
                decode: unprepared_decode,
            },
        );
        Self { subs }
    }

    fn sub(&self, code: i32) -> Result<&ErrorSub<B>> {
        self.subs
            .get(&code)
            .ok_or(CodecError::UnknownErrorCode { code })
    }
}

impl<B: WireBuf> MessageCodec<B> for ErrorCodec<B> {
    fn opcode(&self) -> Opcode {
        Opcode::Error
    }

    fn encode(&self, message: &Message, dst: &mut B) -> Result<()> {
        let Message::Error(error) = message else {
            return Err(wrong_message(Opcode::Error, message));
        };
        let sub = self.sub(error.code)?;
        (sub.encoded_size)(error)?;
        dst.write_i32(error.code);
        (sub.encode)(error, dst)
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Error(error) = message else {
            return Err(wrong_message(Opcode::Error, message));
        };
        let sub = self.sub(error.code)?;
        Ok(sizes::INT + (sub.encoded_size)(error)?)
    }

    fn decode(&self, src: &mut B) -> Result<Message> {
        let code = src.read_i32()?;
        let sub = self.sub(code)?;
        Ok(Message::Error((sub.decode)(code, src)?))
    }
}

fn detail_mismatch(code: i32) -> CodecError {
    CodecError::invalid(format!(
        "error detail does not match error code {code:#x}"
    ))
}

fn simple_encode<B: WireBuf>(error: &ErrorResponse, dst: &mut B) -> Result<()> {
    let ErrorDetail::Simple = &error.detail else {
        return Err(detail_mismatch(error.code));
    };
    dst.write_string(&error.message);
    Ok(())
}

fn simple_size(error: &ErrorResponse) -> Result<usize> {
    let ErrorDetail::Simple = &error.detail else {
        return Err(detail_mismatch(error.code));
    };
    Ok(sizes::of_string(&error.message))
}

fn simple_decode<B: WireBuf>(code: i32, src: &mut B) -> Result<ErrorResponse> {
    Ok(ErrorResponse::simple(code, src.read_string()?))
}

fn unavailable_encode<B: WireBuf>(error: &ErrorResponse, dst: &mut B) -> Result<()> {
    let ErrorDetail::Unavailable {
        consistency,
        required,
        alive,
    } = &error.detail
    else {
        return Err(detail_mismatch(error.code));
    };
    dst.write_string(&error.message);
    dst.write_u16(*consistency);
    dst.write_i32(*required);
    dst.write_i32(*alive);
    Ok(())
}

fn unavailable_size(error: &ErrorResponse) -> Result<usize> {
    let ErrorDetail::Unavailable { .. } = &error.detail else {
        return Err(detail_mismatch(error.code));
    };
    Ok(sizes::of_string(&error.message) + sizes::SHORT + sizes::INT + sizes::INT)
}

fn unavailable_decode<B: WireBuf>(code: i32, src: &mut B) -> Result<ErrorResponse> {
    let message = src.read_string()?;
    let consistency = src.read_u16()?;
    let required = src.read_i32()?;
    let alive = src.read_i32()?;
    Ok(ErrorResponse {
        code,
        message,
        detail: ErrorDetail::Unavailable {
            consistency,
            required,
            alive,
        },
    })
}

fn write_timeout_encode<B: WireBuf>(error: &ErrorResponse, dst: &mut B) -> Result<()> {
    let ErrorDetail::WriteTimeout {
        consistency,
        received,
        block_for,
        write_type,
    } = &error.detail
    else {
        return Err(detail_mismatch(error.code));
    };
    dst.write_string(&error.message);
    dst.write_u16(*consistency);
    dst.write_i32(*received);
    dst.write_i32(*block_for);
    dst.write_string(write_type);
    Ok(())
}

fn write_timeout_size(error: &ErrorResponse) -> Result<usize> {
    let ErrorDetail::WriteTimeout { write_type, .. } = &error.detail else {
        return Err(detail_mismatch(error.code));
    };
    Ok(sizes::of_string(&error.message)
        + sizes::SHORT
        + sizes::INT
        + sizes::INT
        + sizes::of_string(write_type))
}

fn write_timeout_decode<B: WireBuf>(code: i32, src: &mut B) -> Result<ErrorResponse> {
    let message = src.read_string()?;
    let consistency = src.read_u16()?;
    let received = src.read_i32()?;
    let block_for = src.read_i32()?;
    let write_type = src.read_string()?;
    Ok(ErrorResponse {
        code,
        message,
        detail: ErrorDetail::WriteTimeout {
            consistency,
            received,
            block_for,
            write_type,
        },
    })
}

fn read_timeout_encode<B: WireBuf>(error: &ErrorResponse, dst: &mut B) -> Result<()> {
    let ErrorDetail::ReadTimeout {
        consistency,
        received,
        block_for,
        data_present,
    } = &error.detail
    else {
        return Err(detail_mismatch(error.code));
    };
    dst.write_string(&error.message);
    dst.write_u16(*consistency);
    dst.write_i32(*received);
    dst.write_i32(*block_for);
    dst.write_u8(u8::from(*data_present));
    Ok(())
}

fn read_timeout_size(error: &ErrorResponse) -> Result<usize> {
    let ErrorDetail::ReadTimeout { .. } = &error.detail else {
        return Err(detail_mismatch(error.code));
    };
    Ok(sizes::of_string(&error.message) + sizes::SHORT + sizes::INT + sizes::INT + sizes::BYTE)
}

fn read_timeout_decode<B: WireBuf>(code: i32, src: &mut B) -> Result<ErrorResponse> {
    let message = src.read_string()?;
    let consistency = src.read_u16()?;
    let received = src.read_i32()?;
    let block_for = src.read_i32()?;
    let data_present = src.read_u8()? != 0;
    Ok(ErrorResponse {
        code,
        message,
        detail: ErrorDetail::ReadTimeout {
            consistency,
            received,
            block_for,
            data_present,
        },
    })
}

fn read_failure_encode_legacy<B: WireBuf>(error: &ErrorResponse, dst: &mut B) -> Result<()> {
    let ErrorDetail::ReadFailure {
        consistency,
        received,
        block_for,
        num_failures,
        data_present,
        ..
    } = &error.detail
    else {
        return Err(detail_mismatch(error.code));
    };
    dst.write_string(&error.message);
    dst.write_u16(*consistency);
    dst.write_i32(*received);
    dst.write_i32(*block_for);
    dst.write_i32(*num_failures);
    dst.write_u8(u8::from(*data_present));
    Ok(())
}

fn read_failure_size_legacy(error: &ErrorResponse) -> Result<usize> {
    let ErrorDetail::ReadFailure { .. } = &error.detail else {
        return Err(detail_mismatch(error.code));
    };
    Ok(sizes::of_string(&error.message)
        + sizes::SHORT
        + sizes::INT
        + sizes::INT
        + sizes::INT
        + sizes::BYTE)
}

fn read_failure_decode_legacy<B: WireBuf>(code: i32, src: &mut B) -> Result<ErrorResponse> {
    let message = src.read_string()?;
    let consistency = src.read_u16()?;
    let received = src.read_i32()?;
    let block_for = src.read_i32()?;
    let num_failures = src.read_i32()?;
    let data_present = src.read_u8()? != 0;
    Ok(ErrorResponse {
        code,
        message,
        detail: ErrorDetail::ReadFailure {
            consistency,
            received,
            block_for,
            num_failures,
            reason_map: OrderedMap::new(),
            data_present,
        },
    })
}

fn read_failure_encode_v5<B: WireBuf>(error: &ErrorResponse, dst: &mut B) -> Result<()> {
    let ErrorDetail::ReadFailure {
        consistency,
        received,
        block_for,
        reason_map,
        data_present,
        ..
    } = &error.detail
    else {
        return Err(detail_mismatch(error.code));
    };
    dst.write_string(&error.message);
    dst.write_u16(*consistency);
    dst.write_i32(*received);
    dst.write_i32(*block_for);
    write_reason_map(reason_map, dst);
    dst.write_u8(u8::from(*data_present));
    Ok(())
}

fn read_failure_size_v5(error: &ErrorResponse) -> Result<usize> {
    let ErrorDetail::ReadFailure { reason_map, .. } = &error.detail else {
        return Err(detail_mismatch(error.code));
    };
    Ok(sizes::of_string(&error.message)
        + sizes::SHORT
        + sizes::INT
        + sizes::INT
        + size_of_reason_map(reason_map)
        + sizes::BYTE)
}

fn read_failure_decode_v5<B: WireBuf>(code: i32, src: &mut B) -> Result<ErrorResponse> {
    let message = src.read_string()?;
    let consistency = src.read_u16()?;
    let received = src.read_i32()?;
    let block_for = src.read_i32()?;
    let reason_map = read_reason_map(src)?;
    let data_present = src.read_u8()? != 0;
    Ok(ErrorResponse {
        code,
        message,
        detail: ErrorDetail::ReadFailure {
            consistency,
            received,
            block_for,
            num_failures: reason_map.len() as i32,
            reason_map,
            data_present,
        },
    })
}

fn write_failure_encode_legacy<B: WireBuf>(error: &ErrorResponse, dst: &mut B) -> Result<()> {
    let ErrorDetail::WriteFailure {
        consistency,
        received,
        block_for,
        num_failures,
        write_type,
        ..
    } = &error.detail
    else {
        return Err(detail_mismatch(error.code));
    };
    dst.write_string(&error.message);
    dst.write_u16(*consistency);
    dst.write_i32(*received);
    dst.write_i32(*block_for);
    dst.write_i32(*num_failures);
    dst.write_string(write_type);
    Ok(())
}

fn write_failure_size_legacy(error: &ErrorResponse) -> Result<usize> {
    let ErrorDetail::WriteFailure { write_type, .. } = &error.detail else {
        return Err(detail_mismatch(error.code));
    };
    Ok(sizes::of_string(&error.message)
        + sizes::SHORT
        + sizes::INT
        + sizes::INT
        + sizes::INT
        + sizes::of_string(write_type))
}

fn write_failure_decode_legacy<B: WireBuf>(code: i32, src: &mut B) -> Result<ErrorResponse> {
    let message = src.read_string()?;
    let consistency = src.read_u16()?;
    let received = src.read_i32()?;
    let block_for = src.read_i32()?;
    let num_failures = src.read_i32()?;
    let write_type = src.read_string()?;
    Ok(ErrorResponse {
        code,
        message,
        detail: ErrorDetail::WriteFailure {
            consistency,
            received,
            block_for,
            num_failures,
            reason_map: OrderedMap::new(),
            write_type,
        },
    })
}

fn write_failure_encode_v5<B: WireBuf>(error: &ErrorResponse, dst: &mut B) -> Result<()> {
    let ErrorDetail::WriteFailure {
        consistency,
        received,
        block_for,
        reason_map,
        write_type,
        ..
    } = &error.detail
    else {
        return Err(detail_mismatch(error.code));
    };
    dst.write_string(&error.message);
    dst.write_u16(*consistency);
    dst.write_i32(*received);
    dst.write_i32(*block_for);
    write_reason_map(reason_map, dst);
    dst.write_string(write_type);
    Ok(())
}

fn write_failure_size_v5(error: &ErrorResponse) -> Result<usize> {
    let ErrorDetail::WriteFailure {
        reason_map,
        write_type,
        ..
    } = &error.detail
    else {
        return Err(detail_mismatch(error.code));
    };
    Ok(sizes::of_string(&error.message)
        + sizes::SHORT
        + sizes::INT
        + sizes::INT
        + size_of_reason_map(reason_map)
        + sizes::of_string(write_type))
}

fn write_failure_decode_v5<B: WireBuf>(code: i32, src: &mut B) -> Result<ErrorResponse> {
    let message = src.read_string()?;
    let consistency = src.read_u16()?;
    let received = src.read_i32()?;
    let block_for = src.read_i32()?;
    let reason_map = read_reason_map(src)?;
    let write_type = src.read_string()?;
    Ok(ErrorResponse {
        code,
        message,
        detail: ErrorDetail::WriteFailure {
            consistency,
            received,
            block_for,
            num_failures: reason_map.len() as i32,
            reason_map,
            write_type,
        },
    })
}

fn function_failure_encode<B: WireBuf>(error: &ErrorResponse, dst: &mut B) -> Result<()> {
    let ErrorDetail::FunctionFailure {
        keyspace,
        function,
        arg_types,
    } = &error.detail
    else {
        return Err(detail_mismatch(error.code));
    };
    dst.write_string(&error.message);
    dst.write_string(keyspace);
    dst.write_string(function);
    dst.write_string_list(arg_types);
    Ok(())
}

fn function_failure_size(error: &ErrorResponse) -> Result<usize> {
    let ErrorDetail::FunctionFailure {
        keyspace,
        function,
        arg_types,
    } = &error.detail
    else {
        return Err(detail_mismatch(error.code));
    };
    Ok(sizes::of_string(&error.message)
        + sizes::of_string(keyspace)
        + sizes::of_string(function)
        + sizes::of_string_list(arg_types))
}

fn function_failure_decode<B: WireBuf>(code: i32, src: &mut B) -> Result<ErrorResponse> {
    let message = src.read_string()?;
    let keyspace = src.read_string()?;
    let function = src.read_string()?;
    let arg_types = src.read_string_list()?;
    Ok(ErrorResponse {
        code,
        message,
        detail: ErrorDetail::FunctionFailure {
            keyspace,
            function,
            arg_types,
        },
    })
}

fn already_exists_encode<B: WireBuf>(error: &ErrorResponse, dst: &mut B) -> Result<()> {
    let ErrorDetail::AlreadyExists { keyspace, table } = &error.detail else {
        return Err(detail_mismatch(error.code));
    };
    dst.write_string(&error.message);
    dst.write_string(keyspace);
    dst.write_string(table);
    Ok(())
}

fn already_exists_size(error: &ErrorResponse) -> Result<usize> {
    let ErrorDetail::AlreadyExists { keyspace, table } = &error.detail else {
        return Err(detail_mismatch(error.code));
    };
    Ok(sizes::of_string(&error.message) + sizes::of_string(keyspace) + sizes::of_string(table))
}

fn already_exists_decode<B: WireBuf>(code: i32, src: &mut B) -> Result<ErrorResponse> {
    let message = src.read_string()?;
    let keyspace = src.read_string()?;
    let table = src.read_string()?;
    Ok(ErrorResponse {
        code,
        message,
        detail: ErrorDetail::AlreadyExists { keyspace, table },
    })
}

fn unprepared_encode<B: WireBuf>(error: &ErrorResponse, dst: &mut B) -> Result<()> {
    let ErrorDetail::Unprepared { id } = &error.detail else {
        return Err(detail_mismatch(error.code));
    };
    dst.write_string(&error.message);
    dst.write_short_bytes(id);
    Ok(())
}

fn unprepared_size(error: &ErrorResponse) -> Result<usize> {
    let ErrorDetail::Unprepared { id } = &error.detail else {
        return Err(detail_mismatch(error.code));
    };
    Ok(sizes::of_string(&error.message) + sizes::of_short_bytes(id))
}

fn unprepared_decode<B: WireBuf>(code: i32, src: &mut B) -> Result<ErrorResponse> {
    let message = src.read_string()?;
    let id = src.read_short_bytes()?;
    Ok(ErrorResponse {
        code,
        message,
        detail: ErrorDetail::Unprepared { id },
    })
}

fn write_reason_map<B: WireBuf>(map: &OrderedMap<IpAddr, u16>, dst: &mut B) {
    dst.write_i32(map.len() as i32);
    for (addr, reason) in map.iter() {
        dst.write_inetaddr(addr);
        dst.write_u16(*reason);
    }
}

fn size_of_reason_map(map: &OrderedMap<IpAddr, u16>) -> usize {
    sizes::INT
        + map
            .iter()
            .map(|(addr, _)| sizes::of_inetaddr(addr) + sizes::SHORT)
            .sum::<usize>()
}

fn read_reason_map<B: WireBuf>(src: &mut B) -> Result<OrderedMap<IpAddr, u16>> {
    let count = src.read_i32()?;
    if count < 0 {
        return Err(CodecError::NegativeLength { length: count });
    }
    let mut map = OrderedMap::with_capacity(count as usize);
    for _ in 0..count {
        let addr = src.read_inetaddr()?;
        let reason = src.read_u16()?;
        map.insert(addr, reason);
    }
    Ok(map)
}
