//! Byte-exact checks of known wire encodings.
//!
//! These pin the layouts that interoperate with real servers: the
//! schema-change tail shared by RESULT and EVENT, and the version-gated
//! read-failure shapes.

use bytes::{Buf, BufMut, BytesMut};
use cqlwire::message::{
    ErrorDetail, ErrorResponse, Event, MessageCodec, ResultBody, SchemaChange,
};
use cqlwire::protocol::message::{ErrorCodec, EventCodec, ResultCodec};
use cqlwire::protocol::types::error_code;
use cqlwire::{Frame, FrameCodec, Message, OrderedMap, ProtocolVersion, WireBuf};
use std::net::{IpAddr, Ipv4Addr};

fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
}

#[test]
fn schema_change_keyspace_event_bytes_v4() {
    let codec: EventCodec<BytesMut> = EventCodec::new(ProtocolVersion::V4);
    let message = Message::Event(Event::SchemaChange(SchemaChange::keyspace(
        "CREATED", "test",
    )));

    let mut encoded = BytesMut::new();
    codec.encode(&message, &mut encoded).unwrap();

    let mut expected = BytesMut::new();
    put_string(&mut expected, "SCHEMA_CHANGE");
    put_string(&mut expected, "CREATED");
    put_string(&mut expected, "KEYSPACE");
    put_string(&mut expected, "test");

    assert_eq!(encoded, expected);
    assert_eq!(codec.encoded_size(&message).unwrap(), 40);
}

#[test]
fn schema_change_function_event_bytes_v4() {
    let codec: EventCodec<BytesMut> = EventCodec::new(ProtocolVersion::V4);
    let message = Message::Event(Event::SchemaChange(SchemaChange {
        change_type: "CREATED".into(),
        target: "FUNCTION".into(),
        keyspace: "test".into(),
        object: Some("myfunction".into()),
        arguments: Some(vec!["int".into(), "int".into()]),
    }));

    let mut encoded = BytesMut::new();
    codec.encode(&message, &mut encoded).unwrap();

    let mut expected = BytesMut::new();
    put_string(&mut expected, "SCHEMA_CHANGE");
    put_string(&mut expected, "CREATED");
    put_string(&mut expected, "FUNCTION");
    put_string(&mut expected, "test");
    put_string(&mut expected, "myfunction");
    expected.put_u16(2);
    put_string(&mut expected, "int");
    put_string(&mut expected, "int");

    assert_eq!(encoded, expected);
}

#[test]
fn schema_change_function_fails_in_v3_both_ways() {
    let codec: EventCodec<BytesMut> = EventCodec::new(ProtocolVersion::V3);
    let message = Message::Event(Event::SchemaChange(SchemaChange {
        change_type: "CREATED".into(),
        target: "FUNCTION".into(),
        keyspace: "test".into(),
        object: Some("myfunction".into()),
        arguments: Some(vec!["int".into(), "int".into()]),
    }));

    let mut buf = BytesMut::new();
    let err = codec.encode(&message, &mut buf).unwrap_err();
    assert_eq!(err.kind(), cqlwire::ErrorKind::InvalidArgument);
    assert!(buf.is_empty());

    // the valid v4 byte sequence must not decode under a v3 codec
    let v4_codec: EventCodec<BytesMut> = EventCodec::new(ProtocolVersion::V4);
    let mut v4_bytes = BytesMut::new();
    v4_codec.encode(&message, &mut v4_bytes).unwrap();
    let err = codec.decode(&mut v4_bytes).unwrap_err();
    assert_eq!(err.kind(), cqlwire::ErrorKind::InvalidArgument);
}

#[test]
fn schema_change_bytes_identical_between_result_and_event() {
    let change = SchemaChange {
        change_type: "UPDATED".into(),
        target: "TABLE".into(),
        keyspace: "ks".into(),
        object: Some("t".into()),
        arguments: None,
    };

    let event_codec: EventCodec<BytesMut> = EventCodec::new(ProtocolVersion::V4);
    let mut event_bytes = BytesMut::new();
    event_codec
        .encode(
            &Message::Event(Event::SchemaChange(change.clone())),
            &mut event_bytes,
        )
        .unwrap();

    let result_codec: ResultCodec<BytesMut> = ResultCodec::new(ProtocolVersion::V4);
    let mut result_bytes = BytesMut::new();
    result_codec
        .encode(
            &Message::Result(ResultBody::SchemaChange(change)),
            &mut result_bytes,
        )
        .unwrap();

    // drop each codec's own tag (event type string / result kind int)
    event_bytes.advance(2 + "SCHEMA_CHANGE".len());
    result_bytes.advance(4);
    assert_eq!(event_bytes, result_bytes);
}

#[test]
fn read_failure_bytes_v4() {
    let codec: ErrorCodec<BytesMut> = ErrorCodec::new(ProtocolVersion::V4);
    let message = Message::Error(ErrorResponse {
        code: error_code::READ_FAILURE,
        message: "read failed".into(),
        detail: ErrorDetail::ReadFailure {
            consistency: 1,
            received: 1,
            block_for: 2,
            num_failures: 1,
            reason_map: OrderedMap::new(),
            data_present: false,
        },
    });

    let mut encoded = BytesMut::new();
    codec.encode(&message, &mut encoded).unwrap();

    let mut expected = BytesMut::new();
    expected.put_i32(error_code::READ_FAILURE);
    put_string(&mut expected, "read failed");
    expected.put_u16(1);
    expected.put_i32(1);
    expected.put_i32(2);
    expected.put_i32(1); // numFailures
    expected.put_u8(0); // dataPresent
    assert_eq!(encoded, expected);
}

#[test]
fn read_failure_bytes_v5_reason_map() {
    let codec: ErrorCodec<BytesMut> = ErrorCodec::new(ProtocolVersion::V5);
    let mut reason_map = OrderedMap::new();
    reason_map.insert(IpAddr::V4(Ipv4Addr::LOCALHOST), 0u16);
    let message = Message::Error(ErrorResponse {
        code: error_code::READ_FAILURE,
        message: "read failed".into(),
        detail: ErrorDetail::ReadFailure {
            consistency: 1,
            received: 1,
            block_for: 2,
            num_failures: 1,
            reason_map,
            data_present: false,
        },
    });

    let mut encoded = BytesMut::new();
    codec.encode(&message, &mut encoded).unwrap();

    let mut expected = BytesMut::new();
    expected.put_i32(error_code::READ_FAILURE);
    put_string(&mut expected, "read failed");
    expected.put_u16(1);
    expected.put_i32(1);
    expected.put_i32(2);
    expected.put_i32(1); // reason map entry count
    expected.put_u8(4); // inetaddr length
    expected.put_slice(&[127, 0, 0, 1]);
    expected.put_u16(0); // reason code
    expected.put_u8(0); // dataPresent
    assert_eq!(encoded, expected);

    // decode recomputes numFailures from the map
    let decoded = codec.decode(&mut encoded.clone()).unwrap();
    let Message::Error(ErrorResponse {
        detail: ErrorDetail::ReadFailure { num_failures, .. },
        ..
    }) = decoded
    else {
        panic!("expected a read failure");
    };
    assert_eq!(num_failures, 1);
}

#[test]
fn read_failure_reencoding_is_identity_per_version() {
    for version in [ProtocolVersion::V4, ProtocolVersion::V5] {
        let codec: ErrorCodec<BytesMut> = ErrorCodec::new(version);
        let mut reason_map = OrderedMap::new();
        if version.supports_reason_maps() {
            reason_map.insert(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)), 1u16);
        }
        let message = Message::Error(ErrorResponse {
            code: error_code::READ_FAILURE,
            message: "read failed".into(),
            detail: ErrorDetail::ReadFailure {
                consistency: 1,
                received: 0,
                block_for: 1,
                num_failures: 1,
                reason_map,
                data_present: true,
            },
        });

        let mut first = BytesMut::new();
        codec.encode(&message, &mut first).unwrap();
        let decoded = codec.decode(&mut first.clone()).unwrap();
        let mut second = BytesMut::new();
        codec.encode(&decoded, &mut second).unwrap();
        assert_eq!(first, second, "re-encoding differs under {version}");
    }
}

#[test]
fn already_exists_bytes() {
    let codec: ErrorCodec<BytesMut> = ErrorCodec::new(ProtocolVersion::V4);
    let message = Message::Error(ErrorResponse {
        code: error_code::ALREADY_EXISTS,
        message: "exists".into(),
        detail: ErrorDetail::AlreadyExists {
            keyspace: "ks".into(),
            table: "t".into(),
        },
    });

    let mut encoded = BytesMut::new();
    codec.encode(&message, &mut encoded).unwrap();

    let mut expected = BytesMut::new();
    expected.put_i32(error_code::ALREADY_EXISTS);
    put_string(&mut expected, "exists");
    put_string(&mut expected, "ks");
    put_string(&mut expected, "t");
    assert_eq!(encoded, expected);
}

#[test]
fn void_result_is_a_bare_kind() {
    let codec: ResultCodec<BytesMut> = ResultCodec::new(ProtocolVersion::V4);
    let message = Message::Result(ResultBody::Void);

    let mut encoded = BytesMut::new();
    codec.encode(&message, &mut encoded).unwrap();
    assert_eq!(&encoded[..], &1i32.to_be_bytes()[..]);
    assert_eq!(codec.encoded_size(&message).unwrap(), 4);
}

#[test]
fn event_frame_header_length_matches_body() {
    let server: FrameCodec<BytesMut> = FrameCodec::server(ProtocolVersion::V4);
    let frame = Frame::new(
        ProtocolVersion::V4,
        -1,
        Message::Event(Event::SchemaChange(SchemaChange::keyspace(
            "CREATED", "test",
        ))),
    );

    let encoded = server.encode(&frame).unwrap();
    assert_eq!(encoded[0], 0x84); // response bit | v4
    assert_eq!(&encoded[2..4], &(-1i16).to_be_bytes()[..]);
    assert_eq!(encoded[4], 0x0C); // EVENT
    let body_len = i32::from_be_bytes([encoded[5], encoded[6], encoded[7], encoded[8]]);
    assert_eq!(body_len, 40);
    assert_eq!(WireBuf::remaining(&encoded), 9 + 40);
}
