//! End-to-end frame round-trips across protocol versions.

use bytes::{Bytes, BytesMut};
use cqlwire::message::{
    batch_type, Batch, BatchStatement, ErrorDetail, ErrorResponse, Event, Execute, Prepare, Query,
    QueryParams, QueryValues, Register, ResultBody, SchemaChange, Startup, Supported,
};
use cqlwire::protocol::types::{error_code, schema_change_type, topology_change_type};
use cqlwire::{Frame, FrameCodec, Message, OrderedMap, ProtocolVersion, WireBuf};
use proptest::prelude::*;

const ALL_VERSIONS: [ProtocolVersion; 5] = [
    ProtocolVersion::V3,
    ProtocolVersion::V4,
    ProtocolVersion::V5,
    ProtocolVersion::Dse1,
    ProtocolVersion::Dse2,
];

fn roundtrip(version: ProtocolVersion, frame: &Frame) {
    let (encoder, decoder): (FrameCodec<BytesMut>, FrameCodec<BytesMut>) =
        if frame.message.opcode().is_request() {
            (FrameCodec::client(version), FrameCodec::server(version))
        } else {
            (FrameCodec::server(version), FrameCodec::client(version))
        };

    let mut encoded = encoder.encode(frame).unwrap();
    assert_eq!(
        WireBuf::remaining(&encoded),
        encoder.encoded_size(frame).unwrap(),
        "encoded length must equal encoded_size under {version}"
    );

    let decoded = decoder.decode(&mut encoded).unwrap();
    assert_eq!(&decoded, frame, "round-trip mismatch under {version}");
    assert_eq!(
        WireBuf::remaining(&encoded),
        0,
        "decode must consume the whole frame under {version}"
    );
}

#[test]
fn request_messages_roundtrip_everywhere() {
    for version in ALL_VERSIONS {
        roundtrip(version, &Frame::new(version, 0, Message::Options));
        roundtrip(
            version,
            &Frame::new(version, 1, Message::Startup(Startup::with_compression("lz4"))),
        );
        roundtrip(
            version,
            &Frame::new(version, 2, Message::Register(Register::all())),
        );
        roundtrip(
            version,
            &Frame::new(
                version,
                3,
                Message::Query(Query::new("SELECT cluster_name FROM system.local")),
            ),
        );
        roundtrip(
            version,
            &Frame::new(
                version,
                4,
                Message::Prepare(Prepare::new("SELECT * FROM t WHERE k = ?")),
            ),
        );
        roundtrip(
            version,
            &Frame::new(
                version,
                5,
                Message::Batch(Batch::logged(vec![BatchStatement::Query {
                    query: "INSERT INTO t (k) VALUES (1)".into(),
                    values: vec![],
                }])),
            ),
        );
    }
}

#[test]
fn execute_roundtrips_with_version_shape() {
    for version in ALL_VERSIONS {
        let execute = Execute {
            id: Bytes::from_static(b"\x00\x2A"),
            result_metadata_id: version
                .supports_result_metadata_id()
                .then(|| Bytes::from_static(b"\x00\x2B")),
            params: QueryParams {
                values: QueryValues::Positional(vec![Some(Bytes::from_static(b"\x07")), None]),
                page_size: Some(1024),
                ..QueryParams::default()
            },
        };
        roundtrip(version, &Frame::new(version, 77, Message::Execute(execute)));
    }
}

#[test]
fn response_messages_roundtrip_everywhere() {
    for version in ALL_VERSIONS {
        roundtrip(version, &Frame::new(version, 0, Message::Ready));
        roundtrip(
            version,
            &Frame::new(
                version,
                1,
                Message::Result(ResultBody::SetKeyspace("system".into())),
            ),
        );
        roundtrip(
            version,
            &Frame::new(
                version,
                2,
                Message::Error(ErrorResponse::simple(
                    error_code::OVERLOADED,
                    "coordinator shedding load",
                )),
            ),
        );
        roundtrip(
            version,
            &Frame::new(
                version,
                -1,
                Message::Event(Event::TopologyChange {
                    change_type: topology_change_type::NEW_NODE.into(),
                    address: "10.0.0.7:9042".parse().unwrap(),
                }),
            ),
        );
        roundtrip(
            version,
            &Frame::new(
                version,
                -1,
                Message::Event(Event::SchemaChange(SchemaChange::keyspace(
                    schema_change_type::DROPPED,
                    "ks",
                ))),
            ),
        );
    }
}

#[test]
fn tracing_flag_roundtrips_on_requests() {
    let mut frame = Frame::new(
        ProtocolVersion::V4,
        12,
        Message::Query(Query::new("SELECT * FROM t")),
    );
    frame.tracing = true;
    roundtrip(ProtocolVersion::V4, &frame);
}

#[test]
fn response_envelopes_roundtrip() {
    let mut frame = Frame::new(ProtocolVersion::V5, 8, Message::Ready);
    frame.tracing_id = Some(uuid::Uuid::new_v4());
    frame.warnings = vec!["query used ALLOW FILTERING".into()];
    let mut payload = OrderedMap::new();
    payload.insert("server_tag".into(), Some(Bytes::from_static(b"\x01\x02")));
    payload.insert("null_entry".into(), None);
    frame.custom_payload = payload;

    roundtrip(ProtocolVersion::V5, &frame);
}

#[test]
fn already_exists_error_roundtrips_with_detail() {
    let frame = Frame::new(
        ProtocolVersion::V4,
        6,
        Message::Error(ErrorResponse {
            code: error_code::ALREADY_EXISTS,
            message: "exists".into(),
            detail: ErrorDetail::AlreadyExists {
                keyspace: "ks".into(),
                table: String::new(), // keyspace-level collision
            },
        }),
    );
    roundtrip(ProtocolVersion::V4, &frame);
}

#[test]
fn supported_multimap_roundtrips() {
    let mut options = OrderedMap::new();
    options.insert(
        "COMPRESSION".to_string(),
        vec!["lz4".to_string(), "snappy".to_string()],
    );
    options.insert("PROTOCOL_VERSIONS".to_string(), vec![
        "3/v3".to_string(),
        "4/v4".to_string(),
        "5/v5".to_string(),
    ]);
    let frame = Frame::new(
        ProtocolVersion::V4,
        0,
        Message::Supported(Supported { options }),
    );
    roundtrip(ProtocolVersion::V4, &frame);
}

#[test]
fn batch_counter_kind_with_prepared_statements() {
    let mut batch = Batch::logged(vec![
        BatchStatement::Prepared {
            id: Bytes::from_static(b"\x10"),
            values: vec![Some(Bytes::from_static(b"\x01"))],
        },
        BatchStatement::Query {
            query: "UPDATE counters SET c = c + 1 WHERE k = 1".into(),
            values: vec![],
        },
    ]);
    batch.kind = batch_type::COUNTER;
    batch.serial_consistency = Some(0x0008);
    roundtrip(
        ProtocolVersion::V4,
        &Frame::new(ProtocolVersion::V4, 30, Message::Batch(batch)),
    );
}

proptest! {
    #[test]
    fn prop_query_frames_roundtrip(
        stream_id in any::<i16>(),
        query in "[a-zA-Z0-9 =?*,._']{0,120}",
        consistency in 0u16..=10,
        page_size in proptest::option::of(1i32..=100_000),
        tracing in any::<bool>(),
    ) {
        let mut frame = Frame::new(
            ProtocolVersion::V4,
            stream_id,
            Message::Query(Query {
                query,
                params: QueryParams {
                    consistency,
                    page_size,
                    ..QueryParams::default()
                },
            }),
        );
        frame.tracing = tracing;

        let client: FrameCodec<BytesMut> = FrameCodec::client(ProtocolVersion::V4);
        let server: FrameCodec<BytesMut> = FrameCodec::server(ProtocolVersion::V4);

        let mut encoded = client.encode(&frame).unwrap();
        prop_assert_eq!(WireBuf::remaining(&encoded), client.encoded_size(&frame).unwrap());

        let decoded = server.decode(&mut encoded).unwrap();
        prop_assert_eq!(decoded, frame);
        prop_assert_eq!(WireBuf::remaining(&encoded), 0);
    }

    #[test]
    fn prop_values_preserve_null_vs_empty(
        cells in proptest::collection::vec(
            proptest::option::of(proptest::collection::vec(any::<u8>(), 0..32)),
            0..8,
        ),
    ) {
        let values: Vec<Option<Bytes>> = cells.into_iter().map(|c| c.map(Bytes::from)).collect();
        let frame = Frame::new(
            ProtocolVersion::V5,
            1,
            Message::Query(Query {
                query: "INSERT INTO t (a) VALUES (?)".into(),
                params: QueryParams {
                    values: QueryValues::Positional(values.clone()),
                    ..QueryParams::default()
                },
            }),
        );

        let client: FrameCodec<BytesMut> = FrameCodec::client(ProtocolVersion::V5);
        let server: FrameCodec<BytesMut> = FrameCodec::server(ProtocolVersion::V5);
        let mut encoded = client.encode(&frame).unwrap();
        let decoded = server.decode(&mut encoded).unwrap();

        let Message::Query(query) = decoded.message else {
            panic!("expected a query");
        };
        prop_assert_eq!(query.params.values, QueryValues::Positional(values));
    }
}
