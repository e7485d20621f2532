//! EVENT message and its per-type sub-codecs
//!
//! The payload opens with the event type `[string]`; topology and
//! status changes carry a change string and an `[inet]` endpoint,
//! schema changes reuse the shared schema-change layout so the bytes
//! match the RESULT encoding exactly.

use std::collections::HashMap;
use std::net::SocketAddr;

use crate::protocol::error::{CodecError, Result};
use crate::protocol::message::schema::SchemaChange;
use crate::protocol::message::{wrong_message, Message, MessageCodec};
use crate::protocol::primitive::{sizes, WireBuf};
use crate::protocol::types::{event_type, Opcode, ProtocolVersion};

/// Server push event
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Node joined or left the ring
    TopologyChange {
        /// NEW_NODE or REMOVED_NODE
        change_type: String,
        /// Endpoint the change applies to
        address: SocketAddr,
    },
    /// Node went up or down
    StatusChange {
        /// UP or DOWN
        change_type: String,
        /// Endpoint the change applies to
        address: SocketAddr,
    },
    /// Schema object changed
    SchemaChange(SchemaChange),
}

impl Event {
    /// The wire event type of this payload
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TopologyChange { .. } => event_type::TOPOLOGY_CHANGE,
            Self::StatusChange { .. } => event_type::STATUS_CHANGE,
            Self::SchemaChange(_) => event_type::SCHEMA_CHANGE,
        }
    }
}

struct EventSub<B: WireBuf> {
    encode: fn(&Event, ProtocolVersion, &mut B) -> Result<()>,
    encoded_size: fn(&Event, ProtocolVersion) -> Result<usize>,
    decode: fn(ProtocolVersion, &mut B) -> Result<Event>,
}

/// Codec for [`Event`] under one protocol version
pub struct EventCodec<B: WireBuf> {
    version: ProtocolVersion,
    subs: HashMap<&'static str, EventSub<B>>,
}

impl<B: WireBuf> EventCodec<B> {
    /// Create the codec for a version, installing every event type
    #[must_use]
    pub fn new(version: ProtocolVersion) -> Self {
        let mut subs: HashMap<&'static str, EventSub<B>> = HashMap::new();
        subs.insert(
            event_type::TOPOLOGY_CHANGE,
            EventSub {
                encode: topology_encode,
                encoded_size: endpoint_size,
                decode: topology_decode,
            },
        );
        subs.insert(
            event_type::STATUS_CHANGE,
            EventSub {
                encode: status_encode,
                encoded_size: endpoint_size,
                decode: status_decode,
            },
        );
        subs.insert(
            event_type::SCHEMA_CHANGE,
            EventSub {
                encode: schema_encode,
                encoded_size: schema_size,
                decode: schema_decode,
            },
        );
        Self { version, subs }
    }
}

impl<B: WireBuf> MessageCodec<B> for EventCodec<B> {
    fn opcode(&self) -> Opcode {
        Opcode::Event
    }

    fn encode(&self, message: &Message, dst: &mut B) -> Result<()> {
        let Message::Event(event) = message else {
            return Err(wrong_message(Opcode::Event, message));
        };
        let sub = self.subs.get(event.event_type()).expect("all event types installed");
        (sub.encoded_size)(event, self.version)?;
        dst.write_string(event.event_type());
        (sub.encode)(event, self.version, dst)
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Event(event) = message else {
            return Err(wrong_message(Opcode::Event, message));
        };
        let sub = self.subs.get(event.event_type()).expect("all event types installed");
        Ok(sizes::of_string(event.event_type()) + (sub.encoded_size)(event, self.version)?)
    }

    fn decode(&self, src: &mut B) -> Result<Message> {
        let event_type = src.read_string()?;
        let sub = self
            .subs
            .get(event_type.as_str())
            .ok_or(CodecError::UnknownEventType { event_type })?;
        Ok(Message::Event((sub.decode)(self.version, src)?))
    }
}

fn topology_encode<B: WireBuf>(event: &Event, _version: ProtocolVersion, dst: &mut B) -> Result<()> {
    let Event::TopologyChange {
        change_type,
        address,
    } = event
    else {
        return Err(CodecError::invalid("expected a topology change event"));
    };
    dst.write_string(change_type);
    dst.write_inet(address);
    Ok(())
}

fn topology_decode<B: WireBuf>(_version: ProtocolVersion, src: &mut B) -> Result<Event> {
    let change_type = src.read_string()?;
    let address = src.read_inet()?;
    Ok(Event::TopologyChange {
        change_type,
        address,
    })
}

fn status_encode<B: WireBuf>(event: &Event, _version: ProtocolVersion, dst: &mut B) -> Result<()> {
    let Event::StatusChange {
        change_type,
        address,
    } = event
    else {
        return Err(CodecError::invalid("expected a status change event"));
    };
    dst.write_string(change_type);
    dst.write_inet(address);
    Ok(())
}

fn status_decode<B: WireBuf>(_version: ProtocolVersion, src: &mut B) -> Result<Event> {
    let change_type = src.read_string()?;
    let address = src.read_inet()?;
    Ok(Event::StatusChange {
        change_type,
        address,
    })
}

fn endpoint_size(event: &Event, _version: ProtocolVersion) -> Result<usize> {
    let (Event::TopologyChange {
        change_type,
        address,
    }
    | Event::StatusChange {
        change_type,
        address,
    }) = event
    else {
        return Err(CodecError::invalid("expected an endpoint-bearing event"));
    };
    Ok(sizes::of_string(change_type) + sizes::of_inet(address))
}

fn schema_encode<B: WireBuf>(event: &Event, version: ProtocolVersion, dst: &mut B) -> Result<()> {
    let Event::SchemaChange(change) = event else {
        return Err(CodecError::invalid("expected a schema change event"));
    };
    change.encode(version, dst)
}

fn schema_size(event: &Event, version: ProtocolVersion) -> Result<usize> {
    let Event::SchemaChange(change) = event else {
        return Err(CodecError::invalid("expected a schema change event"));
    };
    change.encoded_size(version)
}

fn schema_decode<B: WireBuf>(version: ProtocolVersion, src: &mut B) -> Result<Event> {
    Ok(Event::SchemaChange(SchemaChange::decode(version, src)?))
}
