//! Notify event decoding
//!
//! Every known packet type except meters carries a 4-byte big-endian
//! reference at payload offset 0. A reference whose high byte is `0xC0`
//! addresses an output; the low 24 bits are the index.
//!
//! | type | kind            | value at offset 4 |
//! |------|-----------------|-------------------|
//! | 0x01 | volume          | f32               |
//! | 0x02 | balance         | f32               |
//! | 0x03 | bus assignment  | u32               |
//! | 0x04 | player status   | u32               |
//! | 0x05 | status resync   | none              |
//! | 0x06 | metadata        | ref = record id   |
//! | 0x07 | recorder resync | none              |
//! | 0x08 | meters          | raw, hex-encoded  |
//! | 0x09 | recorder gain   | f32               |
//! | 0x0a | position        | f32               |
//! | 0x0b | item deleted    | ref = record id   |
//! | 0x0c | output delay    | f32 (outputs only)|
//! | 0x10 | processor load  | u8 at offset 8    |

use bytes::Buf;
use serde::Serialize;

use crate::error::DecodeError;

use super::constants::{event_topic, meter_topic, packet_type, INDEX_MASK, OUTPUT_FLAG};
use super::framer::RawPacket;

/// Kind of decoded studio event
///
/// Serialized names are the `type` field seen by browser clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    #[serde(rename = "vol")]
    InputVolume,
    #[serde(rename = "outvol")]
    OutputVolume,
    #[serde(rename = "bal")]
    Balance,
    #[serde(rename = "bus")]
    InputBus,
    #[serde(rename = "outbus")]
    OutputBus,
    #[serde(rename = "stat")]
    PlayerStatus,
    /// Overall state changed; re-query with an explicit status command
    #[serde(rename = "status")]
    StatusResync,
    #[serde(rename = "meta")]
    MetadataChanged,
    /// Recorder state changed; re-query out of band
    #[serde(rename = "recstatus")]
    RecorderResync,
    #[serde(rename = "recgain")]
    RecorderGain,
    #[serde(rename = "pos")]
    Position,
    #[serde(rename = "delete")]
    ItemDeleted,
    #[serde(rename = "delay")]
    OutputDelay,
    #[serde(rename = "cpu")]
    ProcessorLoad,
    #[serde(rename = "vu")]
    Meters,
}

impl EventKind {
    /// Whether the reference is a record id (`uid`) rather than a channel (`num`)
    pub fn is_record_event(&self) -> bool {
        matches!(self, EventKind::MetadataChanged | EventKind::ItemDeleted)
    }
}

/// Value carried by an event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventValue {
    Float(f32),
    Uint(u32),
    /// Hex-encoded raw payload (meters)
    Hex(String),
}

/// A typed event decoded from one notify packet
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    /// Studio the packet arrived from
    pub studio: String,
    /// Topic the event is published on
    pub topic: String,
    pub kind: EventKind,
    /// Channel index or record id
    pub index: Option<u32>,
    pub value: Option<EventValue>,
}

#[derive(Serialize)]
struct WireEvent<'a> {
    #[serde(rename = "type")]
    kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    num: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    val: Option<&'a EventValue>,
}

impl DecodedEvent {
    fn new(studio: &str, kind: EventKind, index: Option<u32>, value: Option<EventValue>) -> Self {
        let topic = if kind == EventKind::Meters {
            meter_topic(studio)
        } else {
            event_topic(studio)
        };

        Self {
            studio: studio.to_string(),
            topic,
            kind,
            index,
            value,
        }
    }

    /// Payload handed to subscribers
    ///
    /// Meter events are the bare hex string; everything else is JSON of the
    /// form `{"type", "num", "val"}` or `{"type", "uid"}`.
    pub fn to_payload(&self) -> String {
        if let (EventKind::Meters, Some(EventValue::Hex(hex))) = (self.kind, &self.value) {
            return hex.clone();
        }

        let (num, uid) = if self.kind.is_record_event() {
            (None, self.index)
        } else {
            (self.index, None)
        };

        let wire = WireEvent {
            kind: self.kind,
            num,
            uid,
            val: self.value.as_ref(),
        };

        // Serializing this struct cannot fail; fall back to a bare type tag anyway
        serde_json::to_string(&wire).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Interprets framed notify packets for one studio
#[derive(Debug, Clone)]
pub struct EventDecoder {
    studio: String,
}

impl EventDecoder {
    /// Create a decoder tagging events with the given studio name
    pub fn new(studio: impl Into<String>) -> Self {
        Self {
            studio: studio.into(),
        }
    }

    /// Studio name this decoder tags events with
    pub fn studio(&self) -> &str {
        &self.studio
    }

    /// Decode a packet
    ///
    /// Returns `Ok(None)` for packets that are understood but intentionally
    /// ignored (an output delay addressed to an input).
    pub fn decode(&self, packet: &RawPacket) -> Result<Option<DecodedEvent>, DecodeError> {
        self.decode_raw(packet.kind, &packet.payload)
    }

    /// Decode a packet given its type byte and payload
    pub fn decode_raw(&self, kind: u8, payload: &[u8]) -> Result<Option<DecodedEvent>, DecodeError> {
        let studio = self.studio.as_str();

        let event = match kind {
            packet_type::VOLUME => {
                let (reference, value) = ref_and_f32(kind, payload)?;
                let (output, index) = split_reference(reference);
                let kind = if output {
                    EventKind::OutputVolume
                } else {
                    EventKind::InputVolume
                };
                DecodedEvent::new(studio, kind, Some(index), Some(EventValue::Float(value)))
            }
            packet_type::BALANCE => {
                let (reference, value) = ref_and_f32(kind, payload)?;
                DecodedEvent::new(
                    studio,
                    EventKind::Balance,
                    Some(reference),
                    Some(EventValue::Float(value)),
                )
            }
            packet_type::BUS => {
                let (reference, value) = ref_and_u32(kind, payload)?;
                let (output, index) = split_reference(reference);
                let kind = if output {
                    EventKind::OutputBus
                } else {
                    EventKind::InputBus
                };
                DecodedEvent::new(studio, kind, Some(index), Some(EventValue::Uint(value)))
            }
            packet_type::PLAYER_STATUS => {
                let (reference, value) = ref_and_u32(kind, payload)?;
                DecodedEvent::new(
                    studio,
                    EventKind::PlayerStatus,
                    Some(reference),
                    Some(EventValue::Uint(value)),
                )
            }
            packet_type::STATUS => DecodedEvent::new(studio, EventKind::StatusResync, None, None),
            packet_type::METADATA => {
                let reference = read_u32(kind, payload, 0)?;
                DecodedEvent::new(studio, EventKind::MetadataChanged, Some(reference), None)
            }
            packet_type::RECORDER_STATUS => {
                DecodedEvent::new(studio, EventKind::RecorderResync, None, None)
            }
            packet_type::METERS => DecodedEvent::new(
                studio,
                EventKind::Meters,
                None,
                Some(EventValue::Hex(hex::encode(payload))),
            ),
            packet_type::RECORDER_GAIN => {
                let (reference, value) = ref_and_f32(kind, payload)?;
                DecodedEvent::new(
                    studio,
                    EventKind::RecorderGain,
                    Some(reference),
                    Some(EventValue::Float(value)),
                )
            }
            packet_type::POSITION => {
                let (reference, value) = ref_and_f32(kind, payload)?;
                DecodedEvent::new(
                    studio,
                    EventKind::Position,
                    Some(reference),
                    Some(EventValue::Float(value)),
                )
            }
            packet_type::DELETED => {
                let reference = read_u32(kind, payload, 0)?;
                DecodedEvent::new(studio, EventKind::ItemDeleted, Some(reference), None)
            }
            packet_type::OUTPUT_DELAY => {
                let (reference, value) = ref_and_f32(kind, payload)?;
                let (output, index) = split_reference(reference);
                if !output {
                    tracing::debug!(studio, reference, "Output delay for non-output reference ignored");
                    return Ok(None);
                }
                DecodedEvent::new(
                    studio,
                    EventKind::OutputDelay,
                    Some(index),
                    Some(EventValue::Float(value)),
                )
            }
            packet_type::PROCESSOR_LOAD => {
                require_len(kind, payload, 9)?;
                DecodedEvent::new(
                    studio,
                    EventKind::ProcessorLoad,
                    None,
                    Some(EventValue::Uint(payload[8] as u32)),
                )
            }
            other => return Err(DecodeError::UnknownType(other)),
        };

        Ok(Some(event))
    }
}

/// Split a reference into (is_output, index)
pub fn split_reference(reference: u32) -> (bool, u32) {
    if (reference >> 24) as u8 == OUTPUT_FLAG {
        (true, reference & INDEX_MASK)
    } else {
        (false, reference)
    }
}

fn require_len(kind: u8, payload: &[u8], needed: usize) -> Result<(), DecodeError> {
    if payload.len() < needed {
        return Err(DecodeError::Truncated {
            kind,
            needed,
            actual: payload.len(),
        });
    }
    Ok(())
}

fn read_u32(kind: u8, payload: &[u8], offset: usize) -> Result<u32, DecodeError> {
    require_len(kind, payload, offset + 4)?;
    let mut buf = &payload[offset..];
    Ok(buf.get_u32())
}

fn ref_and_f32(kind: u8, payload: &[u8]) -> Result<(u32, f32), DecodeError> {
    require_len(kind, payload, 8)?;
    let mut buf = payload;
    Ok((buf.get_u32(), buf.get_f32()))
}

fn ref_and_u32(kind: u8, payload: &[u8]) -> Result<(u32, u32), DecodeError> {
    require_len(kind, payload, 8)?;
    let mut buf = payload;
    Ok((buf.get_u32(), buf.get_u32()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(reference: u32, value: &[u8]) -> Vec<u8> {
        let mut out = reference.to_be_bytes().to_vec();
        out.extend_from_slice(value);
        out
    }

    fn decode(kind: u8, payload: &[u8]) -> DecodedEvent {
        EventDecoder::new("main")
            .decode_raw(kind, payload)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_output_volume() {
        let event = decode(0x01, &payload(0xC000_0005, &0.75f32.to_be_bytes()));

        assert_eq!(event.kind, EventKind::OutputVolume);
        assert_eq!(event.index, Some(5));
        assert_eq!(event.value, Some(EventValue::Float(0.75)));
        assert_eq!(event.topic, "main");
    }

    #[test]
    fn test_input_volume() {
        let event = decode(0x01, &payload(0x0000_0005, &0.75f32.to_be_bytes()));

        assert_eq!(event.kind, EventKind::InputVolume);
        assert_eq!(event.index, Some(5));
        assert_eq!(event.value, Some(EventValue::Float(0.75)));
    }

    #[test]
    fn test_bus_assignment() {
        let out = decode(0x03, &payload(0xC000_0002, &7u32.to_be_bytes()));
        assert_eq!(out.kind, EventKind::OutputBus);
        assert_eq!(out.index, Some(2));
        assert_eq!(out.value, Some(EventValue::Uint(7)));

        let input = decode(0x03, &payload(0x0000_0002, &7u32.to_be_bytes()));
        assert_eq!(input.kind, EventKind::InputBus);
    }

    #[test]
    fn test_resync_hints() {
        let status = decode(0x05, &[]);
        assert_eq!(status.kind, EventKind::StatusResync);
        assert_eq!(status.to_payload(), r#"{"type":"status"}"#);

        let recorder = decode(0x07, &[]);
        assert_eq!(recorder.kind, EventKind::RecorderResync);
        assert_eq!(recorder.to_payload(), r#"{"type":"recstatus"}"#);
    }

    #[test]
    fn test_record_events_use_uid() {
        let meta = decode(0x06, &1234u32.to_be_bytes());
        assert_eq!(meta.to_payload(), r#"{"type":"meta","uid":1234}"#);

        let deleted = decode(0x0b, &99u32.to_be_bytes());
        assert_eq!(deleted.kind, EventKind::ItemDeleted);
        assert_eq!(deleted.to_payload(), r#"{"type":"delete","uid":99}"#);
    }

    #[test]
    fn test_json_payload() {
        let event = decode(0x0a, &payload(3, &10.5f32.to_be_bytes()));
        assert_eq!(event.to_payload(), r#"{"type":"pos","num":3,"val":10.5}"#);

        let status = decode(0x04, &payload(1, &2u32.to_be_bytes()));
        assert_eq!(status.to_payload(), r#"{"type":"stat","num":1,"val":2}"#);
    }

    #[test]
    fn test_meters_pass_through_as_hex() {
        let event = decode(0x08, &[0x00, 0xAB, 0x10, 0xFF]);

        assert_eq!(event.kind, EventKind::Meters);
        assert_eq!(event.topic, "vu_main");
        assert_eq!(event.to_payload(), "00ab10ff");
    }

    #[test]
    fn test_output_delay_requires_output_flag() {
        let decoder = EventDecoder::new("main");

        let ignored = decoder
            .decode_raw(0x0c, &payload(0x0000_0001, &0.25f32.to_be_bytes()))
            .unwrap();
        assert!(ignored.is_none());

        let event = decode(0x0c, &payload(0xC000_0001, &0.25f32.to_be_bytes()));
        assert_eq!(event.kind, EventKind::OutputDelay);
        assert_eq!(event.index, Some(1));
    }

    #[test]
    fn test_processor_load() {
        let event = decode(0x10, &[0, 0, 0, 0, 0, 0, 0, 0, 37]);

        assert_eq!(event.kind, EventKind::ProcessorLoad);
        assert_eq!(event.to_payload(), r#"{"type":"cpu","val":37}"#);
    }

    #[test]
    fn test_recorder_gain() {
        let event = decode(0x09, &payload(2, &(-3.0f32).to_be_bytes()));
        assert_eq!(event.kind, EventKind::RecorderGain);
        assert_eq!(event.index, Some(2));
        assert_eq!(event.value, Some(EventValue::Float(-3.0)));
    }

    #[test]
    fn test_unknown_type() {
        let result = EventDecoder::new("main").decode_raw(0x42, &[1, 2, 3]);
        assert_eq!(result, Err(DecodeError::UnknownType(0x42)));
    }

    #[test]
    fn test_truncated_payload() {
        let result = EventDecoder::new("main").decode_raw(0x01, &[0, 0, 0, 1]);
        assert_eq!(
            result,
            Err(DecodeError::Truncated {
                kind: 0x01,
                needed: 8,
                actual: 4
            })
        );
    }

    #[test]
    fn test_split_reference() {
        assert_eq!(split_reference(0xC000_0005), (true, 5));
        assert_eq!(split_reference(0xC012_3456), (true, 0x12_3456));
        assert_eq!(split_reference(0x0000_0005), (false, 5));
        assert_eq!(split_reference(0x8000_0005), (false, 0x8000_0005));
    }
}
