//! Decoding of the isolated telemetry message bytes.
//!
//! Two backends implement [`TelemetryDecoder`]: [`ProtobufDecoder`] (prost, behind the
//! `protobuf` feature) and [`WireDecoder`], a hand-rolled reader of the protobuf wire format
//! that is always available and keeps whatever fields it managed to read before a fault.
//! The backend is picked once, when the extractor is built.

use clap::ValueEnum;
use serde::Deserialize;

use crate::diag::warn_once;

/// Telemetry fields as they came off the wire, before sanitizing.
///
/// Every field is optional: absent on the wire means absent here.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawTelemetry {
    pub version: Option<f64>,
    pub gear_state: Option<f64>,
    pub frame_seq_no: Option<SeqValue>,
    pub vehicle_speed_mps: Option<f64>,
    pub accelerator_pedal_position: Option<f64>,
    pub steering_wheel_angle: Option<f64>,
    pub blinker_on_left: Option<bool>,
    pub blinker_on_right: Option<bool>,
    pub brake_applied: Option<bool>,
    pub autopilot_state: Option<f64>,
    pub latitude_deg: Option<f64>,
    pub longitude_deg: Option<f64>,
    pub heading_deg: Option<f64>,
    pub linear_acceleration_mps2_x: Option<f64>,
    pub linear_acceleration_mps2_y: Option<f64>,
    pub linear_acceleration_mps2_z: Option<f64>,
}

/// A frame counter in any of the representations producers use for 64-bit integers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SeqValue {
    Int(u64),
    Float(f64),
    /// Wide counters serialized as decimal text.
    Text(String),
}

impl SeqValue {
    pub fn to_u64(&self) -> Option<u64> {
        match self {
            SeqValue::Int(v) => Some(*v),
            SeqValue::Float(f) if f.is_finite() && *f >= 0.0 && *f < u64::MAX as f64 => {
                Some(f.trunc() as u64)
            }
            SeqValue::Float(_) => None,
            SeqValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn nonzero(v: Option<f64>) -> bool {
    v.is_some_and(|v| v.is_finite() && v != 0.0)
}

impl RawTelemetry {
    /// Decoded bytes count as telemetry only if they carry a version, motion or a position.
    /// Noise that happens to parse as protobuf almost never does.
    pub fn is_plausible(&self) -> bool {
        self.version.is_some_and(|v| v > 0.0)
            || self.vehicle_speed_mps.is_some_and(|v| v > 0.0)
            || nonzero(self.latitude_deg)
            || nonzero(self.longitude_deg)
    }

    fn apply(&mut self, field: u64, value: WireValue) {
        match field {
            1 => self.version = Some(value.as_f64()),
            2 => self.gear_state = Some(value.as_f64()),
            3 => self.frame_seq_no = Some(value.as_seq()),
            4 => self.vehicle_speed_mps = Some(value.as_f64()),
            5 => self.accelerator_pedal_position = Some(value.as_f64()),
            6 => self.steering_wheel_angle = Some(value.as_f64()),
            7 => self.blinker_on_left = Some(value.as_bool()),
            8 => self.blinker_on_right = Some(value.as_bool()),
            9 => self.brake_applied = Some(value.as_bool()),
            10 => self.autopilot_state = Some(value.as_f64()),
            11 => self.latitude_deg = Some(value.as_f64()),
            12 => self.longitude_deg = Some(value.as_f64()),
            13 => self.heading_deg = Some(value.as_f64()),
            14 => self.linear_acceleration_mps2_x = Some(value.as_f64()),
            15 => self.linear_acceleration_mps2_y = Some(value.as_f64()),
            16 => self.linear_acceleration_mps2_z = Some(value.as_f64()),
            _ => {}
        }
    }
}

/// Decodes one isolated message into raw telemetry.
pub trait TelemetryDecoder: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Decode `message`. Never fails: a broken message yields whatever was recovered,
    /// possibly nothing.
    fn decode(&self, message: &[u8]) -> RawTelemetry;
}

/// Which decoder backend an extractor uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderBackend {
    /// Protobuf when compiled in, otherwise the wire decoder.
    #[default]
    Auto,
    Protobuf,
    Wire,
}

impl DecoderBackend {
    pub fn parse(s: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(s.trim(), true).ok()
    }
}

pub(crate) fn build_decoder(backend: DecoderBackend) -> Box<dyn TelemetryDecoder> {
    match backend {
        DecoderBackend::Wire => Box::new(WireDecoder),
        #[cfg(feature = "protobuf")]
        DecoderBackend::Auto | DecoderBackend::Protobuf => Box::new(ProtobufDecoder),
        #[cfg(not(feature = "protobuf"))]
        DecoderBackend::Auto => Box::new(WireDecoder),
        #[cfg(not(feature = "protobuf"))]
        DecoderBackend::Protobuf => {
            warn_once!("protobuf decoder not compiled in; using the wire decoder");
            Box::new(WireDecoder)
        }
    }
}

// -----------------------------
// Wire-format decoder
// -----------------------------

#[derive(Debug, Clone, Copy)]
enum WireValue {
    Varint(u64),
    Fixed64(f64),
    Fixed32(f32),
}

impl WireValue {
    fn as_f64(self) -> f64 {
        match self {
            WireValue::Varint(v) => v as f64,
            WireValue::Fixed64(v) => v,
            WireValue::Fixed32(v) => f64::from(v),
        }
    }

    fn as_bool(self) -> bool {
        match self {
            WireValue::Varint(v) => v != 0,
            other => other.as_f64() != 0.0,
        }
    }

    fn as_seq(self) -> SeqValue {
        match self {
            WireValue::Varint(v) => SeqValue::Int(v),
            other => SeqValue::Float(other.as_f64()),
        }
    }
}

struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        WireReader { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn varint(&mut self) -> Option<u64> {
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            let b = *self.buf.get(self.pos)?;
            self.pos += 1;
            result |= u64::from(b & 0x7F) << shift;
            if b & 0x80 == 0 {
                return Some(result);
            }
            shift += 7;
            if shift > 63 {
                return None;
            }
        }
    }

    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let end = self.pos.checked_add(N)?;
        let bytes = self.buf.get(self.pos..end)?.try_into().ok()?;
        self.pos = end;
        Some(bytes)
    }

    fn skip(&mut self, n: u64) -> Option<()> {
        let end = self.pos.checked_add(usize::try_from(n).ok()?)?;
        if end > self.buf.len() {
            return None;
        }
        self.pos = end;
        Some(())
    }
}

/// Protobuf wire-format reader that needs no schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct WireDecoder;

impl TelemetryDecoder for WireDecoder {
    fn name(&self) -> &'static str {
        "wire"
    }

    fn decode(&self, message: &[u8]) -> RawTelemetry {
        let mut raw = RawTelemetry::default();
        let mut r = WireReader::new(message);

        while !r.is_empty() {
            let Some(tag) = r.varint() else { break };
            let field = tag >> 3;
            let value = match tag & 0x7 {
                0 => r.varint().map(WireValue::Varint),
                1 => r.take::<8>().map(|b| WireValue::Fixed64(f64::from_le_bytes(b))),
                5 => r.take::<4>().map(|b| WireValue::Fixed32(f32::from_le_bytes(b))),
                2 => match r.varint().and_then(|len| r.skip(len)) {
                    Some(()) => continue,
                    None => break,
                },
                // Groups and reserved wire types: step over a byte and try to resync.
                _ => {
                    r.pos += 1;
                    continue;
                }
            };
            let Some(value) = value else { break };
            raw.apply(field, value);
        }

        raw
    }
}

// -----------------------------
// Protobuf decoder
// -----------------------------

#[cfg(feature = "protobuf")]
impl From<crate::pb::SeiMetadata> for RawTelemetry {
    fn from(m: crate::pb::SeiMetadata) -> Self {
        RawTelemetry {
            version: Some(f64::from(m.version)),
            gear_state: Some(f64::from(m.gear_state)),
            frame_seq_no: Some(SeqValue::Int(m.frame_seq_no)),
            vehicle_speed_mps: Some(f64::from(m.vehicle_speed_mps)),
            accelerator_pedal_position: Some(f64::from(m.accelerator_pedal_position)),
            steering_wheel_angle: Some(f64::from(m.steering_wheel_angle)),
            blinker_on_left: Some(m.blinker_on_left),
            blinker_on_right: Some(m.blinker_on_right),
            brake_applied: Some(m.brake_applied),
            autopilot_state: Some(f64::from(m.autopilot_state)),
            latitude_deg: Some(m.latitude_deg),
            longitude_deg: Some(m.longitude_deg),
            heading_deg: Some(m.heading_deg),
            linear_acceleration_mps2_x: Some(m.linear_acceleration_mps2_x),
            linear_acceleration_mps2_y: Some(m.linear_acceleration_mps2_y),
            linear_acceleration_mps2_z: Some(m.linear_acceleration_mps2_z),
        }
    }
}

/// Schema-driven decoder backed by the prost-generated [`SeiMetadata`](crate::pb::SeiMetadata).
///
/// prost rejects a message outright on the first bad field; in that case the wire decoder
/// runs instead so the fields in front of the fault are still recovered.
#[cfg(feature = "protobuf")]
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtobufDecoder;

#[cfg(feature = "protobuf")]
impl TelemetryDecoder for ProtobufDecoder {
    fn name(&self) -> &'static str {
        "protobuf"
    }

    fn decode(&self, message: &[u8]) -> RawTelemetry {
        use prost::Message;

        match crate::pb::SeiMetadata::decode(message) {
            Ok(m) => m.into(),
            Err(err) => {
                warn_once!("protobuf decode failed ({err}); recovering with the wire decoder");
                WireDecoder.decode(message)
            }
        }
    }
}
