//! Builders for synthetic dashcam clips used by the unit tests.

use crate::sei::{MARKER_BYTE, MARKER_END};

pub fn make_box(fourcc: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let size = (8 + body.len()) as u32;
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(fourcc);
    out.extend_from_slice(body);
    out
}

pub fn make_full_box(fourcc: &[u8; 4], version: u8, flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + payload.len());
    body.push(version);
    body.push(((flags >> 16) & 0xFF) as u8);
    body.push(((flags >> 8) & 0xFF) as u8);
    body.push((flags & 0xFF) as u8);
    body.extend_from_slice(payload);
    make_box(fourcc, &body)
}

pub fn make_mdhd(version: u8, timescale: u32) -> Vec<u8> {
    let mut payload = Vec::new();
    if version == 1 {
        payload.extend_from_slice(&[0u8; 16]);
        payload.extend_from_slice(&timescale.to_be_bytes());
        payload.extend_from_slice(&[0u8; 8]);
    } else {
        payload.extend_from_slice(&[0u8; 8]);
        payload.extend_from_slice(&timescale.to_be_bytes());
        payload.extend_from_slice(&[0u8; 4]);
    }
    // language + pre_defined
    payload.extend_from_slice(&[0x55, 0xC4, 0, 0]);
    make_full_box(b"mdhd", version, 0, &payload)
}

pub fn make_stts(runs: &[(u32, u32)]) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&(runs.len() as u32).to_be_bytes());
    for (count, delta) in runs {
        payload.extend_from_slice(&count.to_be_bytes());
        payload.extend_from_slice(&delta.to_be_bytes());
    }
    make_full_box(b"stts", 0, 0, &payload)
}

/// `ftyp` + `moov` (one video track with the given timing) + `mdat` holding `units`.
pub fn make_clip(timescale: u32, frame_duration: u32, units: &[Vec<u8>]) -> Vec<u8> {
    let stbl = make_box(b"stbl", &make_stts(&[(units.len() as u32, frame_duration)]));
    let mut mdia = make_mdhd(0, timescale);
    mdia.extend_from_slice(&make_box(b"minf", &stbl));
    let moov = make_box(b"moov", &make_box(b"trak", &make_box(b"mdia", &mdia)));

    let mut out = make_box(b"ftyp", b"isom\0\0\0\0");
    out.extend_from_slice(&moov);
    out.extend_from_slice(&make_box(b"mdat", &units.concat()));
    out
}

/// Prefix a NAL unit with its 4-byte big-endian length.
pub fn length_prefixed(nal: &[u8]) -> Vec<u8> {
    let mut out = (nal.len() as u32).to_be_bytes().to_vec();
    out.extend_from_slice(nal);
    out
}

/// Insert emulation prevention bytes the way an H.264 encoder would.
pub fn add_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 2);
    let mut zeros = 0usize;
    for &b in data {
        if zeros >= 2 && b <= 0x03 {
            out.push(0x03);
            zeros = 0;
        }
        out.push(b);
        zeros = if b == 0 { zeros + 1 } else { 0 };
    }
    out
}

/// An SEI NAL unit (without length prefix) carrying `message` behind the vendor marker.
pub fn sei_nal(message: &[u8]) -> Vec<u8> {
    let escaped = add_emulation_prevention(message);
    let mut nal = vec![0x06, 0x05, escaped.len().min(0xFF) as u8];
    nal.extend_from_slice(&[MARKER_BYTE; 6]);
    nal.push(MARKER_END);
    nal.extend_from_slice(&escaped);
    // rbsp trailing bits
    nal.push(0x80);
    nal
}

pub fn sei_unit(message: &[u8]) -> Vec<u8> {
    length_prefixed(&sei_nal(message))
}

pub fn slice_unit(idr: bool) -> Vec<u8> {
    let header = if idr { 0x65 } else { 0x41 };
    length_prefixed(&[header, 0x88, 0x84, 0x21, 0xA0])
}

/// Minimal protobuf wire-format writer for telemetry messages.
#[derive(Debug, Default, Clone)]
pub struct WireMessage(Vec<u8>);

impl WireMessage {
    fn put_varint(&mut self, mut v: u64) {
        while v >= 0x80 {
            self.0.push((v as u8) | 0x80);
            v >>= 7;
        }
        self.0.push(v as u8);
    }

    fn tag(&mut self, field: u32, wire_type: u8) {
        self.put_varint((u64::from(field) << 3) | u64::from(wire_type));
    }

    pub fn varint(mut self, field: u32, v: u64) -> Self {
        self.tag(field, 0);
        self.put_varint(v);
        self
    }

    pub fn float(mut self, field: u32, v: f32) -> Self {
        self.tag(field, 5);
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn double(mut self, field: u32, v: f64) -> Self {
        self.tag(field, 1);
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn bytes(mut self, field: u32, v: &[u8]) -> Self {
        self.tag(field, 2);
        self.put_varint(v.len() as u64);
        self.0.extend_from_slice(v);
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.0.extend_from_slice(bytes);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.0
    }
}

/// A realistic driving sample: version 1, drive gear, given counter and speed.
pub fn driving_message(frame_seq_no: u64, speed_mps: f32) -> Vec<u8> {
    WireMessage::default()
        .varint(1, 1)
        .varint(2, 1)
        .varint(3, frame_seq_no)
        .float(4, speed_mps)
        .float(5, 0.25)
        .float(6, -12.5)
        .varint(7, 1)
        .varint(9, 0)
        .varint(10, 2)
        .double(11, 37.4219)
        .double(12, -122.0841)
        .double(13, 271.5)
        .double(14, 0.5)
        .double(15, -0.25)
        .double(16, 9.81)
        .finish()
}

/// A clip where every frame is an SEI followed by a slice, counters starting at `first_seq`.
pub fn driving_clip(frames: usize, first_seq: u64) -> Vec<u8> {
    let mut units = Vec::new();
    for i in 0..frames {
        units.push(sei_unit(&driving_message(first_seq + i as u64, 10.0 + i as f32)));
        units.push(slice_unit(i % 30 == 0));
    }
    make_clip(36_000, 1000, &units)
}
