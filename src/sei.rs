use crate::decode::TelemetryDecoder;
use crate::diag::debug_once;
use crate::telemetry::{TelemetryRecord, sanitize};

/// Filler byte the firmware repeats in front of the telemetry message.
pub(crate) const MARKER_BYTE: u8 = 0x42;
/// Byte closing the marker run.
pub(crate) const MARKER_END: u8 = 0x69;
const MIN_MARKER_RUN: usize = 4;

// NAL header, SEI payload type and a one-byte payload size precede the marker.
const SEI_HEADER_LEN: usize = 3;

// -----------------------------
// SEI payload isolation
// -----------------------------
pub(crate) fn remove_emulation_prevention(rbsp: &[u8]) -> Vec<u8> {
    // Remove 0x03 after 0x00 0x00 sequences (H264/H265)
    let mut out = Vec::with_capacity(rbsp.len());
    let mut zeros = 0usize;

    for &b in rbsp {
        if zeros >= 2 && b == 0x03 {
            // skip this emulation prevention byte
            zeros = 0;
            continue;
        }
        out.push(b);
        if b == 0x00 {
            zeros += 1;
        } else {
            zeros = 0;
        }
    }
    out
}

/// Isolate the telemetry message carried by one SEI NAL unit (header byte first).
///
/// The message sits between the `0x42…0x42 0x69` marker and the unit's final byte, which is
/// always rbsp trailing bits. Returns `None` when the marker is absent or too short.
pub(crate) fn parse_sei_unit(unit: &[u8]) -> Option<Vec<u8>> {
    let run_start = SEI_HEADER_LEN;
    let run_len = unit
        .get(run_start..)?
        .iter()
        .take_while(|&&b| b == MARKER_BYTE)
        .count();
    let delimiter = run_start + run_len;

    if run_len < MIN_MARKER_RUN || unit.get(delimiter) != Some(&MARKER_END) {
        debug_once!("SEI unit without telemetry marker (first seen, {} bytes)", unit.len());
        return None;
    }

    let start = delimiter + 1;
    let end = unit.len() - 1;
    if start >= end {
        return None;
    }
    Some(remove_emulation_prevention(&unit[start..end]))
}

/// Full per-unit pipeline: isolate, decode, plausibility check, sanitize.
pub(crate) fn decode_sei_unit(
    unit: &[u8],
    decoder: &dyn TelemetryDecoder,
) -> Option<TelemetryRecord> {
    let message = parse_sei_unit(unit)?;
    let raw = decoder.decode(&message);
    if !raw.is_plausible() {
        return None;
    }
    Some(sanitize(&raw))
}
