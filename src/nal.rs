use log::debug;

use crate::decode::TelemetryDecoder;
use crate::sei::decode_sei_unit;
use crate::telemetry::TelemetryRecord;

const NAL_TYPE_SLICE: u8 = 1;
const NAL_TYPE_IDR: u8 = 5;
const NAL_TYPE_SEI: u8 = 6;

const LENGTH_PREFIX_LEN: usize = 4;

// -----------------------------
// Elementary stream walk
// -----------------------------

/// Walk the 4-byte length-prefixed NAL units in `[start, end)` and pair each SEI with the
/// slice that follows it. Each returned record's `frame_index` is the number of slices seen
/// before the one that closed its frame.
///
/// A zero or overrunning length means the walk lost sync; it then slides forward one byte at
/// a time until a plausible prefix turns up, so units in the gap are dropped.
pub(crate) fn scan_frames(
    buf: &[u8],
    start: usize,
    end: usize,
    decoder: &dyn TelemetryDecoder,
) -> Vec<TelemetryRecord> {
    let end = end.min(buf.len());
    let mut frames = Vec::new();
    let mut pending: Option<TelemetryRecord> = None;
    let mut frame_counter = 0usize;
    let mut sei_units = 0usize;
    let mut resync_steps = 0usize;
    let mut pos = start;

    while pos + LENGTH_PREFIX_LEN <= end {
        let len = u32::from_be_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]) as usize;
        let unit_start = pos + LENGTH_PREFIX_LEN;
        let unit_end = unit_start.saturating_add(len);
        if len == 0 || unit_end > end {
            pos += 1;
            resync_steps += 1;
            continue;
        }

        let unit = &buf[unit_start..unit_end];
        match unit[0] & 0x1F {
            NAL_TYPE_SEI => {
                sei_units += 1;
                // A second SEI before the next slice replaces the first.
                pending = decode_sei_unit(unit, decoder);
            }
            NAL_TYPE_IDR | NAL_TYPE_SLICE => {
                if let Some(telemetry) = pending.take() {
                    frames.push(telemetry.with_frame_index(frame_counter));
                }
                frame_counter += 1;
            }
            _ => {}
        }

        pos = unit_end;
    }

    debug!(
        "scanned {frame_counter} frames, {sei_units} SEI units, {} with telemetry ({resync_steps} resync steps)",
        frames.len()
    );
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::WireDecoder;
    use crate::test_support::{driving_message, length_prefixed, sei_unit, slice_unit};

    fn scan(units: &[Vec<u8>]) -> Vec<TelemetryRecord> {
        let buf = units.concat();
        scan_frames(&buf, 0, buf.len(), &WireDecoder)
    }

    #[test]
    fn pairs_each_sei_with_following_slice() {
        let mut units = Vec::new();
        for i in 0..5u64 {
            units.push(sei_unit(&driving_message(500 + i, 5.0)));
            units.push(slice_unit(i == 0));
        }
        let frames = scan(&units);
        assert_eq!(frames.len(), 5);
        for (i, f) in frames.iter().enumerate() {
            assert_eq!(f.frame_index, i);
            assert_eq!(f.frame_seq_no, 500 + i as u64);
        }
    }

    #[test]
    fn slices_without_sei_still_advance_the_counter() {
        let units = vec![
            slice_unit(true),
            sei_unit(&driving_message(10, 1.0)),
            slice_unit(false),
            slice_unit(false),
            sei_unit(&driving_message(12, 1.0)),
            slice_unit(false),
        ];
        let frames = scan(&units);
        let indices: Vec<usize> = frames.iter().map(|f| f.frame_index).collect();
        assert_eq!(indices, vec![1, 3]);
    }

    #[test]
    fn later_sei_overwrites_pending_one() {
        let units = vec![
            sei_unit(&driving_message(1, 1.0)),
            sei_unit(&driving_message(2, 2.0)),
            slice_unit(true),
        ];
        let frames = scan(&units);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_seq_no, 2);
    }

    #[test]
    fn sei_without_marker_leaves_frame_empty() {
        let units = vec![
            length_prefixed(&[0x06, 0x05, 0x02, 0x10, 0x20, 0x80]),
            slice_unit(true),
            sei_unit(&driving_message(3, 1.0)),
            slice_unit(false),
        ];
        let frames = scan(&units);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_index, 1);
    }

    #[test]
    fn resyncs_after_zero_length_prefix() {
        let mut buf = vec![0u8, 0, 0, 0];
        buf.extend_from_slice(&sei_unit(&driving_message(9, 1.0)));
        buf.extend_from_slice(&slice_unit(true));
        let frames = scan_frames(&buf, 0, buf.len(), &WireDecoder);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_seq_no, 9);
    }

    #[test]
    fn overrunning_length_does_not_panic() {
        let mut buf = sei_unit(&driving_message(9, 1.0));
        buf.extend_from_slice(&[0x00, 0x00, 0xFF, 0xFF, 0x65]);
        let frames = scan_frames(&buf, 0, buf.len(), &WireDecoder);
        assert!(frames.is_empty());
    }
}
