use std::collections::HashMap;

use serde::Serialize;

use crate::mp4::{DEFAULT_FPS, Timing};
use crate::telemetry::TelemetryRecord;

/// How far around the target counter a sequence lookup searches.
const SEQ_SEARCH_RADIUS: i128 = 5;
/// Largest frame distance the frame-order fallback accepts.
const MAX_FRAME_DISTANCE: i128 = 10;

/// Everything extracted from one clip.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    /// Records in stream order.
    pub frames: Vec<TelemetryRecord>,
    pub timescale: u32,
    pub frame_duration: u32,
    pub fps: f64,
    /// Smallest positive `frame_seq_no` in the clip.
    pub base_frame_seq_no: Option<u64>,
    #[serde(skip)]
    seq_index: HashMap<u64, usize>,
}

impl Default for ExtractionResult {
    fn default() -> Self {
        ExtractionResult {
            frames: Vec::new(),
            timescale: 0,
            frame_duration: 0,
            fps: DEFAULT_FPS,
            base_frame_seq_no: None,
            seq_index: HashMap::new(),
        }
    }
}

impl ExtractionResult {
    pub(crate) fn new(frames: Vec<TelemetryRecord>, timing: Timing) -> Self {
        let base_frame_seq_no = frames
            .iter()
            .map(|f| f.frame_seq_no)
            .filter(|&seq| seq > 0)
            .min();

        // Duplicate counters: the later frame wins.
        let seq_index = frames
            .iter()
            .enumerate()
            .map(|(i, f)| (f.frame_seq_no, i))
            .collect();

        ExtractionResult {
            frames,
            timescale: timing.timescale,
            frame_duration: timing.frame_duration,
            fps: timing.fps,
            base_frame_seq_no,
            seq_index,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Playback length covered by the recorded frames.
    pub fn duration_seconds(&self) -> f64 {
        self.frames
            .last()
            .map_or(0.0, |f| (f.frame_index + 1) as f64 / self.fps)
    }

    pub fn record_for_seq(&self, frame_seq_no: u64) -> Option<&TelemetryRecord> {
        self.seq_index.get(&frame_seq_no).map(|&i| &self.frames[i])
    }

    /// Telemetry to show at playback position `seconds`.
    ///
    /// Uses the firmware frame counter when the clip has one, which stays aligned even when
    /// frames were dropped; otherwise falls back to the frame's position in the stream.
    pub fn telemetry_at(&self, seconds: f64) -> Option<&TelemetryRecord> {
        if !seconds.is_finite() {
            return None;
        }
        let offset = (seconds * self.fps).floor() as i128;

        match self.base_frame_seq_no {
            Some(base) if !self.seq_index.is_empty() => self.lookup_by_seq(i128::from(base) + offset),
            _ => self.lookup_by_frame_index(offset),
        }
    }

    fn seq_hit(&self, target: i128) -> Option<&TelemetryRecord> {
        u64::try_from(target).ok().and_then(|seq| self.record_for_seq(seq))
    }

    fn lookup_by_seq(&self, target: i128) -> Option<&TelemetryRecord> {
        // Nearest first; at equal distance the earlier counter wins.
        self.seq_hit(target).or_else(|| {
            (1..=SEQ_SEARCH_RADIUS)
                .find_map(|d| self.seq_hit(target - d).or_else(|| self.seq_hit(target + d)))
        })
    }

    fn lookup_by_frame_index(&self, target: i128) -> Option<&TelemetryRecord> {
        let idx = self
            .frames
            .partition_point(|f| (f.frame_index as i128) < target);
        let distance = |f: &TelemetryRecord| (f.frame_index as i128 - target).abs();

        let before = idx.checked_sub(1).and_then(|i| self.frames.get(i));
        let after = self.frames.get(idx);
        let nearest = match (before, after) {
            (Some(b), Some(a)) if distance(a) < distance(b) => a,
            (Some(b), _) => b,
            (None, Some(a)) => a,
            (None, None) => return None,
        };

        (distance(nearest) <= MAX_FRAME_DISTANCE).then_some(nearest)
    }
}

/// Telemetry at playback time `seconds` in an extracted clip.
pub fn get_telemetry_at_time(result: &ExtractionResult, seconds: f64) -> Option<&TelemetryRecord> {
    result.telemetry_at(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{RawTelemetry, SeqValue};
    use crate::telemetry::sanitize;

    fn record(frame_index: usize, seq: u64) -> TelemetryRecord {
        sanitize(&RawTelemetry {
            version: Some(1.0),
            frame_seq_no: Some(SeqValue::Int(seq)),
            ..Default::default()
        })
        .with_frame_index(frame_index)
    }

    fn timing(fps: f64) -> Timing {
        Timing {
            timescale: 36_000,
            frame_duration: 1000,
            fps,
        }
    }

    fn from_seqs(seqs: &[u64]) -> ExtractionResult {
        let frames = seqs.iter().enumerate().map(|(i, &s)| record(i, s)).collect();
        ExtractionResult::new(frames, timing(36.0))
    }

    #[test]
    fn base_is_minimum_positive_counter() {
        let r = from_seqs(&[0, 1005, 1001, 1003]);
        assert_eq!(r.base_frame_seq_no, Some(1001));
        assert_eq!(from_seqs(&[0, 0]).base_frame_seq_no, None);
    }

    #[test]
    fn exact_sequence_hit() {
        let r = from_seqs(&[1000, 1072, 1074]);
        assert_eq!(r.telemetry_at(2.0).unwrap().frame_seq_no, 1072);
    }

    #[test]
    fn nearest_sequence_hit_within_radius() {
        let r = from_seqs(&[1000, 1074, 1090]);
        assert_eq!(r.telemetry_at(2.0).unwrap().frame_seq_no, 1074);
    }

    #[test]
    fn sequence_ties_prefer_earlier_counter() {
        let r = from_seqs(&[1000, 1070, 1074]);
        assert_eq!(r.telemetry_at(2.0).unwrap().frame_seq_no, 1070);
    }

    #[test]
    fn sequence_miss_beyond_radius() {
        let r = from_seqs(&[1000, 1078]);
        assert!(r.telemetry_at(2.0).is_none());
        assert!(r.telemetry_at(f64::NAN).is_none());
    }

    #[test]
    fn duplicate_counters_keep_later_frame() {
        let r = from_seqs(&[1000, 1001, 1001]);
        assert_eq!(r.record_for_seq(1001).unwrap().frame_index, 2);
    }

    #[test]
    fn frame_order_fallback_without_counters() {
        let frames = [0usize, 2, 4, 40]
            .iter()
            .map(|&i| record(i, 0))
            .collect();
        let r = ExtractionResult::new(frames, timing(4.0));
        assert_eq!(r.base_frame_seq_no, None);

        assert_eq!(r.telemetry_at(0.0).unwrap().frame_index, 0);
        // Target 3 is equidistant from 2 and 4.
        assert_eq!(r.telemetry_at(0.75).unwrap().frame_index, 2);
        assert_eq!(r.telemetry_at(3.5).unwrap().frame_index, 4);
        // Target 25: nearest is 40 (15 away), too far.
        assert!(r.telemetry_at(6.25).is_none());
        assert_eq!(r.telemetry_at(11.25).unwrap().frame_index, 40);
        assert!(r.telemetry_at(15.0).is_none());
    }

    #[test]
    fn empty_result_defaults() {
        let r = ExtractionResult::default();
        assert!(r.is_empty());
        assert_eq!(r.fps, DEFAULT_FPS);
        assert_eq!(r.duration_seconds(), 0.0);
        assert!(get_telemetry_at_time(&r, 1.0).is_none());
    }

    #[test]
    fn duration_covers_last_frame() {
        let r = from_seqs(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert!((r.duration_seconds() - 0.25).abs() < 1e-12);
    }
}
