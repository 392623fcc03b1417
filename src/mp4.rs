use log::{debug, trace};

use crate::Error;
use crate::diag::warn_once;

/// Frame rate used whenever the container's timing is missing or implausible.
pub const DEFAULT_FPS: f64 = 36.0;

// Dashcam clips are recorded somewhere in this band; anything else means bogus timing boxes.
const MIN_PLAUSIBLE_FPS: f64 = 20.0;
const MAX_PLAUSIBLE_FPS: f64 = 60.0;

const BOX_HEADER_LEN: usize = 8;
const LARGE_BOX_HEADER_LEN: usize = 16;

// Boxes whose payload is itself a sequence of boxes.
const CONTAINER_BOXES: [[u8; 4]; 7] = [
    *b"moov", *b"trak", *b"mdia", *b"minf", *b"stbl", *b"edts", *b"dinf",
];

// -----------------------------
// Box scanning (minimal ISO-BMFF)
// -----------------------------

/// Location of one box inside the file buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerBox {
    pub typ: [u8; 4],
    /// Offset of the size field.
    pub start: usize,
    /// One past the last byte, clamped to the enclosing range.
    pub end: usize,
    pub payload_start: usize,
    /// Declared size (after resolving largesize / to-end-of-range).
    pub size: u64,
}

pub(crate) fn fourcc_to_string(t: [u8; 4]) -> String {
    // Best-effort display for debugging.
    t.iter()
        .map(|&c| if c.is_ascii_graphic() { c as char } else { '.' })
        .collect()
}

fn be_u32(buf: &[u8], pos: usize, limit: usize) -> Option<u32> {
    let end = pos.checked_add(4)?;
    if end > limit {
        return None;
    }
    let bytes: [u8; 4] = buf.get(pos..end)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

fn be_u64(buf: &[u8], pos: usize, limit: usize) -> Option<u64> {
    let end = pos.checked_add(8)?;
    if end > limit {
        return None;
    }
    let bytes: [u8; 8] = buf.get(pos..end)?.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Read the box header at `pos`. `Ok(None)` means the range has no room for another header.
fn read_box(buf: &[u8], pos: usize, range_end: usize) -> Result<Option<ContainerBox>, Error> {
    let Some(size32) = be_u32(buf, pos, range_end) else {
        return Ok(None);
    };
    let Some(typ) = buf
        .get(pos + 4..pos + BOX_HEADER_LEN)
        .filter(|_| pos + BOX_HEADER_LEN <= range_end)
        .and_then(|t| <[u8; 4]>::try_from(t).ok())
    else {
        return Ok(None);
    };

    let (size, header_len) = match size32 {
        // largesize
        1 => match be_u64(buf, pos + BOX_HEADER_LEN, range_end) {
            Some(size64) => (size64, LARGE_BOX_HEADER_LEN),
            None => return Ok(None),
        },
        // size==0 means "extends to end of the containing range".
        0 => ((range_end - pos) as u64, BOX_HEADER_LEN),
        n => (u64::from(n), BOX_HEADER_LEN),
    };

    if size < header_len as u64 {
        return Err(Error::MalformedBox {
            box_type: fourcc_to_string(typ),
            offset: pos,
        });
    }

    // Clamp to the containing range so a lying size never walks past its parent.
    let end = usize::try_from(size)
        .ok()
        .and_then(|s| pos.checked_add(s))
        .map_or(range_end, |e| e.min(range_end));

    Ok(Some(ContainerBox {
        typ,
        start: pos,
        end,
        payload_start: pos + header_len,
        size,
    }))
}

/// Find the first box named `name` in `[range_start, range_end)`.
///
/// The walk is pre-order: known container boxes are searched before their next sibling, and
/// the first match wins. A malformed header ends the search of the branch it appears in; the
/// enclosing level keeps going with its own next sibling.
pub fn find_box(
    buf: &[u8],
    name: &[u8; 4],
    range_start: usize,
    range_end: usize,
) -> Option<ContainerBox> {
    let range_end = range_end.min(buf.len());
    let mut pos = range_start;

    while pos < range_end {
        let found = match read_box(buf, pos, range_end) {
            Ok(Some(b)) => b,
            Ok(None) => return None,
            Err(err) => {
                debug!("[mp4] {err}; abandoning branch");
                return None;
            }
        };
        trace!(
            "[mp4] pos={} typ={} size={} end={} limit={}",
            found.start,
            fourcc_to_string(found.typ),
            found.size,
            found.end,
            range_end
        );

        if &found.typ == name {
            return Some(found);
        }

        if CONTAINER_BOXES.contains(&found.typ) {
            if let Some(nested) = find_box(buf, name, found.payload_start, found.end) {
                return Some(nested);
            }
        }

        pos = found.end;
    }

    None
}

// -----------------------------
// Timing
// -----------------------------

/// Track timing derived from `mdhd` and `stts`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    /// Media timescale in ticks per second (0 when unknown).
    pub timescale: u32,
    /// Duration of the first `stts` run in timescale ticks (0 when unknown).
    pub frame_duration: u32,
    pub fps: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            timescale: 0,
            frame_duration: 0,
            fps: DEFAULT_FPS,
        }
    }
}

/// Read timescale and nominal frame duration from within the `moov` payload.
///
/// Only the first `stts` run is considered, so variable frame rate clips get the rate of
/// their opening run.
pub fn extract_timing(buf: &[u8], moov_start: usize, moov_end: usize) -> Timing {
    let mut timing = Timing::default();

    if let Some(mdhd) = find_box(buf, b"mdhd", moov_start, moov_end) {
        let p = mdhd.payload_start;
        // v1 widens creation/modification time to 64 bits.
        let timescale_at = match buf.get(p) {
            Some(&1) => p + 20,
            _ => p + 12,
        };
        timing.timescale = be_u32(buf, timescale_at, mdhd.end).unwrap_or(0);
    }

    if let Some(stts) = find_box(buf, b"stts", moov_start, moov_end) {
        let p = stts.payload_start;
        let entry_count = be_u32(buf, p + 4, stts.end).unwrap_or(0);
        if entry_count > 0 {
            timing.frame_duration = be_u32(buf, p + 12, stts.end).unwrap_or(0);
        }
    }

    if timing.timescale > 0 && timing.frame_duration > 0 {
        let fps = f64::from(timing.timescale) / f64::from(timing.frame_duration);
        if (MIN_PLAUSIBLE_FPS..=MAX_PLAUSIBLE_FPS).contains(&fps) {
            timing.fps = fps;
        } else {
            warn_once!("implausible frame rate {fps:.3} from container timing; using {DEFAULT_FPS}");
        }
    }

    timing
}
