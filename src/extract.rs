use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::decode::{DecoderBackend, TelemetryDecoder, build_decoder};
use crate::mp4::{extract_timing, find_box};
use crate::nal::scan_frames;
use crate::timeline::ExtractionResult;
use crate::Error;

/// Environment variable selecting the decoder backend (`auto`, `protobuf` or `wire`).
pub const DECODER_ENV: &str = "TESLA_TELEMETRY_DECODER";

/// Extractor settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractorConfig {
    pub decoder: DecoderBackend,
}

impl ExtractorConfig {
    /// Defaults, overridden by [`DECODER_ENV`] when it holds a known backend name.
    pub fn from_env() -> Self {
        let mut config = ExtractorConfig::default();
        if let Ok(value) = env::var(DECODER_ENV) {
            match DecoderBackend::parse(&value) {
                Some(decoder) => config.decoder = decoder,
                None => warn!("ignoring {DECODER_ENV}={value:?}; expected auto, protobuf or wire"),
            }
        }
        config
    }
}

/// Cache key: a file is considered unchanged while name, size and mtime match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub name: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl FileIdentity {
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let meta = fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(FileIdentity {
            name,
            size: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// Extracts telemetry from dashcam clips and memoizes the results per file.
///
/// Concurrent calls for the same file are not coalesced: each one that misses the cache runs
/// the full parse, and the last to finish overwrites the cached entry.
pub struct TelemetryExtractor {
    decoder: Box<dyn TelemetryDecoder>,
    cache: Mutex<HashMap<FileIdentity, Arc<ExtractionResult>>>,
    parses: AtomicUsize,
}

impl Default for TelemetryExtractor {
    fn default() -> Self {
        TelemetryExtractor::new(ExtractorConfig::default())
    }
}

impl TelemetryExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let decoder = build_decoder(config.decoder);
        debug!("telemetry extractor using the {} decoder", decoder.name());
        TelemetryExtractor {
            decoder,
            cache: Mutex::new(HashMap::new()),
            parses: AtomicUsize::new(0),
        }
    }

    pub fn decoder_name(&self) -> &'static str {
        self.decoder.name()
    }

    /// Extract (or fetch from cache) the telemetry of the clip at `path`.
    ///
    /// Never fails: unreadable or unparseable files yield an empty result. Only results with
    /// at least one record are cached.
    pub fn extract_from_file(&self, path: impl AsRef<Path>) -> Arc<ExtractionResult> {
        let path = path.as_ref();
        let identity = match FileIdentity::from_path(path) {
            Ok(identity) => identity,
            Err(err) => {
                warn!("cannot stat {}: {err}", path.display());
                return Arc::default();
            }
        };

        if let Some(hit) = self.cache.lock().get(&identity).cloned() {
            debug!("telemetry cache hit for {}", identity.name);
            return hit;
        }

        let result = fs::read(path)
            .map_err(Error::from)
            .and_then(|bytes| self.run_pipeline(&bytes))
            .unwrap_or_else(|err| {
                debug!("no telemetry extracted from {}: {err}", path.display());
                ExtractionResult::default()
            });
        let result = Arc::new(result);

        if !result.is_empty() {
            self.cache.lock().insert(identity, Arc::clone(&result));
        }
        result
    }

    /// Run the full pipeline over an in-memory clip, bypassing the cache.
    pub fn extract_from_bytes(&self, buf: &[u8]) -> ExtractionResult {
        match self.run_pipeline(buf) {
            Ok(result) => result,
            Err(err) => {
                debug!("no telemetry extracted: {err}");
                ExtractionResult::default()
            }
        }
    }

    fn run_pipeline(&self, buf: &[u8]) -> Result<ExtractionResult, Error> {
        self.parses.fetch_add(1, Ordering::Relaxed);

        let moov = find_box(buf, b"moov", 0, buf.len()).ok_or(Error::MissingBox { name: "moov" })?;
        let timing = extract_timing(buf, moov.payload_start, moov.end);
        let mdat = find_box(buf, b"mdat", 0, buf.len()).ok_or(Error::MissingBox { name: "mdat" })?;

        let frames = scan_frames(buf, mdat.payload_start, mdat.end, self.decoder.as_ref());
        let result = ExtractionResult::new(frames, timing);
        debug!(
            "extracted {} records at {:.3} fps (timescale {}, frame duration {}, base seq {:?})",
            result.len(),
            result.fps,
            result.timescale,
            result.frame_duration,
            result.base_frame_seq_no
        );
        Ok(result)
    }

    /// Whether the clip at `path` carries any telemetry.
    pub fn has_telemetry(&self, path: impl AsRef<Path>) -> bool {
        !self.extract_from_file(path).is_empty()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn cached_files(&self) -> usize {
        self.cache.lock().len()
    }

    /// How many times the parse pipeline has run on this extractor.
    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::Relaxed)
    }
}

static DEFAULT_EXTRACTOR: OnceLock<TelemetryExtractor> = OnceLock::new();

/// Process-wide extractor behind the free functions, configured from the environment.
pub fn default_extractor() -> &'static TelemetryExtractor {
    DEFAULT_EXTRACTOR.get_or_init(|| TelemetryExtractor::new(ExtractorConfig::from_env()))
}

/// Extract telemetry from the clip at `path` using the process-wide cache.
pub fn extract_from_file(path: impl AsRef<Path>) -> Arc<ExtractionResult> {
    default_extractor().extract_from_file(path)
}

pub fn has_telemetry(path: impl AsRef<Path>) -> bool {
    default_extractor().has_telemetry(path)
}

/// Drop every cached result of the process-wide extractor.
pub fn clear_cache() {
    default_extractor().clear_cache();
}
