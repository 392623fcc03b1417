//! `tesla-telemetry` extracts the vehicle telemetry Tesla dashcams embed as SEI metadata in
//! their MP4 clips, and answers "what was the telemetry at playback time T".
//!
//! This crate provides:
//! - A synchronous, caching extractor ([`TelemetryExtractor`]) plus free functions backed by a
//!   process-wide instance.
//! - Time lookup over an [`ExtractionResult`], keyed on the firmware frame counter when present.
//! - A Tokio-based async wrapper (enabled by default) for easy integration with async apps.
//!
//! ## Quick start
//! - Call [`extract_from_file`] on a clip, then [`get_telemetry_at_time`] with the playback
//!   position in seconds.
//!
//! Extraction never fails: a clip without telemetry and a clip that could not be parsed both
//! produce an empty result.
//!
//! ## Features
//! - `protobuf` (default): prost-based decoder for the telemetry message. Without it the
//!   built-in wire-format decoder is used.
//! - `async` (default): enables Tokio helpers.

#[cfg(feature = "protobuf")]
pub mod pb;

mod diag;
mod error;

pub mod decode;
pub mod mp4;
mod nal;
mod sei;
pub mod telemetry;
pub mod timeline;

pub mod extract;

#[cfg(feature = "async")]
pub mod async_extract;

#[cfg(test)]
mod test_support;

pub use decode::{DecoderBackend, RawTelemetry, SeqValue, TelemetryDecoder, WireDecoder};
pub use extract::{
    clear_cache, default_extractor, extract_from_file, has_telemetry, ExtractorConfig,
    FileIdentity, TelemetryExtractor, DECODER_ENV,
};
pub use mp4::DEFAULT_FPS;
pub use telemetry::{sanitize, TelemetryRecord};
pub use timeline::{get_telemetry_at_time, ExtractionResult};

pub(crate) use error::Error;

#[cfg(feature = "async")]
pub use async_extract::{extract_from_file_async, stream_from_path};
