use std::io;

use thiserror::Error;

/// Failures inside the extraction pipeline.
///
/// These never reach callers of the public operations: the extractor logs them and
/// returns an empty [`ExtractionResult`](crate::ExtractionResult) instead.
#[derive(Debug, Error)]
pub(crate) enum Error {
    /// Passthrough for IO errors (open/read/metadata).
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A top-level box the pipeline cannot work without is absent.
    #[error("mp4 missing required box: {name}")]
    MissingBox { name: &'static str },

    /// A box header declares a size smaller than its own header.
    #[error("mp4 malformed box {box_type} at offset {offset}")]
    MalformedBox { box_type: String, offset: usize },
}
