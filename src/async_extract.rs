#![cfg(feature = "async")]

use std::path::PathBuf;
use std::sync::Arc;

use log::warn;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::extract::TelemetryExtractor;
use crate::telemetry::TelemetryRecord;
use crate::timeline::ExtractionResult;

/// Extract telemetry from the clip at `path` without blocking the async runtime.
///
/// The read and parse run on a blocking thread (`tokio::task::spawn_blocking`); the
/// extractor's cache is consulted and filled exactly as in the synchronous call.
pub async fn extract_from_file_async(
    extractor: Arc<TelemetryExtractor>,
    path: impl Into<PathBuf>,
) -> Arc<ExtractionResult> {
    let path = path.into();
    match tokio::task::spawn_blocking(move || extractor.extract_from_file(&path)).await {
        Ok(result) => result,
        Err(err) => {
            warn!("telemetry extraction task failed: {err}");
            Arc::default()
        }
    }
}

/// Create a Tokio `Stream` of the records extracted from the clip at `path`.
///
/// Extraction runs on a blocking thread and records are forwarded in stream order over a
/// bounded channel of capacity `buffer`. The stream ends early if the receiver is dropped.
pub fn stream_from_path(
    extractor: Arc<TelemetryExtractor>,
    path: impl Into<PathBuf>,
    buffer: usize,
) -> ReceiverStream<TelemetryRecord> {
    let path = path.into();
    let (tx, rx) = mpsc::channel(buffer.max(1));

    tokio::task::spawn_blocking(move || {
        let result = extractor.extract_from_file(&path);
        for record in &result.frames {
            if tx.blocking_send(record.clone()).is_err() {
                break;
            }
        }
    });

    ReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::driving_clip;
    use std::io::Write;
    use tokio_stream::StreamExt;

    fn clip_file(frames: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&driving_clip(frames, 300)).unwrap();
        file
    }

    #[tokio::test]
    async fn async_extraction_uses_cache() {
        let file = clip_file(8);
        let extractor = Arc::new(TelemetryExtractor::default());

        let first = extract_from_file_async(Arc::clone(&extractor), file.path()).await;
        let second = extract_from_file_async(Arc::clone(&extractor), file.path()).await;

        assert_eq!(first.len(), 8);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(extractor.parse_count(), 1);
    }

    #[tokio::test]
    async fn stream_yields_records_in_order() {
        let file = clip_file(5);
        let extractor = Arc::new(TelemetryExtractor::default());

        let seqs: Vec<u64> = stream_from_path(extractor, file.path(), 2)
            .map(|r| r.frame_seq_no)
            .collect()
            .await;
        assert_eq!(seqs, vec![300, 301, 302, 303, 304]);
    }
}
