//! Concurrent, resumable segmented transfers.
//!
//! A resource is split into clips, one tokio task fetches each clip into its
//! own temp file, and the temp files are concatenated once every task has
//! returned. Temp files survive failed runs and are reused by the next one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use futures::StreamExt;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::download::clip::{get_all_clips, temp_path, Clip, DEFAULT_SEGMENT_SIZE};
use crate::download::merge::merge_clips;
use crate::download::single::download_single;
use crate::download::source::ByteSource;
use crate::download::state::{
    spawn_aggregator, Outcome, ProgressEvent, ProgressReporter, ProgressSender, TransferState,
};
use crate::error::{Error, Result};

/// Tunables of the download engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub segment_size: u64,
    /// Split transfers into clips. Disabled means single stream only.
    pub multi_segment: bool,
    /// Resumes allowed for a single-stream transfer.
    pub resume_attempts: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            multi_segment: true,
            resume_attempts: 3,
        }
    }
}

/// Segmented download engine over a [`ByteSource`].
pub struct SegmentedDownloader {
    source: Arc<dyn ByteSource>,
    options: EngineOptions,
}

impl SegmentedDownloader {
    pub fn new(source: Arc<dyn ByteSource>, options: EngineOptions) -> Self {
        Self { source, options }
    }

    /// Download `url` into `dest`.
    ///
    /// Falls back to a single stream when the size is unknown or splitting is
    /// disabled.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        reporter: Arc<dyn ProgressReporter>,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        let size = self.source.probe(url).await?;

        if let Some(size) = size {
            if is_complete(dest, size).await {
                tracing::debug!("{} already complete ({} bytes)", dest.display(), size);
                return Ok(Outcome::AlreadyComplete);
            }
        }

        let clips = match size {
            Some(size) if self.options.multi_segment => {
                get_all_clips(size, self.options.segment_size)
            }
            _ => Vec::new(),
        };

        let Some(total) = size.filter(|_| !clips.is_empty()) else {
            tracing::debug!("No clip plan for {}, using single stream", url);
            return self.download_single(url, dest, size, reporter, cancel).await;
        };

        tracing::debug!(
            "Planned {} clip(s) of {} bytes for {} bytes",
            clips.len(),
            self.options.segment_size,
            total
        );

        self.download_clips(url, dest, total, &clips, reporter).await
    }

    /// Single-stream transfer through the same source.
    pub async fn download_single(
        &self,
        url: &str,
        dest: &Path,
        known_size: Option<u64>,
        reporter: Arc<dyn ProgressReporter>,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        download_single(
            self.source.as_ref(),
            url,
            dest,
            known_size,
            self.options.resume_attempts,
            reporter,
            cancel,
        )
        .await
    }

    async fn download_clips(
        &self,
        url: &str,
        dest: &Path,
        total: u64,
        clips: &[Clip],
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<Outcome> {
        let state = Arc::new(TransferState::new(total, clips.len()));
        let (tx, aggregator) = spawn_aggregator(state.clone(), reporter);

        let handles: Vec<_> = clips
            .iter()
            .map(|clip| {
                let source = self.source.clone();
                let url = url.to_string();
                let temp = temp_path(dest, clip.index);
                let clip = *clip;
                let tx = tx.clone();
                tokio::spawn(async move { fetch_clip(source, url, temp, clip, total, tx).await })
            })
            .collect();
        drop(tx);

        let results = join_all(handles).await;
        let _ = aggregator.await;

        let mut failed = Vec::new();
        let mut fetched = 0u64;
        for (clip, result) in clips.iter().zip(results) {
            match result {
                Ok(Ok(bytes)) => fetched += bytes,
                Ok(Err(e)) => {
                    tracing::warn!("Segment {} failed: {}", clip.index, e);
                    failed.push(clip.index);
                }
                Err(e) => {
                    tracing::warn!("Segment {} task aborted: {}", clip.index, e);
                    failed.push(clip.index);
                }
            }
        }

        if !failed.is_empty() {
            return Err(Error::SegmentsFailed {
                failed,
                total: clips.len(),
            });
        }

        tracing::debug!(
            "All {} clip(s) of {} complete",
            state.completed_clips(),
            dest.display()
        );
        merge_clips(dest, clips.len()).await?;

        Ok(Outcome::Downloaded { bytes: fetched })
    }
}

async fn is_complete(path: &Path, size: u64) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() == size)
        .unwrap_or(false)
}

/// Fetch one clip into its temp file, returning the bytes fetched.
async fn fetch_clip(
    source: Arc<dyn ByteSource>,
    url: String,
    temp: PathBuf,
    clip: Clip,
    total: u64,
    tx: ProgressSender,
) -> Result<u64> {
    let expected = clip.expected_len(total);

    if is_complete(&temp, expected).await {
        let _ = tx.send(ProgressEvent::Bytes(expected));
        let _ = tx.send(ProgressEvent::ClipDone(clip.index));
        return Ok(0);
    }

    let response = source.open(&url, Some(clip.range())).await?;
    if !response.partial {
        // A full body would be written into a clip slot
        return Err(Error::HttpStatus {
            url,
            status: 200,
        });
    }

    let mut file = File::create(&temp).await?;
    let mut stream = response.stream;
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        let _ = tx.send(ProgressEvent::Bytes(chunk.len() as u64));
    }
    file.flush().await?;

    if written != expected {
        return Err(Error::Truncated {
            url,
            received: written,
            expected,
        });
    }

    let _ = tx.send(ProgressEvent::ClipDone(clip.index));
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::source::testing::MemorySource;
    use crate::download::state::NoProgress;
    use tempfile::tempdir;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    fn engine(source: Arc<MemorySource>, segment_size: u64) -> SegmentedDownloader {
        SegmentedDownloader::new(
            source,
            EngineOptions {
                segment_size,
                ..EngineOptions::default()
            },
        )
    }

    async fn run(engine: &SegmentedDownloader, dest: &Path) -> Result<Outcome> {
        engine
            .download("m://v", dest, Arc::new(NoProgress), &CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn test_segmented_download_and_merge() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("video.m4s");
        let data = payload(105);
        let source = Arc::new(MemorySource::new().with("m://v", data.clone()));

        let outcome = run(&engine(source.clone(), 10), &dest).await.unwrap();

        assert_eq!(outcome, Outcome::Downloaded { bytes: 105 });
        assert_eq!(fs::read(&dest).await.unwrap(), data);
        assert_eq!(source.open_count(), 11);
        for i in 0..11 {
            assert!(!temp_path(&dest, i).exists());
        }
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("video.m4s");
        let data = payload(64);
        let source = Arc::new(MemorySource::new().with("m://v", data.clone()));
        let engine = engine(source.clone(), 16);

        run(&engine, &dest).await.unwrap();
        let opens = source.open_count();

        let outcome = run(&engine, &dest).await.unwrap();
        assert_eq!(outcome, Outcome::AlreadyComplete);
        assert_eq!(outcome.transferred(), 0);
        assert_eq!(source.open_count(), opens);
        assert_eq!(fs::read(&dest).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_complete_temp_files_skip_requests() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("video.m4s");
        let data = payload(30);
        for (i, part) in data.chunks(10).enumerate() {
            fs::write(temp_path(&dest, i), part).await.unwrap();
        }
        let source = Arc::new(MemorySource::new().with("m://v", data.clone()));

        let outcome = run(&engine(source.clone(), 10), &dest).await.unwrap();

        assert_eq!(outcome, Outcome::Downloaded { bytes: 0 });
        assert_eq!(source.open_count(), 0);
        assert_eq!(fs::read(&dest).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_stale_partial_temp_is_refetched() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("video.m4s");
        let data = payload(25);
        fs::write(temp_path(&dest, 2), b"xx").await.unwrap();
        let source = Arc::new(MemorySource::new().with("m://v", data.clone()));

        run(&engine(source, 10), &dest).await.unwrap();

        assert_eq!(fs::read(&dest).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_failed_segments_are_reported_and_kept() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("video.m4s");
        let data = payload(40);
        let mut source = MemorySource::new().with("m://v", data.clone());
        source.failing_offsets.insert(10);
        source.failing_offsets.insert(30);
        let source = Arc::new(source);

        let err = run(&engine(source.clone(), 10), &dest).await.unwrap_err();
        match err {
            Error::SegmentsFailed { failed, total } => {
                assert_eq!(failed, vec![1, 3]);
                assert_eq!(total, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dest.exists());
        assert!(temp_path(&dest, 0).exists());
        assert!(temp_path(&dest, 2).exists());

        // Next run only fetches the missing clips
        let healed = Arc::new(MemorySource::new().with("m://v", data.clone()));
        let outcome = run(&engine(healed.clone(), 10), &dest).await.unwrap();
        assert_eq!(healed.open_count(), 2);
        assert_eq!(outcome.transferred(), 20);
        assert_eq!(fs::read(&dest).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_unknown_size_uses_single_stream() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("video.flv");
        let data = payload(50);
        let mut source = MemorySource::new().with("m://v", data.clone());
        source.hide_size = true;
        let source = Arc::new(source);

        run(&engine(source.clone(), 10), &dest).await.unwrap();

        assert_eq!(source.open_count(), 1);
        assert_eq!(source.ranges.lock().unwrap()[0], None);
        assert_eq!(fs::read(&dest).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_ignored_range_fails_segment() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("video.m4s");
        let mut source = MemorySource::new().with("m://v", payload(20));
        source.ignore_ranges = true;

        let err = run(&engine(Arc::new(source), 10), &dest).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_probe_failure_is_fatal() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("video.m4s");
        let source = Arc::new(MemorySource::new());

        let err = run(&engine(source.clone(), 10), &dest).await.unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
        assert_eq!(source.open_count(), 0);
    }
}
