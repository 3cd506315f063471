//! Single-stream transfer with byte-offset resume.

use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::download::clip::ByteRange;
use crate::download::source::ByteSource;
use crate::download::state::{
    spawn_aggregator, Outcome, ProgressEvent, ProgressReporter, ProgressSender, TransferState,
};
use crate::error::{Error, Result};

/// Fetch `url` into `dest` with one request, resuming after interruptions.
///
/// When `known_size` is given and `dest` already holds a shorter prefix, the
/// transfer starts as a resume. A server that ignores the range restarts the
/// file from zero.
pub async fn download_single(
    source: &dyn ByteSource,
    url: &str,
    dest: &Path,
    known_size: Option<u64>,
    resume_attempts: u32,
    reporter: Arc<dyn ProgressReporter>,
    cancel: &CancellationToken,
) -> Result<Outcome> {
    let existing = fs::metadata(dest).await.map(|m| m.len()).unwrap_or(0);

    let mut offset = match known_size {
        Some(size) if size > 0 && existing == size => {
            tracing::debug!("{} already complete", dest.display());
            return Ok(Outcome::AlreadyComplete);
        }
        Some(size) if existing > 0 && existing < size => {
            tracing::info!("Resuming {} at byte {}", dest.display(), existing);
            existing
        }
        _ => 0,
    };

    let state = Arc::new(TransferState::new(known_size.unwrap_or(0), 0));
    let (tx, aggregator) = spawn_aggregator(state, reporter);
    if offset > 0 {
        let _ = tx.send(ProgressEvent::Bytes(offset));
    }

    let result = transfer(
        source,
        url,
        dest,
        known_size,
        resume_attempts,
        &mut offset,
        &tx,
        cancel,
    )
    .await;

    drop(tx);
    let _ = aggregator.await;
    result
}

#[allow(clippy::too_many_arguments)]
async fn transfer(
    source: &dyn ByteSource,
    url: &str,
    dest: &Path,
    known_size: Option<u64>,
    resume_attempts: u32,
    offset: &mut u64,
    tx: &ProgressSender,
    cancel: &CancellationToken,
) -> Result<Outcome> {
    let mut fetched: u64 = 0;
    let mut resumes: u32 = 0;

    loop {
        let range = (*offset > 0).then(|| ByteRange::from_offset(*offset));
        let response = source.open(url, range).await?;

        if range.is_some() && !response.partial {
            tracing::warn!("Server ignored range request, restarting {}", dest.display());
            *offset = 0;
            let _ = tx.send(ProgressEvent::Restart);
        }

        let mut file = open_output(dest, *offset).await?;
        let mut stream = response.stream;
        let mut interrupted: Option<Error> = None;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    file.flush().await.map_err(|e| Error::assembly(dest, e))?;
                    return Err(Error::Cancelled);
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    file.write_all(&chunk)
                        .await
                        .map_err(|e| Error::assembly(dest, e))?;
                    let len = chunk.len() as u64;
                    *offset += len;
                    fetched += len;
                    let _ = tx.send(ProgressEvent::Bytes(len));
                }
                Some(Err(e)) => {
                    interrupted = Some(e);
                    break;
                }
                None => break,
            }
        }

        file.flush().await.map_err(|e| Error::assembly(dest, e))?;

        let short = known_size.is_some_and(|size| *offset < size);
        let failure = match interrupted {
            Some(e) => e,
            None if short => Error::Truncated {
                url: url.to_string(),
                received: *offset,
                expected: known_size.unwrap_or_default(),
            },
            None => return Ok(Outcome::Downloaded { bytes: fetched }),
        };

        if *offset == 0 || resumes >= resume_attempts {
            return Err(failure);
        }

        resumes += 1;
        tracing::warn!(
            "Transfer interrupted at byte {} ({}), resuming ({}/{})",
            offset,
            failure,
            resumes,
            resume_attempts
        );
    }
}

async fn open_output(dest: &Path, offset: u64) -> Result<File> {
    let result = if offset > 0 {
        OpenOptions::new().append(true).open(dest).await
    } else {
        File::create(dest).await
    };
    result.map_err(|e| Error::assembly(dest, e))
}
