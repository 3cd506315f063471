//! Assembly of clip temp files into the destination.

use std::path::Path;

use tokio::fs::{self, File};
use tokio::io::{self, AsyncWriteExt};

use crate::download::clip::temp_path;
use crate::error::{Error, Result};

/// Concatenate `clip_count` temp files into `dest` in index order.
///
/// Each temp file is removed once copied. A single clip is renamed instead.
pub async fn merge_clips(dest: &Path, clip_count: usize) -> Result<()> {
    if clip_count == 0 {
        return Ok(());
    }

    if clip_count == 1 {
        let temp = temp_path(dest, 0);
        return fs::rename(&temp, dest)
            .await
            .map_err(|e| Error::assembly(dest, e));
    }

    let mut output = File::create(dest)
        .await
        .map_err(|e| Error::assembly(dest, e))?;

    for index in 0..clip_count {
        let temp = temp_path(dest, index);
        let mut input = File::open(&temp)
            .await
            .map_err(|e| Error::assembly(&temp, e))?;

        io::copy(&mut input, &mut output)
            .await
            .map_err(|e| Error::assembly(dest, e))?;
        drop(input);

        fs::remove_file(&temp)
            .await
            .map_err(|e| Error::assembly(&temp, e))?;
    }

    output.flush().await.map_err(|e| Error::assembly(dest, e))?;
    tracing::debug!("Merged {} clips into {}", clip_count, dest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_merge_in_order_and_remove_temps() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("video.m4s");

        for (i, part) in [b"AAA".as_slice(), b"BB", b"C"].iter().enumerate() {
            fs::write(temp_path(&dest, i), part).await.unwrap();
        }

        merge_clips(&dest, 3).await.unwrap();

        assert_eq!(fs::read(&dest).await.unwrap(), b"AAABBC");
        for i in 0..3 {
            assert!(!temp_path(&dest, i).exists());
        }
    }

    #[tokio::test]
    async fn test_single_clip_is_renamed() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("audio.m4s");
        fs::write(temp_path(&dest, 0), b"only").await.unwrap();

        merge_clips(&dest, 1).await.unwrap();

        assert_eq!(fs::read(&dest).await.unwrap(), b"only");
        assert!(!temp_path(&dest, 0).exists());
    }

    #[tokio::test]
    async fn test_missing_temp_is_assembly_error() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("broken.m4s");
        fs::write(temp_path(&dest, 0), b"x").await.unwrap();

        let err = merge_clips(&dest, 2).await.unwrap_err();
        assert!(matches!(err, Error::Assembly { .. }));
        assert!(!err.is_transport());
    }
}
