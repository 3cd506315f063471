//! Muxing video and audio tracks with external tools.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{Error, Result};

/// Locations of the external muxers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxTools {
    pub ffmpeg: PathBuf,
    pub mp4box: PathBuf,
}

impl Default for MuxTools {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            mp4box: PathBuf::from("MP4Box"),
        }
    }
}

/// Arguments for a stream-copy ffmpeg mux.
pub fn ffmpeg_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-i".into(),
        video.into(),
        "-i".into(),
        audio.into(),
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        "copy".into(),
        output.into(),
        "-y".into(),
    ]
}

/// Arguments for an MP4Box mux.
pub fn mp4box_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-add".into(),
        video.into(),
        "-add".into(),
        audio.into(),
        "-new".into(),
        output.into(),
    ]
}

/// Mux `video` and `audio` into `output`, trying ffmpeg first and MP4Box second.
pub async fn mux_tracks(tools: &MuxTools, video: &Path, audio: &Path, output: &Path) -> Result<()> {
    tracing::info!("Muxing into {}", output.display());

    let ffmpeg_err = match run_tool(&tools.ffmpeg, ffmpeg_args(video, audio, output)).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    tracing::warn!("ffmpeg mux failed ({}), trying MP4Box", ffmpeg_err);

    run_tool(&tools.mp4box, mp4box_args(video, audio, output))
        .await
        .map_err(|mp4box_err| match (&ffmpeg_err, &mp4box_err) {
            (Error::ToolNotFound(_), Error::ToolNotFound(_)) => {
                Error::ToolNotFound("ffmpeg or MP4Box".to_string())
            }
            _ => Error::Mux(format!("ffmpeg: {}; MP4Box: {}", ffmpeg_err, mp4box_err)),
        })
}

async fn run_tool(program: &Path, args: Vec<OsString>) -> Result<()> {
    let name = program.display().to_string();
    tracing::debug!("Running {} {:?}", name, args);

    let output = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ToolNotFound(name.clone())
            } else {
                Error::Mux(format!("Failed to run {}: {}", name, e))
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail = stderr.lines().last().unwrap_or("").trim().to_string();
        return Err(Error::Mux(format!(
            "{} exited with status: {} {}",
            name, output.status, tail
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_args() {
        let args = ffmpeg_args(Path::new("v.m4s"), Path::new("a.m4s"), Path::new("out.mp4"));
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec!["-i", "v.m4s", "-i", "a.m4s", "-c:v", "copy", "-c:a", "copy", "out.mp4", "-y"]
        );
    }

    #[test]
    fn test_mp4box_args() {
        let args = mp4box_args(Path::new("v"), Path::new("a"), Path::new("o.mp4"));
        assert_eq!(args.len(), 6);
        assert_eq!(args[4], "-new");
        assert_eq!(args[5], "o.mp4");
    }

    #[tokio::test]
    async fn test_missing_tools() {
        let tools = MuxTools {
            ffmpeg: PathBuf::from("/nonexistent/ffmpeg-for-tests"),
            mp4box: PathBuf::from("/nonexistent/mp4box-for-tests"),
        };
        let err = mux_tracks(&tools, Path::new("v"), Path::new("a"), Path::new("o"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(_)));
    }
}
