//! Output filename generation.

use crate::error::{Error, Result};

/// Replace characters that are invalid in filenames.
///
/// Path separators are replaced rather than rejected, since titles routinely
/// contain them. Names that sanitize to nothing, or to a bare `.`/`..`, are an
/// error.
pub fn sanitize_filename(name: &str) -> Result<String> {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let sanitized = sanitized.trim();

    if sanitized.is_empty() {
        return Err(Error::InvalidFilename(
            "Filename cannot be empty or whitespace-only".to_string(),
        ));
    }

    if sanitized == "." || sanitized == ".." {
        return Err(Error::InvalidFilename(format!(
            "Path traversal detected: '{}'",
            name
        )));
    }

    Ok(sanitized.to_string())
}

/// Base name (no extension) for one entry's output files.
///
/// Uses the part title, falling back to the video title, and appends `_P<n>`
/// when the video has several parts.
pub fn output_stem(title: &str, part: &str, index: u32, multi_part: bool) -> Result<String> {
    let base = if part.trim().is_empty() { title } else { part };
    let name = if multi_part {
        format!("{}_P{}", base, index)
    } else {
        base.to_string()
    };

    sanitize_filename(&name)
}

/// File extension for a standalone audio file with the given codec.
pub fn audio_extension(codec: &str) -> &'static str {
    let codec = codec.to_lowercase();

    if codec.contains("mp3") {
        "mp3"
    } else if codec.contains("aac") {
        "aac"
    } else if codec.contains("opus") {
        "opus"
    } else if codec.contains("flac") {
        "flac"
    } else if codec.contains("ac-3") || codec.contains("eac3") || codec.contains("ec-3") {
        "eac3"
    } else {
        "m4a"
    }
}

/// Container extension guessed from a stream URL path, `mp4` when unknown.
pub fn extension_from_url(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();

    if path.ends_with(".flv") {
        "flv"
    } else {
        "mp4"
    }
}
