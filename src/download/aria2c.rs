//! Delegated transfers through an external aria2c process.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::download::source::{needs_referer, HttpConfig, DEFAULT_REFERER};
use crate::error::{Error, Result};

const BASE_ARGS: [&str; 6] = [
    "--summary-interval=1",
    "--show-console-readout=true",
    "--file-allocation=none",
    "--max-connection-per-server=16",
    "--split=16",
    "--min-split-size=1M",
];

/// aria2c invocation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aria2cOptions {
    pub program: PathBuf,
    /// Extra whitespace-separated arguments.
    pub extra_args: String,
}

impl Default for Aria2cOptions {
    fn default() -> Self {
        Self {
            program: PathBuf::from("aria2c"),
            extra_args: String::new(),
        }
    }
}

/// Build the aria2c argument list for one download.
pub fn build_args(options: &Aria2cOptions, http: &HttpConfig, url: &str, dest: &Path) -> Vec<String> {
    let mut args: Vec<String> = BASE_ARGS.iter().map(|a| a.to_string()).collect();

    args.push(format!("--user-agent={}", http.user_agent));
    if needs_referer(url) {
        args.push(format!("--referer={}", DEFAULT_REFERER));
    }
    if let Some(cookie) = &http.cookie {
        args.push(format!("--header=Cookie: {}", cookie));
    }

    args.extend(options.extra_args.split_whitespace().map(str::to_string));

    if let Some(dir) = dest.parent().filter(|d| !d.as_os_str().is_empty()) {
        args.push(format!("--dir={}", dir.display()));
    }
    if let Some(name) = dest.file_name() {
        args.push(format!("--out={}", name.to_string_lossy()));
    }

    args.push(url.to_string());
    args
}

/// Download `url` to `dest` with aria2c, inheriting the terminal for its readout.
pub async fn download_with_aria2c(
    options: &Aria2cOptions,
    http: &HttpConfig,
    url: &str,
    dest: &Path,
) -> Result<()> {
    let args = build_args(options, http, url, dest);
    let program = options.program.display().to_string();
    tracing::debug!("Running {} {:?}", program, args);

    let status = Command::new(&options.program)
        .args(&args)
        .stdin(Stdio::null())
        .status()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ToolNotFound(program.clone())
            } else {
                Error::Aria2c(format!("Failed to run {}: {}", program, e))
            }
        })?;

    if !status.success() {
        return Err(Error::Aria2c(format!("{} exited with status: {}", program, status)));
    }

    Ok(())
}
