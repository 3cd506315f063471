//! API mode and download strategy definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which play-URL endpoint family to resolve streams from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    /// Web player endpoints (default).
    #[default]
    Web,
    /// TV client endpoints, signed with an app key.
    Tv,
    /// International gateway.
    Intl,
}

impl fmt::Display for ApiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiMode::Web => write!(f, "web"),
            ApiMode::Tv => write!(f, "tv"),
            ApiMode::Intl => write!(f, "intl"),
        }
    }
}

impl FromStr for ApiMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "web" => Ok(ApiMode::Web),
            "tv" => Ok(ApiMode::Tv),
            "intl" | "international" => Ok(ApiMode::Intl),
            _ => Err(format!("Unknown API mode: {}", s)),
        }
    }
}

/// How a track's bytes are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStrategy {
    /// Concurrent range requests into clip temp files (default).
    #[default]
    Segmented,
    /// One request with byte-offset resume.
    Single,
    /// Delegate to an external aria2c process.
    Aria2c,
}

impl fmt::Display for DownloadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadStrategy::Segmented => write!(f, "segmented"),
            DownloadStrategy::Single => write!(f, "single"),
            DownloadStrategy::Aria2c => write!(f, "aria2c"),
        }
    }
}

impl FromStr for DownloadStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "segmented" | "multi" => Ok(DownloadStrategy::Segmented),
            "single" => Ok(DownloadStrategy::Single),
            "aria2c" | "aria2" => Ok(DownloadStrategy::Aria2c),
            _ => Err(format!("Unknown download strategy: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!("TV".parse::<ApiMode>().unwrap(), ApiMode::Tv);
        assert_eq!("international".parse::<ApiMode>().unwrap(), ApiMode::Intl);
        assert!("app".parse::<ApiMode>().is_err());

        assert_eq!(
            "aria2".parse::<DownloadStrategy>().unwrap(),
            DownloadStrategy::Aria2c
        );
        assert_eq!(DownloadStrategy::default().to_string(), "segmented");
    }
}
