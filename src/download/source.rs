//! Byte sources for the download engine.
//!
//! The engine only sees [`ByteSource`]; [`HttpSource`] is the production
//! implementation on top of `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use rand::Rng;
use reqwest::{header, Client, StatusCode};

use crate::download::clip::ByteRange;
use crate::error::{Error, Result};

/// Referer sent with media and API requests.
pub const DEFAULT_REFERER: &str = "https://www.bilibili.com/";

/// Default overall per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Streamed response body.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// An opened body stream.
pub struct SourceResponse {
    /// The server honored the requested range (206).
    pub partial: bool,
    pub stream: ByteStream,
}

/// Something that can report a resource size and stream byte ranges of it.
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Resource size in bytes, `None` when the server does not report one.
    async fn probe(&self, url: &str) -> Result<Option<u64>>;

    /// Open the resource, optionally restricted to a byte range.
    async fn open(&self, url: &str, range: Option<ByteRange>) -> Result<SourceResponse>;
}

/// HTTP settings shared by the API client and the download engine.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub user_agent: String,
    pub cookie: Option<String>,
    pub timeout: Duration,
}

impl HttpConfig {
    /// Build settings, picking a random desktop user agent when none is given.
    pub fn new(user_agent: Option<&str>, cookie: Option<&str>, timeout: Duration) -> Self {
        let user_agent = match user_agent.map(str::trim) {
            Some(ua) if !ua.is_empty() => ua.to_string(),
            _ => random_user_agent(),
        };
        let cookie = cookie
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        Self {
            user_agent,
            cookie,
            timeout,
        }
    }

    /// Build a `reqwest` client with these settings.
    pub fn build_client(&self) -> Result<Client> {
        Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| Error::Api(format!("Failed to create HTTP client: {}", e)))
    }

    /// Per-request headers for `url`.
    pub fn headers_for(&self, url: &str) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();

        if needs_referer(url) {
            headers.insert(
                header::REFERER,
                header::HeaderValue::from_static(DEFAULT_REFERER),
            );
        }

        if let Some(cookie) = &self.cookie {
            match header::HeaderValue::from_str(cookie) {
                Ok(value) => {
                    headers.insert(header::COOKIE, value);
                }
                Err(_) => tracing::warn!("Cookie contains invalid header characters, ignoring"),
            }
        }

        headers
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::new(None, None, DEFAULT_TIMEOUT)
    }
}

/// Android client URLs are rejected when a web referer is present.
pub fn needs_referer(url: &str) -> bool {
    !url.contains("platform=android")
}

/// Generate a plausible desktop browser user agent.
pub fn random_user_agent() -> String {
    const PLATFORMS: [&str; 3] = [
        "Windows NT 10.0; Win64; x64",
        "Macintosh; Intel Mac OS X 10_15_7",
        "X11; Linux x86_64",
    ];

    let mut rng = rand::thread_rng();
    let platform = PLATFORMS[rng.gen_range(0..PLATFORMS.len())];
    let version: f64 = rng.gen_range(80.0..110.0);

    let browser = if rng.gen_bool(0.5) {
        format!(
            "AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{:.1} Safari/537.36",
            version
        )
    } else {
        format!("Gecko/20100101 Firefox/{:.1}", version)
    };

    format!("Mozilla/5.0 ({}) {}", platform, browser)
}

/// `reqwest`-backed byte source.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    config: HttpConfig,
}

impl HttpSource {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = config.build_client()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ByteSource for HttpSource {
    async fn probe(&self, url: &str) -> Result<Option<u64>> {
        tracing::debug!("HEAD {}", url);

        let response = self
            .client
            .head(url)
            .headers(self.config.headers_for(url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // Header lookup: a HEAD body is empty, so the body size hint is useless
        let size = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|len| *len > 0);

        Ok(size)
    }

    async fn open(&self, url: &str, range: Option<ByteRange>) -> Result<SourceResponse> {
        let mut request = self.client.get(url).headers(self.config.headers_for(url));
        if let Some(range) = range {
            tracing::debug!("GET {} ({})", url, range.header_value());
            request = request.header(header::RANGE, range.header_value());
        } else {
            tracing::debug!("GET {}", url);
        }

        let response = request.send().await?;
        let status = response.status();

        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(Error::from))
            .boxed();

        Ok(SourceResponse {
            partial: status == StatusCode::PARTIAL_CONTENT,
            stream,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referer_rule() {
        assert!(needs_referer("https://upos.example.com/v.m4s?e=1"));
        assert!(!needs_referer("https://upos.example.com/v.m4s?platform=android&e=1"));

        let config = HttpConfig::new(Some("test-agent"), Some("SESSDATA=abc"), DEFAULT_TIMEOUT);
        let headers = config.headers_for("https://upos.example.com/v.m4s");
        assert_eq!(headers.get(header::REFERER).unwrap(), DEFAULT_REFERER);
        assert_eq!(headers.get(header::COOKIE).unwrap(), "SESSDATA=abc");

        let android = config.headers_for("https://x/?platform=android");
        assert!(android.get(header::REFERER).is_none());
    }

    #[test]
    fn test_user_agent_defaults() {
        let config = HttpConfig::new(Some("  "), Some(""), DEFAULT_TIMEOUT);
        assert!(config.user_agent.starts_with("Mozilla/5.0 ("));
        assert!(config.cookie.is_none());

        let config = HttpConfig::new(Some("custom"), None, DEFAULT_TIMEOUT);
        assert_eq!(config.user_agent, "custom");
    }

    #[tokio::test]
    async fn test_memory_source_ranges() {
        let source = testing::MemorySource::new().with("m://a", b"0123456789".to_vec());

        assert_eq!(source.probe("m://a").await.unwrap(), Some(10));

        let response = source
            .open("m://a", Some(ByteRange { from: 2, to: Some(5) }))
            .await
            .unwrap();
        assert!(response.partial);
        let body: Vec<Bytes> = response
            .stream
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(body.concat(), b"2345");
    }
}
