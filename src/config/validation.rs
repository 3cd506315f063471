//! Configuration validation and input parsing.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use crate::config::loader::Config;
use crate::config::modes::ApiMode;
use crate::error::{Error, Result};
use regex::Regex;

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_selection(config)?;
    validate_transfer(config)?;
    validate_api(config)?;
    validate_account(config)?;

    if let Some(pages) = &config.download.select_page {
        validate_page_selection(pages)?;
    }

    Ok(())
}

fn validate_selection(config: &Config) -> Result<()> {
    if config.selection.video_only && config.selection.audio_only {
        return Err(Error::ConfigValidation {
            field: "selection".to_string(),
            message: "video_only and audio_only cannot both be set".to_string(),
        });
    }
    Ok(())
}

fn validate_transfer(config: &Config) -> Result<()> {
    if config.download.segment_size_mib == 0 {
        return Err(Error::ConfigValidation {
            field: "segment_size_mib".to_string(),
            message: "Segment size must be at least 1 MiB".to_string(),
        });
    }

    if config.download.timeout_secs == 0 {
        return Err(Error::ConfigValidation {
            field: "timeout_secs".to_string(),
            message: "Timeout must be a positive number of seconds".to_string(),
        });
    }

    Ok(())
}

fn validate_api(config: &Config) -> Result<()> {
    if config.api.mode == ApiMode::Tv {
        let missing = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or("").is_empty();
        if missing(&config.api.app_key) {
            return Err(Error::MissingConfig("app_key (required for tv mode)".to_string()));
        }
        if missing(&config.api.app_secret) {
            return Err(Error::MissingConfig(
                "app_secret (required for tv mode)".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_account(config: &Config) -> Result<()> {
    let fields = [
        ("cookie", &config.account.cookie),
        ("access_token", &config.account.access_token),
        ("user_agent", &config.account.user_agent),
    ];

    for (field, value) in fields {
        let Some(value) = value else { continue };
        if is_placeholder(value) {
            return Err(Error::ConfigValidation {
                field: field.to_string(),
                message: format!(
                    "Value appears to be a placeholder. Please provide your actual {}.",
                    field
                ),
            });
        }
    }

    Ok(())
}

fn is_placeholder(value: &str) -> bool {
    let lower = value.to_lowercase();
    lower.contains("replaceme") || lower.contains("your_") || lower.contains("<your")
}

/// Check the syntax of a page selection such as `1,3-5`.
pub fn validate_page_selection(selection: &str) -> Result<()> {
    if is_all_pages(selection) {
        return Ok(());
    }

    if !page_pattern().is_match(selection) {
        return Err(Error::ConfigValidation {
            field: "select_page".to_string(),
            message: format!(
                "Invalid page selection '{}'. Use numbers and ranges like 1,3-5.",
                selection
            ),
        });
    }

    Ok(())
}

fn page_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*\d+(\s*-\s*\d+)?(\s*,\s*\d+(\s*-\s*\d+)?)*\s*$").unwrap()
    })
}

fn is_all_pages(selection: &str) -> bool {
    let trimmed = selection.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all")
}

/// Expand a page selection into sorted 1-based page numbers.
///
/// Pages beyond `page_count` are ignored. An empty selection or `all`
/// selects every page.
pub fn parse_page_selection(selection: &str, page_count: usize) -> Result<Vec<usize>> {
    validate_page_selection(selection)?;

    if is_all_pages(selection) {
        return Ok((1..=page_count).collect());
    }

    let mut pages = BTreeSet::new();
    for part in selection.split(',') {
        let part = part.trim();
        let (start, end) = match part.split_once('-') {
            Some((a, b)) => (parse_page(a)?, parse_page(b)?),
            None => {
                let page = parse_page(part)?;
                (page, page)
            }
        };

        if start > end {
            return Err(Error::ConfigValidation {
                field: "select_page".to_string(),
                message: format!("Descending page range '{}'", part),
            });
        }

        pages.extend((start.max(1)..=end.min(page_count)).filter(|p| *p >= 1));
    }

    Ok(pages.into_iter().collect())
}

fn parse_page(raw: &str) -> Result<usize> {
    raw.trim().parse().map_err(|_| Error::ConfigValidation {
        field: "select_page".to_string(),
        message: format!("Invalid page number '{}'", raw.trim()),
    })
}

/// A recognized media identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaId {
    /// `BV…` video id.
    Bvid(String),
    /// Numeric `av` video id.
    Aid(u64),
    /// Bangumi episode.
    Episode(u64),
    /// Bangumi season.
    Season(u64),
    /// Favourites or media list.
    MediaList(u64),
}

impl MediaId {
    /// Whether this identifier resolves through the bangumi endpoints.
    pub fn is_bangumi(&self) -> bool {
        matches!(self, MediaId::Episode(_) | MediaId::Season(_))
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaId::Bvid(id) => write!(f, "{}", id),
            MediaId::Aid(id) => write!(f, "av{}", id),
            MediaId::Episode(id) => write!(f, "ep{}", id),
            MediaId::Season(id) => write!(f, "ss{}", id),
            MediaId::MediaList(id) => write!(f, "medialist:{}", id),
        }
    }
}

/// Extract a media identifier from a bare id or a URL.
pub fn parse_media_id(input: &str) -> Result<MediaId> {
    let input = input.trim();

    if input.starts_with("http://") || input.starts_with("https://") {
        return parse_media_url(input);
    }

    if let Some(id) = input.strip_prefix("medialist:") {
        return parse_number(input, id).map(MediaId::MediaList);
    }

    if let Some(caps) = bvid_pattern().captures(input) {
        return Ok(MediaId::Bvid(format!("BV{}", &caps[1])));
    }

    let lower = input.to_lowercase();
    for (prefix, build) in [
        ("av", MediaId::Aid as fn(u64) -> MediaId),
        ("ep", MediaId::Episode),
        ("ss", MediaId::Season),
    ] {
        if let Some(num) = lower.strip_prefix(prefix) {
            return parse_number(input, num).map(build);
        }
    }

    // A bare number is an av id
    if let Ok(aid) = input.parse::<u64>() {
        return Ok(MediaId::Aid(aid));
    }

    Err(Error::InvalidMediaId(input.to_string()))
}

type IdBuilder = fn(&str) -> Option<MediaId>;

fn bvid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(?i:bv)([0-9A-Za-z]{10})$").unwrap())
}

/// URL path patterns, most specific first.
fn url_patterns() -> &'static [(Regex, IdBuilder)] {
    static PATTERNS: OnceLock<Vec<(Regex, IdBuilder)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let table: [(&str, IdBuilder); 6] = [
            (r"/video/(BV[0-9A-Za-z]{10})", |c| Some(MediaId::Bvid(c.to_string()))),
            (r"/video/av(\d+)", |c| c.parse().ok().map(MediaId::Aid)),
            (r"/bangumi/play/ep(\d+)", |c| c.parse().ok().map(MediaId::Episode)),
            (r"/bangumi/play/ss(\d+)", |c| c.parse().ok().map(MediaId::Season)),
            (r"medialist/detail/ml(\d+)", |c| c.parse().ok().map(MediaId::MediaList)),
            (r"[?&]bvid=(BV[0-9A-Za-z]{10})", |c| Some(MediaId::Bvid(c.to_string()))),
        ];
        table
            .into_iter()
            .map(|(pattern, build)| (Regex::new(pattern).unwrap(), build))
            .collect()
    })
}

/// Loose fallbacks for mirrors and short paths.
fn loose_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(BV[0-9A-Za-z]{10})|/ep(\d+)|/ss(\d+)|av(\d+)").unwrap()
    })
}

fn parse_media_url(url: &str) -> Result<MediaId> {
    for (re, build) in url_patterns() {
        if let Some(id) = re.captures(url).and_then(|caps| build(&caps[1])) {
            return Ok(id);
        }
    }

    if let Some(caps) = loose_url_pattern().captures(url) {
        if let Some(bv) = caps.get(1) {
            return Ok(MediaId::Bvid(bv.as_str().to_string()));
        }
        if let Some(ep) = caps.get(2) {
            return parse_number(url, ep.as_str()).map(MediaId::Episode);
        }
        if let Some(ss) = caps.get(3) {
            return parse_number(url, ss.as_str()).map(MediaId::Season);
        }
        if let Some(av) = caps.get(4) {
            return parse_number(url, av.as_str()).map(MediaId::Aid);
        }
    }

    Err(Error::InvalidMediaId(url.to_string()))
}

fn parse_number(input: &str, digits: &str) -> Result<u64> {
    digits
        .parse()
        .map_err(|_| Error::InvalidMediaId(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_patterns_are_compiled_once() {
        assert!(std::ptr::eq(bvid_pattern(), bvid_pattern()));
        assert!(std::ptr::eq(loose_url_pattern(), loose_url_pattern()));
        assert_eq!(url_patterns().len(), 6);
        assert!(std::ptr::eq(url_patterns().as_ptr(), url_patterns().as_ptr()));
    }

    #[test]
    fn test_parse_bare_ids() {
        assert_eq!(
            parse_media_id("BV1xx411c7mD").unwrap(),
            MediaId::Bvid("BV1xx411c7mD".into())
        );
        assert_eq!(
            parse_media_id("bv1xx411c7mD").unwrap(),
            MediaId::Bvid("BV1xx411c7mD".into())
        );
        assert_eq!(parse_media_id("av170001").unwrap(), MediaId::Aid(170001));
        assert_eq!(parse_media_id("170001").unwrap(), MediaId::Aid(170001));
        assert_eq!(parse_media_id("ep12345").unwrap(), MediaId::Episode(12345));
        assert_eq!(parse_media_id("SS678").unwrap(), MediaId::Season(678));
        assert_eq!(
            parse_media_id("medialist:99").unwrap(),
            MediaId::MediaList(99)
        );
    }

    #[test]
    fn test_parse_urls() {
        assert_eq!(
            parse_media_id("https://www.bilibili.com/video/BV1xx411c7mD/?p=2").unwrap(),
            MediaId::Bvid("BV1xx411c7mD".into())
        );
        assert_eq!(
            parse_media_id("https://www.bilibili.com/video/av170001").unwrap(),
            MediaId::Aid(170001)
        );
        assert_eq!(
            parse_media_id("https://www.bilibili.com/bangumi/play/ep374717").unwrap(),
            MediaId::Episode(374717)
        );
        assert_eq!(
            parse_media_id("https://www.bilibili.com/bangumi/play/ss33802").unwrap(),
            MediaId::Season(33802)
        );
        assert_eq!(
            parse_media_id("https://www.bilibili.com/medialist/detail/ml1234").unwrap(),
            MediaId::MediaList(1234)
        );
        assert_eq!(
            parse_media_id("https://m.bilibili.com/play?bvid=BV1xx411c7mD").unwrap(),
            MediaId::Bvid("BV1xx411c7mD".into())
        );
    }

    #[test]
    fn test_parse_invalid_ids() {
        assert!(matches!(
            parse_media_id("hello"),
            Err(Error::InvalidMediaId(_))
        ));
        assert!(parse_media_id("avxyz").is_err());
        assert!(parse_media_id("https://example.com/nothing").is_err());
    }

    #[test]
    fn test_media_id_display() {
        assert_eq!(MediaId::Aid(5).to_string(), "av5");
        assert_eq!(MediaId::MediaList(7).to_string(), "medialist:7");
        assert!(MediaId::Episode(1).is_bangumi());
        assert!(!MediaId::Bvid("BV1".into()).is_bangumi());
    }

    #[test]
    fn test_page_selection() {
        assert_eq!(parse_page_selection("1,2-5,7", 10).unwrap(), vec![1, 2, 3, 4, 5, 7]);
        assert_eq!(parse_page_selection(" 3 , 1 ", 10).unwrap(), vec![1, 3]);
        assert_eq!(parse_page_selection("4-9", 6).unwrap(), vec![4, 5, 6]);
        assert_eq!(parse_page_selection("0,8", 6).unwrap(), Vec::<usize>::new());
        assert_eq!(parse_page_selection("ALL", 3).unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_page_selection("", 2).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_page_selection_invalid() {
        assert!(parse_page_selection("1,,2", 5).is_err());
        assert!(parse_page_selection("a-b", 5).is_err());
        assert!(parse_page_selection("5-2", 5).is_err());
    }

    #[test]
    fn test_validate_config() {
        assert!(validate_config(&Config::default()).is_ok());

        let mut config = Config::default();
        config.selection.video_only = true;
        config.selection.audio_only = true;
        assert!(matches!(
            validate_config(&config),
            Err(Error::ConfigValidation { .. })
        ));

        let mut config = Config::default();
        config.download.segment_size_mib = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.api.mode = ApiMode::Tv;
        assert!(matches!(validate_config(&config), Err(Error::MissingConfig(_))));
        config.api.app_key = Some("key".into());
        config.api.app_secret = Some("secret".into());
        assert!(validate_config(&config).is_ok());

        let mut config = Config::default();
        config.account.cookie = Some("SESSDATA=REPLACEME".into());
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.download.select_page = Some("1;2".into());
        assert!(validate_config(&config).is_err());
    }
}
