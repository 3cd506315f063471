//! Query string signing.
//!
//! Signers take an unsigned query string and return the query to send,
//! with the signature parameter appended. Parameters are sorted by key
//! before signing.

use std::time::{SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};
use url::form_urlencoded;

/// Positions of the WBI mixin key characters in the concatenated image keys.
const MIXIN_KEY_ENC_TAB: [usize; 32] = [
    46, 47, 18, 2, 53, 8, 23, 32, 15, 50, 10, 31, 58, 3, 45, 35, 27, 43, 5, 49, 33, 9, 42, 19,
    29, 28, 14, 39, 12, 38, 41, 13,
];

/// Signs a query string.
pub trait QuerySigner: Send + Sync {
    fn sign(&self, query: &str) -> String;
}

/// App key signer: `sign = md5(sorted_query + secret)`.
#[derive(Debug, Clone)]
pub struct AppKeySigner {
    app_key: String,
    app_secret: String,
}

impl AppKeySigner {
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
        }
    }
}

impl QuerySigner for AppKeySigner {
    fn sign(&self, query: &str) -> String {
        let mut params = parse_query(query);
        params.retain(|(k, _)| k != "appkey" && k != "sign");
        params.push(("appkey".to_string(), self.app_key.clone()));
        if !params.iter().any(|(k, _)| k == "ts") {
            params.push(("ts".to_string(), unix_timestamp().to_string()));
        }

        let sorted = encode_sorted(params);
        let sign = md5_hex(&format!("{}{}", sorted, self.app_secret));
        format!("{}&sign={}", sorted, sign)
    }
}

/// WBI signer: `w_rid = md5(sorted_query + mixin_key)`.
#[derive(Debug, Clone)]
pub struct WbiSigner {
    mixin_key: String,
}

impl WbiSigner {
    /// Build from the image and sub image URLs (or bare keys) of the nav endpoint.
    pub fn from_image_urls(img_url: &str, sub_url: &str) -> Self {
        let raw = format!("{}{}", file_stem(img_url), file_stem(sub_url));
        Self {
            mixin_key: mixin_key(&raw),
        }
    }

    pub fn mixin_key(&self) -> &str {
        &self.mixin_key
    }
}

impl QuerySigner for WbiSigner {
    fn sign(&self, query: &str) -> String {
        let mut params = parse_query(query);
        params.retain(|(k, _)| k != "w_rid");
        if !params.iter().any(|(k, _)| k == "wts") {
            params.push(("wts".to_string(), unix_timestamp().to_string()));
        }
        for (_, value) in params.iter_mut() {
            value.retain(|c| !"!'()*".contains(c));
        }

        let sorted = encode_sorted_component(params);
        let w_rid = md5_hex(&format!("{}{}", sorted, self.mixin_key));
        format!("{}&w_rid={}", sorted, w_rid)
    }
}

/// Signer that leaves the query untouched, apart from sorting.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSigner;

impl QuerySigner for NoSigner {
    fn sign(&self, query: &str) -> String {
        encode_sorted(parse_query(query))
    }
}

/// Derive the 32-character mixin key from the concatenated image keys.
pub fn mixin_key(raw: &str) -> String {
    let bytes = raw.as_bytes();
    MIXIN_KEY_ENC_TAB
        .iter()
        .filter_map(|&i| bytes.get(i).map(|b| *b as char))
        .collect()
}

/// Last path segment without its extension.
fn file_stem(url: &str) -> &str {
    let name = url.rsplit('/').next().unwrap_or(url);
    match name.rfind('.') {
        Some(dot) => &name[..dot],
        None => name,
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .into_owned()
        .collect()
}

fn encode_sorted(mut params: Vec<(String, String)>) -> String {
    params.sort_by(|a, b| a.0.cmp(&b.0));
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish()
}

/// Sorted query with values percent-encoded as URI components (`%20` for space).
fn encode_sorted_component(mut params: Vec<(String, String)>) -> String {
    params.sort_by(|a, b| a.0.cmp(&b.0));
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Lowercase hex MD5 digest.
pub fn md5_hex(input: &str) -> String {
    let digest = Md5::digest(input.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
