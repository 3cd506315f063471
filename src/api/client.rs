//! Bilibili API HTTP client.

use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use url::form_urlencoded;

use crate::api::sign::{AppKeySigner, NoSigner, QuerySigner, WbiSigner};
use crate::api::types::*;
use crate::config::{ApiConfig, ApiMode, MediaId};
use crate::download::source::HttpConfig;
use crate::error::{Error, Result};

/// Page size for media list resource requests.
const MEDIALIST_PAGE_SIZE: u32 = 20;

/// Upper bound on media list pages fetched for one list.
const MEDIALIST_MAX_PAGES: usize = 500;

/// Identifies one playable item for a play-URL request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayTarget {
    pub aid: u64,
    pub cid: u64,
    /// Set for bangumi episodes.
    pub ep_id: Option<u64>,
}

/// API client for metadata and play-URL endpoints.
pub struct BiliApi {
    client: Client,
    http: HttpConfig,
    config: ApiConfig,
    access_token: Option<String>,
    wbi: OnceCell<WbiSigner>,
}

impl BiliApi {
    /// Create a new API client.
    pub fn new(http: HttpConfig, config: ApiConfig, access_token: Option<String>) -> Result<Self> {
        let client = http.build_client()?;
        let access_token = access_token.filter(|t| !t.trim().is_empty());

        Ok(Self {
            client,
            http,
            config,
            access_token,
            wbi: OnceCell::new(),
        })
    }

    /// GET a URL and return the body text.
    async fn get_text(&self, url: &str) -> Result<String> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .headers(self.http.headers_for(url))
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Response status: {}", status);

        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }

    /// GET a URL and decode the payload of a `code == 0` envelope.
    async fn get_payload<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let text = self.get_text(url).await?;

        let response: ApiResponse<T> = serde_json::from_str(&text).map_err(|e| {
            Error::Api(format!(
                "Failed to parse {}: {} - Response: {}",
                what,
                e,
                truncate(&text)
            ))
        })?;

        if response.code != 0 {
            return Err(Error::ApiCode {
                code: response.code,
                message: response.message,
            });
        }

        response
            .into_payload()
            .ok_or_else(|| Error::Api(format!("Empty {} response", what)))
    }

    /// WBI signer, fetched from the nav endpoint once per client.
    async fn wbi_signer(&self) -> Result<&WbiSigner> {
        self.wbi
            .get_or_try_init(|| async {
                let url = endpoint(&self.config.host, "/x/web-interface/nav", "");
                let text = self.get_text(&url).await?;

                // Anonymous sessions get code -101 but still carry the keys
                let response: ApiResponse<NavData> = serde_json::from_str(&text)?;
                let nav = response
                    .into_payload()
                    .ok_or_else(|| Error::Api("Nav response carries no WBI keys".into()))?;

                tracing::debug!("Fetched WBI keys");
                Ok::<_, Error>(WbiSigner::from_image_urls(
                    &nav.wbi_img.img_url,
                    &nav.wbi_img.sub_url,
                ))
            })
            .await
    }

    /// Signer for the configured app key, if any.
    fn app_key_signer(&self) -> Option<AppKeySigner> {
        match (&self.config.app_key, &self.config.app_secret) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some(AppKeySigner::new(key.clone(), secret.clone()))
            }
            _ => None,
        }
    }

    /// Fetch video metadata and its page list.
    pub async fn video_view(&self, id: &MediaId) -> Result<VideoView> {
        let query = match id {
            MediaId::Bvid(bvid) => encode(&[("bvid", bvid.clone())]),
            MediaId::Aid(aid) => encode(&[("aid", aid.to_string())]),
            other => return Err(Error::InvalidMediaId(other.to_string())),
        };

        let signed = self.wbi_signer().await?.sign(&query);
        let url = endpoint(&self.config.host, "/x/web-interface/view", &signed);
        self.get_payload(&url, "video info").await
    }

    /// Fetch a bangumi season by episode or season id.
    pub async fn season(&self, id: &MediaId) -> Result<SeasonInfo> {
        let query = match id {
            MediaId::Episode(ep) => encode(&[("ep_id", ep.to_string())]),
            MediaId::Season(ss) => encode(&[("season_id", ss.to_string())]),
            other => return Err(Error::InvalidMediaId(other.to_string())),
        };

        let url = endpoint(&self.config.ep_host, "/pgc/view/web/season", &query);
        self.get_payload(&url, "season info").await
    }

    /// Fetch a media list header.
    pub async fn medialist_info(&self, ml_id: u64) -> Result<MediaListInfo> {
        let query = encode(&[
            ("type", "3".to_string()),
            ("biz_id", ml_id.to_string()),
            ("tid", "0".to_string()),
        ]);
        let url = endpoint(&self.config.host, "/x/v2/medialist/info", &query);
        self.get_payload(&url, "media list info").await
    }

    /// Fetch every video of a media list, following pagination.
    pub async fn medialist_items(&self, ml_id: u64) -> Result<Vec<MediaListItem>> {
        let mut items: Vec<MediaListItem> = Vec::new();
        let mut oid = String::new();

        for _ in 0..MEDIALIST_MAX_PAGES {
            let query = encode(&[
                ("type", "3".to_string()),
                ("biz_id", ml_id.to_string()),
                ("oid", oid.clone()),
                ("otype", "2".to_string()),
                ("ps", MEDIALIST_PAGE_SIZE.to_string()),
                ("direction", "false".to_string()),
                ("desc", "true".to_string()),
                ("sort_field", "1".to_string()),
                ("tid", "0".to_string()),
                ("with_current", "false".to_string()),
            ]);
            let url = endpoint(&self.config.host, "/x/v2/medialist/resource/list", &query);
            let page: MediaListPage = self.get_payload(&url, "media list page").await?;

            let batch = page.media_list.unwrap_or_default();
            let Some(last) = batch.last().map(|item| item.id.to_string()) else {
                break;
            };
            if last == oid {
                break;
            }

            items.extend(batch);
            oid = last;

            if !page.has_more {
                break;
            }
        }

        Ok(items)
    }

    /// Fetch the raw play-URL response for one item.
    pub async fn play_payload(&self, target: &PlayTarget) -> Result<String> {
        let url = match self.config.mode {
            ApiMode::Web => self.web_play_url(target).await?,
            ApiMode::Tv => self.tv_play_url(target)?,
            ApiMode::Intl => self.intl_play_url(target),
        };

        let text = self.get_text(&url).await?;

        let status: ApiStatus = serde_json::from_str(&text)?;
        if status.code != 0 {
            return Err(Error::ApiCode {
                code: status.code,
                message: status.message,
            });
        }

        Ok(text)
    }

    async fn web_play_url(&self, target: &PlayTarget) -> Result<String> {
        let mut params = vec![
            ("avid", target.aid.to_string()),
            ("cid", target.cid.to_string()),
            ("fnval", "4048".to_string()),
            ("fnver", "0".to_string()),
            ("fourk", "1".to_string()),
            ("otype", "json".to_string()),
            ("qn", "0".to_string()),
            ("support_multi_audio", "true".to_string()),
            ("from_client", "BROWSER".to_string()),
        ];
        if self.http.cookie.is_none() {
            params.push(("try_look", "1".to_string()));
        }
        if let (Some(area), Some(token)) = (&self.config.area, &self.access_token) {
            params.push(("area", area.clone()));
            params.push(("access_key", token.clone()));
        }

        match target.ep_id {
            Some(ep_id) => {
                params.push(("module", "bangumi".to_string()));
                params.push(("ep_id", ep_id.to_string()));
                let query = NoSigner.sign(&encode(&params));
                Ok(endpoint(&self.config.ep_host, "/pgc/player/web/v2/playurl", &query))
            }
            None => {
                let query = self.wbi_signer().await?.sign(&encode(&params));
                Ok(endpoint(&self.config.host, "/x/player/wbi/playurl", &query))
            }
        }
    }

    fn tv_play_url(&self, target: &PlayTarget) -> Result<String> {
        let signer = self
            .app_key_signer()
            .ok_or_else(|| Error::MissingConfig("app_key and app_secret for tv mode".into()))?;

        let mut params = vec![
            ("build", "106500".to_string()),
            ("cid", target.cid.to_string()),
            ("device", "android".to_string()),
            ("fnval", "4048".to_string()),
            ("fnver", "0".to_string()),
            ("fourk", "1".to_string()),
            ("mid", "0".to_string()),
            ("mobi_app", "android_tv_yst".to_string()),
            ("object_id", target.aid.to_string()),
            ("platform", "android".to_string()),
            ("playurl_type", "1".to_string()),
            ("qn", "0".to_string()),
        ];
        if let Some(token) = &self.access_token {
            params.push(("access_key", token.clone()));
        }

        let path = match target.ep_id {
            Some(ep_id) => {
                params.push(("ep_id", ep_id.to_string()));
                params.push(("expire", "0".to_string()));
                "/pgc/player/api/playurltv"
            }
            None => "/x/tv/playurl",
        };

        Ok(endpoint(&self.config.tv_host, path, &signer.sign(&encode(&params))))
    }

    fn intl_play_url(&self, target: &PlayTarget) -> String {
        let mut params = vec![
            ("aid", target.aid.to_string()),
            ("cid", target.cid.to_string()),
            ("platform", "android".to_string()),
            ("prefer_code_type", "0".to_string()),
            ("qn", "0".to_string()),
            ("s_locale", "zh_SG".to_string()),
        ];
        if let Some(ep_id) = target.ep_id {
            params.push(("ep_id", ep_id.to_string()));
        }
        if let Some(token) = &self.access_token {
            params.push(("access_key", token.clone()));
        }
        if let Some(area) = &self.config.area {
            params.push(("area", area.clone()));
        }

        let query = encode(&params);
        let query = match self.app_key_signer() {
            Some(signer) => signer.sign(&query),
            None => NoSigner.sign(&query),
        };

        endpoint(&self.config.intl_host, "/intl/gateway/v2/ogv/playurl", &query)
    }
}

/// Build an endpoint URL; bare hosts get an https scheme.
fn endpoint(host: &str, path: &str, query: &str) -> String {
    let base = if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", host.trim_end_matches('/'))
    };

    if query.is_empty() {
        format!("{}{}", base, path)
    } else {
        format!("{}{}?{}", base, path, query)
    }
}

fn encode<K: AsRef<str>>(params: &[(K, String)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key.as_ref(), value);
    }
    serializer.finish()
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(mode: ApiMode) -> BiliApi {
        let config = ApiConfig {
            mode,
            app_key: Some("key".into()),
            app_secret: Some("secret".into()),
            ..ApiConfig::default()
        };
        BiliApi::new(HttpConfig::default(), config, Some("token".into())).unwrap()
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            endpoint("api.bilibili.com", "/x/a", "b=1"),
            "https://api.bilibili.com/x/a?b=1"
        );
        assert_eq!(
            endpoint("http://localhost:8080/", "/x/a", ""),
            "http://localhost:8080/x/a"
        );
    }

    #[test]
    fn test_tv_play_url() {
        let url = api(ApiMode::Tv)
            .tv_play_url(&PlayTarget {
                aid: 1,
                cid: 2,
                ep_id: Some(3),
            })
            .unwrap();

        assert!(url.starts_with("https://api.snm0516.aisee.tv/pgc/player/api/playurltv?"));
        assert!(url.contains("access_key=token"));
        assert!(url.contains("appkey=key"));
        assert!(url.contains("ep_id=3"));
        assert!(url.contains("&sign="));
    }

    #[test]
    fn test_tv_requires_app_key() {
        let api = BiliApi::new(
            HttpConfig::default(),
            ApiConfig {
                mode: ApiMode::Tv,
                ..ApiConfig::default()
            },
            None,
        )
        .unwrap();
        let target = PlayTarget {
            aid: 1,
            cid: 2,
            ep_id: None,
        };
        assert!(matches!(
            api.tv_play_url(&target),
            Err(Error::MissingConfig(_))
        ));
    }

    #[test]
    fn test_intl_play_url() {
        let url = api(ApiMode::Intl).intl_play_url(&PlayTarget {
            aid: 5,
            cid: 6,
            ep_id: Some(7),
        });
        assert!(url.starts_with("https://api.biliintl.com/intl/gateway/v2/ogv/playurl?"));
        assert!(url.contains("s_locale=zh_SG"));
        assert!(url.contains("ep_id=7"));
    }

    #[test]
    fn test_truncate() {
        let long = "x".repeat(500);
        assert_eq!(truncate(&long).len(), 200);
        assert_eq!(truncate("short"), "short");
    }
}
