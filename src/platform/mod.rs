//! Calls against the platform's web API and profile pages.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

use crate::config::Config;
use crate::cookies::SessionCookies;
use crate::http::{FetchError, FetchRequest, PageFetcher};

pub mod detail;
pub mod identity;
pub mod listing;

pub use detail::ItemDetailApi;
pub use identity::IdentityResolver;
pub use listing::{ItemListPager, ItemPage, ListingCrawler};

/// Web-app id sent with every API call
const APP_ID: &str = "1988";

const ACCEPT_JSON: &str = "application/json, text/plain, */*";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Review state of a listed video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Pending,
}

/// One video of a user listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListingEntry {
    pub id: String,
    pub url: Option<String>,
    pub direct_url: Option<String>,
    pub title: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Seconds
    pub duration: Option<f64>,
    pub status: VideoStatus,
}

/// Shared HTTP plumbing for platform calls: endpoint URLs and header sets.
#[derive(Clone)]
pub struct PlatformClient {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
    user_agent: String,
    cookie_file: Option<PathBuf>,
}

impl PlatformClient {
    pub fn new(config: &Config, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            base_url: config.platform.base_url.trim_end_matches('/').to_string(),
            user_agent: config.platform.user_agent.clone(),
            cookie_file: config.cookie_file(),
        }
    }

    pub fn fetcher(&self) -> &Arc<dyn PageFetcher> {
        &self.fetcher
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn cookie_file(&self) -> Option<&PathBuf> {
        self.cookie_file.as_ref()
    }

    /// Read the cookie jar afresh.
    pub fn load_cookies(&self) -> SessionCookies {
        SessionCookies::load(self.cookie_file.as_deref())
    }

    /// API endpoint URL with the web-app id, the given params and `msToken` when present.
    pub fn api_url(&self, path: &str, params: &[(&str, &str)], cookies: &SessionCookies) -> Result<String, url::ParseError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("aid", APP_ID);
            for (key, value) in params {
                query.append_pair(key, value);
            }
            if let Some(token) = cookies.ms_token() {
                query.append_pair(crate::cookies::MS_TOKEN, token);
            }
        }
        Ok(url.into())
    }

    pub fn api_request(&self, url: String, referer: &str, cookies: &SessionCookies) -> FetchRequest {
        FetchRequest::new(url)
            .header("User-Agent", self.user_agent.clone())
            .header("Accept", ACCEPT_JSON)
            .header("Accept-Language", ACCEPT_LANGUAGE)
            .header("Referer", referer)
            .cookie_header(&cookies.to_header())
    }

    pub fn html_request(&self, url: String, referer: &str, cookies: &SessionCookies) -> FetchRequest {
        FetchRequest::new(url)
            .header("User-Agent", self.user_agent.clone())
            .header("Accept", ACCEPT_HTML)
            .header("Accept-Language", ACCEPT_LANGUAGE)
            .header("Referer", referer)
            .header("Upgrade-Insecure-Requests", "1")
            .cookie_header(&cookies.to_header())
    }

    /// Headers for pulling media bytes; the CDN checks Referer against the video page.
    pub fn media_headers(&self, referer: &str, cookies: &SessionCookies) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Referer".to_string(), referer.to_string()),
            ("User-Agent".to_string(), self.user_agent.clone()),
        ];
        let cookie_header = cookies.to_header();
        if !cookie_header.is_empty() {
            headers.push(("Cookie".to_string(), cookie_header));
        }
        headers
    }

    /// GET a JSON API endpoint, failing on non-2xx statuses or undecodable bodies.
    pub async fn get_json(&self, request: FetchRequest) -> Result<serde_json::Value, FetchError> {
        self.fetcher.fetch(request).await?.error_for_status()?.json()
    }

    pub fn profile_url(&self, handle: &str) -> String {
        format!("{}/@{}", self.base_url, handle)
    }

    pub fn site_referer(&self) -> String {
        format!("{}/", self.base_url)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockPageFetcher;

    #[test]
    fn test_api_url_appends_ms_token() {
        let client = test_support::client(MockPageFetcher::new());
        let cookies = SessionCookies::parse("d\tTRUE\t/\tTRUE\t0\tmsToken\ttok en");

        let url = client
            .api_url("/api/item/detail/", &[("itemId", "42")], &cookies)
            .unwrap();
        assert_eq!(url, "https://www.tiktok.com/api/item/detail/?aid=1988&itemId=42&msToken=tok+en");
    }

    #[test]
    fn test_media_headers_include_cookie_only_when_present() {
        let client = test_support::client(MockPageFetcher::new());
        let headers = client.media_headers("https://www.tiktok.com/@u/video/1", &SessionCookies::default());
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].1, "https://www.tiktok.com/@u/video/1");
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = VideoListingEntry {
            id: "1".to_string(),
            url: None,
            direct_url: Some("https://cdn.example/v.mp4".to_string()),
            title: "t".to_string(),
            created_at: None,
            duration: Some(12.0),
            status: VideoStatus::Pending,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["directUrl"], "https://cdn.example/v.mp4");
        assert_eq!(json["status"], "pending");
    }
}
