use regex::Regex;
use std::sync::LazyLock;

use super::PlatformClient;
use crate::cookies::SessionCookies;
use crate::reference::STABLE_ID_PREFIX;

static SEC_UID_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""secUid":"([^"]+)""#).unwrap());

/// Maps a handle to the platform's stable user id (`secUid`).
pub struct IdentityResolver {
    client: PlatformClient,
}

impl IdentityResolver {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }

    /// Resolve `handle`, trying the user-detail API and then the profile page.
    ///
    /// Every kind of failure collapses into `None`.
    pub async fn resolve(&self, handle: &str, cookies: &SessionCookies) -> Option<String> {
        if let Some(stable_id) = handle.strip_prefix(STABLE_ID_PREFIX) {
            return Some(stable_id.to_string());
        }

        if let Some(sec_uid) = self.from_user_api(handle, cookies).await {
            return Some(sec_uid);
        }

        self.from_profile_page(handle, cookies).await
    }

    async fn from_user_api(&self, handle: &str, cookies: &SessionCookies) -> Option<String> {
        let url = self
            .client
            .api_url("/api/user/detail/", &[("uniqueId", handle), ("language", "en")], cookies)
            .ok()?;
        let request = self.client.api_request(url, &self.client.profile_url(handle), cookies);

        match self.client.get_json(request).await {
            Ok(data) => {
                let sec_uid = data["userInfo"]["user"]["secUid"]
                    .as_str()
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                if sec_uid.is_none() {
                    tracing::debug!("user/detail for {} had no secUid", handle);
                }
                sec_uid
            }
            Err(e) => {
                tracing::warn!("Failed to fetch secUid via API for {}: {}", handle, e);
                None
            }
        }
    }

    async fn from_profile_page(&self, handle: &str, cookies: &SessionCookies) -> Option<String> {
        let request = self
            .client
            .html_request(self.client.profile_url(handle), &self.client.site_referer(), cookies);

        let html = match self.client.fetcher().fetch(request).await.and_then(|r| r.error_for_status()) {
            Ok(response) => response.body,
            Err(e) => {
                tracing::warn!("Failed to fetch profile HTML for {}: {}", handle, e);
                return None;
            }
        };

        SEC_UID_REGEX
            .captures(&html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}
