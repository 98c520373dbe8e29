use serde_json::Value;

use super::PlatformClient;
use crate::cookies::SessionCookies;
use crate::http::FetchError;

/// The single-item detail endpoint.
#[derive(Clone)]
pub struct ItemDetailApi {
    client: PlatformClient,
}

impl ItemDetailApi {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }

    /// Fetch `itemInfo.itemStruct` for a video id. `Ok(None)` when the payload lacks it.
    pub async fn fetch_item(&self, id: &str, referer: &str, cookies: &SessionCookies) -> Result<Option<Value>, FetchError> {
        let url = self
            .client
            .api_url(
                "/api/item/detail/",
                &[
                    ("itemId", id),
                    ("app_name", "tiktok_web"),
                    ("device_platform", "webapp"),
                    ("os", "web"),
                ],
                cookies,
            )
            .map_err(|e| FetchError::Status {
                status: 0,
                preview: format!("bad item/detail URL: {}", e),
            })?;

        let mut data = self.client.get_json(self.client.api_request(url, referer, cookies)).await?;
        let item = data
            .get_mut("itemInfo")
            .and_then(|info| info.get_mut("itemStruct"))
            .map(Value::take)
            .filter(|item| item.is_object());

        Ok(item)
    }
}
