use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use super::{IdentityResolver, PlatformClient, VideoListingEntry, VideoStatus};
use crate::cookies::SessionCookies;
use crate::embedded::{self, tree};
use crate::http::FetchError;

/// One page of the user item-list API.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemPage {
    pub items: Vec<Value>,
    pub cursor: String,
    pub has_more: bool,
}

impl ItemPage {
    fn from_payload(data: &Value) -> Self {
        let items = tree::first_field(data, &["itemList", "item_list"])
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let cursor = match data.get("cursor") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "0".to_string(),
        };

        let has_more = match data.get("hasMore") {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
            _ => false,
        };

        Self { items, cursor, has_more }
    }
}

/// Fetches pages of a user's posted items.
#[derive(Clone)]
pub struct ItemListPager {
    client: PlatformClient,
    page_size: String,
}

impl ItemListPager {
    pub fn new(client: PlatformClient, page_size: u32) -> Self {
        Self {
            client,
            page_size: page_size.to_string(),
        }
    }

    pub async fn fetch_page(
        &self,
        sec_uid: &str,
        cursor: &str,
        handle: &str,
        cookies: &SessionCookies,
    ) -> Result<ItemPage, FetchError> {
        let url = self
            .client
            .api_url(
                "/api/post/item_list/",
                &[("count", &self.page_size), ("cursor", cursor), ("secUid", sec_uid)],
                cookies,
            )
            .map_err(|e| FetchError::Status {
                status: 0,
                preview: format!("bad item_list URL: {}", e),
            })?;
        let request = self.client.api_request(url, &self.client.profile_url(handle), cookies);

        let data = self.client.get_json(request).await?;
        Ok(ItemPage::from_payload(&data))
    }
}

/// Creation time of an API item (`createTime`, seconds since epoch, number or string).
pub fn item_created_at(item: &Value) -> Option<DateTime<Utc>> {
    let seconds = match item.get("createTime")? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.parse().ok()?,
        _ => return None,
    };
    DateTime::from_timestamp(seconds, 0).filter(|_| seconds > 0)
}

/// Item id as a string, whatever JSON type the API used.
pub fn item_id(item: &Value) -> Option<String> {
    match item.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Paginates a user's listing into [`VideoListingEntry`] records.
pub struct ListingCrawler {
    client: PlatformClient,
    identity: IdentityResolver,
    pager: ItemListPager,
    page_cap: usize,
}

impl ListingCrawler {
    pub fn new(client: PlatformClient, page_size: u32, page_cap: usize) -> Self {
        Self {
            identity: IdentityResolver::new(client.clone()),
            pager: ItemListPager::new(client.clone(), page_size),
            client,
            page_cap,
        }
    }

    /// Crawl `handle`'s videos created within `[start, end]` (calendar days, UTC, inclusive).
    ///
    /// Never fails: an unknown user or API error ends the crawl with whatever was collected.
    pub async fn crawl(&self, handle: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<VideoListingEntry> {
        let cookies = self.client.load_cookies();

        let Some(sec_uid) = self.identity.resolve(handle, &cookies).await else {
            tracing::warn!("Could not resolve secUid for {}", handle);
            return Vec::new();
        };

        let mut videos = Vec::new();
        let mut cursor = "0".to_string();

        'pages: for page in 0..self.page_cap {
            let listing = match self.pager.fetch_page(&sec_uid, &cursor, handle, &cookies).await {
                Ok(listing) => listing,
                Err(e) => {
                    tracing::warn!("item_list failed for {} page={} cursor={}: {}", handle, page, cursor, e);
                    break;
                }
            };

            tracing::debug!(
                "item_list page={} cursor={} items={} has_more={}",
                page,
                cursor,
                listing.items.len(),
                listing.has_more
            );

            if listing.items.is_empty() {
                break;
            }

            for item in &listing.items {
                let Some(created_at) = item_created_at(item) else {
                    continue;
                };
                let day = created_at.date_naive();

                // Pages are assumed to be newest-first, so the first item older than
                // `start` ends the crawl. Unverified against the service; if it ever
                // reorders items, older videos are silently under-reported.
                if start.is_some_and(|start| day < start) {
                    break 'pages;
                }
                if end.is_some_and(|end| day > end) {
                    continue;
                }

                match self.entry_from_item(item, handle, created_at) {
                    Some(entry) => videos.push(entry),
                    None => tracing::debug!("Skipping item without id on page {}", page),
                }
            }

            if !listing.has_more {
                break;
            }
            cursor = listing.cursor;
        }

        tracing::info!("Listed {} videos for {}", videos.len(), handle);
        videos
    }

    fn entry_from_item(&self, item: &Value, handle: &str, created_at: DateTime<Utc>) -> Option<VideoListingEntry> {
        let id = item_id(item)?;

        let author = item
            .get("author")
            .and_then(|author| tree::first_field(author, &["uniqueId", "nickname"]))
            .and_then(Value::as_str)
            .unwrap_or(handle);

        let title = item
            .get("desc")
            .and_then(Value::as_str)
            .filter(|desc| !desc.is_empty())
            .unwrap_or("Untitled Video");

        Some(VideoListingEntry {
            url: Some(format!("{}/@{}/video/{}", self.client.base_url(), author, id)),
            id,
            direct_url: embedded::extract_direct_url(item),
            title: title.to_string(),
            created_at: Some(created_at),
            duration: item["video"]["duration"].as_f64(),
            status: VideoStatus::Pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{FetchResponse, MockPageFetcher};
    use crate::platform::test_support;
    use chrono::TimeZone;
    use serde_json::json;

    fn noon(y: i32, m: u32, d: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap().timestamp()
    }

    fn item(id: &str, created: i64) -> Value {
        json!({
            "id": id,
            "createTime": created,
            "desc": format!("video {}", id),
            "author": {"uniqueId": "someone"},
            "video": {"duration": 15, "playAddr": format!("https://cdn.example/{}.mp4", id)}
        })
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_date_bounds_are_inclusive_and_prune_older_pages() {
        let mut fetcher = MockPageFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|request| request.url.contains("cursor=0&"))
            .times(1)
            .returning(|_| {
                Ok(FetchResponse::ok(
                    json!({
                        "itemList": [
                            item("after-end", noon(2024, 3, 21)),
                            item("end-day", noon(2024, 3, 20)),
                            item("middle", noon(2024, 3, 15)),
                        ],
                        "cursor": "1710500000000",
                        "hasMore": true
                    })
                    .to_string(),
                ))
            });
        fetcher
            .expect_fetch()
            .withf(|request| request.url.contains("cursor=1710500000000"))
            .times(1)
            .returning(|_| {
                Ok(FetchResponse::ok(
                    json!({
                        "itemList": [
                            item("start-day", noon(2024, 3, 10)),
                            item("before-start", noon(2024, 3, 9)),
                            item("never-seen", noon(2024, 3, 8)),
                        ],
                        "cursor": 1709000000000u64,
                        "hasMore": true
                    })
                    .to_string(),
                ))
            });

        let crawler = ListingCrawler::new(test_support::client(fetcher), 35, 80);
        let videos = crawler
            .crawl("tiktokuser:SEC", Some(day(2024, 3, 10)), Some(day(2024, 3, 20)))
            .await;

        let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["end-day", "middle", "start-day"]);

        let first = &videos[0];
        assert_eq!(first.url.as_deref(), Some("https://www.tiktok.com/@someone/video/end-day"));
        assert_eq!(first.direct_url.as_deref(), Some("https://cdn.example/end-day.mp4"));
        assert_eq!(first.duration, Some(15.0));
        assert_eq!(first.status, VideoStatus::Pending);
    }

    #[tokio::test]
    async fn test_page_cap_bounds_endless_pagination() {
        let mut fetcher = MockPageFetcher::new();
        fetcher.expect_fetch().times(3).returning(|_| {
            Ok(FetchResponse::ok(
                json!({"itemList": [item("1", noon(2024, 1, 1))], "cursor": 5, "hasMore": true}).to_string(),
            ))
        });

        let crawler = ListingCrawler::new(test_support::client(fetcher), 35, 3);
        let videos = crawler.crawl("tiktokuser:SEC", None, None).await;
        assert_eq!(videos.len(), 3);
    }

    #[tokio::test]
    async fn test_api_error_yields_empty() {
        let mut fetcher = MockPageFetcher::new();
        fetcher.expect_fetch().times(1).returning(|_| {
            Ok(FetchResponse {
                status: 500,
                body: "oops".to_string(),
            })
        });

        let crawler = ListingCrawler::new(test_support::client(fetcher), 35, 80);
        assert!(crawler.crawl("tiktokuser:SEC", None, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_user_yields_empty_without_paging() {
        let mut fetcher = MockPageFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|request| !request.url.contains("/api/post/item_list/"))
            .times(2)
            .returning(|_| Ok(FetchResponse::ok("{}")));

        let crawler = ListingCrawler::new(test_support::client(fetcher), 35, 80);
        assert!(crawler.crawl("someone", None, None).await.is_empty());
    }

    #[test]
    fn test_page_from_snake_case_payload() {
        let page = ItemPage::from_payload(&json!({"item_list": [{"id": 1}], "hasMore": 1}));
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.cursor, "0");
        assert!(page.has_more);
    }

    #[test]
    fn test_item_created_at_accepts_strings() {
        let created = item_created_at(&json!({"createTime": "1710504000"})).unwrap();
        assert_eq!(created.date_naive(), day(2024, 3, 15));
        assert!(item_created_at(&json!({"createTime": 0})).is_none());
        assert!(item_created_at(&json!({})).is_none());
    }
}
