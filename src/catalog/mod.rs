//! Video enumeration for a user: API crawl first, flat yt-dlp playlist second.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::platform::{ListingCrawler, PlatformClient, VideoListingEntry, VideoStatus};
use crate::reference::{self, normalize_handle};
use crate::tools::{ExtractionTool, ToolOptions};

/// Video ids carry their creation time in the upper 32 bits
const ID_TIMESTAMP_SHIFT: u32 = 32;
/// 2010-01-01T00:00:00Z; anything earlier decoded from an id is noise
const ID_TIMESTAMP_FLOOR: i64 = 1_262_304_000;

pub struct VideoCatalog {
    client: PlatformClient,
    crawler: ListingCrawler,
    tool: Arc<dyn ExtractionTool>,
    impersonate_target: String,
    fallback_limit: usize,
}

impl VideoCatalog {
    pub fn new(config: &Config, client: PlatformClient, tool: Arc<dyn ExtractionTool>) -> Self {
        Self {
            crawler: ListingCrawler::new(client.clone(), config.platform.page_size, config.platform.crawl_page_cap),
            client,
            tool,
            impersonate_target: config.platform.impersonate_target.clone(),
            fallback_limit: config.app.listing_fallback_limit,
        }
    }

    /// List videos of `user` (handle, `@handle`, profile URL or `tiktokuser:` id)
    /// created within the inclusive day range.
    pub async fn list_videos(&self, user: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<VideoListingEntry> {
        let handle = normalize_handle(user);

        let videos = self.crawler.crawl(&handle, start, end).await;
        if !videos.is_empty() {
            return videos;
        }

        tracing::info!("API listing empty for {}, falling back to yt-dlp playlist", handle);
        self.list_via_playlist(&handle, start, end).await
    }

    async fn list_via_playlist(&self, handle: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<VideoListingEntry> {
        let options = ToolOptions {
            cookie_file: self.client.cookie_file().cloned(),
            headers: vec![
                ("User-Agent".to_string(), self.client.user_agent().to_string()),
                ("Referer".to_string(), self.client.site_referer()),
            ],
            impersonate: Some(self.impersonate_target.clone()),
        };

        let info = match self
            .tool
            .dump_info(&reference::profile_url(handle), &options, true, Some(self.fallback_limit))
            .await
        {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!("yt-dlp user extraction failed for {}: {}", handle, e);
                return Vec::new();
            }
        };

        let Some(entries) = info.get("entries").and_then(Value::as_array) else {
            return Vec::new();
        };

        let bounded = start.is_some() || end.is_some();
        let videos: Vec<VideoListingEntry> = entries
            .iter()
            .filter(|entry| entry.is_object())
            .filter_map(|entry| {
                let created_at = extract_video_date(entry);
                if bounded {
                    let day = created_at?.date_naive();
                    if start.is_some_and(|start| day < start) || end.is_some_and(|end| day > end) {
                        return None;
                    }
                }
                self.entry_from_playlist(entry, handle, created_at)
            })
            .collect();

        tracing::info!("Listed {} videos for {} via yt-dlp", videos.len(), handle);
        videos
    }

    fn entry_from_playlist(&self, entry: &Value, handle: &str, created_at: Option<DateTime<Utc>>) -> Option<VideoListingEntry> {
        let id = crate::platform::listing::item_id(entry)?;

        let url = entry
            .get("url")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/@{}/video/{}", self.client.base_url(), handle, id));

        let title = ["title", "description"]
            .iter()
            .filter_map(|key| entry.get(*key)?.as_str())
            .find(|text| !text.is_empty())
            .unwrap_or("Untitled Video");

        Some(VideoListingEntry {
            id,
            url: Some(url),
            direct_url: None,
            title: title.to_string(),
            created_at,
            duration: entry.get("duration").and_then(Value::as_f64),
            status: VideoStatus::Pending,
        })
    }
}

/// Creation time of a yt-dlp entry: `upload_date`, then timestamps, then the id itself.
pub fn extract_video_date(entry: &Value) -> Option<DateTime<Utc>> {
    if let Some(raw) = entry.get("upload_date").and_then(Value::as_str) {
        match NaiveDate::parse_from_str(raw, "%Y%m%d") {
            Ok(day) => return day.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt)),
            Err(e) => tracing::debug!("Error parsing upload_date {}: {}", raw, e),
        }
    }

    let timestamp = ["timestamp", "release_timestamp"]
        .iter()
        .filter_map(|key| entry.get(*key)?.as_f64())
        .find(|ts| *ts > 0.0);
    if let Some(ts) = timestamp {
        return DateTime::from_timestamp(ts as i64, 0);
    }

    let id: u64 = entry.get("id")?.as_str()?.parse().ok()?;
    let seconds = (id >> ID_TIMESTAMP_SHIFT) as i64;
    if seconds > ID_TIMESTAMP_FLOOR {
        DateTime::from_timestamp(seconds, 0)
    } else {
        None
    }
}
