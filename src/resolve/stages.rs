use async_trait::async_trait;
use std::sync::Arc;

use super::{ResolveSession, ResolveStage, StageError};
use crate::embedded;
use crate::platform::{listing, IdentityResolver, ItemDetailApi, ItemListPager, PlatformClient};
use crate::tools::{ExtractionTool, ToolOptions};

/// Ask the extraction tool to print the media URL, optionally impersonating a browser.
pub struct YtDlpStage {
    tool: Arc<dyn ExtractionTool>,
    user_agent: String,
    referer: String,
    impersonate: Option<String>,
}

impl YtDlpStage {
    pub fn new(tool: Arc<dyn ExtractionTool>, client: &PlatformClient, impersonate: Option<String>) -> Self {
        Self {
            tool,
            user_agent: client.user_agent().to_string(),
            referer: client.site_referer(),
            impersonate,
        }
    }
}

#[async_trait]
impl ResolveStage for YtDlpStage {
    fn name(&self) -> &'static str {
        if self.impersonate.is_some() {
            "yt-dlp-impersonate"
        } else {
            "yt-dlp"
        }
    }

    async fn attempt(&self, session: &ResolveSession) -> Result<String, StageError> {
        let options = ToolOptions {
            cookie_file: session.cookie_file.clone(),
            headers: vec![
                ("User-Agent".to_string(), self.user_agent.clone()),
                ("Referer".to_string(), self.referer.clone()),
            ],
            impersonate: self.impersonate.clone(),
        };

        Ok(self
            .tool
            .print_media_url(&session.reference.page_url(), &options)
            .await?)
    }
}

/// Page through the owner's listing until the referenced item shows up.
pub struct ItemListStage {
    identity: IdentityResolver,
    pager: ItemListPager,
    page_cap: usize,
}

impl ItemListStage {
    pub fn new(client: PlatformClient, page_size: u32, page_cap: usize) -> Self {
        Self {
            identity: IdentityResolver::new(client.clone()),
            pager: ItemListPager::new(client, page_size),
            page_cap,
        }
    }
}

#[async_trait]
impl ResolveStage for ItemListStage {
    fn name(&self) -> &'static str {
        "item-list"
    }

    async fn attempt(&self, session: &ResolveSession) -> Result<String, StageError> {
        let reference = &session.reference;
        let handle = reference
            .handle()
            .ok_or_else(|| StageError::NotFound("reference carries no handle".to_string()))?;

        let sec_uid = self
            .identity
            .resolve(handle, &session.cookies)
            .await
            .ok_or_else(|| StageError::NotFound(format!("no secUid for {}", handle)))?;

        let mut cursor = "0".to_string();
        for page in 0..self.page_cap {
            let listing = self
                .pager
                .fetch_page(&sec_uid, &cursor, handle, &session.cookies)
                .await
                .inspect_err(|e| tracing::debug!("item-list page={} cursor={} failed: {}", page, cursor, e))?;

            tracing::debug!(
                "item-list page={} cursor={} items={} has_more={}",
                page,
                cursor,
                listing.items.len(),
                listing.has_more
            );

            if let Some(item) = listing
                .items
                .iter()
                .find(|item| listing::item_id(item).as_deref() == Some(reference.id()))
            {
                return embedded::extract_direct_url(item).ok_or_else(|| {
                    StageError::NotFound(format!("item {} on page {} has no media address", reference.id(), page))
                });
            }

            if listing.items.is_empty() || !listing.has_more {
                break;
            }
            cursor = listing.cursor;
        }

        Err(StageError::NotFound(format!("item {} not in {}'s listing", reference.id(), handle)))
    }
}

/// Look the item up by id on the detail endpoint.
pub struct ItemDetailStage {
    client: PlatformClient,
    api: ItemDetailApi,
}

impl ItemDetailStage {
    pub fn new(client: PlatformClient) -> Self {
        Self {
            api: ItemDetailApi::new(client.clone()),
            client,
        }
    }
}

#[async_trait]
impl ResolveStage for ItemDetailStage {
    fn name(&self) -> &'static str {
        "item-detail"
    }

    async fn attempt(&self, session: &ResolveSession) -> Result<String, StageError> {
        let reference = &session.reference;
        let referer = reference
            .canonical_url()
            .map(str::to_string)
            .unwrap_or_else(|| self.client.site_referer());

        let item = self
            .api
            .fetch_item(reference.id(), &referer, &session.cookies)
            .await?
            .ok_or_else(|| StageError::NotFound("no itemStruct in detail payload".to_string()))?;

        embedded::extract_direct_url(&item)
            .ok_or_else(|| StageError::NotFound("itemStruct has no media address".to_string()))
    }
}

/// Fetch the video page (and its embed/mobile variants) and scrape embedded state.
pub struct HtmlScrapeStage {
    client: PlatformClient,
    min_html_bytes: usize,
}

impl HtmlScrapeStage {
    pub fn new(client: PlatformClient, min_html_bytes: usize) -> Self {
        Self { client, min_html_bytes }
    }

    /// Page URLs to try, in order, without duplicates.
    pub fn candidates(&self, session: &ResolveSession) -> Vec<String> {
        let reference = &session.reference;
        let id = reference.id();
        let page = reference.page_url();
        let bare = page.split(['?', '#']).next().unwrap_or(&page).to_string();
        let base = self.client.base_url();

        let all = [
            page.clone(),
            format!("{}/embed/v2/{}", base, id),
            format!("{}/embed/{}", base, id),
            format!("https://m.tiktok.com/v/{}.html", id),
            format!("{}?is_copy_url=1&is_from_webapp=v1", bare),
            format!("{}?lang=en", bare),
            format!("{}?is_copy_url=1&is_from_webapp=v1&lang=en", bare),
        ];

        let mut candidates: Vec<String> = Vec::with_capacity(all.len());
        for url in all {
            if !candidates.contains(&url) {
                candidates.push(url);
            }
        }
        candidates
    }
}

#[async_trait]
impl ResolveStage for HtmlScrapeStage {
    fn name(&self) -> &'static str {
        "html-scrape"
    }

    async fn attempt(&self, session: &ResolveSession) -> Result<String, StageError> {
        let referer = self.client.site_referer();
        let mut html: Option<String> = None;

        for url in self.candidates(session) {
            let request = self.client.html_request(url.clone(), &referer, &session.cookies);
            let response = match self.client.fetcher().fetch(request).await {
                Ok(response) if response.is_success() => response,
                Ok(response) => {
                    tracing::debug!("HTML candidate {} returned {}", url, response.status);
                    continue;
                }
                Err(e) => {
                    tracing::debug!("HTML candidate {} failed: {}", url, e);
                    continue;
                }
            };

            tracing::debug!("HTML candidate {} returned {} bytes", url, response.body.len());
            if response.body.is_empty() {
                continue;
            }
            let large_enough = response.body.len() > self.min_html_bytes;
            if html.as_ref().map_or(true, |kept| response.body.len() > kept.len()) {
                html = Some(response.body);
            }
            if large_enough {
                break;
            }
        }

        let html = html.ok_or_else(|| StageError::NotFound("no HTML candidate answered".to_string()))?;
        embedded::extract_from_html(&html)
            .ok_or_else(|| StageError::NotFound("no media address in page state".to_string()))
    }
}
