//! The media locator cascade: ordered strategies that turn a video reference
//! into one direct, fetchable media URL.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, PlatformConfig};
use crate::cookies::SessionCookies;
use crate::http::{FetchError, PageFetcher};
use crate::platform::PlatformClient;
use crate::reference::VideoReference;
use crate::tools::{ExtractionTool, ToolError};
use crate::PipelineError;

pub mod normalize;
pub mod stages;

pub use normalize::normalize;
pub use stages::{HtmlScrapeStage, ItemDetailStage, ItemListStage, YtDlpStage};

/// Why a single strategy produced nothing. Always recovered by falling through.
#[derive(thiserror::Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("{0}")]
    NotFound(String),
}

/// Everything a stage may look at while resolving one reference.
#[derive(Debug, Clone)]
pub struct ResolveSession {
    pub reference: VideoReference,
    /// Loaded once per resolution
    pub cookies: SessionCookies,
    pub cookie_file: Option<PathBuf>,
}

/// One resolution strategy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResolveStage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(&self, session: &ResolveSession) -> Result<String, StageError>;
}

/// Runs the stages in order and returns the first normalized URL.
pub struct MediaLocator {
    client: PlatformClient,
    stages: Vec<Box<dyn ResolveStage>>,
}

impl MediaLocator {
    /// The default cascade over live collaborators.
    pub fn new(config: &Config, fetcher: Arc<dyn PageFetcher>, tool: Arc<dyn ExtractionTool>) -> Self {
        Self::from_client(PlatformClient::new(config, fetcher), tool, &config.platform)
    }

    pub fn from_client(client: PlatformClient, tool: Arc<dyn ExtractionTool>, platform: &PlatformConfig) -> Self {
        let stages: Vec<Box<dyn ResolveStage>> = vec![
            Box::new(YtDlpStage::new(tool.clone(), &client, None)),
            Box::new(YtDlpStage::new(tool, &client, Some(platform.impersonate_target.clone()))),
            Box::new(ItemListStage::new(client.clone(), platform.page_size, platform.lookup_page_cap)),
            Box::new(ItemDetailStage::new(client.clone())),
            Box::new(HtmlScrapeStage::new(client.clone(), platform.min_html_bytes)),
        ];

        Self::with_stages(client, stages)
    }

    pub fn with_stages(client: PlatformClient, stages: Vec<Box<dyn ResolveStage>>) -> Self {
        Self { client, stages }
    }

    pub fn client(&self) -> &PlatformClient {
        &self.client
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Resolve a video URL. Invalid references fail before any stage runs.
    pub async fn resolve(&self, input: &str) -> Result<String, PipelineError> {
        let reference = VideoReference::parse(input)?;
        self.resolve_reference(&reference).await
    }

    pub async fn resolve_reference(&self, reference: &VideoReference) -> Result<String, PipelineError> {
        let session = ResolveSession {
            reference: reference.clone(),
            cookies: self.client.load_cookies(),
            cookie_file: self.client.cookie_file().cloned(),
        };

        tracing::debug!(
            "Resolving {} (id={}, cookies={})",
            reference,
            reference.id(),
            session.cookies.len()
        );

        let mut tried = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            tried.push(stage.name());
            tracing::debug!("Trying stage {} for {}", stage.name(), reference.id());

            match stage.attempt(&session).await {
                Ok(raw) => match normalize(&raw) {
                    Some(url) => {
                        tracing::info!("Resolved {} via {}", reference.id(), stage.name());
                        return Ok(url);
                    }
                    None => tracing::warn!("Stage {} returned an empty URL", stage.name()),
                },
                Err(e) => tracing::warn!("Stage {} failed for {}: {}", stage.name(), reference.id(), e),
            }
        }

        Err(PipelineError::ResolutionExhausted(format!(
            "video {} (tried {})",
            reference.id(),
            tried.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{FetchResponse, MockPageFetcher};
    use crate::platform::test_support;
    use crate::tools::MockExtractionTool;

    fn stage(name: &'static str, outcome: Option<&'static str>, times: usize) -> Box<dyn ResolveStage> {
        let mut stage = MockResolveStage::new();
        stage.expect_name().return_const(name);
        stage
            .expect_attempt()
            .times(times)
            .returning(move |_| match outcome {
                Some(url) => Ok(url.to_string()),
                None => Err(StageError::NotFound(format!("{} found nothing", name))),
            });
        Box::new(stage)
    }

    fn locator(stages: Vec<Box<dyn ResolveStage>>) -> MediaLocator {
        MediaLocator::with_stages(test_support::client(MockPageFetcher::new()), stages)
    }

    #[tokio::test]
    async fn test_invalid_reference_runs_no_stage() {
        let locator = locator(vec![stage("first", Some("https://cdn.example/v.mp4"), 0)]);

        let err = locator.resolve("https://www.tiktok.com/@someone").await.unwrap_err();
        assert!(matches!(err, PipelineError::ReferenceInvalid(_)));
    }

    #[tokio::test]
    async fn test_first_success_stops_cascade() {
        let stages = vec![
            stage("one", None, 1),
            stage("two", None, 1),
            stage("three", Some("https:\\/\\/cdn.example\\/v.mp4?a=1\\u0026b=2"), 1),
            stage("four", Some("https://cdn.example/never.mp4"), 0),
        ];

        let url = locator(stages)
            .resolve("https://www.tiktok.com/@someone/video/123")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example/v.mp4?a=1&b=2");
    }

    #[tokio::test]
    async fn test_all_stages_failing_is_exhausted() {
        let stages = vec![stage("one", None, 1), stage("two", Some("  "), 1)];

        let err = locator(stages)
            .resolve("https://www.tiktok.com/@someone/video/123")
            .await
            .unwrap_err();
        assert_eq!(err.category(), "resolution-exhausted");
        assert!(err.to_string().contains("one, two"));
    }

    #[tokio::test]
    async fn test_item_detail_payload_resolves_when_earlier_stages_fail() {
        let mut tool = MockExtractionTool::new();
        tool.expect_print_media_url().times(2).returning(|_, _| {
            Err(ToolError::Failed {
                tool: "yt-dlp".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "Unable to extract".to_string(),
            })
        });

        let mut fetcher = MockPageFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|request| request.url.contains("/api/user/detail/"))
            .times(1)
            .returning(|_| Ok(FetchResponse::ok(r#"{"userInfo":{}}"#)));
        fetcher
            .expect_fetch()
            .withf(|request| request.url == "https://www.tiktok.com/@someone")
            .times(1)
            .returning(|_| Ok(FetchResponse::ok("<html>blocked</html>")));
        fetcher
            .expect_fetch()
            .withf(|request| request.url.contains("/api/item/detail/") && request.url.contains("itemId=7000000000000000001"))
            .times(1)
            .returning(|_| {
                Ok(FetchResponse::ok(
                    r#"{"itemInfo":{"itemStruct":{"id":"7000000000000000001","video":{"playAddr":"","downloadAddr":{"urlList":["https://cdn.example/video.mp4"]}}}}}"#,
                ))
            });

        let platform = Config::default().platform;
        let locator = MediaLocator::from_client(test_support::client(fetcher), Arc::new(tool), &platform);
        assert_eq!(
            locator.stage_names(),
            vec!["yt-dlp", "yt-dlp-impersonate", "item-list", "item-detail", "html-scrape"]
        );

        let url = locator
            .resolve("https://www.tiktok.com/@someone/video/7000000000000000001")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example/video.mp4");
    }
}
