use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::acquire::{AudioAcquirer, AudioArtifact};
use crate::config::Config;
use crate::http::PageFetcher;
use crate::reference::VideoReference;
use crate::resolve::MediaLocator;
use crate::subtitles::SubtitleFetcher;
use crate::tools::{ExtractionTool, ToolError, Transcoder};
use crate::PipelineError;

pub mod whisper;

pub use whisper::WhisperCli;

/// Where the transcript text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptSource {
    Speech,
    Captions,
}

/// Transcription result with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionResult {
    pub video_id: String,

    /// The transcribed text
    pub text: String,

    pub source: TranscriptSource,

    /// Language requested or, for captions, the track used
    pub language: Option<String>,

    /// Validated audio length in seconds (speech only)
    pub audio_seconds: Option<f64>,
}

/// Speech-to-text over a validated audio artifact.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechModel: Send + Sync {
    async fn transcribe(&self, audio: &AudioArtifact, language: Option<String>) -> Result<String, ToolError>;
}

/// Main transcription pipeline
pub struct TranscriptionPipeline {
    locator: Arc<MediaLocator>,
    acquirer: AudioAcquirer,
    captions: SubtitleFetcher,
    model: Arc<dyn SpeechModel>,
    caption_fallback: bool,
    show_progress: bool,
}

impl TranscriptionPipeline {
    /// Wire the pipeline over shared collaborators. The speech model is created once by the caller.
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        tool: Arc<dyn ExtractionTool>,
        transcoder: Arc<dyn Transcoder>,
        model: Arc<dyn SpeechModel>,
    ) -> Self {
        let locator = Arc::new(MediaLocator::new(config, fetcher, tool.clone()));
        let acquirer = AudioAcquirer::new(config, tool.clone(), transcoder, locator.clone());
        let captions = SubtitleFetcher::new(config, tool, locator.client().clone());

        Self::from_parts(locator, acquirer, captions, model, config.app.caption_fallback)
    }

    pub fn from_parts(
        locator: Arc<MediaLocator>,
        acquirer: AudioAcquirer,
        captions: SubtitleFetcher,
        model: Arc<dyn SpeechModel>,
        caption_fallback: bool,
    ) -> Self {
        Self {
            locator,
            acquirer,
            captions,
            model,
            caption_fallback,
            show_progress: false,
        }
    }

    /// Show a spinner on stderr while the speech model runs
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn with_caption_fallback(mut self, caption_fallback: bool) -> Self {
        self.caption_fallback = caption_fallback;
        self
    }

    /// Resolve a video URL to its direct media URL
    pub async fn resolve(&self, video_url: &str) -> Result<String, PipelineError> {
        self.locator.resolve(video_url).await
    }

    /// Transcribe a video, falling back to its caption track when audio cannot be acquired.
    pub async fn transcribe(
        &self,
        video_url: &str,
        direct_url: Option<&str>,
        language: Option<&str>,
    ) -> Result<TranscriptionResult, PipelineError> {
        let reference = VideoReference::parse(video_url)?;
        let language = language_hint(language);

        tracing::info!("Transcribing {}", reference);

        let artifact = match self.acquirer.acquire_audio(&reference, direct_url).await {
            Ok(artifact) => artifact,
            Err(e) if self.caption_fallback => {
                tracing::warn!("Audio unavailable ({}), trying captions", e.category());
                return match self.captions.fetch(&reference, language.as_deref()).await {
                    Ok(captions) => Ok(TranscriptionResult {
                        video_id: reference.id().to_string(),
                        text: captions.text,
                        source: TranscriptSource::Captions,
                        language: Some(captions.language),
                        audio_seconds: None,
                    }),
                    Err(caption_error) => {
                        tracing::warn!("Caption fallback failed: {}", caption_error);
                        Err(e)
                    }
                };
            }
            Err(e) => return Err(e),
        };

        let progress = self.spinner("Transcribing audio...");
        let text = self
            .model
            .transcribe(&artifact, language.clone())
            .await
            .map_err(|e| PipelineError::TranscriptionFailed(e.to_string()));
        progress.finish_and_clear();

        let text = text?.trim().to_string();
        if text.is_empty() {
            return Err(PipelineError::TranscriptionFailed("speech model returned no text".to_string()));
        }

        Ok(TranscriptionResult {
            video_id: reference.id().to_string(),
            text,
            source: TranscriptSource::Speech,
            language,
            audio_seconds: Some(artifact.duration()),
        })
    }

    /// Caption text only, no audio work
    pub async fn subtitles(&self, video_url: &str, language: Option<&str>) -> Result<TranscriptionResult, PipelineError> {
        let reference = VideoReference::parse(video_url)?;
        let captions = self
            .captions
            .fetch(&reference, language_hint(language).as_deref())
            .await?;

        Ok(TranscriptionResult {
            video_id: reference.id().to_string(),
            text: captions.text,
            source: TranscriptSource::Captions,
            language: Some(captions.language),
            audio_seconds: None,
        })
    }

    fn spinner(&self, message: &'static str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        progress.set_message(message);
        progress.enable_steady_tick(Duration::from_millis(120));
        progress
    }
}

/// `auto` and blank hints mean "let the model decide"
fn language_hint(language: Option<&str>) -> Option<String> {
    language
        .map(str::trim)
        .filter(|lang| !lang.is_empty() && !lang.eq_ignore_ascii_case("auto"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{FetchResponse, MockPageFetcher};
    use crate::platform::test_support;
    use crate::tools::{MockExtractionTool, MockTranscoder};
    use serde_json::json;

    fn pipeline(
        tool: MockExtractionTool,
        transcoder: MockTranscoder,
        fetcher: MockPageFetcher,
        model: MockSpeechModel,
    ) -> TranscriptionPipeline {
        let config = Config::default();
        let tool: Arc<dyn ExtractionTool> = Arc::new(tool);
        let client = test_support::client(fetcher);
        let locator = Arc::new(MediaLocator::with_stages(client.clone(), Vec::new()));

        TranscriptionPipeline::from_parts(
            locator.clone(),
            AudioAcquirer::new(&config, tool.clone(), Arc::new(transcoder), locator),
            SubtitleFetcher::new(&config, tool, client),
            Arc::new(model),
            true,
        )
    }

    #[tokio::test]
    async fn test_speech_transcript() {
        let mut tool = MockExtractionTool::new();
        tool.expect_extract_audio().returning(|_, stem, _| {
            std::fs::write(stem.with_extension("mp3"), b"mp3").unwrap();
            Ok(())
        });

        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_decode_samples()
            .returning(|_, _| Ok(vec![0.0; 32_000]));

        let mut model = MockSpeechModel::new();
        model
            .expect_transcribe()
            .withf(|audio, language| audio.sample_count() == 32_000 && language.as_deref() == Some("ro"))
            .times(1)
            .returning(|_, _| Ok("  Salut tuturor  ".to_string()));

        let result = pipeline(tool, transcoder, MockPageFetcher::new(), model)
            .transcribe("https://www.tiktok.com/@u/video/1", None, Some("ro"))
            .await
            .unwrap();

        assert_eq!(result.text, "Salut tuturor");
        assert_eq!(result.source, TranscriptSource::Speech);
        assert_eq!(result.audio_seconds, Some(2.0));
    }

    #[tokio::test]
    async fn test_caption_fallback_when_audio_fails() {
        let mut tool = MockExtractionTool::new();
        tool.expect_extract_audio().returning(|_, _, _| {
            Err(ToolError::Timeout {
                tool: "yt-dlp".to_string(),
                secs: 120,
            })
        });
        tool.expect_dump_info().returning(|_, _, _, _| {
            Ok(json!({"subtitles": {"ru": [{"ext": "srt", "url": "https://subs.example/ru.srt"}]}}))
        });

        let mut fetcher = MockPageFetcher::new();
        fetcher
            .expect_fetch()
            .returning(|_| Ok(FetchResponse::ok("1\n00:00:00,000 --> 00:00:01,000\nпривет\n")));

        let mut model = MockSpeechModel::new();
        model.expect_transcribe().times(0);

        let result = pipeline(tool, MockTranscoder::new(), fetcher, model)
            .transcribe("https://www.tiktok.com/@u/video/1", None, Some("auto"))
            .await
            .unwrap();

        assert_eq!(result.text, "привет");
        assert_eq!(result.source, TranscriptSource::Captions);
        assert_eq!(result.language.as_deref(), Some("ru"));
    }

    #[tokio::test]
    async fn test_acquisition_error_surfaces_when_fallback_disabled() {
        let mut tool = MockExtractionTool::new();
        tool.expect_extract_audio().returning(|_, _, _| {
            Err(ToolError::Timeout {
                tool: "yt-dlp".to_string(),
                secs: 120,
            })
        });
        tool.expect_dump_info().times(0);

        let err = pipeline(tool, MockTranscoder::new(), MockPageFetcher::new(), MockSpeechModel::new())
            .with_caption_fallback(false)
            .transcribe("https://www.tiktok.com/@u/video/1", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.category(), "resolution-exhausted");
    }

    #[tokio::test]
    async fn test_invalid_reference() {
        let err = pipeline(
            MockExtractionTool::new(),
            MockTranscoder::new(),
            MockPageFetcher::new(),
            MockSpeechModel::new(),
        )
        .transcribe("https://www.tiktok.com/@u", None, None)
        .await
        .unwrap_err();
        assert_eq!(err.category(), "reference-invalid");
    }

    #[test]
    fn test_language_hint() {
        assert_eq!(language_hint(Some("auto")), None);
        assert_eq!(language_hint(Some(" ")), None);
        assert_eq!(language_hint(Some("ro")).as_deref(), Some("ro"));
        assert_eq!(language_hint(None), None);
    }
}
