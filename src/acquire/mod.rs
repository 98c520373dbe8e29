//! Turning a video into a validated local audio artifact.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

use crate::config::Config;
use crate::http::FetchRequest;
use crate::reference::VideoReference;
use crate::resolve::{normalize, MediaLocator};
use crate::tools::{ExtractionTool, ToolOptions, Transcoder, DECODE_SAMPLE_RATE};
use crate::PipelineError;

/// Shortest audio accepted for transcription, in seconds
pub const MIN_AUDIO_SECONDS: f64 = 1.0;

const AUDIO_STEM: &str = "audio";
const AUDIO_FILE: &str = "audio.mp3";
const DECODED_FILE: &str = "audio.wav";
const MEDIA_FILE: &str = "media.download";

/// Validated audio living in a request-scoped temporary workspace.
///
/// The workspace (and every file in it) is removed when the artifact is dropped.
#[derive(Debug)]
pub struct AudioArtifact {
    workspace: TempDir,
    path: PathBuf,
    wav_path: PathBuf,
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioArtifact {
    /// The transcoded MP3
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 16 kHz mono PCM copy of the audio
    pub fn wav_path(&self) -> &Path {
        &self.wav_path
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Check that `count` samples at `sample_rate` cover at least [`MIN_AUDIO_SECONDS`].
pub fn check_duration(count: usize, sample_rate: u32) -> Result<f64, PipelineError> {
    let seconds = count as f64 / sample_rate as f64;
    if seconds < MIN_AUDIO_SECONDS {
        return Err(PipelineError::AudioRejected(format!(
            "{:.2}s of audio decoded, need at least {:.1}s",
            seconds, MIN_AUDIO_SECONDS
        )));
    }
    Ok(seconds)
}

/// Three-tier audio acquisition: extraction tool, remote transcode, download then transcode.
pub struct AudioAcquirer {
    tool: Arc<dyn ExtractionTool>,
    transcoder: Arc<dyn Transcoder>,
    locator: Arc<MediaLocator>,
    temp_dir: Option<PathBuf>,
}

impl AudioAcquirer {
    pub fn new(
        config: &Config,
        tool: Arc<dyn ExtractionTool>,
        transcoder: Arc<dyn Transcoder>,
        locator: Arc<MediaLocator>,
    ) -> Self {
        Self {
            tool,
            transcoder,
            locator,
            temp_dir: config.app.temp_dir.clone(),
        }
    }

    fn workspace(&self, tag: &str) -> Result<TempDir, PipelineError> {
        let mut builder = tempfile::Builder::new();
        let prefix = format!("tokscribe-{}-", tag);
        builder.prefix(&prefix);

        match &self.temp_dir {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        }
        .map_err(|e| PipelineError::AcquisitionFailed(format!("cannot create workspace: {}", e)))
    }

    /// Acquire validated audio for `reference`.
    ///
    /// `resolved_url` skips the locator cascade when a direct URL is already known.
    pub async fn acquire_audio(
        &self,
        reference: &VideoReference,
        resolved_url: Option<&str>,
    ) -> Result<AudioArtifact, PipelineError> {
        let request_id = Uuid::new_v4().to_string()[..8].to_string();
        let workspace = self.workspace(&request_id)?;
        let audio = workspace.path().join(AUDIO_FILE);
        let page_url = reference.page_url();

        tracing::info!("[{}] Acquiring audio for {} in {}", request_id, page_url, workspace.path().display());

        let client = self.locator.client();
        let cookies = client.load_cookies();
        let headers = client.media_headers(&page_url, &cookies);

        let mut failures = Vec::new();

        // Tier 1: the extraction tool does everything
        let options = ToolOptions {
            cookie_file: client.cookie_file().cloned(),
            headers: headers.iter().filter(|(name, _)| name != "Cookie").cloned().collect(),
            impersonate: None,
        };
        match self
            .tool
            .extract_audio(&page_url, &workspace.path().join(AUDIO_STEM), &options)
            .await
        {
            Ok(()) => {
                tracing::info!("[{}] Audio extracted by yt-dlp", request_id);
                return self.validate(workspace, audio).await;
            }
            Err(e) => {
                tracing::warn!("[{}] yt-dlp audio extraction failed: {}", request_id, e);
                failures.push(format!("yt-dlp: {}", e));
            }
        }

        let media_url = match resolved_url.and_then(normalize) {
            Some(url) => url,
            None => self.locator.resolve_reference(reference).await?,
        };
        tracing::debug!("[{}] Direct media URL: {}", request_id, crate::utils::preview(&media_url, 120));

        // Tier 2: the transcoder pulls the URL itself
        match self.transcoder.transcode_url(&media_url, &headers, &audio).await {
            Ok(()) => {
                tracing::info!("[{}] Audio transcoded from remote URL", request_id);
                return self.validate(workspace, audio).await;
            }
            Err(e) => {
                tracing::warn!("[{}] Remote transcode failed: {}", request_id, e);
                failures.push(format!("ffmpeg (remote): {}", e));
            }
        }

        // Tier 3: download, then transcode the local copy
        let media = workspace.path().join(MEDIA_FILE);
        let request = headers
            .iter()
            .fold(FetchRequest::new(media_url.as_str()), |request, (name, value)| {
                request.header(name, value.as_str())
            });

        match client.fetcher().download(request, &media).await {
            Ok(0) => {
                return Err(PipelineError::AudioRejected("downloaded media is empty".to_string()));
            }
            Ok(bytes) => tracing::debug!("[{}] Downloaded {} bytes", request_id, bytes),
            Err(e) => {
                tracing::warn!("[{}] Media download failed: {}", request_id, e);
                failures.push(format!("download: {}", e));
                return Err(PipelineError::AcquisitionFailed(failures.join("; ")));
            }
        }

        match self.transcoder.transcode_file(&media, &audio).await {
            Ok(()) => {
                tracing::info!("[{}] Audio transcoded from downloaded media", request_id);
                self.validate(workspace, audio).await
            }
            Err(e) => {
                tracing::warn!("[{}] Local transcode failed: {}", request_id, e);
                failures.push(format!("ffmpeg (local): {}", e));
                Err(PipelineError::AcquisitionFailed(failures.join("; ")))
            }
        }
    }

    /// The gate every tier passes through: present, non-empty, at least a second long.
    async fn validate(&self, workspace: TempDir, audio: PathBuf) -> Result<AudioArtifact, PipelineError> {
        let size = fs_err::metadata(&audio).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(PipelineError::AudioRejected(format!(
                "{} is missing or empty",
                audio.display()
            )));
        }

        let wav_path = workspace.path().join(DECODED_FILE);
        let samples = self
            .transcoder
            .decode_samples(&audio, &wav_path)
            .await
            .map_err(|e| PipelineError::AudioRejected(format!("audio does not decode: {}", e)))?;

        let seconds = check_duration(samples.len(), DECODE_SAMPLE_RATE)?;
        tracing::info!(
            "Audio accepted: {} bytes, {} samples, {}",
            size,
            samples.len(),
            crate::utils::format_duration(seconds)
        );

        Ok(AudioArtifact {
            workspace,
            path: audio,
            wav_path,
            samples,
            sample_rate: DECODE_SAMPLE_RATE,
        })
    }
}
