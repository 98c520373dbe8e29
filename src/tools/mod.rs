use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

pub mod ffmpeg;
pub mod ytdlp;

pub use ffmpeg::Ffmpeg;
pub use ytdlp::YtDlp;

/// Sample rate audio is decoded to before validation and speech recognition.
pub const DECODE_SAMPLE_RATE: u32 = 16_000;

#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Unexpected output from {tool}: {message}")]
    Output { tool: String, message: String },
}

/// Per-invocation settings for the extraction tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOptions {
    pub cookie_file: Option<PathBuf>,
    pub headers: Vec<(String, String)>,
    /// Browser fingerprint to impersonate, e.g. `chrome`
    pub impersonate: Option<String>,
}

/// The generic video-extraction utility.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExtractionTool: Send + Sync {
    /// Resolve the direct media URL without downloading anything.
    async fn print_media_url(&self, video_url: &str, options: &ToolOptions) -> Result<String, ToolError>;

    /// Download and transcode audio; the tool writes `<output_stem>.mp3`.
    async fn extract_audio(&self, video_url: &str, output_stem: &Path, options: &ToolOptions) -> Result<(), ToolError>;

    /// Metadata for a single video (`flat = false`) or a flat playlist of a profile.
    async fn dump_info(&self, url: &str, options: &ToolOptions, flat: bool, playlist_end: Option<usize>) -> Result<Value, ToolError>;
}

/// The media transcoder.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Pull a remote URL through the transcoder with explicit HTTP headers.
    async fn transcode_url(&self, url: &str, headers: &[(String, String)], output: &Path) -> Result<(), ToolError>;

    /// Transcode a local media file to audio.
    async fn transcode_file(&self, input: &Path, output: &Path) -> Result<(), ToolError>;

    /// Decode audio to 16 kHz mono PCM at `wav_output` and return its samples.
    async fn decode_samples(&self, input: &Path, wav_output: &Path) -> Result<Vec<f32>, ToolError>;
}

/// Run a prepared command with a deadline, killing the child when it expires.
pub(crate) async fn run_with_timeout(tool: &str, mut command: Command, timeout: Duration) -> Result<Output, ToolError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|source| ToolError::Spawn {
        tool: tool.to_string(),
        source,
    })?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(ToolError::Spawn {
            tool: tool.to_string(),
            source,
        }),
        Err(_) => Err(ToolError::Timeout {
            tool: tool.to_string(),
            secs: timeout.as_secs(),
        }),
    }
}

/// Map a non-zero exit into [`ToolError::Failed`], logging the diagnostic text.
pub(crate) fn check_status(tool: &str, output: &Output) -> Result<(), ToolError> {
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        tracing::debug!("{} stdout (first 500): {}", tool, crate::utils::preview(&stdout, 500));
    }
    tracing::debug!("{} stderr (first 2000): {}", tool, crate::utils::preview(&stderr, 2000));

    Err(ToolError::Failed {
        tool: tool.to_string(),
        status: output.status.to_string(),
        stderr: crate::utils::preview(stderr.trim(), 300),
    })
}
