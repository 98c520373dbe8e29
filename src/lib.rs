//! TikTok Scribe - resolve TikTok videos to direct media and turn them into transcripts
//!
//! The library walks an ordered cascade of resolution strategies to find a
//! fetchable media URL for a video, acquires a validated audio artifact from it
//! (or falls back to caption tracks), and hands the result to a speech model.

pub mod acquire;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod cookies;
pub mod embedded;
pub mod http;
pub mod output;
pub mod platform;
pub mod reference;
pub mod resolve;
pub mod subtitles;
pub mod tools;
pub mod transcribe;
pub mod utils;

pub use acquire::{AudioAcquirer, AudioArtifact};
pub use catalog::VideoCatalog;
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use cookies::SessionCookies;
pub use platform::{VideoListingEntry, VideoStatus};
pub use reference::VideoReference;
pub use resolve::MediaLocator;
pub use transcribe::{TranscriptionPipeline, TranscriptionResult};

/// Result type used at the CLI and configuration boundary
pub type Result<T> = anyhow::Result<T>;

/// Terminal outcomes reported to callers of the pipeline.
///
/// Individual stage failures never show up here; they are logged and the
/// cascade falls through to the next stage.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Invalid video reference: {0}")]
    ReferenceInvalid(String),

    #[error("No direct URL resolvable: {0}")]
    ResolutionExhausted(String),

    #[error("Audio acquisition failed: {0}")]
    AcquisitionFailed(String),

    #[error("Audio rejected: {0}")]
    AudioRejected(String),

    #[error("No subtitles found: {0}")]
    NoSubtitles(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),
}

impl PipelineError {
    /// Short machine-friendly category name, used in logs and CLI output.
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::ReferenceInvalid(_) => "reference-invalid",
            PipelineError::ResolutionExhausted(_) => "resolution-exhausted",
            PipelineError::AcquisitionFailed(_) => "acquisition-failed",
            PipelineError::AudioRejected(_) => "audio-rejected",
            PipelineError::NoSubtitles(_) => "no-subtitles",
            PipelineError::TranscriptionFailed(_) => "transcription-failed",
        }
    }
}
