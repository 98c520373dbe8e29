use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "tokscribe",
    about = "TikTok Scribe - resolve TikTok videos to direct media and transcribe them",
    version,
    long_about = "Resolves TikTok videos to direct media URLs through a cascade of strategies (yt-dlp, web API, embedded page state), extracts validated audio and transcribes it with whisper.cpp, falling back to caption tracks when audio is unavailable."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Netscape cookie jar exported from a logged-in browser session
    #[arg(long, global = true, env = "TIKTOK_COOKIE_FILE", value_name = "FILE")]
    pub cookies: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the direct media URL of a video
    Resolve {
        /// TikTok video URL
        #[arg(value_name = "URL")]
        url: String,
    },

    /// List a user's videos, optionally within a date range
    List {
        /// Handle, @handle, profile URL or tiktokuser:<secUid>
        #[arg(value_name = "USER")]
        user: String,

        /// First day to include (YYYY-MM-DD, UTC)
        #[arg(long, value_name = "DATE")]
        start: Option<NaiveDate>,

        /// Last day to include (YYYY-MM-DD, UTC)
        #[arg(long, value_name = "DATE")]
        end: Option<NaiveDate>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Transcribe a video's audio
    Transcribe {
        /// TikTok video URL
        #[arg(value_name = "URL")]
        url: String,

        /// Already resolved direct media URL (skips the resolution cascade)
        #[arg(long, value_name = "URL")]
        direct_url: Option<String>,

        /// Language code for transcription (auto-detect if not specified)
        #[arg(short, long, value_name = "LANG")]
        language: Option<String>,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Fail instead of falling back to caption tracks
        #[arg(long)]
        no_caption_fallback: bool,
    },

    /// Print a video's caption track as plain text
    Subtitles {
        /// TikTok video URL
        #[arg(value_name = "URL")]
        url: String,

        /// Preferred caption language
        #[arg(short, long, value_name = "LANG")]
        language: Option<String>,
    },

    /// Show or initialize the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
