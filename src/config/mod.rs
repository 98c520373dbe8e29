use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Platform endpoints, headers and paging limits
    pub platform: PlatformConfig,

    /// External tool locations
    pub tools: ToolsConfig,

    /// Per-call timeouts
    pub timeouts: TimeoutConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Site root used for API and page requests
    pub base_url: String,

    /// User-Agent sent with every request and tool invocation
    pub user_agent: String,

    /// Netscape cookie jar exported from a logged-in browser
    pub cookie_file: Option<PathBuf>,

    /// Items requested per listing page
    pub page_size: u32,

    /// Page cap for user listing crawls
    pub crawl_page_cap: usize,

    /// Page cap when scanning a listing for a single video
    pub lookup_page_cap: usize,

    /// HTML bodies at or below this size are treated as stub pages
    pub min_html_bytes: usize,

    /// Browser fingerprint yt-dlp impersonates
    pub impersonate_target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    pub yt_dlp: String,
    pub ffmpeg: String,
    pub whisper: String,
    pub whisper_model: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub http_secs: u64,
    pub download_secs: u64,
    pub resolve_tool_secs: u64,
    pub transcode_secs: u64,
    pub speech_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Parent directory for per-request workspaces
    pub temp_dir: Option<PathBuf>,

    /// Append-only diagnostic log of cascade outcomes
    pub debug_log: Option<PathBuf>,

    /// Caption languages tried, in order, when no hint matches
    pub caption_languages: Vec<String>,

    /// Fall back to caption tracks when audio cannot be acquired
    pub caption_fallback: bool,

    /// Entries requested from the yt-dlp listing fallback
    pub listing_fallback_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            platform: PlatformConfig {
                base_url: "https://www.tiktok.com".to_string(),
                user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36".to_string(),
                cookie_file: None,
                page_size: 35,
                crawl_page_cap: 80,
                lookup_page_cap: 40,
                min_html_bytes: 2000,
                impersonate_target: "chrome".to_string(),
            },
            tools: ToolsConfig {
                yt_dlp: "yt-dlp".to_string(),
                ffmpeg: "ffmpeg".to_string(),
                whisper: "whisper-cli".to_string(),
                whisper_model: PathBuf::from("models/ggml-base.bin"),
            },
            timeouts: TimeoutConfig {
                http_secs: 20,
                download_secs: 30,
                resolve_tool_secs: 40,
                transcode_secs: 120,
                speech_secs: 900,
            },
            app: AppConfig {
                temp_dir: None,
                debug_log: None,
                caption_languages: vec!["ro".to_string(), "ru".to_string(), "en".to_string()],
                caption_fallback: true,
                listing_fallback_limit: 100,
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("tiktok-scribe").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if url::Url::parse(&self.platform.base_url).is_err() {
            anyhow::bail!("platform.base_url is not a valid URL: {}", self.platform.base_url);
        }

        if self.platform.page_size == 0 {
            anyhow::bail!("platform.page_size must be greater than zero");
        }

        if self.platform.crawl_page_cap == 0 || self.platform.lookup_page_cap == 0 {
            anyhow::bail!("Listing page caps must be greater than zero");
        }

        let timeouts = &self.timeouts;
        if [timeouts.http_secs, timeouts.download_secs, timeouts.resolve_tool_secs, timeouts.transcode_secs, timeouts.speech_secs]
            .contains(&0)
        {
            anyhow::bail!("Timeouts must be greater than zero");
        }

        Ok(())
    }

    /// Apply a cookie jar given on the command line or via the environment
    pub fn with_cookie_override(mut self, cookie_file: Option<PathBuf>) -> Self {
        if cookie_file.is_some() {
            self.platform.cookie_file = cookie_file;
        }
        self
    }

    /// Effective cookie jar: the configured file if it exists, else `./cookies.txt`
    pub fn cookie_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.platform.cookie_file {
            if path.exists() {
                return Some(path.clone());
            }
            tracing::warn!("Configured cookie file not found: {}", path.display());
        }

        let local = PathBuf::from("cookies.txt");
        local.exists().then_some(local)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Base URL: {}", self.platform.base_url);
        match self.cookie_file() {
            Some(path) => println!("  Cookie jar: {}", path.display()),
            None => println!("  Cookie jar: (none)"),
        }
        println!("  Page size: {} (crawl cap {}, lookup cap {})",
            self.platform.page_size, self.platform.crawl_page_cap, self.platform.lookup_page_cap);
        println!("  yt-dlp: {}", self.tools.yt_dlp);
        println!("  ffmpeg: {}", self.tools.ffmpeg);
        println!("  Whisper: {} ({})", self.tools.whisper, self.tools.whisper_model.display());
        if let Some(log) = &self.app.debug_log {
            println!("  Debug log: {}", log.display());
        }
        println!("  Caption languages: {}", self.app.caption_languages.join(", "));
        println!("  Caption fallback: {}", self.app.caption_fallback);
    }

    /// Path the configuration is read from
    pub fn location() -> Result<PathBuf> {
        Self::config_path()
    }
}
