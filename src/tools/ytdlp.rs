use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

use super::{check_status, run_with_timeout, ExtractionTool, ToolError, ToolOptions};
use crate::config::Config;

const TOOL: &str = "yt-dlp";

/// yt-dlp driven as a subprocess
pub struct YtDlp {
    yt_dlp_path: String,
    resolve_timeout: Duration,
    transcode_timeout: Duration,
}

impl YtDlp {
    pub fn new(config: &Config) -> Self {
        Self {
            yt_dlp_path: config.tools.yt_dlp.clone(),
            resolve_timeout: Duration::from_secs(config.timeouts.resolve_tool_secs),
            transcode_timeout: Duration::from_secs(config.timeouts.transcode_secs),
        }
    }

    /// Arguments shared by every invocation
    fn base_args(options: &ToolOptions) -> Vec<String> {
        let cookie_file = options
            .cookie_file
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/dev/null".to_string());

        let mut args = vec![
            "--no-playlist".to_string(),
            "--cookies".to_string(),
            cookie_file,
            "--no-warnings".to_string(),
        ];

        for (name, value) in &options.headers {
            args.push("--add-header".to_string());
            args.push(format!("{}: {}", name, value));
        }

        if let Some(target) = &options.impersonate {
            args.push("--extractor-args".to_string());
            args.push(format!("tiktok:impersonate={}", target));
        }

        args
    }

    fn command(&self, args: &[String]) -> Command {
        let mut command = Command::new(&self.yt_dlp_path);
        command.args(args);
        command
    }
}

#[async_trait]
impl ExtractionTool for YtDlp {
    async fn print_media_url(&self, video_url: &str, options: &ToolOptions) -> Result<String, ToolError> {
        tracing::debug!("Resolving media URL with yt-dlp (impersonate={:?}): {}", options.impersonate, video_url);

        let mut args = Self::base_args(options);
        args.extend(["--print".to_string(), "url".to_string(), video_url.to_string()]);

        let output = run_with_timeout(TOOL, self.command(&args), self.resolve_timeout).await?;
        check_status(TOOL, &output)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let first_line = stdout.trim().lines().next().unwrap_or("").trim();

        if first_line.starts_with("http") {
            Ok(first_line.to_string())
        } else {
            Err(ToolError::Output {
                tool: TOOL.to_string(),
                message: format!("no URL printed: {}", crate::utils::preview(first_line, 200)),
            })
        }
    }

    async fn extract_audio(&self, video_url: &str, output_stem: &Path, options: &ToolOptions) -> Result<(), ToolError> {
        tracing::debug!("Extracting audio with yt-dlp for: {}", video_url);

        let mut args = Self::base_args(options);
        args.extend([
            "-x".to_string(),
            "--audio-format".to_string(),
            "mp3".to_string(),
            "--audio-quality".to_string(),
            "2".to_string(),
            "-o".to_string(),
            output_stem.to_string_lossy().into_owned(),
            video_url.to_string(),
        ]);

        let output = run_with_timeout(TOOL, self.command(&args), self.transcode_timeout).await?;
        check_status(TOOL, &output)
    }

    async fn dump_info(&self, url: &str, options: &ToolOptions, flat: bool, playlist_end: Option<usize>) -> Result<Value, ToolError> {
        tracing::debug!("Dumping yt-dlp info (flat={}) for: {}", flat, url);

        let mut args = Self::base_args(options);
        if flat {
            // --no-playlist from the base args would collapse the profile listing
            args.retain(|arg| arg != "--no-playlist");
            args.extend(["--flat-playlist".to_string(), "--yes-playlist".to_string()]);
        }
        if let Some(end) = playlist_end {
            args.extend(["--playlist-end".to_string(), end.to_string()]);
        }
        args.extend([
            "--dump-single-json".to_string(),
            "--skip-download".to_string(),
            url.to_string(),
        ]);

        let output = run_with_timeout(TOOL, self.command(&args), self.transcode_timeout).await?;
        check_status(TOOL, &output)?;

        serde_json::from_slice(&output.stdout).map_err(|e| ToolError::Output {
            tool: TOOL.to_string(),
            message: format!("invalid JSON: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_base_args_without_cookies_uses_dev_null() {
        let args = YtDlp::base_args(&ToolOptions::default());
        assert_eq!(args, vec!["--no-playlist", "--cookies", "/dev/null", "--no-warnings"]);
    }

    #[test]
    fn test_base_args_with_headers_and_impersonation() {
        let options = ToolOptions {
            cookie_file: Some(PathBuf::from("/tmp/jar.txt")),
            headers: vec![("Referer".to_string(), "https://www.tiktok.com/".to_string())],
            impersonate: Some("chrome".to_string()),
        };
        let args = YtDlp::base_args(&options);

        assert!(args.windows(2).any(|w| w[0] == "--cookies" && w[1] == "/tmp/jar.txt"));
        assert!(args.windows(2).any(|w| w[0] == "--add-header" && w[1] == "Referer: https://www.tiktok.com/"));
        assert!(args.windows(2).any(|w| w[0] == "--extractor-args" && w[1] == "tiktok:impersonate=chrome"));
    }
}
