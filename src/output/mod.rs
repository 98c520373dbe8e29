use anyhow::Result;
use console::style;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::platform::VideoListingEntry;
use crate::transcribe::{TranscriptSource, TranscriptionResult};

/// Render a transcription result
pub fn format_transcript(result: &TranscriptionResult, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => result.text.clone(),
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
    })
}

/// Render a video listing
pub fn format_videos(videos: &[VideoListingEntry], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(videos)?);
    }

    let lines: Vec<String> = videos
        .iter()
        .map(|video| {
            let date = video
                .created_at
                .map(|at| at.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "----------".to_string());
            format!(
                "{}  {}  {}\n    {}",
                date,
                video.id,
                video.title,
                video.url.as_deref().unwrap_or("-")
            )
        })
        .collect();

    Ok(lines.join("\n"))
}

/// Save transcription result to file
pub async fn save_to_file(result: &TranscriptionResult, path: &Path, format: OutputFormat) -> Result<()> {
    let content = format_transcript(result, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print transcription result to console
pub fn print_to_console(result: &TranscriptionResult, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Text && result.source == TranscriptSource::Captions {
        eprintln!(
            "{}",
            style(format!(
                "(from {} captions, no audio transcription)",
                result.language.as_deref().unwrap_or("unknown")
            ))
            .yellow()
        );
    }

    println!("{}", format_transcript(result, format)?);
    Ok(())
}

/// Print a video listing to console
pub fn print_videos(videos: &[VideoListingEntry], format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Text {
        eprintln!("{}", style(format!("{} videos", videos.len())).bold());
    }

    println!("{}", format_videos(videos, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::VideoStatus;
    use chrono::{TimeZone, Utc};

    fn video() -> VideoListingEntry {
        VideoListingEntry {
            id: "7000000000000000001".to_string(),
            url: Some("https://www.tiktok.com/@u/video/7000000000000000001".to_string()),
            direct_url: None,
            title: "Salut".to_string(),
            created_at: Some(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()),
            duration: Some(12.0),
            status: VideoStatus::Pending,
        }
    }

    #[test]
    fn test_text_listing() {
        let text = format_videos(&[video()], OutputFormat::Text).unwrap();
        assert_eq!(
            text,
            "2024-03-15  7000000000000000001  Salut\n    https://www.tiktok.com/@u/video/7000000000000000001"
        );
    }

    #[test]
    fn test_json_listing_uses_camel_case() {
        let json = format_videos(&[video()], OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["status"], "pending");
        assert!(parsed[0]["createdAt"].as_str().unwrap().starts_with("2024-03-15"));
    }

    #[tokio::test]
    async fn test_save_transcript_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let result = TranscriptionResult {
            video_id: "1".to_string(),
            text: "hello".to_string(),
            source: TranscriptSource::Speech,
            language: None,
            audio_seconds: Some(3.5),
        };

        save_to_file(&result, &path, OutputFormat::Json).await.unwrap();
        let saved: serde_json::Value = serde_json::from_str(&fs_err::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["videoId"], "1");
        assert_eq!(saved["source"], "speech");
        assert_eq!(saved["audioSeconds"], 3.5);
    }
}
