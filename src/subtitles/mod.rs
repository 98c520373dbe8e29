//! Caption tracks as a fallback when no audio can be acquired.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::config::Config;
use crate::http::FetchRequest;
use crate::platform::PlatformClient;
use crate::reference::VideoReference;
use crate::tools::{ExtractionTool, ToolOptions};
use crate::PipelineError;

/// Track formats we know how to flatten, in order of preference
const CAPTION_FORMATS: &[&str] = &["vtt", "srt"];

/// Flattened caption text of one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Captions {
    pub text: String,
    pub language: String,
    pub format: String,
}

/// Looks up caption tracks through the extraction tool and downloads one.
pub struct SubtitleFetcher {
    tool: Arc<dyn ExtractionTool>,
    client: PlatformClient,
    preferred_languages: Vec<String>,
}

impl SubtitleFetcher {
    pub fn new(config: &Config, tool: Arc<dyn ExtractionTool>, client: PlatformClient) -> Self {
        Self {
            tool,
            client,
            preferred_languages: config.app.caption_languages.clone(),
        }
    }

    /// Fetch captions for `reference`, honouring a language hint when that track exists.
    pub async fn fetch(&self, reference: &VideoReference, language: Option<&str>) -> Result<Captions, PipelineError> {
        let options = ToolOptions {
            cookie_file: self.client.cookie_file().cloned(),
            headers: vec![
                ("User-Agent".to_string(), self.client.user_agent().to_string()),
                ("Referer".to_string(), self.client.site_referer()),
            ],
            impersonate: None,
        };

        let info = self
            .tool
            .dump_info(&reference.page_url(), &options, false, None)
            .await
            .map_err(|e| PipelineError::NoSubtitles(format!("metadata unavailable: {}", e)))?;

        let tracks = caption_tracks(&info)
            .ok_or_else(|| PipelineError::NoSubtitles(format!("video {} has no caption tracks", reference.id())))?;

        let language = choose_language(tracks, language, &self.preferred_languages)
            .ok_or_else(|| PipelineError::NoSubtitles("no caption language available".to_string()))?;

        let (url, format) = choose_track(&tracks[&language])
            .ok_or_else(|| PipelineError::NoSubtitles(format!("no vtt/srt track for '{}'", language)))?;

        tracing::info!("Downloading {} captions ({}) for {}", language, format, reference.id());

        let request = FetchRequest::new(url).header("User-Agent", self.client.user_agent());
        let raw = self
            .client
            .fetcher()
            .fetch(request)
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| PipelineError::NoSubtitles(format!("caption download failed: {}", e)))?
            .body;

        let text = flatten_cues(&raw);
        if text.is_empty() {
            return Err(PipelineError::NoSubtitles(format!("{} captions are empty", language)));
        }

        Ok(Captions {
            text,
            language,
            format: format.to_string(),
        })
    }
}

/// Manual subtitles, else automatic captions; `None` when neither has tracks.
fn caption_tracks(info: &Value) -> Option<&Map<String, Value>> {
    ["subtitles", "automatic_captions"]
        .iter()
        .filter_map(|key| info.get(*key)?.as_object())
        .find(|tracks| !tracks.is_empty())
}

/// Pick a track language: the hint, then the preferred list, then whatever comes first.
///
/// Hints are reduced to their primary subtag (`ro-md` becomes `ro`); `auto` means no hint.
pub fn choose_language(tracks: &Map<String, Value>, hint: Option<&str>, preferred: &[String]) -> Option<String> {
    let hint = hint
        .map(|h| h.split(['-', '_']).next().unwrap_or(h).to_lowercase())
        .filter(|h| !h.is_empty() && h != "auto");

    hint.into_iter()
        .chain(preferred.iter().cloned())
        .find(|lang| tracks.contains_key(lang))
        .or_else(|| tracks.keys().next().cloned())
}

/// URL and format of the best flattenable entry of a track list.
fn choose_track(entries: &Value) -> Option<(&str, &'static str)> {
    let entries = entries.as_array()?;

    CAPTION_FORMATS.iter().find_map(|format| {
        entries.iter().find_map(|entry| {
            let url = entry.get("url")?.as_str().filter(|url| !url.is_empty())?;
            (entry.get("ext")?.as_str()? == *format).then_some((url, *format))
        })
    })
}

/// Collapse a WebVTT or SubRip document into one line of spoken text.
pub fn flatten_cues(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with("WEBVTT") && !line.starts_with("NOTE"))
        .filter(|line| !line.chars().all(|c| c.is_ascii_digit()))
        .filter(|line| !line.contains("-->"))
        .collect::<Vec<_>>()
        .join(" ")
}
