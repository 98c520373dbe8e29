//! Direct-media URL extraction from API items and scraped HTML.
//!
//! The platform ships video state in several shapes depending on the page
//! generation: a JSON rehydration script, an older `SIGI_STATE` script, a
//! loose JavaScript assignment, or just fragments in the markup. Each shape
//! has its own stage here, tried in a fixed priority order.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

pub mod tree;

const PLAY_KEYS: &[&str] = &["playAddr", "play_addr"];
const DOWNLOAD_KEYS: &[&str] = &["downloadAddr", "download_addr"];
const URL_LIST_KEYS: &[&str] = &["urlList", "url_list"];

/// Characters searched before the first address key in the last-resort scan
const WINDOW_BEFORE: usize = 2_000;
/// Characters searched after it
const WINDOW_AFTER: usize = 120_000;

static REHYDRATION_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)id="__UNIVERSAL_DATA_FOR_REHYDRATION__"\s*type="application/json"\s*>(.*?)</script>"#).unwrap()
});
static SIGI_SCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)id="SIGI_STATE"[^>]*>(.*?)</script>"#).unwrap());
static REHYDRATION_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)__UNIVERSAL_DATA_FOR_REHYDRATION__\s*=\s*(\{.*?\})\s*;</script>"#).unwrap()
});
static LITERAL_ADDRESSES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#""playAddr":"(.*?)""#,
        r#""downloadAddr":"(.*?)""#,
        r#""playAddr"\s*:\s*\{"urlList":\["(.*?)""#,
        r#""downloadAddr"\s*:\s*\{"urlList":\["(.*?)""#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});
static LOOSE_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>]+"#).unwrap());

/// Direct URL of a structured item payload (API item, `itemStruct`, `ItemModule` entry).
///
/// The play address wins over the download address. Either may be a bare
/// string or an object carrying a URL list.
pub fn extract_direct_url(item: &Value) -> Option<String> {
    let video = item.get("video")?;

    [PLAY_KEYS, DOWNLOAD_KEYS]
        .iter()
        .filter_map(|keys| tree::first_field(video, keys))
        .find_map(address_url)
}

fn address_url(address: &Value) -> Option<String> {
    match address {
        Value::String(url) if !url.is_empty() => Some(url.clone()),
        Value::Object(_) => tree::first_field(address, URL_LIST_KEYS)?
            .as_array()?
            .iter()
            .filter_map(Value::as_str)
            .find(|url| !url.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// Direct URL scraped out of a video page, trying each embedded-state shape in priority order.
pub fn extract_from_html(html: &str) -> Option<String> {
    let stages: [(&str, fn(&str) -> Option<String>); 5] = [
        ("rehydration-script", from_rehydration_script),
        ("sigi-state", from_sigi_state),
        ("rehydration-assignment", from_rehydration_assignment),
        ("literal-address", from_literal_address),
        ("address-window", from_address_window),
    ];

    stages.iter().find_map(|(name, stage)| {
        let url = stage(html)?;
        tracing::debug!("HTML extraction matched via {}: {}", name, crate::utils::preview(&url, 120));
        Some(url)
    })
}

fn parse_capture(regex: &Regex, html: &str) -> Option<Value> {
    let raw = regex.captures(html)?.get(1)?.as_str();
    serde_json::from_str(raw)
        .map_err(|e| tracing::debug!("Embedded JSON did not parse: {}", e))
        .ok()
}

fn from_rehydration_script(html: &str) -> Option<String> {
    deep_address(&parse_capture(&REHYDRATION_SCRIPT, html)?)
}

/// First absolute play or download address anywhere in a state blob
fn deep_address(data: &Value) -> Option<String> {
    let mut candidates = tree::find_key(data, "playAddr");
    candidates.extend(tree::find_key(data, "downloadAddr"));

    candidates.into_iter().find_map(|candidate| match candidate {
        Value::String(url) if url.starts_with("http") => Some(url.clone()),
        Value::Object(_) => tree::first_field(candidate, URL_LIST_KEYS)?
            .as_array()?
            .iter()
            .filter_map(Value::as_str)
            .find(|url| url.starts_with("http"))
            .map(str::to_string),
        _ => None,
    })
}

fn from_sigi_state(html: &str) -> Option<String> {
    let data = parse_capture(&SIGI_SCRIPT, html)?;
    data.get("ItemModule")
        .and_then(Value::as_object)
        .and_then(|items| items.values().find_map(extract_direct_url))
        .or_else(|| deep_address(&data))
}

fn from_rehydration_assignment(html: &str) -> Option<String> {
    let data = parse_capture(&REHYDRATION_ASSIGNMENT, html)?;
    extract_direct_url(tree::find_object(&data, "itemStruct")?)
}

fn from_literal_address(html: &str) -> Option<String> {
    LITERAL_ADDRESSES.iter().find_map(|pattern| {
        let raw = pattern.captures(html)?.get(1)?.as_str();
        let decoded = serde_json::from_str::<String>(&format!("\"{}\"", raw))
            .unwrap_or_else(|_| raw.to_string());
        Some(decoded).filter(|url| !url.is_empty())
    })
}

fn from_address_window(html: &str) -> Option<String> {
    let hint = html.find("playAddr").or_else(|| html.find("downloadAddr"))?;

    let start = crate::utils::floor_char_boundary(html, hint.saturating_sub(WINDOW_BEFORE));
    let end = crate::utils::floor_char_boundary(html, hint.saturating_add(WINDOW_AFTER));

    LOOSE_URL
        .find(&html[start..end])
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rehydration_html(url: &str) -> String {
        format!(
            r#"<script id="__UNIVERSAL_DATA_FOR_REHYDRATION__" type="application/json">{{"__DEFAULT_SCOPE__":{{"webapp.video-detail":{{"itemInfo":{{"itemStruct":{{"video":{{"playAddr":"{}"}}}}}}}}}}}}</script>"#,
            url
        )
    }

    fn sigi_html(url: &str) -> String {
        format!(
            r#"<script id="SIGI_STATE" type="application/json">{{"ItemModule":{{"7000":{{"video":{{"downloadAddr":{{"urlList":["{}"]}}}}}}}}}}</script>"#,
            url
        )
    }

    #[test]
    fn test_item_prefers_play_address() {
        let item = json!({"video": {
            "playAddr": "https://cdn.example/play.mp4",
            "downloadAddr": "https://cdn.example/download.mp4"
        }});
        assert_eq!(extract_direct_url(&item).as_deref(), Some("https://cdn.example/play.mp4"));
    }

    #[test]
    fn test_item_falls_back_to_download_url_list() {
        let item = json!({"video": {
            "playAddr": "",
            "download_addr": {"url_list": ["https://cdn.example/download.mp4", "https://cdn.example/other.mp4"]}
        }});
        assert_eq!(extract_direct_url(&item).as_deref(), Some("https://cdn.example/download.mp4"));
    }

    #[test]
    fn test_item_with_empty_addresses() {
        assert_eq!(extract_direct_url(&json!({"video": {"playAddr": {"urlList": []}}})), None);
        assert_eq!(extract_direct_url(&json!({"id": "1"})), None);
    }

    #[test]
    fn test_rehydration_blob_wins_over_legacy_state() {
        let html = format!(
            "<html>{}{}</html>",
            sigi_html("https://cdn.example/legacy.mp4"),
            rehydration_html("https://cdn.example/rehydrated.mp4")
        );
        assert_eq!(extract_from_html(&html).as_deref(), Some("https://cdn.example/rehydrated.mp4"));
    }

    #[test]
    fn test_legacy_state_used_when_rehydration_missing() {
        let html = format!("<html>{}</html>", sigi_html("https://cdn.example/legacy.mp4"));
        assert_eq!(extract_from_html(&html).as_deref(), Some("https://cdn.example/legacy.mp4"));
    }

    #[test]
    fn test_rehydration_blob_without_http_falls_through() {
        let html = format!(
            "{}{}",
            rehydration_html("relative/path"),
            sigi_html("https://cdn.example/legacy.mp4")
        );
        assert_eq!(extract_from_html(&html).as_deref(), Some("https://cdn.example/legacy.mp4"));
    }

    #[test]
    fn test_rehydration_assignment() {
        let html = r#"<script>window.__UNIVERSAL_DATA_FOR_REHYDRATION__ = {"scope":{"itemInfo":{"itemStruct":{"video":{"playAddr":{"urlList":["https://cdn.example/assigned.mp4"]}}}}}};</script>"#;
        assert_eq!(extract_from_html(html).as_deref(), Some("https://cdn.example/assigned.mp4"));
    }

    #[test]
    fn test_literal_address_is_json_decoded() {
        let html = r#"<div data-x='{"playAddr":"https:\/\/cdn.example\/v.mp4?a=1&b=2"}'></div>"#;
        assert_eq!(extract_from_html(html).as_deref(), Some("https://cdn.example/v.mp4?a=1&b=2"));
    }

    #[test]
    fn test_literal_address_list_form() {
        let html = r#"<div>"downloadAddr": {"urlList":["https://cdn.example/list.mp4"]}</div>"#;
        assert_eq!(extract_from_html(html).as_deref(), Some("https://cdn.example/list.mp4"));
    }

    #[test]
    fn test_address_window_heuristic() {
        let html = format!("playAddr={}<a href='https://cdn.example/near.mp4'>", "x".repeat(500));
        assert_eq!(extract_from_html(&html).as_deref(), Some("https://cdn.example/near.mp4"));
    }

    #[test]
    fn test_address_window_is_bounded() {
        let html = format!("playAddr{}https://cdn.example/far.mp4", " ".repeat(WINDOW_AFTER + 10));
        assert_eq!(extract_from_html(&html), None);
    }

    #[test]
    fn test_address_window_ignores_urls_far_before_key() {
        let html = format!("https://cdn.example/far.mp4{}playAddr", " ".repeat(WINDOW_BEFORE + 10));
        assert_eq!(extract_from_html(&html), None);

        let html = format!("https://cdn.example/near.mp4{}playAddr", " ".repeat(WINDOW_BEFORE - 100));
        assert_eq!(extract_from_html(&html).as_deref(), Some("https://cdn.example/near.mp4"));
    }

    #[test]
    fn test_empty_literal_play_address_falls_through() {
        let html = r#"<div>"playAddr":"","downloadAddr":{"urlList":["https://cdn.example/dl.mp4"]}</div>"#;
        assert_eq!(extract_from_html(html).as_deref(), Some("https://cdn.example/dl.mp4"));
    }

    #[test]
    fn test_legacy_state_searched_outside_item_module() {
        let html = r#"<script id="SIGI_STATE" type="application/json">{"VideoPage":{"detail":{"video":{"playAddr":{"urlList":["https://cdn.example/nested.mp4"]}}}}}</script>"#;
        assert_eq!(extract_from_html(html).as_deref(), Some("https://cdn.example/nested.mp4"));
    }

    #[test]
    fn test_nothing_found() {
        assert_eq!(extract_from_html("<html><body>nothing</body></html>"), None);
        assert_eq!(extract_from_html(r#"<script id="SIGI_STATE">{not json</script>"#), None);
    }
}
