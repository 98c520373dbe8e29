use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::PipelineError;

/// Prefix marking a handle that already is a resolved stable user id.
pub const STABLE_ID_PREFIX: &str = "tiktokuser:";

const BASE_URL: &str = "https://www.tiktok.com";

static VIDEO_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/video/(\d+)").unwrap());
static HANDLE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@([^/?#]+)").unwrap());

/// A single video on the platform, derived from an input URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReference {
    id: String,
    canonical_url: Option<String>,
    handle: Option<String>,
}

impl VideoReference {
    /// Parse a reference out of an arbitrary video URL.
    ///
    /// Fails when no numeric video id can be found; nothing is fetched.
    pub fn parse(input: &str) -> Result<Self, PipelineError> {
        let input = input.trim();

        let id = VIDEO_ID_REGEX
            .captures(input)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                PipelineError::ReferenceInvalid(format!("no numeric video id in '{}'", input))
            })?;

        let handle = extract_handle(input);

        let canonical_url = if input.starts_with("http://") || input.starts_with("https://") {
            Some(input.to_string())
        } else {
            handle
                .as_ref()
                .map(|handle| format!("{}/@{}/video/{}", BASE_URL, handle, id))
        };

        Ok(Self {
            id,
            canonical_url,
            handle,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    pub fn canonical_url(&self) -> Option<&str> {
        self.canonical_url.as_deref()
    }

    /// The page URL, falling back to the handle-less share form.
    pub fn page_url(&self) -> String {
        self.canonical_url
            .clone()
            .unwrap_or_else(|| format!("{}/video/{}", BASE_URL, self.id))
    }
}

impl fmt::Display for VideoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.page_url())
    }
}

/// Extract the `@handle` segment of a URL, percent-decoded.
pub fn extract_handle(input: &str) -> Option<String> {
    let raw = HANDLE_REGEX.captures(input)?.get(1)?.as_str();
    let decoded = urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    Some(decoded).filter(|h| !h.is_empty())
}

/// Reduce user input (profile URL, `@handle`, bare handle) to a bare handle.
///
/// Stable-id sentinels pass through untouched.
pub fn normalize_handle(input: &str) -> String {
    let input = input.trim();

    if input.starts_with(STABLE_ID_PREFIX) {
        return input.to_string();
    }

    if input.contains("tiktok.com/") {
        if let Some(handle) = extract_handle(input) {
            return handle;
        }
    }

    input.strip_prefix('@').unwrap_or(input).to_string()
}

/// Profile page URL for a handle or stable-id sentinel.
pub fn profile_url(handle: &str) -> String {
    if handle.starts_with(STABLE_ID_PREFIX) {
        handle.to_string()
    } else {
        format!("{}/@{}", BASE_URL, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_url() {
        let reference =
            VideoReference::parse("https://www.tiktok.com/@some.user/video/7000000000000000001?lang=en").unwrap();

        assert_eq!(reference.id(), "7000000000000000001");
        assert_eq!(reference.handle(), Some("some.user"));
        assert_eq!(
            reference.canonical_url(),
            Some("https://www.tiktok.com/@some.user/video/7000000000000000001?lang=en")
        );
    }

    #[test]
    fn test_parse_without_id_is_invalid() {
        let err = VideoReference::parse("https://www.tiktok.com/@some.user").unwrap_err();
        assert!(matches!(err, PipelineError::ReferenceInvalid(_)));

        assert!(VideoReference::parse("").is_err());
        assert!(VideoReference::parse("https://www.tiktok.com/@u/video/abc").is_err());
    }

    #[test]
    fn test_handle_is_percent_decoded() {
        assert_eq!(
            extract_handle("https://www.tiktok.com/@caf%C3%A9/video/1"),
            Some("café".to_string())
        );
    }

    #[test]
    fn test_normalize_handle() {
        assert_eq!(normalize_handle("@someone"), "someone");
        assert_eq!(normalize_handle("https://www.tiktok.com/@someone?lang=en"), "someone");
        assert_eq!(normalize_handle("someone"), "someone");
        assert_eq!(normalize_handle("tiktokuser:MS4wLjAB"), "tiktokuser:MS4wLjAB");
    }

    #[test]
    fn test_profile_url() {
        assert_eq!(profile_url("someone"), "https://www.tiktok.com/@someone");
        assert_eq!(profile_url("tiktokuser:abc"), "tiktokuser:abc");
    }
}
