use url::Url;

const ESCAPES: &[(&str, &str)] = &[("\\u0026", "&"), ("\\/", "/")];

/// Canonicalize a resolved media URL.
///
/// Trims whitespace and wrapping quotes, undoes the JSON escapes the platform
/// leaves in embedded URLs and repairs truncated hosts (`www.tiktok.` or
/// `www.tiktok` become `www.tiktok.com`). Strings that do not parse as URLs
/// come back cleaned but otherwise untouched. Applying it twice changes nothing.
pub fn normalize(raw: &str) -> Option<String> {
    let cleaned = unescape(strip_wrapping(raw));
    let cleaned = strip_wrapping(&cleaned);
    if cleaned.is_empty() {
        return None;
    }

    let Ok(mut url) = Url::parse(cleaned) else {
        return Some(cleaned.to_string());
    };

    let Some(host) = url.host_str() else {
        return Some(cleaned.to_string());
    };

    let mut fixed = host.trim_end_matches('.').to_string();
    if fixed.ends_with("tiktok") {
        fixed.push_str(".com");
    }
    if fixed == host {
        return Some(cleaned.to_string());
    }

    match url.set_host(Some(&fixed)) {
        Ok(()) => Some(url.into()),
        Err(_) => Some(cleaned.to_string()),
    }
}

fn strip_wrapping(raw: &str) -> &str {
    let mut current = raw;
    loop {
        let next = current.trim().trim_matches(|c| c == '"' || c == '\'');
        if next == current {
            return current;
        }
        current = next;
    }
}

fn unescape(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = ESCAPES
            .iter()
            .fold(current.clone(), |acc, (from, to)| acc.replace(from, to));
        if next == current {
            return current;
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("  \"\"  "), None);
    }

    #[test]
    fn test_escapes_and_quotes() {
        assert_eq!(
            normalize(r#" "https:\/\/v16.tiktokcdn.com\/video.mp4?a=1&b=2" "#).as_deref(),
            Some("https://v16.tiktokcdn.com/video.mp4?a=1&b=2")
        );
    }

    #[test]
    fn test_host_repair() {
        assert_eq!(
            normalize("https://www.tiktok./@u/video/1").as_deref(),
            Some("https://www.tiktok.com/@u/video/1")
        );
        assert_eq!(
            normalize("https://www.tiktok/@u/video/1").as_deref(),
            Some("https://www.tiktok.com/@u/video/1")
        );
        assert_eq!(
            normalize("https://cdn.example.com./v.mp4").as_deref(),
            Some("https://cdn.example.com/v.mp4")
        );
    }

    #[test]
    fn test_unparseable_is_returned_cleaned() {
        assert_eq!(normalize("'not a url'").as_deref(), Some("not a url"));
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "https://cdn.example/video.mp4",
            r#""https:\/\/www.tiktok.\/@a\/video\/1?x=1&y=2""#,
            "https://www.tiktok/@u/video/1",
            r"https:\\/\\/cdn.example\\/v.mp4",
            "' \"quoted\" '",
            "relative/path",
            "https://cdn.example/a b",
        ];

        for input in inputs {
            let once = normalize(input);
            let twice = once.as_deref().and_then(normalize);
            assert_eq!(once, twice, "normalize is not idempotent for {:?}", input);
        }
    }
}
