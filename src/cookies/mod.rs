use std::path::Path;

/// Name of the anti-bot token cookie that the web API also accepts as a query parameter.
pub const MS_TOKEN: &str = "msToken";

/// Cookies loaded from a Netscape-format cookie jar.
///
/// Insertion order is kept so the generated `Cookie` header is stable. The
/// jar is read whole for every session and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCookies {
    entries: Vec<(String, String)>,
}

impl SessionCookies {
    /// Load cookies from `path`.
    ///
    /// A missing or unreadable jar yields an empty set; callers must cope with zero cookies.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match fs_err::read_to_string(path) {
            Ok(content) => {
                let cookies = Self::parse(&content);
                tracing::debug!(
                    "Loaded {} cookies from {}, msToken={}",
                    cookies.len(),
                    path.display(),
                    cookies.ms_token().is_some()
                );
                cookies
            }
            Err(e) => {
                tracing::warn!("Failed to read cookie file: {}", e);
                Self::default()
            }
        }
    }

    /// Parse jar content. Malformed lines are skipped.
    pub fn parse(content: &str) -> Self {
        let mut cookies = Self::default();

        for line in content.lines() {
            let line = line.trim();
            let line = line.strip_prefix("#HttpOnly_").unwrap_or(line);

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() < 7 {
                continue;
            }

            cookies.insert(parts[5], parts[6]);
        }

        cookies
    }

    fn insert(&mut self, name: &str, value: &str) {
        match self.entries.iter_mut().find(|(existing, _)| existing == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    /// The `msToken` anti-bot token, if the jar carries a non-empty one.
    pub fn ms_token(&self) -> Option<&str> {
        self.get(MS_TOKEN).filter(|token| !token.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// `name=value` pairs joined with `"; "`, empty when there are no cookies.
    pub fn to_header(&self) -> String {
        self.iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
