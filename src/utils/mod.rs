use crate::config::Config;

/// First `max_chars` characters of `text`, for log lines.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Largest char boundary in `text` that is `<= idx`.
pub fn floor_char_boundary(text: &str, idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    let mut idx = idx;
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Check if the current environment has required tools
pub async fn check_dependencies(config: &Config) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(&config.tools.yt_dlp, "--version").await {
        missing.push(format!("{} - required for URL resolution and audio extraction", config.tools.yt_dlp));
    }

    if !check_command_available(&config.tools.ffmpeg, "-version").await {
        missing.push(format!("{} - required for audio transcoding", config.tools.ffmpeg));
    }

    if !check_command_available(&config.tools.whisper, "--help").await {
        missing.push(format!("{} - required for speech-to-text", config.tools.whisper));
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str, probe_arg: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg(probe_arg)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.0), "30s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3661.0), "1h 1m 1s");
    }

    #[test]
    fn test_preview_respects_chars() {
        assert_eq!(preview("abcdef", 3), "abc");
        assert_eq!(preview("ăîșțâ", 2), "ăî");
        assert_eq!(preview("ab", 10), "ab");
    }

    #[test]
    fn test_floor_char_boundary() {
        let text = "aă";
        assert_eq!(floor_char_boundary(text, 2), 1);
        assert_eq!(floor_char_boundary(text, 99), text.len());
        assert_eq!(floor_char_boundary(text, 0), 0);
    }
}
