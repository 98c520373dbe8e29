use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use super::SpeechModel;
use crate::acquire::AudioArtifact;
use crate::config::Config;
use crate::tools::{check_status, run_with_timeout, ToolError};

const TOOL: &str = "whisper-cli";
const OUTPUT_BASE: &str = "transcript";

/// whisper.cpp's command-line front end, loaded once per process.
pub struct WhisperCli {
    binary: String,
    model: PathBuf,
    timeout: Duration,
}

impl WhisperCli {
    pub fn new(config: &Config) -> Self {
        Self {
            binary: config.tools.whisper.clone(),
            model: config.tools.whisper_model.clone(),
            timeout: Duration::from_secs(config.timeouts.speech_secs),
        }
    }

    pub fn model(&self) -> &Path {
        &self.model
    }

    fn args(&self, wav: &Path, output_base: &Path, language: Option<&str>) -> Vec<String> {
        vec![
            "-m".to_string(),
            self.model.to_string_lossy().into_owned(),
            "-f".to_string(),
            wav.to_string_lossy().into_owned(),
            "-l".to_string(),
            language.unwrap_or("auto").to_string(),
            "-otxt".to_string(),
            "-of".to_string(),
            output_base.to_string_lossy().into_owned(),
            "-np".to_string(),
        ]
    }
}

#[async_trait]
impl SpeechModel for WhisperCli {
    async fn transcribe(&self, audio: &AudioArtifact, language: Option<String>) -> Result<String, ToolError> {
        let output_base = audio.workspace().join(OUTPUT_BASE);
        let args = self.args(audio.wav_path(), &output_base, language.as_deref());

        tracing::info!(
            "Running {} on {:.1}s of audio (language: {})",
            self.binary,
            audio.duration(),
            language.as_deref().unwrap_or("auto")
        );

        let mut command = Command::new(&self.binary);
        command.args(&args);

        let output = run_with_timeout(TOOL, command, self.timeout).await?;
        check_status(TOOL, &output)?;

        let text_path = output_base.with_extension("txt");
        let raw = fs_err::read_to_string(&text_path).map_err(|e| ToolError::Output {
            tool: TOOL.to_string(),
            message: format!("no transcript written: {}", e),
        })?;

        Ok(join_lines(&raw))
    }
}

/// whisper.cpp writes one segment per line
fn join_lines(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
