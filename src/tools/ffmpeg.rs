use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

use super::{check_status, run_with_timeout, ToolError, Transcoder, DECODE_SAMPLE_RATE};
use crate::config::Config;

const TOOL: &str = "ffmpeg";

/// ffmpeg driven as a subprocess
pub struct Ffmpeg {
    ffmpeg_path: String,
    timeout: Duration,
}

impl Ffmpeg {
    pub fn new(config: &Config) -> Self {
        Self {
            ffmpeg_path: config.tools.ffmpeg.clone(),
            timeout: Duration::from_secs(config.timeouts.transcode_secs),
        }
    }

    /// CRLF-terminated header block for ffmpeg's `-headers` option
    fn header_block(headers: &[(String, String)]) -> String {
        headers
            .iter()
            .map(|(name, value)| format!("{}: {}\r\n", name, value))
            .collect()
    }

    /// Output arguments converting the input to an MP3 audio track
    fn mp3_output_args(output: &Path) -> Vec<String> {
        vec![
            "-vn".to_string(), // No video
            "-acodec".to_string(),
            "libmp3lame".to_string(),
            "-q:a".to_string(),
            "2".to_string(),
            output.to_string_lossy().into_owned(),
        ]
    }

    async fn run(&self, args: Vec<String>) -> Result<(), ToolError> {
        let mut command = Command::new(&self.ffmpeg_path);
        command.arg("-y").args(args);

        let output = run_with_timeout(TOOL, command, self.timeout).await?;
        check_status(TOOL, &output)
    }
}

#[async_trait]
impl Transcoder for Ffmpeg {
    async fn transcode_url(&self, url: &str, headers: &[(String, String)], output: &Path) -> Result<(), ToolError> {
        tracing::debug!("Transcoding remote media with ffmpeg: {}", crate::utils::preview(url, 80));

        let mut args = Vec::new();
        if !headers.is_empty() {
            args.push("-headers".to_string());
            args.push(Self::header_block(headers));
        }
        args.extend(["-i".to_string(), url.to_string()]);
        args.extend(Self::mp3_output_args(output));

        self.run(args).await
    }

    async fn transcode_file(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        tracing::debug!("Converting {} to MP3", input.display());

        let mut args = vec!["-i".to_string(), input.to_string_lossy().into_owned()];
        args.extend(Self::mp3_output_args(output));

        self.run(args).await
    }

    async fn decode_samples(&self, input: &Path, wav_output: &Path) -> Result<Vec<f32>, ToolError> {
        tracing::debug!("Decoding {} to {} Hz mono PCM", input.display(), DECODE_SAMPLE_RATE);

        self.run(vec![
            "-i".to_string(),
            input.to_string_lossy().into_owned(),
            "-vn".to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-ar".to_string(),
            DECODE_SAMPLE_RATE.to_string(),
            "-acodec".to_string(),
            "pcm_s16le".to_string(),
            wav_output.to_string_lossy().into_owned(),
        ])
        .await?;

        read_wav_samples(wav_output)
    }
}

/// Read a 16-bit PCM WAV file into normalized `f32` samples.
pub fn read_wav_samples(path: &Path) -> Result<Vec<f32>, ToolError> {
    let output_error = |message: String| ToolError::Output {
        tool: TOOL.to_string(),
        message,
    };

    let mut reader = hound::WavReader::open(path)
        .map_err(|e| output_error(format!("unreadable WAV {}: {}", path.display(), e)))?;

    reader
        .samples::<i16>()
        .map(|sample| sample.map(|s| s as f32 / i16::MAX as f32))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| output_error(format!("corrupt WAV {}: {}", path.display(), e)))
}
