//! Audio extraction stage.
//!
//! Recordings arrive as either bare audio or a container (mp4/mkv/webm/mov)
//! that must be demuxed before the recognizer will accept it. The ffmpeg
//! implementation shells out to a binary found on PATH.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Container extensions that need demuxing before transcription.
const CONTAINER_EXTENSIONS: [&str; 4] = ["mp4", "mkv", "webm", "mov"];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("ffmpeg not found on PATH")]
    BinaryMissing,
    #[error("Input file not found: {0}")]
    InputMissing(PathBuf),
    #[error("Extraction failed: {0}")]
    Failed(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Optional caller-provided knowledge about the input format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AudioHint {
    /// Decide from the file extension.
    #[default]
    Auto,
    /// Input is already bare audio; pass through.
    AudioOnly,
    /// Input is a container; always demux.
    Container,
}

/// Produces a recognizer-ready audio file from an uploaded media file.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Return the path of a bare audio file for `input`, demuxing if needed.
    async fn ensure_audio_extracted(
        &self,
        input: &Path,
        hint: AudioHint,
    ) -> Result<PathBuf, ExtractError>;
}

/// Whether a path looks like a container needing demuxing.
pub(crate) fn is_container(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            CONTAINER_EXTENSIONS.iter().any(|c| *c == e)
        })
        .unwrap_or(false)
}

/// ffmpeg-based extractor. Copies the audio stream without re-encoding.
pub struct FfmpegExtractor;

impl FfmpegExtractor {
    pub fn new() -> Self {
        Self
    }

    fn binary() -> Result<PathBuf, ExtractError> {
        which::which("ffmpeg").map_err(|_| ExtractError::BinaryMissing)
    }
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioExtractor for FfmpegExtractor {
    async fn ensure_audio_extracted(
        &self,
        input: &Path,
        hint: AudioHint,
    ) -> Result<PathBuf, ExtractError> {
        if !input.exists() {
            return Err(ExtractError::InputMissing(input.to_path_buf()));
        }

        let demux = match hint {
            AudioHint::AudioOnly => false,
            AudioHint::Container => true,
            AudioHint::Auto => is_container(input),
        };
        if !demux {
            return Ok(input.to_path_buf());
        }

        let output = input.with_extension("m4a");
        let ffmpeg = Self::binary()?;
        debug!(input = %input.display(), output = %output.display(), "Demuxing audio");

        let result = Command::new(&ffmpeg)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-vn")
            .arg("-acodec")
            .arg("copy")
            .arg(&output)
            .output()
            .await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ExtractError::Failed(
                stderr.lines().last().unwrap_or("unknown error").to_string(),
            ));
        }
        Ok(output)
    }
}
