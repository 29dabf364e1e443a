//! Audio file handling for speech synthesis and transcription.
//!
//! Audio is treated as opaque bytes; no decoding happens here.

use crate::error::{AiError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Container format requested for synthesized speech.
pub const SPEECH_FORMAT: &str = "wav";

/// Audio handed to [`AiManager::transcribe_audio`](crate::manager::AiManager::transcribe_audio).
#[derive(Debug, Clone, PartialEq)]
pub enum AudioInput {
    /// Encoded audio already in memory.
    Bytes(Vec<u8>),
    /// An audio file on disk.
    Path(PathBuf),
}

impl AudioInput {
    /// Read the audio and pick an upload file name.
    pub async fn load(self) -> Result<(Vec<u8>, String)> {
        let (audio, file_name) = match self {
            AudioInput::Bytes(bytes) => (bytes, format!("audio.{}", SPEECH_FORMAT)),
            AudioInput::Path(path) => {
                if !path.is_file() {
                    return Err(AiError::InvalidInput(format!(
                        "audio file not found: {}",
                        path.display()
                    )));
                }
                let file_name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("audio.wav")
                    .to_string();
                (tokio::fs::read(&path).await?, file_name)
            }
        };
        if audio.is_empty() {
            return Err(AiError::InvalidInput("audio input is empty".into()));
        }
        Ok((audio, file_name))
    }
}

/// `<output_dir>/speech/speech_<8 hex digits>.wav`
pub fn default_speech_path(output_dir: &Path) -> PathBuf {
    output_dir
        .join("speech")
        .join(format!("speech_{:08x}.{}", fastrand::u32(..), SPEECH_FORMAT))
}

/// Write audio bytes, creating parent directories as needed.
pub async fn write_audio(path: &Path, audio: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, audio).await?;
    debug!(path = %path.display(), bytes = audio.len(), "audio written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_speech_path_shape() {
        let path = default_speech_path(Path::new("out"));
        assert_eq!(path.parent(), Some(Path::new("out/speech")));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("speech_"));
        assert!(name.ends_with(".wav"));
        assert_eq!(name.len(), "speech_".len() + 8 + ".wav".len());
    }

    #[tokio::test]
    async fn test_write_audio_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/clip.wav");
        write_audio(&path, b"RIFF").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF");
    }

    #[tokio::test]
    async fn test_load_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.mp3");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let (bytes, name) = AudioInput::Path(path).load().await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(name, "note.mp3");

        let (_, name) = AudioInput::Bytes(vec![9]).load().await.unwrap();
        assert_eq!(name, "audio.wav");
    }

    #[tokio::test]
    async fn test_load_rejects_missing_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = AudioInput::Path(dir.path().join("absent.wav")).load().await;
        assert!(matches!(missing, Err(AiError::InvalidInput(_))));

        tokio_test::assert_err!(AudioInput::Bytes(Vec::new()).load().await);
    }
}
