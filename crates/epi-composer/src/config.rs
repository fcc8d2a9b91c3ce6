//! Composer configuration.

use std::path::PathBuf;
use std::str::FromStr;

use epi_media::DEFAULT_CACHE_PATH;
use epi_timeline::DEFAULT_MAX_SAFE_RATE;

use crate::error::{ComposerError, ComposerResult};

/// How narration durations are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeechMode {
    /// Synthesize on the TTS server and probe the audio.
    #[default]
    Tts,
    /// Estimate from text length.
    Estimate,
}

impl FromStr for SpeechMode {
    type Err = ComposerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tts" => Ok(Self::Tts),
            "estimate" => Ok(Self::Estimate),
            other => Err(ComposerError::config_error(format!(
                "unknown speech mode '{}', expected 'tts' or 'estimate'",
                other
            ))),
        }
    }
}

/// Composer configuration.
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Output frame rate
    pub fps: f64,
    /// Highest playback rate for safe acceleration
    pub max_safe_rate: f64,
    /// Maximum script entries probed concurrently
    pub probe_parallelism: usize,
    /// Directory script sources are resolved against
    pub media_root: PathBuf,
    /// Metadata cache file
    pub cache_path: PathBuf,
    /// TTS server endpoint
    pub tts_url: String,
    /// TTS voice
    pub tts_voice: String,
    /// Narration duration source
    pub speech_mode: SpeechMode,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            fps: 24.0,
            max_safe_rate: DEFAULT_MAX_SAFE_RATE,
            probe_parallelism: 4,
            media_root: PathBuf::from("./public"),
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            tts_url: "http://localhost:5500/api/tts".to_string(),
            tts_voice: "espeak:en#en-us".to_string(),
            speech_mode: SpeechMode::Tts,
        }
    }
}

impl ComposerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fps: std::env::var("EPI_FPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.fps),
            max_safe_rate: std::env::var("EPI_MAX_SAFE_RATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_safe_rate),
            probe_parallelism: std::env::var("EPI_PROBE_PARALLELISM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.probe_parallelism),
            media_root: std::env::var("EPI_MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_root),
            cache_path: std::env::var("EPI_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_path),
            tts_url: std::env::var("EPI_TTS_URL").unwrap_or(defaults.tts_url),
            tts_voice: std::env::var("EPI_TTS_VOICE").unwrap_or(defaults.tts_voice),
            speech_mode: std::env::var("EPI_SPEECH_MODE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.speech_mode),
        }
    }

    /// Reject values the timeline cannot work with.
    pub fn validate(&self) -> ComposerResult<()> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(ComposerError::config_error(format!(
                "fps must be positive, got {}",
                self.fps
            )));
        }
        if !self.max_safe_rate.is_finite() || self.max_safe_rate < 1.0 {
            return Err(ComposerError::config_error(format!(
                "max safe rate must be at least 1.0, got {}",
                self.max_safe_rate
            )));
        }
        if self.probe_parallelism == 0 {
            return Err(ComposerError::config_error(
                "probe parallelism must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ComposerConfig::default();
        assert_eq!(config.fps, 24.0);
        assert_eq!(config.max_safe_rate, 16.0);
        assert_eq!(config.cache_path, PathBuf::from("./cache/metaCache.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_speech_mode_parsing() {
        assert_eq!("tts".parse::<SpeechMode>().unwrap(), SpeechMode::Tts);
        assert_eq!(" Estimate ".parse::<SpeechMode>().unwrap(), SpeechMode::Estimate);
        assert!("espeak".parse::<SpeechMode>().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ComposerConfig {
            max_safe_rate: 0.5,
            ..ComposerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ComposerError::ConfigError(_))));

        let config = ComposerConfig {
            probe_parallelism: 0,
            ..ComposerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
