//! Composer error types.

use epi_media::MediaError;
use epi_timeline::TimelineError;
use thiserror::Error;

pub type ComposerResult<T> = Result<T, ComposerError>;

#[derive(Debug, Error)]
pub enum ComposerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to resolve entry {entry_index} ({source_name}): {error}")]
    Resolve {
        entry_index: usize,
        source_name: String,
        #[source]
        error: MediaError,
    },

    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ComposerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn resolve(entry_index: usize, source_name: impl Into<String>, error: MediaError) -> Self {
        Self::Resolve {
            entry_index,
            source_name: source_name.into(),
            error,
        }
    }

    /// Remediation for timeline failures, for the caller to surface.
    pub fn remediation(&self, target_frames: u64) -> Option<String> {
        match self {
            ComposerError::Timeline(err) => Some(err.remediation(target_frames)),
            ComposerError::Resolve { entry_index, .. } => {
                Some(format!("check the source of script entry {}", entry_index))
            }
            _ => None,
        }
    }
}
