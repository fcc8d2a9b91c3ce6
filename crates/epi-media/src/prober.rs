//! Media prober abstraction.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use epi_models::MediaInfo;

use crate::error::{MediaError, MediaResult};
use crate::probe::probe_media;

/// Reports duration, resolution and seekability of a script source.
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, source: &str) -> MediaResult<MediaInfo>;
}

#[async_trait]
impl<T: MediaProber + ?Sized> MediaProber for Arc<T> {
    async fn probe(&self, source: &str) -> MediaResult<MediaInfo> {
        (**self).probe(source).await
    }
}

/// Probes sources with ffprobe, relative to a media root directory.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    media_root: PathBuf,
}

impl FfprobeProber {
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
        }
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    /// Resolve a script source against the media root.
    ///
    /// Sources may not climb out of the root.
    pub fn resolve(&self, source: &str) -> MediaResult<PathBuf> {
        let relative = Path::new(source.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(MediaError::SecurityViolation(format!(
                "source escapes media root: {}",
                source
            )));
        }
        Ok(self.media_root.join(relative))
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, source: &str) -> MediaResult<MediaInfo> {
        let path = self.resolve(source)?;
        probe_media(&path).await
    }
}
