//! Memoizing wrappers around the raw collaborators.

use std::sync::Arc;

use async_trait::async_trait;
use epi_models::{MediaInfo, SpeechScript};
use tracing::{debug, warn};

use crate::cache::{media_key, speech_key, CachedValue, MetadataCache};
use crate::error::MediaResult;
use crate::metrics::{record_cache_lookup, record_probe};
use crate::prober::MediaProber;
use crate::speech::SpeechDurationService;

/// Media prober memoized by source path.
pub struct CachedProber<P> {
    inner: P,
    cache: Arc<MetadataCache>,
}

impl<P: MediaProber> CachedProber<P> {
    pub fn new(inner: P, cache: Arc<MetadataCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }
}

#[async_trait]
impl<P: MediaProber> MediaProber for CachedProber<P> {
    async fn probe(&self, source: &str) -> MediaResult<MediaInfo> {
        if let Some(info) = self.cache.media(source).await {
            record_cache_lookup("media", true);
            return Ok(info);
        }
        record_cache_lookup("media", false);

        let result = self.inner.probe(source).await;
        record_probe("media", result.is_ok());
        let info = result?;

        debug!(source, duration_secs = info.duration_secs, "Caching media probe");
        self.cache
            .insert(media_key(source), CachedValue::Media { info: info.clone() })
            .await;
        if let Err(e) = self.cache.persist().await {
            warn!(error = %e, "Failed to persist metadata cache");
        }
        Ok(info)
    }
}

/// Speech duration service memoized by speech content hash.
///
/// An empty script is zero seconds and never reaches the inner service.
pub struct CachedSpeech<S> {
    inner: S,
    cache: Arc<MetadataCache>,
}

impl<S: SpeechDurationService> CachedSpeech<S> {
    pub fn new(inner: S, cache: Arc<MetadataCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<S: SpeechDurationService> SpeechDurationService for CachedSpeech<S> {
    async fn duration_secs(&self, speech: &SpeechScript) -> MediaResult<f64> {
        if speech.is_empty() {
            return Ok(0.0);
        }

        let hash = speech.content_hash();
        if let Some(secs) = self.cache.speech(&hash).await {
            record_cache_lookup("speech", true);
            return Ok(secs);
        }
        record_cache_lookup("speech", false);

        let result = self.inner.duration_secs(speech).await;
        record_probe("speech", result.is_ok());
        let secs = result?;

        self.cache
            .insert(speech_key(&hash), CachedValue::Speech { secs })
            .await;
        if let Err(e) = self.cache.persist().await {
            warn!(error = %e, "Failed to persist metadata cache");
        }
        Ok(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingProber {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MediaProber for CountingProber {
        async fn probe(&self, source: &str) -> MediaResult<MediaInfo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if source == "broken.mp4" {
                return Err(MediaError::InvalidVideo("broken".to_string()));
            }
            Ok(MediaInfo {
                duration_secs: 10.0,
                width: 640,
                height: 360,
                fps: 24.0,
                codec: "h264".to_string(),
                can_fast_seek: true,
            })
        }
    }

    #[derive(Default)]
    struct CountingSpeech {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechDurationService for CountingSpeech {
        async fn duration_secs(&self, _speech: &SpeechScript) -> MediaResult<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(1.5)
        }
    }

    #[tokio::test]
    async fn test_probe_is_memoized() {
        let inner = Arc::new(CountingProber::default());
        let prober = CachedProber::new(inner.clone(), Arc::new(MetadataCache::in_memory()));

        prober.probe("a.mp4").await.unwrap();
        prober.probe("a.mp4").await.unwrap();
        prober.probe("b.mp4").await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_probe_is_not_cached() {
        let inner = Arc::new(CountingProber::default());
        let prober = CachedProber::new(inner.clone(), Arc::new(MetadataCache::in_memory()));

        assert!(prober.probe("broken.mp4").await.is_err());
        assert!(prober.probe("broken.mp4").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert!(prober.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_speech_skips_service() {
        let inner = Arc::new(CountingSpeech::default());
        let speech = CachedSpeech::new(inner.clone(), Arc::new(MetadataCache::in_memory()));

        assert_eq!(speech.duration_secs(&SpeechScript::default()).await.unwrap(), 0.0);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_speech_is_memoized_by_content() {
        let inner = Arc::new(CountingSpeech::default());
        let speech = CachedSpeech::new(inner.clone(), Arc::new(MetadataCache::in_memory()));

        let hello = SpeechScript::phrase("hello");
        assert_eq!(speech.duration_secs(&hello).await.unwrap(), 1.5);
        assert_eq!(speech.duration_secs(&hello.clone()).await.unwrap(), 1.5);
        speech
            .duration_secs(&SpeechScript::phrase("goodbye"))
            .await
            .unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
