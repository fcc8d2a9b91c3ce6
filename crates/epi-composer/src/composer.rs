//! Episode composer service.
//!
//! Resolves metadata, builds and memoizes [`EpisodeMeta`] per
//! (script hash, fps) and validated compositions per
//! (script hash, fps, target). Concurrent identical requests wait on the
//! same per-key cell instead of recomputing; failures are never memoized.

use std::collections::HashMap;
use std::sync::Arc;

use epi_media::{
    CachedProber, CachedSpeech, EstimatedSpeechService, FfprobeProber, MediaProber,
    MetadataCache, SpeechDurationService, TtsSpeechService,
};
use epi_models::{CompositionKey, EditorCuts, MetaKey, Script};
use epi_timeline::{build_episode_meta, compose_episode, suggest_cuts, ComposedEpisode, EpisodeMeta};
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, Instrument};

use crate::config::{ComposerConfig, SpeechMode};
use crate::error::{ComposerError, ComposerResult};
use crate::logging::CompositionLogger;
use crate::metrics::{record_composition, record_meta_build, record_memo_hit};
use crate::resolve::resolve_metadata;

type Memo<K, V> = Mutex<HashMap<K, Arc<OnceCell<Arc<V>>>>>;

/// The composer wired to ffprobe and the configured speech service.
pub type DefaultComposer =
    EpisodeComposer<CachedProber<FfprobeProber>, CachedSpeech<Arc<dyn SpeechDurationService>>>;

/// Composition service over a media prober and a speech duration service.
pub struct EpisodeComposer<P, S> {
    config: ComposerConfig,
    prober: P,
    speech: S,
    cache: Arc<MetadataCache>,
    metas: Memo<MetaKey, EpisodeMeta>,
    compositions: Memo<CompositionKey, ComposedEpisode>,
}

impl DefaultComposer {
    /// Build the production composer: load the metadata cache and put it in
    /// front of ffprobe and the speech service.
    pub async fn from_config(config: ComposerConfig) -> ComposerResult<Self> {
        config.validate()?;

        let cache = Arc::new(MetadataCache::load(&config.cache_path).await);
        let speech: Arc<dyn SpeechDurationService> = match config.speech_mode {
            SpeechMode::Tts => Arc::new(TtsSpeechService::new(
                config.tts_url.clone(),
                config.tts_voice.clone(),
            )),
            SpeechMode::Estimate => Arc::new(EstimatedSpeechService),
        };
        let prober = CachedProber::new(FfprobeProber::new(&config.media_root), cache.clone());
        let speech = CachedSpeech::new(speech, cache.clone());

        Ok(Self::new(config, prober, speech, cache))
    }
}

impl<P: MediaProber, S: SpeechDurationService> EpisodeComposer<P, S> {
    pub fn new(config: ComposerConfig, prober: P, speech: S, cache: Arc<MetadataCache>) -> Self {
        Self {
            config,
            prober,
            speech,
            cache,
            metas: Mutex::new(HashMap::new()),
            compositions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    async fn cell<K, V>(memo: &Memo<K, V>, key: &K) -> Arc<OnceCell<Arc<V>>>
    where
        K: std::hash::Hash + Eq + Clone,
    {
        memo.lock().await.entry(key.clone()).or_default().clone()
    }

    /// Drop the cell of a failed request unless another request filled it meanwhile.
    async fn forget<K, V>(memo: &Memo<K, V>, key: &K, cell: &Arc<OnceCell<Arc<V>>>)
    where
        K: std::hash::Hash + Eq,
    {
        let mut memo = memo.lock().await;
        if memo
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, cell) && current.get().is_none())
        {
            memo.remove(key);
        }
    }

    /// Classified episode for a script at the configured frame rate.
    pub async fn episode_meta(&self, script: &Script) -> ComposerResult<Arc<EpisodeMeta>> {
        let key = MetaKey::for_script(script, self.config.fps);
        let cell = Self::cell(&self.metas, &key).await;
        if let Some(meta) = cell.get() {
            record_memo_hit("meta");
            return Ok(meta.clone());
        }

        let logger = CompositionLogger::new(&key.script_hash, "episode_meta");
        let result = cell
            .get_or_try_init(|| async {
                logger.log_start(&format!("{} entries", script.len()));
                let metadata = resolve_metadata(
                    script,
                    &self.prober,
                    &self.speech,
                    self.config.probe_parallelism,
                )
                .await?;
                logger.log_progress("metadata resolved");
                let result = build_episode_meta(script, &metadata, self.config.fps);
                record_meta_build(result.is_ok());
                Ok::<_, ComposerError>(Arc::new(result?))
            })
            .instrument(logger.create_span())
            .await
            .map(Arc::clone);

        if let Err(e) = &result {
            logger.log_error(&e.to_string());
            Self::forget(&self.metas, &key, &cell).await;
        }
        result
    }

    /// Validated composition of exactly `target` frames.
    pub async fn compose(&self, script: &Script, target: u64) -> ComposerResult<Arc<ComposedEpisode>> {
        let key = MetaKey::for_script(script, self.config.fps).with_target(target);
        let cell = Self::cell(&self.compositions, &key).await;
        if let Some(composed) = cell.get() {
            record_memo_hit("composition");
            return Ok(composed.clone());
        }

        let meta = match self.episode_meta(script).await {
            Ok(meta) => meta,
            Err(e) => {
                Self::forget(&self.compositions, &key, &cell).await;
                return Err(e);
            }
        };

        let logger = CompositionLogger::new(&key.meta.script_hash, "compose");
        let result = cell
            .get_or_try_init(|| async {
                logger.log_start(&format!("target {} frames", target));
                let result = compose_episode(script, &meta, target, self.config.max_safe_rate);
                record_composition(result.is_ok());
                let composed = result?;
                if composed.solution.acceleration.is_split() {
                    logger.log_warning(&format!(
                        "footage beyond the safe rate plays as fast-forward at {:.2}x",
                        composed.solution.acceleration.fast_forward_rate
                    ));
                }
                logger.log_completion(&format!(
                    "{} visual / {} audio ranges",
                    composed.composition.visual_track.len(),
                    composed.composition.audio_track.len()
                ));
                Ok::<_, ComposerError>(Arc::new(composed))
            })
            .instrument(logger.create_span())
            .await
            .map(Arc::clone);

        if let Err(e) = &result {
            match e.remediation(target) {
                Some(remediation) => logger.log_error(&format!("{}; {}", e, remediation)),
                None => logger.log_error(&e.to_string()),
            }
            Self::forget(&self.compositions, &key, &cell).await;
        }
        result
    }

    /// Editor cut suggestions for a target duration.
    pub async fn suggest_cuts(&self, script: &Script, target: u64) -> ComposerResult<EditorCuts> {
        let meta = self.episode_meta(script).await?;
        Ok(suggest_cuts(&meta, target, self.config.max_safe_rate)?)
    }

    /// Forget every memoized result and clear the metadata cache.
    pub async fn clear_caches(&self) -> ComposerResult<()> {
        self.metas.lock().await.clear();
        self.compositions.lock().await.clear();
        self.cache.clear().await?;
        info!("Cleared composer caches");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use epi_media::{MediaError, MediaResult};
    use epi_models::{MediaInfo, ScriptEntry, SlideItem, SlidesEntry, SpeechScript, VideoEntry};
    use epi_timeline::TimelineError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeProber {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MediaProber for FakeProber {
        async fn probe(&self, source: &str) -> MediaResult<MediaInfo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if source == "missing.mp4" {
                return Err(MediaError::FileNotFound(source.into()));
            }
            Ok(MediaInfo {
                duration_secs: 125.0,
                width: 1920,
                height: 1080,
                fps: 24.0,
                codec: "h264".to_string(),
                can_fast_seek: true,
            })
        }
    }

    #[derive(Default)]
    struct FakeSpeech {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechDurationService for FakeSpeech {
        async fn duration_secs(&self, _speech: &SpeechScript) -> MediaResult<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(2.0)
        }
    }

    type TestComposer = EpisodeComposer<Arc<FakeProber>, Arc<FakeSpeech>>;

    fn composer() -> (TestComposer, Arc<FakeProber>, Arc<FakeSpeech>) {
        let prober = Arc::new(FakeProber::default());
        let speech = Arc::new(FakeSpeech::default());
        let composer = EpisodeComposer::new(
            ComposerConfig::default(),
            prober.clone(),
            speech.clone(),
            Arc::new(MetadataCache::in_memory()),
        );
        (composer, prober, speech)
    }

    fn script() -> Script {
        Script::new(vec![
            ScriptEntry::Video(VideoEntry::new("a.mp4").with_cue(100, SpeechScript::phrase("hi"))),
            ScriptEntry::Slides(SlidesEntry {
                items: vec![SlideItem::new("end", SpeechScript::phrase("bye"))],
            }),
            ScriptEntry::Video(VideoEntry::new("b.mp4")),
        ])
    }

    #[tokio::test]
    async fn test_compose_and_memoize() {
        let (composer, prober, speech) = composer();
        let script = script();

        let first = composer.compose(&script, 1000).await.unwrap();
        let second = composer.compose(&script, 1000).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.composition.visual_frames(), 1000);

        // A new target reuses the episode meta.
        composer.compose(&script, 1500).await.unwrap();
        assert_eq!(prober.calls.load(Ordering::SeqCst), 2);
        assert_eq!(speech.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_work() {
        let (composer, prober, _speech) = composer();
        let script = script();

        let (a, b) = tokio::join!(composer.compose(&script, 800), composer.compose(&script, 800));
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(prober.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_infeasible_target_is_not_memoized() {
        let (composer, _prober, _speech) = composer();
        let script = script();

        let err = composer.compose(&script, 50).await.unwrap_err();
        assert!(matches!(
            err,
            ComposerError::Timeline(TimelineError::Infeasible { .. })
        ));
        assert!(err.remediation(50).unwrap().contains("at least"));

        let key = MetaKey::for_script(&script, 24.0).with_target(50);
        assert!(!composer.compositions.lock().await.contains_key(&key));
        assert_eq!(composer.metas.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_failure_names_entry() {
        let (composer, _prober, _speech) = composer();
        let script = Script::new(vec![ScriptEntry::Video(VideoEntry::new("missing.mp4"))]);

        let err = composer.episode_meta(&script).await.unwrap_err();
        assert!(matches!(err, ComposerError::Resolve { entry_index: 0, .. }));
        assert!(composer.metas.lock().await.is_empty());

        let err = composer.compose(&script, 100).await.unwrap_err();
        assert!(matches!(err, ComposerError::Resolve { entry_index: 0, .. }));
        assert!(composer.metas.lock().await.is_empty());
        assert!(composer.compositions.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_caches_forces_recompute() {
        let (composer, prober, _speech) = composer();
        let script = script();

        composer.episode_meta(&script).await.unwrap();
        composer.clear_caches().await.unwrap();
        composer.episode_meta(&script).await.unwrap();
        assert_eq!(prober.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_suggest_cuts() {
        let (composer, _prober, _speech) = composer();
        let cuts = composer.suggest_cuts(&script(), 1000).await.unwrap();
        assert_eq!(cuts.normal_speed_cut.stream_frame, 999);
        assert_eq!(cuts.normal_speed_cut.label.as_deref(), Some("a.mp4"));
    }

    #[test]
    fn test_from_config_with_estimated_speech() {
        let dir = tempfile::tempdir().unwrap();
        let config = ComposerConfig {
            media_root: dir.path().to_path_buf(),
            cache_path: dir.path().join("cache").join("meta.json"),
            speech_mode: SpeechMode::Estimate,
            ..ComposerConfig::default()
        };

        let cache_path = config.cache_path.clone();

        tokio_test::block_on(async {
            let composer = DefaultComposer::from_config(config).await.unwrap();
            assert!(composer.cache().is_empty().await);
            assert_eq!(composer.cache().path(), Some(cache_path.as_path()));

            composer.clear_caches().await.unwrap();
            let written = tokio::fs::read_to_string(&cache_path).await.unwrap();
            assert_eq!(written, "{}");
        });
    }
}
