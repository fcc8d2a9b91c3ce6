//! External collaborators of the episode timeline.
//!
//! This crate provides:
//! - Media probing via FFprobe
//! - Speech duration measurement (TTS server) and estimation
//! - An explicit metadata cache with load/persist/clear lifecycle
//! - Memoizing wrappers that put the cache in front of probing

pub mod cache;
pub mod cached;
pub mod error;
pub mod metrics;
pub mod probe;
pub mod prober;
pub mod speech;

pub use cache::{CacheEntry, CachedValue, MetadataCache, DEFAULT_CACHE_PATH};
pub use cached::{CachedProber, CachedSpeech};
pub use error::{MediaError, MediaResult};
pub use probe::{can_fast_seek, parse_frame_rate, probe_audio_duration, probe_media};
pub use prober::{FfprobeProber, MediaProber};
pub use speech::{to_ssml, EstimatedSpeechService, SpeechDurationService, TtsSpeechService};
