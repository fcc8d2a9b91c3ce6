//! Episode composition service.
//!
//! Wires the timeline core to its collaborators:
//! - Environment configuration
//! - Bounded-parallel metadata resolution
//! - Memoization of episode metadata and compositions
//! - Structured per-request logging and metrics

pub mod composer;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod resolve;

pub use composer::{DefaultComposer, EpisodeComposer};
pub use config::{ComposerConfig, SpeechMode};
pub use error::{ComposerError, ComposerResult};
pub use logging::CompositionLogger;
pub use resolve::resolve_metadata;
