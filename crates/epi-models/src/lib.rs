//! Shared data models for the episode timeline composer.
//!
//! This crate provides Serde-serializable types for:
//! - Episode scripts (video clips and slide segments with narration cues)
//! - Per-frame playback and audio treatments
//! - Frame ranges and the two-track composition consumed by rendering
//! - Externally probed media metadata
//! - Content-addressed memoization keys

pub mod composition;
pub mod error;
pub mod frame_range;
pub mod keys;
pub mod metadata;
pub mod script;
pub mod speech;
pub mod treatment;

// Re-export common types
pub use composition::{Acceleration, AudioEntry, Composition, CutSuggestion, EditorCuts, VisualEntry};
pub use error::{ScriptError, ScriptResult};
pub use frame_range::FrameRange;
pub use keys::{CompositionKey, MetaKey};
pub use metadata::{EntryMetadata, MediaInfo};
pub use script::{
    CommentaryCue, DirectiveRange, Script, ScriptEntry, SlideItem, SlidesEntry, VideoEntry,
    VolumeRange,
};
pub use speech::{SpeechPart, SpeechScript};
pub use treatment::{AudioTreatment, FrameTreatment};

/// Convert a duration in seconds to a whole number of frames.
pub fn seconds_to_frames(seconds: f64, fps: f64) -> u64 {
    let frames = (seconds * fps).round();
    if frames.is_finite() && frames > 0.0 {
        frames as u64
    } else {
        0
    }
}
