//! Script validation errors.

use thiserror::Error;

/// Result type for script validation.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Malformed input rejected before any frame is classified.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("script has no entries")]
    Empty,

    #[error("entry {entry_index}: {kind} range [{from}, {to}) must satisfy from < to")]
    InvalidRange {
        entry_index: usize,
        kind: &'static str,
        from: u64,
        to: u64,
    },

    #[error("entry {entry_index}: trim [{start}, {end}) must satisfy start < end")]
    InvalidTrim {
        entry_index: usize,
        start: u64,
        end: u64,
    },

    #[error("entry {entry_index}: volume {volume} is not a finite number")]
    InvalidVolume { entry_index: usize, volume: f64 },

    #[error("entry {entry_index}: video source is empty")]
    EmptySource { entry_index: usize },

    #[error("entry {entry_index}: slides entry has no items")]
    EmptySlides { entry_index: usize },

    #[error("entry {entry_index}: duplicate slide id {id:?}")]
    DuplicateSlideId { entry_index: usize, id: String },

    #[error("entry {entry_index}: speech pause {pause} must be a finite non-negative number")]
    InvalidPause { entry_index: usize, pause: f64 },

    #[error("frame rate {0} must be a finite positive number")]
    InvalidFrameRate(f64),
}
