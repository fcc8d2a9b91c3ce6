//! Externally probed metadata consumed by the classifier.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Media file information as reported by the media prober.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration_secs: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Native frame rate (fps)
    pub fps: f64,
    /// Video codec
    pub codec: String,
    /// Whether frames can be extracted quickly at arbitrary positions
    pub can_fast_seek: bool,
}

/// Resolved durations for one script entry, in script order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryMetadata {
    Video {
        media: MediaInfo,
        /// Spoken duration of each commentary cue, in seconds.
        cue_durations: Vec<f64>,
    },
    Slides {
        /// Spoken duration of each slide item, in seconds.
        item_durations: Vec<f64>,
    },
}
