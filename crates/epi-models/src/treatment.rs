//! Per-source-frame classifications.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How a source frame is played back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FrameTreatment {
    /// Played at 1x. Narrated frames and forced-normal directives.
    Normal,
    /// Played at the solved safe rate.
    SafeAccelerated,
    /// Played at the solved fast-forward rate with a distinct visual treatment.
    FastForward,
}

impl FrameTreatment {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameTreatment::Normal => "normal",
            FrameTreatment::SafeAccelerated => "safe_accelerated",
            FrameTreatment::FastForward => "fast_forward",
        }
    }
}

/// What is heard while a source frame is shown.
///
/// Narration takes precedence over original audio, which takes precedence
/// over silence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AudioTreatment {
    /// Narration of cue `cue_index` owned by entry `entry_index`.
    ///
    /// The owner differs from the entry holding the frame when speech
    /// overshoots into the following entry.
    Narration { entry_index: usize, cue_index: usize },
    /// The clip's own audio at the given volume.
    OriginalAtVolume { volume: f64 },
    Silence,
}

impl AudioTreatment {
    pub fn is_narration(&self) -> bool {
        matches!(self, AudioTreatment::Narration { .. })
    }
}
