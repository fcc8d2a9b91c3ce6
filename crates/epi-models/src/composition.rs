//! Composition models consumed by rendering.
//!
//! A composition is two independently run-length-encoded tracks over the
//! output frames `[0, D)`: what is shown and what is heard.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::frame_range::FrameRange;
use crate::speech::SpeechScript;
use crate::treatment::FrameTreatment;

/// Solved playback rates for one composition request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Acceleration {
    /// Rate for safe-accelerated footage, never above the configured maximum.
    pub safe_rate: f64,
    /// Rate for fast-forward footage, absorbing whatever the safe rate cannot.
    pub fast_forward_rate: f64,
    /// Uniform rate that would fit all accelerable footage into the budget.
    pub required_rate: f64,
}

impl Acceleration {
    /// A single uniform rate for all accelerable footage.
    pub fn uniform(rate: f64) -> Self {
        Self {
            safe_rate: rate,
            fast_forward_rate: rate,
            required_rate: rate,
        }
    }

    /// Whether the fast-forward tier had to exceed the safe rate.
    pub fn is_split(&self) -> bool {
        self.fast_forward_rate > self.safe_rate
    }

    pub fn rate_for(&self, treatment: FrameTreatment) -> f64 {
        match treatment {
            FrameTreatment::Normal => 1.0,
            FrameTreatment::SafeAccelerated => self.safe_rate,
            FrameTreatment::FastForward => self.fast_forward_rate,
        }
    }
}

/// What the visual track shows for a range of output frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VisualEntry {
    Slide {
        entry_index: usize,
        item_index: usize,
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        img: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Video {
        entry_index: usize,
        source: String,
        /// First source frame to seek to.
        start_source_frame: u64,
        /// `start_source_frame + round(output frames * playback_rate)`.
        end_source_frame: u64,
        playback_rate: f64,
        /// Rendered with the fast-forward visual treatment.
        fast_forward: bool,
        /// Frames may be extracted off the main render thread.
        offthread: bool,
    },
}

impl VisualEntry {
    pub fn entry_index(&self) -> usize {
        match self {
            VisualEntry::Slide { entry_index, .. } | VisualEntry::Video { entry_index, .. } => {
                *entry_index
            }
        }
    }

    pub fn playback_rate(&self) -> f64 {
        match self {
            VisualEntry::Slide { .. } => 1.0,
            VisualEntry::Video { playback_rate, .. } => *playback_rate,
        }
    }
}

/// What the audio track plays for a range of output frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AudioEntry {
    Narration {
        entry_index: usize,
        cue_index: usize,
        speech: SpeechScript,
    },
    Original {
        entry_index: usize,
        volume: f64,
    },
    Silence,
}

/// The frame-exact episode timeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Composition {
    pub visual_track: Vec<FrameRange<VisualEntry>>,
    pub audio_track: Vec<FrameRange<AudioEntry>>,
}

impl Composition {
    /// Output frames covered by the visual track.
    pub fn visual_frames(&self) -> u64 {
        self.visual_track.iter().map(FrameRange::len).sum()
    }

    /// Output frames covered by the audio track.
    pub fn audio_frames(&self) -> u64 {
        self.audio_track.iter().map(FrameRange::len).sum()
    }

    /// Visual entry shown at an output frame.
    pub fn visual_at(&self, frame: u64) -> Option<&VisualEntry> {
        find_range(&self.visual_track, frame)
    }

    /// Audio entry heard at an output frame.
    pub fn audio_at(&self, frame: u64) -> Option<&AudioEntry> {
        find_range(&self.audio_track, frame)
    }
}

fn find_range<T>(track: &[FrameRange<T>], frame: u64) -> Option<&T> {
    let idx = track.partition_point(|range| range.to < frame);
    track
        .get(idx)
        .filter(|range| range.contains(frame))
        .map(|range| &range.payload)
}

/// A suggested script cut point for an editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CutSuggestion {
    /// Position in the episode stream.
    pub stream_frame: u64,
    /// Entry at that position, `None` past the end of the stream.
    pub entry_index: Option<usize>,
    /// Source frame within that entry.
    pub source_frame: Option<u64>,
    /// Video source or slide id at that position.
    pub label: Option<String>,
}

/// Where the script would have to end to fit the target at each speed regime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EditorCuts {
    pub normal_speed_cut: CutSuggestion,
    pub safe_speed_cut: CutSuggestion,
    pub composite_cut: CutSuggestion,
}
