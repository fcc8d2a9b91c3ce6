//! Episode script models.
//!
//! A script is the ordered list of entries an episode is authored from:
//! video clips annotated with narration cues and speed directives, and
//! slide segments whose items each carry their own narration.

use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ScriptError, ScriptResult};
use crate::speech::{SpeechPart, SpeechScript};

/// Half-open source-frame range `[from, to)` carrying a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DirectiveRange {
    pub from: u64,
    pub to: u64,
}

impl DirectiveRange {
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    /// Close the range against the real clip bounds `[first, end)`.
    ///
    /// Returns `None` when nothing of the range lies inside the clip.
    pub fn clamp(&self, first: u64, end: u64) -> Option<(u64, u64)> {
        let from = self.from.max(first);
        let to = self.to.min(end);
        (from < to).then_some((from, to))
    }
}

/// Half-open source-frame range playing the original audio at `volume`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VolumeRange {
    pub from: u64,
    pub to: u64,
    pub volume: f64,
}

impl VolumeRange {
    pub fn new(from: u64, to: u64, volume: f64) -> Self {
        Self { from, to, volume }
    }

    pub fn range(&self) -> DirectiveRange {
        DirectiveRange::new(self.from, self.to)
    }
}

/// Narration starting at a source frame of a video entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CommentaryCue {
    pub at_source_frame: u64,
    pub speech: SpeechScript,
}

impl CommentaryCue {
    pub fn new(at_source_frame: u64, speech: SpeechScript) -> Self {
        Self {
            at_source_frame,
            speech,
        }
    }
}

/// A video clip entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoEntry {
    /// Source path, relative to the media root.
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commentary: Vec<CommentaryCue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fast_forward: Vec<DirectiveRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub force_normal_speed: Vec<DirectiveRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume: Vec<VolumeRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_start: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_end: Option<u64>,
}

impl VideoEntry {
    /// A bare clip with no cues or directives.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            commentary: Vec::new(),
            fast_forward: Vec::new(),
            force_normal_speed: Vec::new(),
            volume: Vec::new(),
            trim_start: None,
            trim_end: None,
        }
    }

    pub fn with_cue(mut self, at_source_frame: u64, speech: SpeechScript) -> Self {
        self.commentary.push(CommentaryCue::new(at_source_frame, speech));
        self
    }

    pub fn with_fast_forward(mut self, from: u64, to: u64) -> Self {
        self.fast_forward.push(DirectiveRange::new(from, to));
        self
    }

    pub fn with_normal_speed(mut self, from: u64, to: u64) -> Self {
        self.force_normal_speed.push(DirectiveRange::new(from, to));
        self
    }

    pub fn with_volume(mut self, from: u64, to: u64, volume: f64) -> Self {
        self.volume.push(VolumeRange::new(from, to, volume));
        self
    }

    pub fn with_trim(mut self, start: Option<u64>, end: Option<u64>) -> Self {
        self.trim_start = start;
        self.trim_end = end;
        self
    }
}

/// A single slide with its narration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SlideItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub commentary: SpeechScript,
}

impl SlideItem {
    pub fn new(id: impl Into<String>, commentary: SpeechScript) -> Self {
        Self {
            id: id.into(),
            title: None,
            img: None,
            text: None,
            commentary,
        }
    }
}

/// A slide segment entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SlidesEntry {
    pub items: Vec<SlideItem>,
}

/// One element of the authored script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptEntry {
    Video(VideoEntry),
    Slides(SlidesEntry),
}

impl ScriptEntry {
    pub fn as_video(&self) -> Option<&VideoEntry> {
        match self {
            ScriptEntry::Video(video) => Some(video),
            ScriptEntry::Slides(_) => None,
        }
    }

    pub fn as_slides(&self) -> Option<&SlidesEntry> {
        match self {
            ScriptEntry::Slides(slides) => Some(slides),
            ScriptEntry::Video(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ScriptEntry::Video(_) => "video",
            ScriptEntry::Slides(_) => "slides",
        }
    }
}

/// The ordered episode script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Script {
    pub entries: Vec<ScriptEntry>,
}

impl Script {
    pub fn new(entries: Vec<ScriptEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// SHA-256 hex digest of the canonical JSON form.
    ///
    /// Any change to the script content changes the hash, which is what
    /// invalidates cached metadata and compositions.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        if serde_json::to_writer(&mut hasher, self).is_err() {
            hasher = Sha256::new();
            hasher.update(format!("{:?}", self).as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Reject malformed directives before classification begins.
    pub fn validate(&self) -> ScriptResult<()> {
        if self.entries.is_empty() {
            return Err(ScriptError::Empty);
        }

        for (entry_index, entry) in self.entries.iter().enumerate() {
            match entry {
                ScriptEntry::Video(video) => validate_video(entry_index, video)?,
                ScriptEntry::Slides(slides) => validate_slides(entry_index, slides)?,
            }
        }

        Ok(())
    }
}

fn validate_video(entry_index: usize, video: &VideoEntry) -> ScriptResult<()> {
    if video.source.trim().is_empty() {
        return Err(ScriptError::EmptySource { entry_index });
    }

    if let (Some(start), Some(end)) = (video.trim_start, video.trim_end) {
        if start >= end {
            return Err(ScriptError::InvalidTrim {
                entry_index,
                start,
                end,
            });
        }
    }

    let directives = video
        .fast_forward
        .iter()
        .map(|r| ("fast-forward", *r))
        .chain(video.force_normal_speed.iter().map(|r| ("normal-speed", *r)))
        .chain(video.volume.iter().map(|r| ("volume", r.range())));

    for (kind, range) in directives {
        if range.from >= range.to {
            return Err(ScriptError::InvalidRange {
                entry_index,
                kind,
                from: range.from,
                to: range.to,
            });
        }
    }

    if let Some(bad) = video.volume.iter().find(|r| !r.volume.is_finite()) {
        return Err(ScriptError::InvalidVolume {
            entry_index,
            volume: bad.volume,
        });
    }

    for cue in &video.commentary {
        validate_speech(entry_index, &cue.speech)?;
    }

    Ok(())
}

fn validate_slides(entry_index: usize, slides: &SlidesEntry) -> ScriptResult<()> {
    if slides.items.is_empty() {
        return Err(ScriptError::EmptySlides { entry_index });
    }

    let mut seen = HashSet::new();
    for item in &slides.items {
        if !seen.insert(item.id.as_str()) {
            return Err(ScriptError::DuplicateSlideId {
                entry_index,
                id: item.id.clone(),
            });
        }
        validate_speech(entry_index, &item.commentary)?;
    }

    Ok(())
}

fn validate_speech(entry_index: usize, speech: &SpeechScript) -> ScriptResult<()> {
    for part in speech.parts() {
        if let SpeechPart::Pause(pause) = part {
            if !pause.is_finite() || *pause < 0.0 {
                return Err(ScriptError::InvalidPause {
                    entry_index,
                    pause: *pause,
                });
            }
        }
    }
    Ok(())
}
