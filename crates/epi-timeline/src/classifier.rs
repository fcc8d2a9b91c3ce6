//! Frame classifier.
//!
//! Turns one script entry plus its probed durations into a per-source-frame
//! playback treatment and audio treatment.
//!
//! Video precedence, lowest to highest:
//!
//! ```text
//! SafeAccelerated (default) < FastForward range < forced Normal range < narration
//! ```
//!
//! Audio precedence: silence < original audio at volume < narration.
//!
//! Narration that runs past the end of a clip is returned as a
//! [`PendingOvershoot`] and painted onto the leading frames of the next
//! entry by the aggregator.

use epi_models::{
    seconds_to_frames, AudioTreatment, FrameTreatment, MediaInfo, SlidesEntry, VideoEntry,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{TimelineError, TimelineResult};

/// Narration frames that did not fit into the entry they started in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOvershoot {
    /// Entry whose cue overshot.
    pub from_entry: usize,
    /// Cue within that entry.
    pub cue_index: usize,
    /// Frames to absorb at the start of the next entry.
    pub frames: u64,
}

/// Classification of one video entry over source frames `[first_frame, end_frame)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedVideo {
    pub first_frame: u64,
    pub frames: Vec<FrameTreatment>,
    pub audio: Vec<AudioTreatment>,
    pub overshoot: Option<PendingOvershoot>,
}

impl ClassifiedVideo {
    pub fn len(&self) -> u64 {
        self.frames.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Exclusive end source frame.
    pub fn end_frame(&self) -> u64 {
        self.first_frame + self.len()
    }

    pub fn treatment_at(&self, source_frame: u64) -> Option<FrameTreatment> {
        let idx = source_frame.checked_sub(self.first_frame)?;
        self.frames.get(idx as usize).copied()
    }

    pub fn audio_at(&self, source_frame: u64) -> Option<AudioTreatment> {
        let idx = source_frame.checked_sub(self.first_frame)?;
        self.audio.get(idx as usize).copied()
    }
}

/// One narrated slide and the frames its narration lasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideSpan {
    pub item_index: usize,
    pub id: String,
    pub frames: u64,
}

/// Classification of one slides entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassifiedSlides {
    pub spans: Vec<SlideSpan>,
}

impl ClassifiedSlides {
    pub fn total_frames(&self) -> u64 {
        self.spans.iter().map(|span| span.frames).sum()
    }
}

/// Longest duration accepted from a prober or speech service. Anything
/// longer is corrupt metadata.
const MAX_DURATION_SECS: f64 = 7.0 * 24.0 * 3600.0;

fn duration_frames(entry_index: usize, what: &str, seconds: f64, fps: f64) -> TimelineResult<u64> {
    if !seconds.is_finite() || !(0.0..=MAX_DURATION_SECS).contains(&seconds) {
        return Err(TimelineError::metadata_mismatch(
            entry_index,
            format!("{} duration {} seconds is out of range", what, seconds),
        ));
    }
    Ok(seconds_to_frames(seconds, fps))
}

fn paint<T: Copy>(buffer: &mut [T], first: u64, from: u64, to: u64, value: T) {
    let start = (from - first) as usize;
    let end = (to - first) as usize;
    buffer[start..end].fill(value);
}

/// Classify every source frame of a video entry.
///
/// `incoming` is the overshoot left by the previous entry. It must fit
/// entirely inside this entry; speech may cross at most one entry boundary.
pub fn classify_video(
    entry_index: usize,
    video: &VideoEntry,
    media: &MediaInfo,
    cue_durations: &[f64],
    fps: f64,
    incoming: Option<PendingOvershoot>,
) -> TimelineResult<ClassifiedVideo> {
    if cue_durations.len() != video.commentary.len() {
        return Err(TimelineError::metadata_mismatch(
            entry_index,
            format!(
                "{} commentary cues but {} speech durations",
                video.commentary.len(),
                cue_durations.len()
            ),
        ));
    }

    let probed_end = duration_frames(entry_index, &video.source, media.duration_secs, fps)?;
    let first = video.trim_start.unwrap_or(0);
    let end = video.trim_end.map_or(probed_end, |end| end.min(probed_end));

    if first >= end {
        return Err(TimelineError::metadata_mismatch(
            entry_index,
            format!(
                "{} has no frames in [{}, {}) (probed length {} frames)",
                video.source, first, end, probed_end
            ),
        ));
    }

    let len = (end - first) as usize;
    let mut frames = vec![FrameTreatment::SafeAccelerated; len];
    let mut audio = vec![AudioTreatment::Silence; len];

    for range in &video.fast_forward {
        if let Some((from, to)) = range.clamp(first, end) {
            paint(&mut frames, first, from, to, FrameTreatment::FastForward);
        }
    }

    for range in &video.force_normal_speed {
        if let Some((from, to)) = range.clamp(first, end) {
            paint(&mut frames, first, from, to, FrameTreatment::Normal);
        }
    }

    // Reverse order so the first listed range wins where ranges overlap.
    for range in video.volume.iter().rev() {
        if let Some((from, to)) = range.range().clamp(first, end) {
            let treatment = if range.volume > 0.0 {
                AudioTreatment::OriginalAtVolume {
                    volume: range.volume,
                }
            } else {
                AudioTreatment::Silence
            };
            paint(&mut audio, first, from, to, treatment);
        }
    }

    if let Some(pending) = incoming {
        if pending.frames > len as u64 {
            return Err(TimelineError::Overshoot {
                from_entry: pending.from_entry,
                into_entry: Some(entry_index),
                frames: pending.frames,
            });
        }

        let to = first + pending.frames;
        if audio[..pending.frames as usize]
            .iter()
            .any(|a| !matches!(a, AudioTreatment::Silence))
        {
            warn!(
                entry_index,
                frames = pending.frames,
                source = %video.source,
                "Overshooting narration overlaps original audio"
            );
        }
        paint(&mut frames, first, first, to, FrameTreatment::Normal);
        paint(
            &mut audio,
            first,
            first,
            to,
            AudioTreatment::Narration {
                entry_index: pending.from_entry,
                cue_index: pending.cue_index,
            },
        );
    }

    let mut overshoot: Option<PendingOvershoot> = None;

    for (cue_index, (cue, duration)) in video.commentary.iter().zip(cue_durations).enumerate() {
        let at = cue.at_source_frame;
        if at < first || at >= end {
            return Err(TimelineError::CueOutOfRange {
                entry_index,
                cue_index,
                frame: at,
                first,
                end,
            });
        }

        let speech_frames = duration_frames(entry_index, "narration", *duration, fps)?;
        let window_end = at.saturating_add(speech_frames);
        let to = window_end.min(end);

        if audio[(at - first) as usize..(to - first) as usize]
            .iter()
            .any(AudioTreatment::is_narration)
        {
            warn!(entry_index, cue_index, at, "Narration overlaps earlier narration");
        }

        paint(&mut frames, first, at, to, FrameTreatment::Normal);
        paint(
            &mut audio,
            first,
            at,
            to,
            AudioTreatment::Narration {
                entry_index,
                cue_index,
            },
        );

        if window_end > end {
            let frames = window_end - end;
            debug!(entry_index, cue_index, frames, "Speech overshoots entry end");
            if overshoot.map_or(true, |previous| frames >= previous.frames) {
                overshoot = Some(PendingOvershoot {
                    from_entry: entry_index,
                    cue_index,
                    frames,
                });
            }
        }
    }

    debug!(
        entry_index,
        source = %video.source,
        first_frame = first,
        frames = len,
        cues = video.commentary.len(),
        "Classified video entry"
    );

    Ok(ClassifiedVideo {
        first_frame: first,
        frames,
        audio,
        overshoot,
    })
}

/// Classify a slides entry: each item lasts as long as its narration.
pub fn classify_slides(
    entry_index: usize,
    slides: &SlidesEntry,
    item_durations: &[f64],
    fps: f64,
) -> TimelineResult<ClassifiedSlides> {
    if item_durations.len() != slides.items.len() {
        return Err(TimelineError::metadata_mismatch(
            entry_index,
            format!(
                "{} slide items but {} speech durations",
                slides.items.len(),
                item_durations.len()
            ),
        ));
    }

    let mut spans = Vec::with_capacity(slides.items.len());
    for (item_index, (item, duration)) in slides.items.iter().zip(item_durations).enumerate() {
        let frames = duration_frames(entry_index, "slide narration", *duration, fps)?;
        if frames == 0 {
            warn!(entry_index, item_index, id = %item.id, "Slide has no narration, skipping");
            continue;
        }
        spans.push(SlideSpan {
            item_index,
            id: item.id.clone(),
            frames,
        });
    }

    Ok(ClassifiedSlides { spans })
}
