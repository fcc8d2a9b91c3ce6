//! Episode aggregator.
//!
//! Concatenates per-entry classifications into [`EpisodeMeta`]: episode-wide
//! frame totals plus a run-length encoded index from stream position to
//! (entry, source frame).

use epi_models::{AudioTreatment, EntryMetadata, FrameTreatment, Script, ScriptEntry, ScriptError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classifier::{classify_slides, classify_video, PendingOvershoot, SlideSpan};
use crate::error::{TimelineError, TimelineResult};

/// Episode-wide source frame totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameTotals {
    pub normal: u64,
    pub safe_accelerated: u64,
    pub fast_forward: u64,
    pub slides: u64,
    /// Sum of all video entries' frame counts.
    pub video: u64,
}

impl FrameTotals {
    /// Frames the solver may speed up.
    pub fn accelerable(&self) -> u64 {
        self.safe_accelerated + self.fast_forward
    }

    /// Frames that always map 1:1 onto output frames.
    pub fn fixed(&self) -> u64 {
        self.normal + self.slides
    }

    /// Length of the episode stream at 1x.
    pub fn stream_len(&self) -> u64 {
        self.video + self.slides
    }

    fn add(&mut self, treatment: FrameTreatment, frames: u64) {
        match treatment {
            FrameTreatment::Normal => self.normal += frames,
            FrameTreatment::SafeAccelerated => self.safe_accelerated += frames,
            FrameTreatment::FastForward => self.fast_forward += frames,
        }
    }
}

/// Classified video entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMeta {
    pub source: String,
    pub first_frame: u64,
    pub frames: Vec<FrameTreatment>,
    pub audio: Vec<AudioTreatment>,
    pub can_fast_seek: bool,
}

impl VideoMeta {
    pub fn len(&self) -> u64 {
        self.frames.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn audio_at(&self, source_frame: u64) -> AudioTreatment {
        source_frame
            .checked_sub(self.first_frame)
            .and_then(|idx| self.audio.get(idx as usize).copied())
            .unwrap_or(AudioTreatment::Silence)
    }
}

/// Classified slides entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlidesMeta {
    pub spans: Vec<SlideSpan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryMeta {
    Video(VideoMeta),
    Slides(SlidesMeta),
}

/// What a stream run plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunKind {
    Video { treatment: FrameTreatment },
    Slide { item_index: usize },
}

/// Maximal run of stream positions sharing an entry and a treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRun {
    pub entry_index: usize,
    /// Source frame of a video run, or the entry-local offset of a slide.
    pub start_frame: u64,
    pub len: u64,
    /// Position of the first frame in the episode stream.
    pub stream_offset: u64,
    pub kind: RunKind,
}

impl StreamRun {
    pub fn stream_end(&self) -> u64 {
        self.stream_offset + self.len
    }

    pub fn is_video(&self) -> bool {
        matches!(self.kind, RunKind::Video { .. })
    }
}

/// Resolved stream position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamPosition {
    pub entry_index: usize,
    /// Source frame for video entries, entry-local frame for slides.
    pub frame: u64,
}

/// Episode-wide classification, built once per script and frame rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMeta {
    pub fps: f64,
    pub entries: Vec<EntryMeta>,
    pub runs: Vec<StreamRun>,
    pub totals: FrameTotals,
}

impl EpisodeMeta {
    pub fn stream_len(&self) -> u64 {
        self.runs.last().map_or(0, StreamRun::stream_end)
    }

    /// Map a stream position to (entry, frame).
    pub fn locate(&self, position: u64) -> Option<StreamPosition> {
        let run = self.run_at(position)?;
        Some(StreamPosition {
            entry_index: run.entry_index,
            frame: run.start_frame + (position - run.stream_offset),
        })
    }

    /// Video source or slide id shown at a stream position.
    pub fn label_at(&self, position: u64) -> Option<String> {
        let run = self.run_at(position)?;
        match (&self.entries[run.entry_index], run.kind) {
            (EntryMeta::Video(video), _) => Some(video.source.clone()),
            (EntryMeta::Slides(slides), RunKind::Slide { item_index }) => slides
                .spans
                .iter()
                .find(|span| span.item_index == item_index)
                .map(|span| span.id.clone()),
            (EntryMeta::Slides(_), RunKind::Video { .. }) => None,
        }
    }

    fn run_at(&self, position: u64) -> Option<&StreamRun> {
        let idx = self.runs.partition_point(|run| run.stream_end() <= position);
        self.runs.get(idx).filter(|run| run.stream_offset <= position)
    }
}

/// Classify every entry and aggregate the episode.
///
/// `metadata` holds the resolved durations for each script entry, in order.
pub fn build_episode_meta(
    script: &Script,
    metadata: &[EntryMetadata],
    fps: f64,
) -> TimelineResult<EpisodeMeta> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(ScriptError::InvalidFrameRate(fps).into());
    }
    script.validate()?;

    if metadata.len() != script.len() {
        return Err(TimelineError::metadata_mismatch(
            metadata.len().min(script.len()),
            format!(
                "{} script entries but {} metadata entries",
                script.len(),
                metadata.len()
            ),
        ));
    }

    let mut entries = Vec::with_capacity(script.len());
    let mut pending: Option<PendingOvershoot> = None;

    for (entry_index, (entry, meta)) in script.entries.iter().zip(metadata).enumerate() {
        match (entry, meta) {
            (
                ScriptEntry::Video(video),
                EntryMetadata::Video {
                    media,
                    cue_durations,
                },
            ) => {
                let classified =
                    classify_video(entry_index, video, media, cue_durations, fps, pending.take())?;
                pending = classified.overshoot;
                entries.push(EntryMeta::Video(VideoMeta {
                    source: video.source.clone(),
                    first_frame: classified.first_frame,
                    frames: classified.frames,
                    audio: classified.audio,
                    can_fast_seek: media.can_fast_seek,
                }));
            }
            (ScriptEntry::Slides(slides), EntryMetadata::Slides { item_durations }) => {
                if let Some(overshoot) = pending.take() {
                    return Err(TimelineError::Overshoot {
                        from_entry: overshoot.from_entry,
                        into_entry: Some(entry_index),
                        frames: overshoot.frames,
                    });
                }
                let classified = classify_slides(entry_index, slides, item_durations, fps)?;
                entries.push(EntryMeta::Slides(SlidesMeta {
                    spans: classified.spans,
                }));
            }
            (entry, _) => {
                return Err(TimelineError::metadata_mismatch(
                    entry_index,
                    format!("{} entry resolved with the wrong kind of metadata", entry.kind()),
                ));
            }
        }
    }

    if let Some(overshoot) = pending {
        return Err(TimelineError::Overshoot {
            from_entry: overshoot.from_entry,
            into_entry: None,
            frames: overshoot.frames,
        });
    }

    let (runs, totals) = index_stream(&entries);
    check_budget(&entries, &totals)?;

    info!(
        entries = entries.len(),
        runs = runs.len(),
        normal = totals.normal,
        safe_accelerated = totals.safe_accelerated,
        fast_forward = totals.fast_forward,
        slides = totals.slides,
        "Built episode meta"
    );

    Ok(EpisodeMeta {
        fps,
        entries,
        runs,
        totals,
    })
}

fn index_stream(entries: &[EntryMeta]) -> (Vec<StreamRun>, FrameTotals) {
    let mut runs: Vec<StreamRun> = Vec::new();
    let mut totals = FrameTotals::default();
    let mut offset = 0u64;

    for (entry_index, entry) in entries.iter().enumerate() {
        match entry {
            EntryMeta::Video(video) => {
                let mut start = 0usize;
                while start < video.frames.len() {
                    let treatment = video.frames[start];
                    let len = video.frames[start..]
                        .iter()
                        .take_while(|t| **t == treatment)
                        .count();
                    runs.push(StreamRun {
                        entry_index,
                        start_frame: video.first_frame + start as u64,
                        len: len as u64,
                        stream_offset: offset,
                        kind: RunKind::Video { treatment },
                    });
                    totals.add(treatment, len as u64);
                    offset += len as u64;
                    start += len;
                }
            }
            EntryMeta::Slides(slides) => {
                let mut local = 0u64;
                for span in &slides.spans {
                    runs.push(StreamRun {
                        entry_index,
                        start_frame: local,
                        len: span.frames,
                        stream_offset: offset,
                        kind: RunKind::Slide {
                            item_index: span.item_index,
                        },
                    });
                    totals.slides += span.frames;
                    local += span.frames;
                    offset += span.frames;
                }
            }
        }
        debug!(entry_index, stream_offset = offset, "Indexed entry");
    }

    totals.video = entries
        .iter()
        .map(|entry| match entry {
            EntryMeta::Video(video) => video.len(),
            EntryMeta::Slides(_) => 0,
        })
        .sum();

    (runs, totals)
}

fn check_budget(entries: &[EntryMeta], totals: &FrameTotals) -> TimelineResult<()> {
    let classified = totals.normal + totals.safe_accelerated + totals.fast_forward;
    if classified != totals.video {
        return Err(TimelineError::FrameBudgetMismatch {
            expected: totals.video,
            classified,
        });
    }

    let slide_frames: u64 = entries
        .iter()
        .filter_map(|entry| match entry {
            EntryMeta::Slides(slides) => Some(slides.spans.iter().map(|s| s.frames).sum::<u64>()),
            EntryMeta::Video(_) => None,
        })
        .sum();
    if slide_frames != totals.slides {
        return Err(TimelineError::FrameBudgetMismatch {
            expected: slide_frames,
            classified: totals.slides,
        });
    }

    Ok(())
}
