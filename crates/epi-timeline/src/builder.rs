//! Composition builder.
//!
//! Walks the stream runs once, assigns each run its share of output frames
//! and folds the resulting segments into two run-length encoded tracks.
//! The fold state is an explicit `(open span, closed ranges)` pair passed
//! by value from one segment to the next.

use epi_models::{
    Acceleration, AudioEntry, AudioTreatment, Composition, FrameRange, FrameTreatment, Script,
    ScriptEntry, SpeechScript, VisualEntry,
};
use tracing::{debug, info, warn};

use crate::aggregator::{EntryMeta, EpisodeMeta, RunKind, StreamRun};
use crate::error::{TimelineError, TimelineResult};
use crate::solver::{scale_rounded, Solution};

/// Payload of a span being folded into a track.
trait SpanPayload: Clone {
    /// Whether `next` extends a span that currently carries `self`.
    fn continues(&self, next: &Self) -> bool;

    /// Merge `next` into `self` once it has been found to continue it.
    fn extend(&mut self, _next: &Self) {}
}

#[derive(Debug, Clone, PartialEq)]
enum VisualKey {
    Slide {
        entry_index: usize,
        item_index: usize,
    },
    Video {
        entry_index: usize,
        rate: f64,
        fast_forward: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct VisualRun {
    key: VisualKey,
    /// Source frame the span starts at.
    origin: u64,
    stream_start: u64,
    stream_end: u64,
}

impl SpanPayload for VisualRun {
    fn continues(&self, next: &Self) -> bool {
        self.key == next.key && self.stream_end == next.stream_start
    }

    fn extend(&mut self, next: &Self) {
        self.stream_end = next.stream_end;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AudioKey {
    Narration { entry_index: usize, cue_index: usize },
    Original { entry_index: usize, volume: f64 },
    Silence,
}

impl SpanPayload for AudioKey {
    fn continues(&self, next: &Self) -> bool {
        self == next
    }
}

#[derive(Debug, Clone)]
struct Span<P> {
    payload: P,
    len: u64,
}

/// Fold state for one track: the open span and the maximal spans closed so far.
#[derive(Debug, Clone)]
struct TrackFold<P> {
    open: Option<Span<P>>,
    closed: Vec<Span<P>>,
}

impl<P: SpanPayload> TrackFold<P> {
    fn new() -> Self {
        Self {
            open: None,
            closed: Vec::new(),
        }
    }

    fn push(self, payload: P, len: u64) -> Self {
        if len == 0 {
            return self;
        }

        match self.open {
            Some(mut open) if open.payload.continues(&payload) => {
                open.payload.extend(&payload);
                open.len += len;
                Self {
                    open: Some(open),
                    ..self
                }
            }
            Some(open) => {
                let mut closed = self.closed;
                closed.push(open);
                Self {
                    open: Some(Span { payload, len }),
                    closed,
                }
            }
            None => Self {
                open: Some(Span { payload, len }),
                ..self
            },
        }
    }

    fn finish(self) -> Vec<FrameRange<P>> {
        let mut spans = self.closed;
        spans.extend(self.open);

        let mut from = 0;
        widen_slivers(spans)
            .into_iter()
            .map(|span| {
                let range = FrameRange::new(from, from + span.len - 1, span.payload);
                from += span.len;
                range
            })
            .collect()
    }
}

/// Inclusive ranges need `from < to`, so every span must cover two frames.
///
/// A single-frame span takes the last frame of the previous span, or the
/// first frame of the next one, when that neighbour can spare it. Only when
/// neither can is it absorbed into a neighbour.
fn widen_slivers<P: SpanPayload>(mut spans: Vec<Span<P>>) -> Vec<Span<P>> {
    let mut i = 0;
    while i < spans.len() {
        if spans[i].len >= 2 {
            i += 1;
            continue;
        }
        if i > 0 && spans[i - 1].len > 2 {
            spans[i - 1].len -= 1;
            spans[i].len += 1;
            i += 1;
            continue;
        }
        if i + 1 < spans.len() && spans[i + 1].len > 2 {
            spans[i + 1].len -= 1;
            spans[i].len += 1;
            i += 1;
            continue;
        }
        if spans.len() == 1 {
            break;
        }

        let sliver = spans.remove(i);
        warn!(
            position = i,
            frames = sliver.len,
            "No neighbouring span can spare a frame, absorbing single-frame span"
        );
        if i == 0 {
            spans[0].len += sliver.len;
            continue;
        }
        spans[i - 1].len += sliver.len;
        if i < spans.len() && spans[i - 1].payload.continues(&spans[i].payload) {
            let next = spans.remove(i);
            spans[i - 1].payload.extend(&next.payload);
            spans[i - 1].len += next.len;
        }
    }
    spans
}

/// Output frames handed out to one class of source frames.
///
/// Cumulative rounding: after `k` source frames the class has produced
/// `round(k * budget / total)` outputs, so the class total is exact.
#[derive(Debug, Clone, Copy)]
struct ClassCursor {
    total: u64,
    budget: u64,
    consumed: u64,
}

impl ClassCursor {
    fn new(total: u64, budget: u64) -> Self {
        Self {
            total,
            budget,
            consumed: 0,
        }
    }

    fn take(&mut self, frames: u64) -> u64 {
        let before = scale_rounded(self.consumed, self.budget, self.total);
        self.consumed += frames;
        scale_rounded(self.consumed, self.budget, self.total) - before
    }
}

#[derive(Debug, Clone, Copy)]
struct Cursors {
    normal: ClassCursor,
    safe_accelerated: ClassCursor,
    fast_forward: ClassCursor,
    slides: ClassCursor,
}

impl Cursors {
    fn for_run(&mut self, run: &StreamRun) -> &mut ClassCursor {
        match run.kind {
            RunKind::Video {
                treatment: FrameTreatment::Normal,
            } => &mut self.normal,
            RunKind::Video {
                treatment: FrameTreatment::SafeAccelerated,
            } => &mut self.safe_accelerated,
            RunKind::Video {
                treatment: FrameTreatment::FastForward,
            } => &mut self.fast_forward,
            RunKind::Slide { .. } => &mut self.slides,
        }
    }
}

fn visual_run(run: &StreamRun, acceleration: &Acceleration) -> VisualRun {
    let key = match run.kind {
        RunKind::Video { treatment } => {
            let rate = acceleration.rate_for(treatment);
            VisualKey::Video {
                entry_index: run.entry_index,
                rate,
                fast_forward: rate > acceleration.safe_rate,
            }
        }
        RunKind::Slide { item_index } => VisualKey::Slide {
            entry_index: run.entry_index,
            item_index,
        },
    };
    VisualRun {
        key,
        origin: run.start_frame,
        stream_start: run.stream_offset,
        stream_end: run.stream_end(),
    }
}

fn audio_key(meta: &EpisodeMeta, run: &StreamRun, source_frame: u64) -> AudioKey {
    match (&meta.entries[run.entry_index], run.kind) {
        (EntryMeta::Slides(_), RunKind::Slide { item_index }) => AudioKey::Narration {
            entry_index: run.entry_index,
            cue_index: item_index,
        },
        (EntryMeta::Video(video), _) => match video.audio_at(source_frame) {
            AudioTreatment::Narration {
                entry_index,
                cue_index,
            } => AudioKey::Narration {
                entry_index,
                cue_index,
            },
            AudioTreatment::OriginalAtVolume { volume } => AudioKey::Original {
                entry_index: run.entry_index,
                volume,
            },
            AudioTreatment::Silence => AudioKey::Silence,
        },
        (EntryMeta::Slides(_), RunKind::Video { .. }) => AudioKey::Silence,
    }
}

/// Fold the audio of one run, sampling the source frame under each output frame.
fn fold_run_audio(
    fold: TrackFold<AudioKey>,
    meta: &EpisodeMeta,
    run: &StreamRun,
    outputs: u64,
) -> TrackFold<AudioKey> {
    if let RunKind::Slide { .. } = run.kind {
        return fold.push(audio_key(meta, run, run.start_frame), outputs);
    }

    let mut fold = fold;
    let mut pending: Option<(AudioKey, u64)> = None;
    for j in 0..outputs {
        let offset = (j as u128 * run.len as u128 / outputs as u128) as u64;
        let key = audio_key(meta, run, run.start_frame + offset);
        pending = match pending {
            Some((open, count)) if open == key => Some((open, count + 1)),
            Some((open, count)) => {
                fold = fold.push(open, count);
                Some((key, 1))
            }
            None => Some((key, 1)),
        };
    }
    match pending {
        Some((key, count)) => fold.push(key, count),
        None => fold,
    }
}

fn speech_for(script: &Script, entry_index: usize, cue_index: usize) -> Option<&SpeechScript> {
    match script.entries.get(entry_index)? {
        ScriptEntry::Video(video) => video.commentary.get(cue_index).map(|cue| &cue.speech),
        ScriptEntry::Slides(slides) => slides.items.get(cue_index).map(|item| &item.commentary),
    }
}

fn materialize_visual(
    range: FrameRange<VisualRun>,
    meta: &EpisodeMeta,
    script: &Script,
    acceleration: &Acceleration,
) -> TimelineResult<FrameRange<VisualEntry>> {
    let len = range.len();
    let run = &range.payload;
    let entry = match run.key {
        VisualKey::Slide {
            entry_index,
            item_index,
        } => {
            let item = script
                .entries
                .get(entry_index)
                .and_then(ScriptEntry::as_slides)
                .and_then(|slides| slides.items.get(item_index))
                .ok_or_else(|| {
                    TimelineError::metadata_mismatch(
                        entry_index,
                        format!("slide item {} missing from script", item_index),
                    )
                })?;
            VisualEntry::Slide {
                entry_index,
                item_index,
                id: item.id.clone(),
                title: item.title.clone(),
                img: item.img.clone(),
                text: item.text.clone(),
            }
        }
        VisualKey::Video {
            entry_index,
            rate,
            fast_forward,
        } => {
            let EntryMeta::Video(video) = &meta.entries[entry_index] else {
                return Err(TimelineError::metadata_mismatch(
                    entry_index,
                    "video run in a slides entry",
                ));
            };
            VisualEntry::Video {
                entry_index,
                source: video.source.clone(),
                start_source_frame: run.origin,
                end_source_frame: (run.origin + (len as f64 * rate).round() as u64)
                    .min(run.origin + (run.stream_end - run.stream_start)),
                playback_rate: rate,
                fast_forward,
                offthread: video.can_fast_seek && rate > acceleration.safe_rate,
            }
        }
    };
    Ok(FrameRange::new(range.from, range.to, entry))
}

fn materialize_audio(
    range: FrameRange<AudioKey>,
    script: &Script,
) -> TimelineResult<FrameRange<AudioEntry>> {
    let entry = match range.payload {
        AudioKey::Narration {
            entry_index,
            cue_index,
        } => {
            let speech = speech_for(script, entry_index, cue_index).ok_or_else(|| {
                TimelineError::metadata_mismatch(
                    entry_index,
                    format!("narration {} missing from script", cue_index),
                )
            })?;
            AudioEntry::Narration {
                entry_index,
                cue_index,
                speech: speech.clone(),
            }
        }
        AudioKey::Original {
            entry_index,
            volume,
        } => AudioEntry::Original {
            entry_index,
            volume,
        },
        AudioKey::Silence => AudioEntry::Silence,
    };
    Ok(FrameRange::new(range.from, range.to, entry))
}

/// Build the two-track composition for a solved episode.
pub fn build_composition(
    meta: &EpisodeMeta,
    script: &Script,
    solution: &Solution,
    target: u64,
) -> TimelineResult<Composition> {
    let planned = solution.budget.total();
    if planned != target {
        return Err(TimelineError::LengthMismatch {
            expected: target,
            actual: planned,
        });
    }

    let totals = &meta.totals;
    let budget = &solution.budget;
    let mut cursors = Cursors {
        normal: ClassCursor::new(totals.normal, budget.normal),
        safe_accelerated: ClassCursor::new(totals.safe_accelerated, budget.safe_accelerated),
        fast_forward: ClassCursor::new(totals.fast_forward, budget.fast_forward),
        slides: ClassCursor::new(totals.slides, budget.slides),
    };

    let mut visual = TrackFold::new();
    let mut audio = TrackFold::new();
    let mut produced = 0u64;

    for run in &meta.runs {
        let outputs = cursors.for_run(run).take(run.len);
        if outputs == 0 {
            debug!(
                entry_index = run.entry_index,
                stream_offset = run.stream_offset,
                frames = run.len,
                "Run receives no output frames"
            );
            continue;
        }
        produced += outputs;
        visual = visual.push(visual_run(run, &solution.acceleration), outputs);
        audio = fold_run_audio(audio, meta, run, outputs);
    }

    if produced != target {
        return Err(TimelineError::LengthMismatch {
            expected: target,
            actual: produced,
        });
    }

    let acceleration = &solution.acceleration;
    let visual_track = visual
        .finish()
        .into_iter()
        .map(|range| materialize_visual(range, meta, script, acceleration))
        .collect::<TimelineResult<Vec<_>>>()?;
    let audio_track = audio
        .finish()
        .into_iter()
        .map(|range| materialize_audio(range, script))
        .collect::<TimelineResult<Vec<_>>>()?;

    let composition = Composition {
        visual_track,
        audio_track,
    };

    for actual in [composition.visual_frames(), composition.audio_frames()] {
        if actual != target {
            return Err(TimelineError::LengthMismatch {
                expected: target,
                actual,
            });
        }
    }

    info!(
        target_frames = target,
        visual_ranges = composition.visual_track.len(),
        audio_ranges = composition.audio_track.len(),
        "Built composition"
    );

    Ok(composition)
}
