//! Editor cut suggestions.
//!
//! Where the script would have to end for the episode to fit the target
//! duration at normal speed, at the safe rate, and at the safe rate with
//! narrated frames kept at 1x.

use epi_models::{CutSuggestion, EditorCuts};
use tracing::debug;

use crate::aggregator::EpisodeMeta;
use crate::error::{TimelineError, TimelineResult};
use crate::solver::solve_acceleration;

fn cut_at(meta: &EpisodeMeta, stream_frame: u64) -> CutSuggestion {
    let position = meta.locate(stream_frame);
    CutSuggestion {
        stream_frame,
        entry_index: position.map(|p| p.entry_index),
        source_frame: position.map(|p| p.frame),
        label: meta.label_at(stream_frame),
    }
}

fn last_frame(value: f64) -> u64 {
    let rounded = value.round();
    if rounded.is_finite() && rounded > 0.0 {
        rounded as u64
    } else {
        0
    }
}

/// Suggest cut points for a target of `target` output frames.
///
/// When the script cannot be retrofit into the target the safe rate is the
/// maximum safe rate; when it is too short to fill the target it is 1x.
pub fn suggest_cuts(
    meta: &EpisodeMeta,
    target: u64,
    max_safe_rate: f64,
) -> TimelineResult<EditorCuts> {
    let safe_rate = match solve_acceleration(&meta.totals, target, max_safe_rate) {
        Ok(solution) => solution.acceleration.safe_rate,
        Err(TimelineError::Infeasible { .. }) => max_safe_rate,
        Err(TimelineError::Underfilled { .. }) => 1.0,
        Err(err) => return Err(err),
    };

    let normal = meta.totals.normal as f64;
    let duration = target as f64;

    let normal_speed_cut = target - 1;
    let safe_speed_cut = last_frame(duration * safe_rate - 1.0);
    let composite_cut = last_frame(normal + ((duration - normal) * safe_rate - 1.0).round());

    debug!(
        target_frames = target,
        safe_rate, normal_speed_cut, safe_speed_cut, composite_cut, "Suggested cuts"
    );

    Ok(EditorCuts {
        normal_speed_cut: cut_at(meta, normal_speed_cut),
        safe_speed_cut: cut_at(meta, safe_speed_cut),
        composite_cut: cut_at(meta, composite_cut),
    })
}
