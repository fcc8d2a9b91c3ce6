//! Episode timeline core.
//!
//! Pure, synchronous pipeline from a script and its resolved metadata to a
//! frame-exact two-track composition:
//!
//! ```text
//! classifier -> aggregator -> solver -> builder -> validator
//! ```
//!
//! All probing happens before this crate runs; every duration arrives as a
//! known scalar in [`epi_models::EntryMetadata`].

pub mod aggregator;
pub mod builder;
pub mod classifier;
pub mod cuts;
pub mod error;
pub mod solver;
pub mod validator;

pub use aggregator::{
    build_episode_meta, EntryMeta, EpisodeMeta, FrameTotals, RunKind, SlidesMeta, StreamPosition,
    StreamRun, VideoMeta,
};
pub use builder::build_composition;
pub use classifier::{
    classify_slides, classify_video, ClassifiedSlides, ClassifiedVideo, PendingOvershoot,
    SlideSpan,
};
pub use cuts::suggest_cuts;
pub use error::{TimelineError, TimelineResult};
pub use solver::{solve_acceleration, OutputBudget, Solution, DEFAULT_MAX_SAFE_RATE};
pub use validator::{
    validate_composition, validate_json_composition, validate_json_track, validate_track,
    Violation,
};

use epi_models::{Composition, Script};
use tracing::error;

/// A validated composition together with the rates it was built with.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedEpisode {
    pub solution: Solution,
    pub composition: Composition,
}

/// Solve, build and validate a composition of exactly `target` frames.
///
/// Returns [`TimelineError::InvalidComposition`] rather than a partial
/// timeline when the built tracks fail validation.
pub fn compose_episode(
    script: &Script,
    meta: &EpisodeMeta,
    target: u64,
    max_safe_rate: f64,
) -> TimelineResult<ComposedEpisode> {
    let solution = solve_acceleration(&meta.totals, target, max_safe_rate)?;
    let composition = build_composition(meta, script, &solution, target)?;

    let violations = validate_composition(&composition, Some(target));
    if !violations.is_empty() {
        for violation in &violations {
            error!(target_frames = target, %violation, "Composition violation");
        }
        return Err(TimelineError::InvalidComposition(violations));
    }

    Ok(ComposedEpisode {
        solution,
        composition,
    })
}
