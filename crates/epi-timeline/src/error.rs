//! Timeline error types.

use epi_models::ScriptError;
use thiserror::Error;

use crate::validator::Violation;

pub type TimelineResult<T> = Result<T, TimelineError>;

/// Fatal errors of the timeline core.
///
/// Nothing here is retried: the core is deterministic, so the same inputs
/// fail the same way again.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimelineError {
    #[error("Invalid script: {0}")]
    InvalidScript(#[from] ScriptError),

    #[error("Metadata mismatch at entry {entry_index}: {message}")]
    MetadataMismatch { entry_index: usize, message: String },

    #[error(
        "Commentary cue {cue_index} of entry {entry_index} starts at source frame {frame}, outside [{first}, {end})"
    )]
    CueOutOfRange {
        entry_index: usize,
        cue_index: usize,
        frame: u64,
        first: u64,
        end: u64,
    },

    #[error("Invalid target duration: {0}")]
    InvalidTarget(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(
        "Speech from entry {from_entry} overshoots by {frames} frames and cannot be absorbed by {}",
        absorber(.into_entry)
    )]
    Overshoot {
        from_entry: usize,
        into_entry: Option<usize>,
        frames: u64,
    },

    #[error("Cannot retrofit script into target duration: {deficit} frames short (retrofit budget {retrofit_budget})")]
    Infeasible { retrofit_budget: i64, deficit: u64 },

    #[error("Script is {surplus} frames too short to fill the target duration without slow motion")]
    Underfilled { surplus: u64 },

    #[error("Frame budget mismatch: {classified} classified frames, {expected} video frames")]
    FrameBudgetMismatch { expected: u64, classified: u64 },

    #[error("Composition length [{actual}] does not match duration [{expected}]")]
    LengthMismatch { expected: u64, actual: u64 },

    #[error("Composition failed validation with {} violation(s)", .0.len())]
    InvalidComposition(Vec<Violation>),
}

fn absorber(into_entry: &Option<usize>) -> String {
    match into_entry {
        Some(index) => format!("entry {}", index),
        None => "any entry (no following entry)".to_string(),
    }
}

impl TimelineError {
    pub fn metadata_mismatch(entry_index: usize, message: impl Into<String>) -> Self {
        Self::MetadataMismatch {
            entry_index,
            message: message.into(),
        }
    }

    pub fn invalid_target(message: impl Into<String>) -> Self {
        Self::InvalidTarget(message.into())
    }

    /// Internal consistency failures: the classifier or builder broke an
    /// invariant, as opposed to bad input.
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            TimelineError::FrameBudgetMismatch { .. }
                | TimelineError::LengthMismatch { .. }
                | TimelineError::InvalidComposition(_)
        )
    }

    /// Target duration that would make an infeasible request succeed.
    pub fn suggested_duration(&self, target_frames: u64) -> Option<u64> {
        match self {
            TimelineError::Infeasible { deficit, .. } => Some(target_frames + deficit),
            TimelineError::Underfilled { surplus } => Some(target_frames.saturating_sub(*surplus)),
            _ => None,
        }
    }

    /// Human-readable remediation for the caller to surface.
    pub fn remediation(&self, target_frames: u64) -> String {
        match self {
            TimelineError::Infeasible { deficit, .. } => format!(
                "use a target duration of at least {} frames",
                target_frames + deficit
            ),
            TimelineError::Underfilled { surplus } => format!(
                "use a target duration of at most {} frames",
                target_frames.saturating_sub(*surplus)
            ),
            TimelineError::Overshoot { from_entry, .. } => format!(
                "shorten the narration of entry {} or extend the following entry",
                from_entry
            ),
            TimelineError::CueOutOfRange { entry_index, .. }
            | TimelineError::MetadataMismatch { entry_index, .. } => {
                format!("fix script entry {}", entry_index)
            }
            TimelineError::InvalidScript(_) => "fix the script".to_string(),
            TimelineError::InvalidTarget(_) => "use a target duration of at least 2 frames".to_string(),
            TimelineError::InvalidConfig(_) => "fix the composer configuration".to_string(),
            _ => "report this as a bug in the timeline composer".to_string(),
        }
    }
}
