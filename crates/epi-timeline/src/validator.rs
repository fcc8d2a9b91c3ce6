//! Composition validator.
//!
//! Collects every structural defect of both tracks instead of stopping at
//! the first one.

use epi_models::{Composition, FrameRange};
use serde_json::Value;
use thiserror::Error;

pub const VISUAL_TRACK: &str = "visual_track";
pub const AUDIO_TRACK: &str = "audio_track";

/// One structural defect of a track.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("{track}[{index}]: 'from' is not a non-negative integer ({value})")]
    NonIntegerFrom {
        track: &'static str,
        index: usize,
        value: String,
    },

    #[error("{track}[{index}]: 'to' is not a non-negative integer ({value})")]
    NonIntegerTo {
        track: &'static str,
        index: usize,
        value: String,
    },

    #[error("{track}[{index}]: from {from} is after to {to}")]
    NotIncreasing {
        track: &'static str,
        index: usize,
        from: u64,
        to: u64,
    },

    #[error("{track}[{index}]: zero-length range at frame {frame}")]
    ZeroLength {
        track: &'static str,
        index: usize,
        frame: u64,
    },

    #[error("{track}[{index}]: expected from {expected}, found {found}")]
    Discontinuous {
        track: &'static str,
        index: usize,
        expected: u64,
        found: u64,
    },

    #[error("{track}: first range starts at {from}, not 0")]
    DoesNotStartAtZero { track: &'static str, from: u64 },

    #[error("{track}: covers {actual} frames, expected {expected}")]
    LengthMismatch {
        track: &'static str,
        expected: u64,
        actual: u64,
    },

    #[error("{track}: {message}")]
    Malformed {
        track: &'static str,
        message: String,
    },
}

/// Structural checks over `(from, to)` bounds. `None` marks a range whose
/// bounds were already reported as malformed.
fn check_bounds(
    track: &'static str,
    bounds: &[Option<(u64, u64)>],
    expected: Option<u64>,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    if let Some(Some((from, _))) = bounds.first() {
        if *from != 0 {
            violations.push(Violation::DoesNotStartAtZero { track, from: *from });
        }
    }

    let mut previous: Option<(u64, u64)> = None;
    let mut covered = 0u64;

    for (index, bound) in bounds.iter().enumerate() {
        let Some((from, to)) = *bound else {
            previous = None;
            continue;
        };

        if from > to {
            violations.push(Violation::NotIncreasing {
                track,
                index,
                from,
                to,
            });
        } else if from == to {
            violations.push(Violation::ZeroLength {
                track,
                index,
                frame: from,
            });
        }

        if let Some((_, previous_to)) = previous {
            let expected_from = previous_to + 1;
            if from != expected_from {
                violations.push(Violation::Discontinuous {
                    track,
                    index,
                    expected: expected_from,
                    found: from,
                });
            }
        }

        if from <= to {
            covered += to - from + 1;
        }
        previous = Some((from, to));
    }

    if let Some(expected) = expected {
        let complete = bounds.iter().all(Option::is_some);
        if complete && covered != expected {
            violations.push(Violation::LengthMismatch {
                track,
                expected,
                actual: covered,
            });
        }
    }

    violations
}

/// Validate one typed track.
pub fn validate_track<T>(
    track: &'static str,
    ranges: &[FrameRange<T>],
    expected: Option<u64>,
) -> Vec<Violation> {
    let bounds: Vec<_> = ranges.iter().map(|r| Some((r.from, r.to))).collect();
    check_bounds(track, &bounds, expected)
}

/// Validate both tracks. An empty result means the composition is valid.
///
/// With `expected` set, each track must also cover exactly that many frames.
pub fn validate_composition(composition: &Composition, expected: Option<u64>) -> Vec<Violation> {
    let mut violations = validate_track(VISUAL_TRACK, &composition.visual_track, expected);
    violations.extend(validate_track(AUDIO_TRACK, &composition.audio_track, expected));
    violations
}

fn integral(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|v| v.fract() == 0.0 && *v >= 0.0 && *v <= u64::MAX as f64)
            .map(|v| v as u64)
    })
}

/// Validate one track of an externally stored composition, including the
/// integrality of its frame numbers.
pub fn validate_json_track(
    track: &'static str,
    value: &Value,
    expected: Option<u64>,
) -> Vec<Violation> {
    let Some(ranges) = value.as_array() else {
        return vec![Violation::Malformed {
            track,
            message: "not an array".to_string(),
        }];
    };

    let mut violations = Vec::new();
    let mut bounds = Vec::with_capacity(ranges.len());

    for (index, range) in ranges.iter().enumerate() {
        let from = range.get("from");
        let to = range.get("to");
        let parsed_from = from.and_then(integral);
        let parsed_to = to.and_then(integral);

        if parsed_from.is_none() {
            violations.push(Violation::NonIntegerFrom {
                track,
                index,
                value: from.map_or_else(|| "missing".to_string(), Value::to_string),
            });
        }
        if parsed_to.is_none() {
            violations.push(Violation::NonIntegerTo {
                track,
                index,
                value: to.map_or_else(|| "missing".to_string(), Value::to_string),
            });
        }

        bounds.push(parsed_from.zip(parsed_to));
    }

    violations.extend(check_bounds(track, &bounds, expected));
    violations
}

/// Validate a composition stored as JSON.
pub fn validate_json_composition(value: &Value, expected: Option<u64>) -> Vec<Violation> {
    [VISUAL_TRACK, AUDIO_TRACK]
        .into_iter()
        .flat_map(|track| match value.get(track) {
            Some(ranges) => validate_json_track(track, ranges, expected),
            None => vec![Violation::Malformed {
                track,
                message: "missing".to_string(),
            }],
        })
        .collect()
}
