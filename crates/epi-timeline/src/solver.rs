//! Acceleration solver.
//!
//! Two tiers:
//! 1. If all accelerable footage fits the retrofit budget at or below the
//!    maximum safe rate, one uniform rate is used.
//! 2. Otherwise safe footage plays at the maximum safe rate and fast-forward
//!    footage absorbs the rest of the budget at a higher rate.

use epi_models::Acceleration;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregator::FrameTotals;
use crate::error::{TimelineError, TimelineResult};

/// Beyond this rate frame decoding during render is unreliable.
pub const DEFAULT_MAX_SAFE_RATE: f64 = 16.0;

/// Output frames assigned to each class of source frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBudget {
    pub normal: u64,
    pub slides: u64,
    pub safe_accelerated: u64,
    pub fast_forward: u64,
}

impl OutputBudget {
    pub fn total(&self) -> u64 {
        self.normal + self.slides + self.safe_accelerated + self.fast_forward
    }
}

/// Solved rates plus the exact output budget per class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub acceleration: Acceleration,
    pub budget: OutputBudget,
    /// Output frames left for accelerable footage.
    pub retrofit_budget: i64,
}

/// Smallest target that fits the episode without exceeding the safe rate
/// for safe footage.
fn min_feasible_target(totals: &FrameTotals, max_safe_rate: f64) -> u64 {
    let safe = (totals.safe_accelerated as f64 / max_safe_rate).ceil() as u64;
    let fast_forward = u64::from(totals.fast_forward > 0);
    totals.fixed() + safe + fast_forward
}

fn infeasible(totals: &FrameTotals, target: u64, retrofit_budget: i64, max_safe_rate: f64) -> TimelineError {
    let deficit = min_feasible_target(totals, max_safe_rate)
        .saturating_sub(target)
        .max(1);
    TimelineError::Infeasible {
        retrofit_budget,
        deficit,
    }
}

/// `round(part * total / whole)` in exact integer arithmetic.
pub(crate) fn scale_rounded(part: u64, total: u64, whole: u64) -> u64 {
    if whole == 0 {
        return 0;
    }
    let numerator = 2 * part as u128 * total as u128 + whole as u128;
    (numerator / (2 * whole as u128)) as u64
}

/// Solve the playback rates that make the episode last exactly `target` frames.
pub fn solve_acceleration(
    totals: &FrameTotals,
    target: u64,
    max_safe_rate: f64,
) -> TimelineResult<Solution> {
    if !max_safe_rate.is_finite() || max_safe_rate < 1.0 {
        return Err(TimelineError::InvalidConfig(format!(
            "maximum safe rate must be at least 1.0, got {}",
            max_safe_rate
        )));
    }
    if target < 2 {
        return Err(TimelineError::invalid_target(format!(
            "target must be at least 2 frames, got {}",
            target
        )));
    }

    let fixed = totals.fixed();
    let retrofit_budget = target as i64 - fixed as i64;
    let safe = totals.safe_accelerated;
    let fast_forward = totals.fast_forward;
    let accelerable = totals.accelerable();

    debug!(
        target_frames = target,
        retrofit_budget,
        normal = totals.normal,
        slides = totals.slides,
        accelerable,
        "Solving acceleration"
    );

    if retrofit_budget < 0 {
        return Err(infeasible(totals, target, retrofit_budget, max_safe_rate));
    }
    let budget = retrofit_budget as u64;

    let mut output = OutputBudget {
        normal: totals.normal,
        slides: totals.slides,
        ..OutputBudget::default()
    };

    if budget == 0 {
        if accelerable > 0 {
            return Err(infeasible(totals, target, retrofit_budget, max_safe_rate));
        }
        return Ok(Solution {
            acceleration: Acceleration::uniform(1.0),
            budget: output,
            retrofit_budget,
        });
    }

    if accelerable < budget {
        return Err(TimelineError::Underfilled {
            surplus: budget - accelerable,
        });
    }

    let required_rate = accelerable as f64 / budget as f64;

    let acceleration = if required_rate <= max_safe_rate {
        if safe > 0 && fast_forward > 0 && budget < 2 {
            return Err(TimelineError::Infeasible {
                retrofit_budget,
                deficit: 2 - budget,
            });
        }
        let lower = u64::from(safe > 0);
        let upper = budget - u64::from(fast_forward > 0);
        output.safe_accelerated = scale_rounded(safe, budget, accelerable).clamp(lower, upper);
        output.fast_forward = budget - output.safe_accelerated;
        Acceleration::uniform(required_rate)
    } else {
        let safe_outputs = (safe as f64 / max_safe_rate).ceil() as u64;
        if safe_outputs > budget || (fast_forward > 0 && safe_outputs == budget) {
            return Err(infeasible(totals, target, retrofit_budget, max_safe_rate));
        }
        let remaining = budget - safe_outputs;
        output.safe_accelerated = safe_outputs;
        output.fast_forward = remaining;
        Acceleration {
            safe_rate: max_safe_rate,
            fast_forward_rate: fast_forward as f64 / remaining as f64,
            required_rate,
        }
    };

    info!(
        target_frames = target,
        required_rate = acceleration.required_rate,
        safe_rate = acceleration.safe_rate,
        fast_forward_rate = acceleration.fast_forward_rate,
        split = acceleration.is_split(),
        "Solved acceleration"
    );

    Ok(Solution {
        acceleration,
        budget: output,
        retrofit_budget,
    })
}
