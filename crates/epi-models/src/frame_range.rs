//! Inclusive frame ranges.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A maximal contiguous run of frames `[from, to]` (inclusive on both ends)
/// sharing one payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameRange<T> {
    pub from: u64,
    pub to: u64,
    pub payload: T,
}

impl<T> FrameRange<T> {
    pub fn new(from: u64, to: u64, payload: T) -> Self {
        Self { from, to, payload }
    }

    /// Number of frames covered.
    pub fn len(&self) -> u64 {
        if self.to < self.from {
            0
        } else {
            self.to - self.from + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, frame: u64) -> bool {
        frame >= self.from && frame <= self.to
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FrameRange<U> {
        FrameRange {
            from: self.from,
            to: self.to,
            payload: f(self.payload),
        }
    }
}
