//! Content-addressed memoization keys.
//!
//! Cached episode metadata is keyed by script hash and frame rate; cached
//! compositions additionally by target duration. Editing the script changes
//! its hash, which invalidates both.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::script::Script;

fn fps_bits(fps: f64) -> u64 {
    // Normalize -0.0 so equal frame rates always share a key.
    if fps == 0.0 {
        0.0f64.to_bits()
    } else {
        fps.to_bits()
    }
}

/// Key of an `EpisodeMeta`: (script hash, frame rate).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetaKey {
    pub script_hash: String,
    fps_bits: u64,
}

impl MetaKey {
    pub fn new(script_hash: impl Into<String>, fps: f64) -> Self {
        Self {
            script_hash: script_hash.into(),
            fps_bits: fps_bits(fps),
        }
    }

    pub fn for_script(script: &Script, fps: f64) -> Self {
        Self::new(script.content_hash(), fps)
    }

    pub fn fps(&self) -> f64 {
        f64::from_bits(self.fps_bits)
    }

    pub fn with_target(&self, target_frames: u64) -> CompositionKey {
        CompositionKey {
            meta: self.clone(),
            target_frames,
        }
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.script_hash, self.fps())
    }
}

/// Key of a `Composition`: (script hash, frame rate, target duration).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositionKey {
    pub meta: MetaKey,
    pub target_frames: u64,
}

impl CompositionKey {
    pub fn new(script_hash: impl Into<String>, fps: f64, target_frames: u64) -> Self {
        MetaKey::new(script_hash, fps).with_target(target_frames)
    }
}

impl fmt::Display for CompositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.meta, self.target_frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_display_and_equality() {
        let key = CompositionKey::new("abc", 24.0, 1000);
        assert_eq!(key.to_string(), "abc@24/1000");
        assert_eq!(key, MetaKey::new("abc", 24.0).with_target(1000));
        assert_ne!(key, CompositionKey::new("abc", 25.0, 1000));
        assert_eq!(MetaKey::new("abc", -0.0), MetaKey::new("abc", 0.0));
    }
}
