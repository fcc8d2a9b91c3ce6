//! Narration scripts.
//!
//! A speech script is an ordered list of spoken phrases interleaved with
//! pauses (in seconds), e.g. `["Welcome back", 0.5, "today we ship it"]`.
//! Its spoken duration is resolved externally by a speech duration service.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One element of a speech script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum SpeechPart {
    /// Spoken text.
    Phrase(String),
    /// Silence, in seconds.
    Pause(f64),
}

/// Ordered phrases and pauses narrated as one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SpeechScript(pub Vec<SpeechPart>);

impl SpeechScript {
    pub fn new(parts: Vec<SpeechPart>) -> Self {
        Self(parts)
    }

    /// Convenience constructor for a single phrase.
    pub fn phrase(text: impl Into<String>) -> Self {
        Self(vec![SpeechPart::Phrase(text.into())])
    }

    /// An empty script resolves to zero duration without asking any service.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn parts(&self) -> &[SpeechPart] {
        &self.0
    }

    /// Pause at the very start of the script, if any.
    ///
    /// Speech synthesizers drop leading breaks, so callers add this back
    /// to the synthesized duration.
    pub fn leading_pause(&self) -> f64 {
        match self.0.first() {
            Some(SpeechPart::Pause(secs)) => *secs,
            _ => 0.0,
        }
    }

    /// Spoken text only, phrases joined by spaces.
    pub fn text(&self) -> String {
        self.0
            .iter()
            .filter_map(|part| match part {
                SpeechPart::Phrase(text) => Some(text.as_str()),
                SpeechPart::Pause(_) => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Stable SHA-256 hex digest of the script content.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for part in &self.0 {
            match part {
                SpeechPart::Phrase(text) => {
                    hasher.update(b"s:");
                    hasher.update(text.as_bytes());
                }
                SpeechPart::Pause(secs) => {
                    hasher.update(b"p:");
                    hasher.update(secs.to_bits().to_be_bytes());
                }
            }
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }
}

impl From<Vec<SpeechPart>> for SpeechScript {
    fn from(parts: Vec<SpeechPart>) -> Self {
        Self(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_mixed_parts() {
        let script: SpeechScript = serde_json::from_str(r#"[0.5, "hello", 1, "world"]"#).unwrap();
        assert_eq!(
            script.parts(),
            &[
                SpeechPart::Pause(0.5),
                SpeechPart::Phrase("hello".to_string()),
                SpeechPart::Pause(1.0),
                SpeechPart::Phrase("world".to_string()),
            ]
        );
        assert!((script.leading_pause() - 0.5).abs() < f64::EPSILON);
        assert_eq!(script.text(), "hello world");
    }

    #[test]
    fn test_content_hash_distinguishes_pause_from_phrase() {
        let a = SpeechScript::new(vec![SpeechPart::Phrase("1".into())]);
        let b = SpeechScript::new(vec![SpeechPart::Pause(1.0)]);
        assert_ne!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash(), a.clone().content_hash());
    }

    #[test]
    fn test_empty_script() {
        let script = SpeechScript::default();
        assert!(script.is_empty());
        assert_eq!(script.leading_pause(), 0.0);
    }
}
