//! Speech duration services.
//!
//! The spoken length of a narration script is either measured by
//! synthesizing it on a TTS server and probing the resulting audio, or
//! estimated from its text length.

use std::sync::Arc;

use async_trait::async_trait;
use epi_models::{SpeechPart, SpeechScript};
use tracing::debug;

use crate::error::MediaResult;
use crate::probe::probe_audio_duration;

/// Seconds of speech per character of text.
pub const CHARACTER_SPEECH_SECS: f64 = 0.07;

/// Seconds of silence per unit of pause.
pub const PAUSE_UNIT_SECS: f64 = 0.4;

/// Resolves how long a narration script takes to speak.
#[async_trait]
pub trait SpeechDurationService: Send + Sync {
    /// Spoken duration in seconds.
    async fn duration_secs(&self, speech: &SpeechScript) -> MediaResult<f64>;
}

#[async_trait]
impl<T: SpeechDurationService + ?Sized> SpeechDurationService for Arc<T> {
    async fn duration_secs(&self, speech: &SpeechScript) -> MediaResult<f64> {
        (**self).duration_secs(speech).await
    }
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Render a speech script as SSML.
///
/// Leading pauses are dropped; synthesizers ignore them anyway.
pub fn to_ssml(speech: &SpeechScript) -> String {
    let body = speech
        .parts()
        .iter()
        .skip_while(|part| matches!(part, SpeechPart::Pause(_)))
        .map(|part| match part {
            SpeechPart::Phrase(text) => format!("<s>{}</s>", escape_xml(text)),
            SpeechPart::Pause(secs) => format!("<break time=\"{}s\"/>", secs),
        })
        .collect::<Vec<_>>()
        .join(" ");
    format!("<speech> {} </speech>", body)
}

/// Duration from a TTS server that renders SSML to audio.
#[derive(Debug, Clone)]
pub struct TtsSpeechService {
    base_url: String,
    voice: String,
}

impl TtsSpeechService {
    pub fn new(base_url: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            voice: voice.into(),
        }
    }

    /// URL that synthesizes this script.
    pub fn url_for(&self, speech: &SpeechScript) -> String {
        format!(
            "{}?voice={}&text={}&ssml=true",
            self.base_url,
            urlencoding::encode(&self.voice),
            urlencoding::encode(&to_ssml(speech))
        )
    }
}

#[async_trait]
impl SpeechDurationService for TtsSpeechService {
    async fn duration_secs(&self, speech: &SpeechScript) -> MediaResult<f64> {
        if speech.is_empty() {
            return Ok(0.0);
        }
        let url = self.url_for(speech);
        let synthesized = probe_audio_duration(&url).await?;
        let secs = synthesized + speech.leading_pause();
        debug!(secs, parts = speech.parts().len(), "Measured speech duration");
        Ok(secs)
    }
}

/// Offline estimate from text length and pauses.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatedSpeechService;

impl EstimatedSpeechService {
    pub fn estimate(speech: &SpeechScript) -> f64 {
        speech
            .parts()
            .iter()
            .map(|part| match part {
                SpeechPart::Phrase(text) => text.chars().count() as f64 * CHARACTER_SPEECH_SECS,
                SpeechPart::Pause(units) => units * PAUSE_UNIT_SECS,
            })
            .sum()
    }
}

#[async_trait]
impl SpeechDurationService for EstimatedSpeechService {
    async fn duration_secs(&self, speech: &SpeechScript) -> MediaResult<f64> {
        Ok(Self::estimate(speech))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script() -> SpeechScript {
        SpeechScript::new(vec![
            SpeechPart::Pause(1.0),
            SpeechPart::Phrase("Hello & welcome".to_string()),
            SpeechPart::Pause(0.5),
            SpeechPart::Phrase("bye".to_string()),
        ])
    }

    #[test]
    fn test_ssml_drops_leading_pause() {
        assert_eq!(
            to_ssml(&script()),
            "<speech> <s>Hello &amp; welcome</s> <break time=\"0.5s\"/> <s>bye</s> </speech>"
        );
    }

    #[test]
    fn test_tts_url_is_encoded() {
        let service = TtsSpeechService::new("http://localhost:5500/api/tts", "espeak:en#en-us");
        let url = service.url_for(&SpeechScript::phrase("hi"));
        assert!(url.starts_with("http://localhost:5500/api/tts?voice=espeak%3Aen%23en-us&text="));
        assert!(url.contains("%3Cs%3Ehi%3C%2Fs%3E"));
        assert!(url.ends_with("&ssml=true"));
    }

    #[tokio::test]
    async fn test_estimate() {
        let secs = EstimatedSpeechService
            .duration_secs(&script())
            .await
            .unwrap();
        // 18 characters, 1.5 pause units
        assert!((secs - (18.0 * 0.07 + 1.5 * 0.4)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_tts_script_skips_server() {
        let service = TtsSpeechService::new("http://127.0.0.1:9/none", "voice");
        let secs = service.duration_secs(&SpeechScript::default()).await.unwrap();
        assert_eq!(secs, 0.0);
    }
}
