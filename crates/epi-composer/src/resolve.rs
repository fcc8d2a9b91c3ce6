//! Metadata resolution.
//!
//! Probes every script entry before classification, with bounded
//! parallelism across entries.

use std::sync::Arc;

use epi_media::{MediaProber, SpeechDurationService};
use epi_models::{EntryMetadata, Script, ScriptEntry, SpeechScript};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::{ComposerError, ComposerResult};

async fn speech_durations<'a, S, I>(speech: &S, scripts: I) -> Result<Vec<f64>, epi_media::MediaError>
where
    S: SpeechDurationService + ?Sized,
    I: IntoIterator<Item = &'a SpeechScript>,
{
    let mut durations = Vec::new();
    for script in scripts {
        durations.push(speech.duration_secs(script).await?);
    }
    Ok(durations)
}

async fn resolve_entry<P, S>(
    entry_index: usize,
    entry: &ScriptEntry,
    prober: &P,
    speech: &S,
) -> ComposerResult<EntryMetadata>
where
    P: MediaProber + ?Sized,
    S: SpeechDurationService + ?Sized,
{
    match entry {
        ScriptEntry::Video(video) => {
            let media = prober
                .probe(&video.source)
                .await
                .map_err(|e| ComposerError::resolve(entry_index, &video.source, e))?;
            let cue_durations = speech_durations(speech, video.commentary.iter().map(|c| &c.speech))
                .await
                .map_err(|e| ComposerError::resolve(entry_index, &video.source, e))?;
            debug!(
                entry_index,
                source = %video.source,
                duration_secs = media.duration_secs,
                cues = cue_durations.len(),
                "Resolved video entry"
            );
            Ok(EntryMetadata::Video {
                media,
                cue_durations,
            })
        }
        ScriptEntry::Slides(slides) => {
            let item_durations = speech_durations(speech, slides.items.iter().map(|i| &i.commentary))
                .await
                .map_err(|e| ComposerError::resolve(entry_index, "slides", e))?;
            debug!(entry_index, items = item_durations.len(), "Resolved slides entry");
            Ok(EntryMetadata::Slides { item_durations })
        }
    }
}

/// Resolve the metadata of every entry, in script order.
///
/// At most `parallelism` entries are probed at the same time.
pub async fn resolve_metadata<P, S>(
    script: &Script,
    prober: &P,
    speech: &S,
    parallelism: usize,
) -> ComposerResult<Vec<EntryMetadata>>
where
    P: MediaProber + ?Sized,
    S: SpeechDurationService + ?Sized,
{
    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));

    let tasks = script.entries.iter().enumerate().map(|(entry_index, entry)| {
        let semaphore = semaphore.clone();
        async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|e| ComposerError::config_error(format!("probe semaphore closed: {}", e)))?;
            resolve_entry(entry_index, entry, prober, speech).await
        }
    });

    join_all(tasks).await.into_iter().collect()
}
