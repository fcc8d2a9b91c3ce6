//! End-to-end scenarios from script and resolved metadata to composition.

use epi_models::{
    Acceleration, AudioEntry, EntryMetadata, FrameTreatment, MediaInfo, Script, ScriptEntry,
    SlideItem, SlidesEntry, SpeechScript, VideoEntry, VisualEntry,
};
use epi_timeline::{
    build_episode_meta, compose_episode, validate_composition, EntryMeta, EpisodeMeta,
    TimelineError, DEFAULT_MAX_SAFE_RATE,
};

const FPS: f64 = 24.0;

fn media(duration_secs: f64) -> MediaInfo {
    MediaInfo {
        duration_secs,
        width: 1920,
        height: 1080,
        fps: FPS,
        codec: "h264".to_string(),
        can_fast_seek: true,
    }
}

fn video(duration_secs: f64, cue_durations: &[f64]) -> EntryMetadata {
    EntryMetadata::Video {
        media: media(duration_secs),
        cue_durations: cue_durations.to_vec(),
    }
}

fn slides(item_durations: &[f64]) -> EntryMetadata {
    EntryMetadata::Slides {
        item_durations: item_durations.to_vec(),
    }
}

fn meta(script: &Script, metadata: &[EntryMetadata]) -> EpisodeMeta {
    build_episode_meta(script, metadata, FPS).unwrap()
}

fn bounds<T>(track: &[epi_models::FrameRange<T>]) -> Vec<(u64, u64)> {
    track.iter().map(|r| (r.from, r.to)).collect()
}

/// Four entries: narration, directives, an overshoot, slides and a fully
/// fast-forwarded clip.
fn mixed_episode() -> (Script, Vec<EntryMetadata>) {
    let script = Script::new(vec![
        ScriptEntry::Video(
            VideoEntry::new("a.mp4")
                .with_fast_forward(200, 800)
                .with_normal_speed(1000, 1100)
                .with_volume(0, 500, 0.5)
                .with_cue(100, SpeechScript::phrase("opening remarks"))
                .with_cue(1400, SpeechScript::phrase("and now for the next clip")),
        ),
        ScriptEntry::Video(
            VideoEntry::new("b.mp4")
                .with_trim(Some(24), None)
                .with_cue(300, SpeechScript::phrase("notice this")),
        ),
        ScriptEntry::Slides(SlidesEntry {
            items: vec![
                SlideItem::new("summary", SpeechScript::phrase("to summarize")),
                SlideItem::new("outro", SpeechScript::phrase("thanks for watching")),
            ],
        }),
        ScriptEntry::Video(VideoEntry::new("c.mp4").with_fast_forward(0, 480)),
    ]);
    let metadata = vec![
        video(60.0, &[3.0, 4.0]),
        video(30.0, &[2.0]),
        slides(&[3.0, 2.5]),
        video(20.0, &[]),
    ];
    (script, metadata)
}

#[test]
fn test_single_clip_uniform_rate() {
    let script = Script::new(vec![ScriptEntry::Video(VideoEntry::new("a.mp4"))]);
    let meta = meta(&script, &[video(125.0, &[])]);
    assert_eq!(meta.totals.safe_accelerated, 3000);

    let composed = compose_episode(&script, &meta, 1000, DEFAULT_MAX_SAFE_RATE).unwrap();
    assert_eq!(composed.solution.acceleration, Acceleration::uniform(3.0));

    let composition = composed.composition;
    assert_eq!(bounds(&composition.visual_track), vec![(0, 999)]);
    assert_eq!(
        composition.visual_track[0].payload,
        VisualEntry::Video {
            entry_index: 0,
            source: "a.mp4".to_string(),
            start_source_frame: 0,
            end_source_frame: 3000,
            playback_rate: 3.0,
            fast_forward: false,
            offthread: false,
        }
    );
    assert_eq!(bounds(&composition.audio_track), vec![(0, 999)]);
    assert_eq!(composition.audio_track[0].payload, AudioEntry::Silence);
}

#[test]
fn test_required_rate_within_safe_bound_is_uniform() {
    let script = Script::new(vec![ScriptEntry::Video(
        VideoEntry::new("a.mp4").with_fast_forward(0, 6000),
    )]);
    let meta = meta(&script, &[video(500.0, &[])]);

    let composed = compose_episode(&script, &meta, 1200, 16.0).unwrap();
    assert_eq!(composed.solution.acceleration, Acceleration::uniform(10.0));

    // Fast-forward and safe footage share the rate, so they form one span.
    let visual = &composed.composition.visual_track;
    assert_eq!(bounds(visual), vec![(0, 1199)]);
    assert_eq!(visual[0].payload.playback_rate(), 10.0);
}

#[test]
fn test_two_tier_split() {
    let script = Script::new(vec![ScriptEntry::Video(
        VideoEntry::new("a.mp4").with_fast_forward(8000, 30000),
    )]);
    let meta = meta(&script, &[video(1250.0, &[])]);
    assert_eq!(meta.totals.safe_accelerated, 8000);
    assert_eq!(meta.totals.fast_forward, 22000);

    let composed = compose_episode(&script, &meta, 1000, 16.0).unwrap();
    let acceleration = composed.solution.acceleration;
    assert_eq!(acceleration.required_rate, 30.0);
    assert_eq!(acceleration.safe_rate, 16.0);
    assert_eq!(acceleration.fast_forward_rate, 44.0);
    assert_eq!(composed.solution.budget.safe_accelerated, 500);

    let visual = &composed.composition.visual_track;
    assert_eq!(bounds(visual), vec![(0, 499), (500, 999)]);
    assert_eq!(
        visual[0].payload,
        VisualEntry::Video {
            entry_index: 0,
            source: "a.mp4".to_string(),
            start_source_frame: 0,
            end_source_frame: 8000,
            playback_rate: 16.0,
            fast_forward: false,
            offthread: false,
        }
    );
    assert_eq!(
        visual[1].payload,
        VisualEntry::Video {
            entry_index: 0,
            source: "a.mp4".to_string(),
            start_source_frame: 8000,
            end_source_frame: 30000,
            playback_rate: 44.0,
            fast_forward: true,
            offthread: true,
        }
    );
}

#[test]
fn test_overshoot_continues_into_next_entry() {
    let script = Script::new(vec![
        ScriptEntry::Video(
            VideoEntry::new("a.mp4")
                .with_trim(None, Some(140))
                .with_cue(100, SpeechScript::phrase("this runs long")),
        ),
        ScriptEntry::Video(VideoEntry::new("b.mp4")),
    ]);
    let meta = meta(&script, &[video(60.0, &[2.0]), video(10.0, &[])]);

    // 48 speech frames from frame 100 of a 140-frame clip leave 8 for the next entry.
    let EntryMeta::Video(next) = &meta.entries[1] else {
        panic!("expected video entry");
    };
    assert!(next.frames[..8]
        .iter()
        .all(|t| *t == FrameTreatment::Normal));
    assert_eq!(next.frames[8], FrameTreatment::SafeAccelerated);
    assert_eq!(meta.totals.normal, 48);
    assert_eq!(meta.totals.safe_accelerated, 332);

    let composed = compose_episode(&script, &meta, 131, 16.0).unwrap();
    assert_eq!(composed.solution.acceleration.safe_rate, 4.0);

    let composition = composed.composition;
    assert_eq!(
        bounds(&composition.visual_track),
        vec![(0, 24), (25, 64), (65, 72), (73, 130)]
    );
    assert_eq!(composition.visual_track[2].payload.entry_index(), 1);
    assert_eq!(composition.visual_track[2].payload.playback_rate(), 1.0);

    // The narration run is uninterrupted across the entry boundary.
    assert_eq!(
        bounds(&composition.audio_track),
        vec![(0, 24), (25, 72), (73, 130)]
    );
    assert_eq!(
        composition.audio_track[1].payload,
        AudioEntry::Narration {
            entry_index: 0,
            cue_index: 0,
            speech: SpeechScript::phrase("this runs long"),
        }
    );
}

#[test]
fn test_negative_retrofit_budget_is_infeasible() {
    let script = Script::new(vec![
        ScriptEntry::Video(
            VideoEntry::new("a.mp4").with_cue(0, SpeechScript::phrase("a long introduction")),
        ),
        ScriptEntry::Slides(SlidesEntry {
            items: vec![SlideItem::new("end", SpeechScript::phrase("goodbye"))],
        }),
    ]);
    let meta = meta(&script, &[video(20.0, &[10.0]), slides(&[5.0])]);

    let err = compose_episode(&script, &meta, 300, 16.0).unwrap_err();
    assert_eq!(
        err,
        TimelineError::Infeasible {
            retrofit_budget: -60,
            deficit: 75,
        }
    );
    assert_eq!(
        err.remediation(300),
        "use a target duration of at least 375 frames"
    );
}

#[test]
fn test_tracks_cover_target_exactly() {
    let (script, metadata) = mixed_episode();
    let meta = meta(&script, &metadata);

    for target in [530, 600, 800, 1500, 2748] {
        let composition = compose_episode(&script, &meta, target, 16.0)
            .unwrap()
            .composition;
        assert!(validate_composition(&composition, Some(target)).is_empty());
        assert_eq!(composition.visual_frames(), target);
        assert_eq!(composition.audio_frames(), target);
        assert_eq!(composition.visual_track.last().map(|r| r.to), Some(target - 1));
        assert_eq!(composition.audio_track.last().map(|r| r.to), Some(target - 1));
    }
}

#[test]
fn test_frame_budget_is_conserved() {
    let (script, metadata) = mixed_episode();
    let meta = meta(&script, &metadata);
    let totals = meta.totals;

    let video_frames: u64 = meta
        .entries
        .iter()
        .map(|entry| match entry {
            EntryMeta::Video(video) => video.len(),
            EntryMeta::Slides(_) => 0,
        })
        .sum();
    assert_eq!(video_frames, 1440 + 696 + 480);
    assert_eq!(
        totals.normal + totals.safe_accelerated + totals.fast_forward,
        video_frames
    );
    assert_eq!(totals.normal, 316);
    assert_eq!(totals.slides, 132);
    assert_eq!(totals.fast_forward, 1080);
}

#[test]
fn test_rates_are_monotonic() {
    let (script, metadata) = mixed_episode();
    let meta = meta(&script, &metadata);

    for target in [530, 600, 800, 1500, 2748] {
        let acceleration = compose_episode(&script, &meta, target, 16.0)
            .unwrap()
            .solution
            .acceleration;
        assert!(acceleration.fast_forward_rate >= acceleration.safe_rate);
        assert!(acceleration.safe_rate >= 1.0);
    }
}

#[test]
fn test_composition_is_deterministic() {
    let (script, metadata) = mixed_episode();
    let first = compose_episode(&script, &meta(&script, &metadata), 800, 16.0).unwrap();
    let second = compose_episode(&script, &meta(&script, &metadata), 800, 16.0).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first.composition).unwrap(),
        serde_json::to_string(&second.composition).unwrap()
    );
}

#[test]
fn test_speech_is_never_accelerated() {
    let (script, metadata) = mixed_episode();
    let meta = meta(&script, &metadata);

    for (entry_index, entry) in script.entries.iter().enumerate() {
        let (ScriptEntry::Video(clip), EntryMeta::Video(classified), EntryMetadata::Video { cue_durations, .. }) =
            (entry, &meta.entries[entry_index], &metadata[entry_index])
        else {
            continue;
        };
        let end = classified.first_frame + classified.len();
        for (cue, secs) in clip.commentary.iter().zip(cue_durations) {
            let window_end = (cue.at_source_frame + (secs * FPS).round() as u64).min(end);
            for frame in cue.at_source_frame..window_end {
                let idx = (frame - classified.first_frame) as usize;
                assert_eq!(
                    classified.frames[idx],
                    FrameTreatment::Normal,
                    "entry {} frame {}",
                    entry_index,
                    frame
                );
            }
        }
    }
}

#[test]
fn test_slides_play_at_normal_speed() {
    let (script, metadata) = mixed_episode();
    let meta = meta(&script, &metadata);
    let composition = compose_episode(&script, &meta, 600, 16.0)
        .unwrap()
        .composition;

    let slide_frames: u64 = composition
        .visual_track
        .iter()
        .filter(|r| matches!(r.payload, VisualEntry::Slide { .. }))
        .map(|r| r.len())
        .sum();
    assert_eq!(slide_frames, 132);
}

/// A clip with a one-frame cue, a one-frame slide and a second clip, all at
/// normal speed.
fn blink_episode(clip_frames: u64) -> (Script, Vec<EntryMetadata>) {
    let script = Script::new(vec![
        ScriptEntry::Video(
            VideoEntry::new("a.mp4")
                .with_normal_speed(0, clip_frames)
                .with_cue(clip_frames / 2, SpeechScript::phrase("now")),
        ),
        ScriptEntry::Slides(SlidesEntry {
            items: vec![SlideItem::new("blink", SpeechScript::phrase("blink"))],
        }),
        ScriptEntry::Video(VideoEntry::new("b.mp4").with_normal_speed(0, clip_frames)),
    ]);
    let clip_secs = clip_frames as f64 / FPS;
    let metadata = vec![
        video(clip_secs, &[1.0 / FPS]),
        slides(&[1.0 / FPS]),
        video(clip_secs, &[]),
    ];
    (script, metadata)
}

#[test]
fn test_one_frame_slide_and_cue_stay_on_both_tracks() {
    let (script, metadata) = blink_episode(48);
    let meta = meta(&script, &metadata);
    assert_eq!(meta.totals.normal, 96);
    assert_eq!(meta.totals.slides, 1);

    let composition = compose_episode(&script, &meta, 97, 16.0).unwrap().composition;

    let visual = &composition.visual_track;
    assert_eq!(bounds(visual), vec![(0, 46), (47, 48), (49, 96)]);
    assert!(matches!(&visual[1].payload, VisualEntry::Slide { id, .. } if id == "blink"));
    match &visual[0].payload {
        VisualEntry::Video {
            source,
            start_source_frame,
            end_source_frame,
            ..
        } => {
            assert_eq!(source, "a.mp4");
            assert_eq!((*start_source_frame, *end_source_frame), (0, 47));
        }
        other => panic!("expected a.mp4, got {:?}", other),
    }

    let audio = &composition.audio_track;
    assert_eq!(
        bounds(audio),
        vec![(0, 22), (23, 24), (25, 46), (47, 48), (49, 96)]
    );
    assert_eq!(
        audio[1].payload,
        AudioEntry::Narration {
            entry_index: 0,
            cue_index: 0,
            speech: SpeechScript::phrase("now"),
        }
    );
    assert_eq!(
        audio[3].payload,
        AudioEntry::Narration {
            entry_index: 1,
            cue_index: 0,
            speech: SpeechScript::phrase("blink"),
        }
    );
}

#[test]
fn test_absorbed_span_never_seeks_past_clip_end() {
    let (script, metadata) = blink_episode(2);
    let meta = meta(&script, &metadata);

    // Neither two-frame clip can spare a frame for the slide.
    let composition = compose_episode(&script, &meta, 5, 16.0).unwrap().composition;
    assert_eq!(bounds(&composition.visual_track), vec![(0, 2), (3, 4)]);
    for range in &composition.visual_track {
        match &range.payload {
            VisualEntry::Video {
                end_source_frame, ..
            } => assert!(*end_source_frame <= 2),
            other => panic!("expected video, got {:?}", other),
        }
    }
}
