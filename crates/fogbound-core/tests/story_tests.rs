// The assembled story: opening ambience, the crow cue, autoplay unmute and a
// complete read-through of the shipped content.

use fogbound_core::bubble::{expansion_ms, PopOutcome};
use fogbound_core::clock::ManualClock;
use fogbound_core::config::StoryConfig;
use fogbound_core::constants::{CROW_DELAY_MAX_MS, INITIAL_AMBIENT_FADE_MS, PAGE_SWAP_MS};
use fogbound_core::ids::{BubbleId, LayerId, SceneId};
use fogbound_core::stage::SceneCue;
use fogbound_core::story::{Collaborators, Story};
use fogbound_core::testing::{RecordingDevice, RecordingStage};
use std::rc::Rc;

const CROW: &str = "audio/fx/crow.mp3";

struct Rig {
    clock: Rc<ManualClock>,
    device: Rc<RecordingDevice>,
    stage: Rc<RecordingStage>,
    story: Story,
}

fn rig(seed: u64) -> Rig {
    let config = StoryConfig::default_story().unwrap();
    let clock = Rc::new(ManualClock::new());
    let device = Rc::new(RecordingDevice::new());
    let stage = Rc::new(RecordingStage::timed(clock.clone()));
    let story = Story::new(
        &config,
        Collaborators {
            device: device.clone(),
            stage: stage.clone(),
            scheduler: clock.clone(),
            content: config.content.clone(),
        },
        seed,
    );
    Rig {
        clock,
        device,
        stage,
        story,
    }
}

fn narrator() -> BubbleId {
    BubbleId::from("s1-narrator")
}

#[test]
fn default_story_validates() {
    let config = StoryConfig::default_story().unwrap();
    assert_eq!(config.validate(), Vec::new());
}

#[test]
fn opening_ambience_fades_in_from_silence() {
    let rig = rig(1);
    rig.story.begin();
    let wind = LayerId::from("wind");
    assert_eq!(rig.story.mixer().layer_volume(&wind), Some(0.0));
    rig.clock.advance(INITIAL_AMBIENT_FADE_MS as u64 / 2);
    let half = rig.story.mixer().layer_volume(&wind).unwrap();
    assert!((half - 0.35 / 2.0).abs() < 1e-4, "half way at {half}");
    rig.clock.advance(INITIAL_AMBIENT_FADE_MS as u64 / 2);
    assert_eq!(rig.story.mixer().layer_volume(&wind), Some(0.35));
}

#[test]
fn first_gesture_unmutes_ambience() {
    let rig = rig(1);
    rig.story.begin();
    let voice = rig
        .story
        .mixer()
        .layer_voice(&LayerId::from("wind"))
        .unwrap();
    assert!(rig.device.voice(voice).unwrap().muted);
    rig.story.first_gesture();
    assert!(!rig.device.voice(voice).unwrap().muted);
    assert!(rig.story.mixer().is_unmuted());
}

#[test]
fn crow_calls_when_the_opening_is_left_alone() {
    for seed in 0..8 {
        let rig = rig(seed);
        rig.story.begin();
        assert!(rig.story.crow_pending());
        rig.clock.advance(CROW_DELAY_MAX_MS as u64);
        assert_eq!(rig.device.voices_for(CROW).len(), 1, "seed {seed}");
        assert!(!rig.story.crow_pending());
    }
}

#[test]
fn opening_a_bubble_silences_the_crow() {
    let rig = rig(3);
    rig.story.begin();
    rig.clock.advance(1000);
    assert!(rig.story.expand(&narrator()));
    assert!(!rig.story.crow_pending());
    rig.clock.advance(CROW_DELAY_MAX_MS as u64);
    assert!(rig.device.voices_for(CROW).is_empty());
}

#[test]
fn same_seed_same_timeline() {
    let a = rig(42);
    let b = rig(42);
    for r in [&a, &b] {
        r.story.begin();
        r.clock.advance(CROW_DELAY_MAX_MS as u64);
    }
    assert_eq!(a.stage.events(), b.stage.events());
    assert_eq!(a.device.calls(), b.device.calls());
}

#[test]
fn full_read_through_reaches_the_finale() {
    let rig = rig(5);
    rig.story.begin();
    rig.story.first_gesture();

    while !rig.story.is_finished() {
        let scene = rig.story.current_scene();
        let bubbles = rig.story.bubbles().ids_in(scene);
        if bubbles.is_empty() {
            rig.story.continue_from(scene);
        }
        for (i, id) in bubbles.iter().enumerate() {
            assert!(rig.story.expand(id));
            rig.clock.advance(expansion_ms() as u64);
            while rig.story.next_page(id) {
                rig.clock.advance(PAGE_SWAP_MS as u64);
            }
            let outcome = rig.story.pop(id);
            if i + 1 == bubbles.len() {
                assert_eq!(outcome, PopOutcome::SceneCleared(scene));
            }
        }
        if rig.story.is_finished() {
            break;
        }
        rig.clock.advance(8000);
        assert_eq!(rig.story.current_scene(), scene.next().unwrap());
    }

    assert_eq!(rig.story.current_scene(), SceneId::LAST);
    let transitions = rig
        .stage
        .scene_cues()
        .into_iter()
        .filter(|c| matches!(c, SceneCue::MarkTransitioning(_)))
        .count();
    assert_eq!(transitions, 8);
    assert_eq!(rig.stage.scene_cues().last(), Some(&SceneCue::Finale));

    // every one-shot ended or stopped; only the pops remain to finish
    rig.device.finish_all();
    rig.clock.run_until_idle();
    let playing: Vec<String> = rig
        .device
        .playing()
        .into_iter()
        .map(|v| rig.device.voice(v).unwrap().source)
        .collect();
    assert_eq!(
        playing,
        vec![
            "audio/ambience/choir.mp3".to_string(),
            "audio/ambience/bells.mp3".to_string()
        ]
    );
}
