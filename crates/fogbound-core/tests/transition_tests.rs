// Transition timeline: phase ordering, completion, busy rejection and the
// spec builder's validation.

use fogbound_core::clock::ManualClock;
use fogbound_core::config::StoryConfig;
use fogbound_core::error::ConfigError;
use fogbound_core::ids::{LayerId, SceneId};
use fogbound_core::mixer::AudioMixer;
use fogbound_core::stage::SceneCue;
use fogbound_core::testing::{RecordingDevice, RecordingStage, StageEvent};
use fogbound_core::transition::{
    Completion, EngineState, RunOutcome, TransitionEngine, TransitionSpec,
};
use std::cell::Cell;
use std::rc::Rc;

struct Rig {
    clock: Rc<ManualClock>,
    device: Rc<RecordingDevice>,
    stage: Rc<RecordingStage>,
    mixer: AudioMixer,
    engine: TransitionEngine,
    config: StoryConfig,
}

fn scene(n: u8) -> SceneId {
    SceneId::new(n).unwrap()
}

fn rig() -> Rig {
    let config = StoryConfig::default_story().unwrap();
    let clock = Rc::new(ManualClock::new());
    let device = Rc::new(RecordingDevice::new());
    let stage = Rc::new(RecordingStage::timed(clock.clone()));
    let mixer = AudioMixer::new(
        config.ambience.clone(),
        config.tracks.clone(),
        device.clone(),
        clock.clone(),
    );
    let engine = TransitionEngine::new(mixer.clone(), stage.clone(), clock.clone());
    Rig {
        clock,
        device,
        stage,
        mixer,
        engine,
        config,
    }
}

fn counter() -> (Rc<Cell<u32>>, Box<dyn FnOnce()>) {
    let count = Rc::new(Cell::new(0));
    let inner = count.clone();
    (count, Box::new(move || inner.set(inner.get() + 1)))
}

#[test]
fn completion_fires_once_at_duration() {
    let rig = rig();
    let spec = rig.config.transitions.get(scene(1), scene(2)).unwrap();
    assert_eq!(spec.duration_ms(), 5500);

    let fired_at = Rc::new(Cell::new(None));
    let clock = rig.clock.clone();
    let slot = fired_at.clone();
    let outcome = rig.engine.run(
        spec,
        Box::new(move || {
            use fogbound_core::clock::Scheduler;
            slot.set(Some(clock.now_ms()));
        }),
    );
    assert_eq!(outcome, RunOutcome::Started);
    assert_eq!(
        rig.engine.state(),
        EngineState::Running {
            from: scene(1),
            to: scene(2)
        }
    );

    rig.clock.advance(5499);
    assert_eq!(fired_at.get(), None);
    rig.clock.advance(1);
    assert_eq!(fired_at.get(), Some(5500));
    assert_eq!(rig.engine.state(), EngineState::Idle);

    rig.clock.run_until_idle();
    assert_eq!(fired_at.get(), Some(5500));
}

#[test]
fn second_run_is_rejected_while_busy() {
    let rig = rig();
    let first = rig.config.transitions.get(scene(1), scene(2)).unwrap();
    let second = rig.config.transitions.get(scene(2), scene(3)).unwrap();
    let (done, task) = counter();
    let (stray, stray_task) = counter();

    assert_eq!(rig.engine.run(first, task), RunOutcome::Started);
    assert_eq!(rig.engine.run(second.clone(), stray_task), RunOutcome::Busy);
    rig.clock.run_until_idle();
    assert_eq!(done.get(), 1);
    assert_eq!(stray.get(), 0);

    // idle again: the next one goes through
    let (again, task) = counter();
    assert_eq!(rig.engine.run(second, task), RunOutcome::Started);
    rig.clock.run_until_idle();
    assert_eq!(again.get(), 1);
}

#[test]
fn phases_land_at_their_offsets() {
    let rig = rig();
    let spec = rig.config.transitions.get(scene(1), scene(2)).unwrap();
    let (_, task) = counter();
    rig.engine.run(spec, task);

    // offset zero happens before run returns
    let cues = rig.stage.scene_cues();
    assert_eq!(cues[0], SceneCue::MarkTransitioning(scene(1)));
    assert!(cues.contains(&SceneCue::ExitDecorations(scene(1))));
    assert_eq!(rig.device.voices_for("audio/fx/gust.mp3").len(), 1);

    rig.clock.run_until_idle();
    let at = |cue: SceneCue| {
        rig.stage
            .time_of(|e| *e == StageEvent::Scene(cue.clone()))
            .unwrap()
    };
    assert_eq!(at(SceneCue::Fog(0.85)), 800);
    assert_eq!(at(SceneCue::Background(scene(2))), 2500);
    assert_eq!(at(SceneCue::EnterDecorations(scene(2))), 3500);
    assert_eq!(at(SceneCue::Fog(0.5)), 4500);
}

#[test]
fn completion_cues_precede_the_callback() {
    let rig = rig();
    let spec = rig.config.transitions.get(scene(1), scene(2)).unwrap();
    let expected = spec.on_complete().to_vec();
    let seen = Rc::new(Cell::new(false));
    let stage = rig.stage.clone();
    let flag = seen.clone();
    rig.engine.run(
        spec,
        Box::new(move || {
            let cues = stage.scene_cues();
            flag.set(cues.ends_with(&expected));
        }),
    );
    rig.clock.run_until_idle();
    assert!(seen.get());
}

#[test]
fn continuing_ambience_dips_then_brings_in_the_next_scene() {
    let rig = rig();
    rig.mixer.start_ambient(scene(1));
    rig.mixer.fade_ambient_in(0);
    let wind = LayerId::from("wind");
    let frogs = LayerId::from("frogs");
    assert_eq!(rig.mixer.layer_volume(&wind), Some(0.35));

    let spec = rig.config.transitions.get(scene(1), scene(2)).unwrap();
    let (_, task) = counter();
    rig.engine.run(spec, task);

    rig.clock.advance(1500);
    let dipped = rig.mixer.layer_volume(&wind).unwrap();
    assert!((dipped - 0.35 * 0.3).abs() < 1e-4, "dipped to {dipped}");
    assert!(rig.mixer.layer_volume(&frogs).is_none());

    rig.clock.advance(1000);
    assert!(rig.mixer.layer_volume(&frogs).is_some());

    rig.clock.run_until_idle();
    assert_eq!(rig.mixer.layer_volume(&wind), Some(0.3));
    assert_eq!(rig.mixer.layer_volume(&frogs), Some(0.25));
    assert_eq!(rig.device.voices_for("audio/ambience/wind.mp3").len(), 1);
}

#[test]
fn finale_transition_swaps_the_palette() {
    let rig = rig();
    rig.mixer.start_ambient(scene(8));
    rig.mixer.fade_ambient_in(0);
    let spec = rig.config.transitions.get(scene(8), scene(9)).unwrap();
    let (done, task) = counter();
    rig.engine.run(spec, task);
    rig.clock.run_until_idle();

    assert_eq!(done.get(), 1);
    assert_eq!(
        rig.mixer.layer_ids(),
        vec![LayerId::from("choir"), LayerId::from("bells")]
    );
    assert_eq!(rig.mixer.layer_volume(&LayerId::from("choir")), Some(0.4));
}

#[test]
fn completion_runs_its_task_once() {
    let (count, task) = counter();
    let completion = Completion::new(task);
    let twin = completion.clone();
    assert!(!completion.has_fired());
    assert!(completion.fire());
    assert!(!twin.fire());
    assert!(twin.has_fired());
    assert_eq!(count.get(), 1);
}

#[test]
fn builder_rejects_bad_tables() {
    let err = TransitionSpec::builder(scene(1), scene(3), 1000)
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        ConfigError::NotAdjacent {
            from: scene(1),
            to: scene(3)
        }
    );

    let err = TransitionSpec::builder(scene(1), scene(2), 1000)
        .audio(1200, 500)
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::FadeExceedsDuration { fade_ms: 1200, .. }
    ));

    let err = TransitionSpec::builder(scene(1), scene(2), 1000)
        .cue(1001, SceneCue::Fog(0.1))
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::PhaseOutOfRange { offset_ms: 1001, .. }
    ));

    let err = TransitionSpec::builder(scene(1), scene(2), 1000)
        .partial_level(1.5)
        .build()
        .unwrap_err();
    assert_eq!(err, ConfigError::LevelOutOfRange(1.5));
}

#[test]
fn phases_are_sorted_stably() {
    let spec = TransitionSpec::builder(scene(2), scene(3), 1000)
        .cue(500, SceneCue::Fog(0.5))
        .cue(0, SceneCue::ExitDecorations(scene(2)))
        .cue(500, SceneCue::Background(scene(3)))
        .build()
        .unwrap();
    let offsets: Vec<u32> = spec.phases().iter().map(|p| p.offset_ms).collect();
    assert_eq!(offsets, vec![0, 500, 500]);
    assert!(matches!(
        spec.phases()[1].effect,
        fogbound_core::transition::PhaseEffect::Scene(SceneCue::Fog(_))
    ));
}
