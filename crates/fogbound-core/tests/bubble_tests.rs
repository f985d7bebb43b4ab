// Bubble sizing, expansion choreography, pagination, page audio and popping.

use fogbound_core::bubble::*;
use fogbound_core::clock::ManualClock;
use fogbound_core::config::{AmbienceConfig, PersonaCatalog, TrackCatalog};
use fogbound_core::constants::{IDLE_DELAY_MAX_MS, PAGE_SWAP_MS};
use fogbound_core::ids::{BubbleId, SceneId};
use fogbound_core::mixer::{AudioMixer, POP_TRACK};
use fogbound_core::persona::{Decoration, EntranceStyle, IdleAnimation};
use fogbound_core::stage::{BubbleCue, BubbleDef};
use fogbound_core::testing::{RecordingDevice, RecordingStage, StageEvent};
use std::rc::Rc;

struct Rig {
    clock: Rc<ManualClock>,
    device: Rc<RecordingDevice>,
    stage: Rc<RecordingStage>,
    mixer: AudioMixer,
    bubbles: BubbleController,
}

fn rig() -> Rig {
    let clock = Rc::new(ManualClock::new());
    let device = Rc::new(RecordingDevice::new());
    let stage = Rc::new(RecordingStage::timed(clock.clone()));
    let tracks = TrackCatalog::new()
        .track(POP_TRACK, "pop.mp3", 0.6)
        .track("alpha-1", "alpha-1.mp3", 0.8)
        .track("alpha-2", "alpha-2.mp3", 0.8)
        .track("beta-1", "beta-1.mp3", 0.8);
    let personas = PersonaCatalog::new()
        .persona("alpha", EntranceStyle::Drift, IdleAnimation::Bob, None)
        .persona(
            "beta",
            EntranceStyle::Rise,
            IdleAnimation::Sway,
            Some(Decoration::Leaves),
        );
    let mixer = AudioMixer::new(
        Rc::new(AmbienceConfig::new()),
        Rc::new(tracks),
        device.clone(),
        clock.clone(),
    );
    let bubbles = BubbleController::new(
        Rc::new(personas),
        mixer.clone(),
        stage.clone(),
        clock.clone(),
        7,
    );
    Rig {
        clock,
        device,
        stage,
        mixer,
        bubbles,
    }
}

fn id(s: &str) -> BubbleId {
    BubbleId::from(s)
}

fn scene() -> SceneId {
    SceneId::new(2).unwrap()
}

impl Rig {
    fn expand_fully(&self, bubble: &str) {
        assert!(self.bubbles.expand(&id(bubble)));
        self.clock.advance(expansion_ms() as u64);
        assert_eq!(self.bubbles.state(&id(bubble)), Some(BubbleState::Revealed));
    }

    fn turn_page(&self, bubble: &str) {
        assert!(self.bubbles.next_page(&id(bubble)));
        self.clock.advance(PAGE_SWAP_MS as u64);
    }

    fn shown_sentences(&self, bubble: &str) -> Vec<usize> {
        self.stage
            .bubble_cues()
            .into_iter()
            .filter_map(|c| match c {
                BubbleCue::ShowSentence { bubble: b, index } if b == id(bubble) => Some(index),
                _ => None,
            })
            .collect()
    }
}

#[test]
fn size_grows_with_sentences_up_to_a_cap() {
    for n in 0..=3 {
        assert_eq!(expanded_size(n), 520.0, "n={n}");
    }
    assert_eq!(expanded_size(4), 600.0);
    assert_eq!(expanded_size(5), 680.0);
    assert_eq!(expanded_size(7), 680.0);
    assert_eq!(expanded_size(40), 680.0);
}

#[test]
fn page_counts() {
    assert_eq!(total_pages(0), 1);
    assert_eq!(total_pages(5), 1);
    assert_eq!(total_pages(7), 2);
    assert_eq!(total_pages(10), 2);
    assert_eq!(total_pages(11), 3);
    assert_eq!(page_range(2, 7), 5..7);
    assert_eq!(page_range(3, 11), 10..11);
}

#[test]
fn stagger_thins_out_as_pages_fill() {
    assert_eq!(stagger_ms(1), 5000);
    assert_eq!(stagger_ms(3), 5000);
    assert_eq!(stagger_ms(4), 3000);
    assert_eq!(stagger_ms(6), 3000);
    assert_eq!(stagger_ms(7), 2000);
    assert_eq!(stagger_ms(10), 2000);
    assert_eq!(stagger_ms(11), 1500);
}

#[test]
fn spawn_then_enter_on_next_frame() {
    let rig = rig();
    let spawned = rig.bubbles.populate(
        scene(),
        vec![
            BubbleDef::new("a", "alpha", 3),
            BubbleDef::new("b", "beta", 4),
            BubbleDef::new("a", "alpha", 2),
        ],
    );
    assert_eq!(spawned, 2, "duplicate id is skipped");
    assert_eq!(rig.bubbles.remaining(scene()), 2);
    assert_eq!(
        rig.stage.count(|e| matches!(e, StageEvent::Bubble(BubbleCue::Enter(_)))),
        0
    );

    for cue in rig.stage.bubble_cues() {
        if let BubbleCue::Spawn { idle_delay_ms, .. } = cue {
            assert!(idle_delay_ms <= IDLE_DELAY_MAX_MS);
        }
    }

    rig.clock.advance(16);
    assert_eq!(
        rig.stage.count(|e| matches!(e, StageEvent::Bubble(BubbleCue::Enter(_)))),
        2
    );
}

#[test]
fn unknown_persona_falls_back_to_default_look() {
    let rig = rig();
    assert_eq!(
        rig.bubbles
            .populate(scene(), vec![BubbleDef::new("x", "ghost", 2)]),
        1
    );
    let persona = rig.stage.bubble_cues().into_iter().find_map(|c| match c {
        BubbleCue::Spawn { persona, .. } => Some(persona),
        _ => None,
    });
    assert_eq!(persona, Some(Default::default()));
}

#[test]
fn expansion_runs_its_phases_in_order() {
    let rig = rig();
    rig.bubbles
        .populate(scene(), vec![BubbleDef::new("a", "alpha", 7)]);
    rig.clock.advance(16);
    let start = 16;

    assert!(rig.bubbles.expand(&id("a")));
    assert!(!rig.bubbles.expand(&id("a")), "second expand is ignored");
    assert_eq!(rig.bubbles.state(&id("a")), Some(BubbleState::Expanding));

    rig.clock.advance(expansion_ms() as u64 - 1);
    assert_eq!(rig.bubbles.state(&id("a")), Some(BubbleState::Expanding));
    rig.clock.advance(1);
    assert_eq!(rig.bubbles.state(&id("a")), Some(BubbleState::Revealed));

    let at = |pred: fn(&StageEvent) -> bool| rig.stage.time_of(pred).unwrap();
    assert_eq!(
        at(|e| matches!(e, StageEvent::Bubble(BubbleCue::Resize { .. }))),
        start
    );
    assert_eq!(
        at(|e| matches!(e, StageEvent::Bubble(BubbleCue::Emphasis(_)))),
        start + 600
    );
    assert_eq!(
        at(|e| matches!(e, StageEvent::Bubble(BubbleCue::RevealPage { .. }))),
        start + 1100
    );

    let layout = rig.bubbles.layout(&id("a")).unwrap();
    assert_eq!(layout.size.x, 680.0);
    assert_eq!(rig.bubbles.total_pages(&id("a")), Some(2));
}

#[test]
fn sentences_are_staggered_by_page_length() {
    let rig = rig();
    rig.bubbles
        .populate(scene(), vec![BubbleDef::new("a", "alpha", 3)]);
    rig.bubbles.expand(&id("a"));
    rig.clock.run_until_idle();

    assert_eq!(rig.shown_sentences("a"), vec![0, 1, 2]);
    let times: Vec<u64> = rig
        .stage
        .events()
        .into_iter()
        .filter(|(_, e)| matches!(e, StageEvent::Bubble(BubbleCue::ShowSentence { .. })))
        .map(|(t, _)| t)
        .collect();
    assert_eq!(times, vec![1400, 6400, 11400]);
}

#[test]
fn turning_the_page_drops_pending_sentences() {
    let rig = rig();
    rig.bubbles
        .populate(scene(), vec![BubbleDef::new("a", "alpha", 7)]);
    rig.expand_fully("a");
    assert_eq!(rig.shown_sentences("a"), vec![0]);

    rig.turn_page("a");
    assert_eq!(rig.bubbles.current_page(&id("a")), Some(2));
    assert!(!rig.bubbles.next_page(&id("a")), "no page after the last");
    rig.clock.run_until_idle();
    assert_eq!(rig.shown_sentences("a"), vec![0, 5, 6]);

    let reveal = rig.stage.bubble_cues().into_iter().rev().find_map(|c| match c {
        BubbleCue::RevealPage {
            page,
            total_pages,
            sentences,
            ..
        } => Some((page, total_pages, sentences)),
        _ => None,
    });
    assert_eq!(reveal, Some((2, 2, 5..7)));
}

#[test]
fn next_page_is_refused_while_expanding() {
    let rig = rig();
    rig.bubbles
        .populate(scene(), vec![BubbleDef::new("a", "alpha", 12)]);
    rig.bubbles.expand(&id("a"));
    assert!(!rig.bubbles.next_page(&id("a")));
    rig.clock.advance(expansion_ms() as u64);
    assert!(rig.bubbles.next_page(&id("a")));
    assert!(!rig.bubbles.next_page(&id("a")), "still swapping pages");
}

#[test]
fn pop_waits_for_the_last_page() {
    let rig = rig();
    rig.bubbles.populate(
        scene(),
        vec![
            BubbleDef::new("a", "alpha", 7),
            BubbleDef::new("b", "beta", 2),
        ],
    );
    assert_eq!(rig.bubbles.pop(&id("a")), PopOutcome::Rejected);

    rig.bubbles.expand(&id("a"));
    assert_eq!(rig.bubbles.pop(&id("a")), PopOutcome::Rejected);
    rig.clock.advance(expansion_ms() as u64);
    assert_eq!(rig.bubbles.pop(&id("a")), PopOutcome::Rejected);
    assert_eq!(rig.bubbles.state(&id("a")), Some(BubbleState::Revealed));

    rig.turn_page("a");
    assert_eq!(
        rig.bubbles.pop(&id("a")),
        PopOutcome::Popped { remaining: 1 }
    );
    assert!(!rig.bubbles.exists(&id("a")));
    assert_eq!(rig.bubbles.pop(&id("a")), PopOutcome::Rejected);

    rig.expand_fully("b");
    assert_eq!(rig.bubbles.pop(&id("b")), PopOutcome::SceneCleared(scene()));
    assert_eq!(rig.device.voices_for("pop.mp3").len(), 2);
}

#[test]
fn pop_is_allowed_mid_swap_onto_the_last_page() {
    let rig = rig();
    rig.bubbles
        .populate(scene(), vec![BubbleDef::new("a", "alpha", 6)]);
    rig.expand_fully("a");
    assert!(rig.bubbles.next_page(&id("a")));
    assert_eq!(rig.bubbles.state(&id("a")), Some(BubbleState::Paginating));
    assert_eq!(rig.bubbles.pop(&id("a")), PopOutcome::SceneCleared(scene()));

    // the delayed page reveal finds nothing to show
    rig.clock.run_until_idle();
    assert_eq!(
        rig.stage
            .count(|e| matches!(e, StageEvent::Bubble(BubbleCue::RevealPage { page: 2, .. }))),
        0
    );
}

#[test]
fn page_tracks_swap_and_stop_on_pop() {
    let rig = rig();
    rig.bubbles.populate(
        scene(),
        vec![BubbleDef::new("a", "alpha", 7).with_tracks(&["alpha-1", "alpha-2"])],
    );
    assert_eq!(rig.device.load_count(), 0, "no audio before reveal");

    rig.expand_fully("a");
    let first = rig.device.voices_for("alpha-1.mp3");
    assert_eq!(first.len(), 1);
    assert!(rig.device.voice(first[0]).unwrap().playing);
    assert!(rig.bubbles.active_track(&id("a")).is_some());

    rig.turn_page("a");
    assert!(rig.device.voice(first[0]).unwrap().released);
    let second = rig.device.voices_for("alpha-2.mp3")[0];
    assert!(rig.device.voice(second).unwrap().playing);

    rig.bubbles.pop(&id("a"));
    assert!(rig.device.voice(second).unwrap().released);
    let pop = rig.device.voices_for("pop.mp3")[0];
    assert_eq!(rig.device.playing(), vec![pop]);
}

#[test]
fn page_without_a_track_keeps_the_previous_one() {
    let rig = rig();
    rig.bubbles.populate(
        scene(),
        vec![BubbleDef::new("a", "alpha", 6).with_tracks(&["alpha-1", ""])],
    );
    rig.expand_fully("a");
    let handle = rig.bubbles.active_track(&id("a")).unwrap();
    rig.turn_page("a");
    assert_eq!(rig.bubbles.active_track(&id("a")), Some(handle));
    assert!(rig.mixer.is_playing(handle));
}

#[test]
fn bubbles_do_not_silence_each_other() {
    let rig = rig();
    rig.bubbles.populate(
        scene(),
        vec![
            BubbleDef::new("a", "alpha", 2).with_tracks(&["alpha-1"]),
            BubbleDef::new("b", "beta", 2).with_tracks(&["beta-1"]),
        ],
    );
    rig.bubbles.expand(&id("a"));
    rig.bubbles.expand(&id("b"));
    rig.clock.advance(expansion_ms() as u64);

    let a = rig.bubbles.active_track(&id("a")).unwrap();
    let b = rig.bubbles.active_track(&id("b")).unwrap();
    assert!(rig.mixer.is_playing(a));
    assert!(rig.mixer.is_playing(b));

    rig.bubbles.pop(&id("a"));
    assert!(!rig.mixer.is_playing(a));
    assert!(rig.mixer.is_playing(b));
}

#[test]
fn discarding_a_scene_removes_its_bubbles_and_audio() {
    let rig = rig();
    let other = SceneId::new(3).unwrap();
    rig.bubbles.populate(
        scene(),
        vec![BubbleDef::new("a", "alpha", 2).with_tracks(&["alpha-1"])],
    );
    rig.bubbles
        .populate(other, vec![BubbleDef::new("b", "beta", 2)]);
    rig.expand_fully("a");
    let handle = rig.bubbles.active_track(&id("a")).unwrap();

    rig.bubbles.discard_scene(scene());
    assert!(!rig.bubbles.exists(&id("a")));
    assert!(!rig.mixer.is_playing(handle));
    assert_eq!(rig.bubbles.ids_in(other), vec![id("b")]);
    assert!(rig
        .stage
        .bubble_cues()
        .contains(&BubbleCue::Discard(id("a"))));
}

#[test]
fn discard_mid_expansion_cancels_the_remaining_phases() {
    let rig = rig();
    rig.bubbles.populate(
        scene(),
        vec![BubbleDef::new("a", "alpha", 7).with_tracks(&["alpha-1", "alpha-2"])],
    );
    assert!(rig.bubbles.expand(&id("a")));
    rig.clock.advance(700);

    rig.bubbles.discard_scene(scene());
    rig.clock.run_until_idle();

    assert_eq!(rig.device.load_count(), 0);
    assert_eq!(
        rig.stage
            .count(|e| matches!(e, StageEvent::Bubble(BubbleCue::RevealPage { .. }))),
        0
    );
    assert!(rig.shown_sentences("a").is_empty());
    assert_eq!(rig.bubbles.state(&id("a")), None);
}

#[test]
fn discard_mid_page_swap_never_reveals_the_next_page() {
    let rig = rig();
    rig.bubbles.populate(
        scene(),
        vec![BubbleDef::new("a", "alpha", 7).with_tracks(&["alpha-1", "alpha-2"])],
    );
    rig.expand_fully("a");
    assert!(rig.bubbles.next_page(&id("a")));
    rig.clock.advance(PAGE_SWAP_MS as u64 / 2);

    rig.bubbles.discard_scene(scene());
    rig.clock.run_until_idle();

    assert_eq!(
        rig.stage
            .count(|e| matches!(e, StageEvent::Bubble(BubbleCue::RevealPage { page: 2, .. }))),
        0
    );
    assert_eq!(rig.shown_sentences("a"), vec![0]);
    assert!(rig.device.playing().is_empty());
}

#[test]
fn unknown_bubbles_are_ignored() {
    let rig = rig();
    assert!(!rig.bubbles.expand(&id("nope")));
    assert!(!rig.bubbles.next_page(&id("nope")));
    assert_eq!(rig.bubbles.pop(&id("nope")), PopOutcome::Rejected);
    assert_eq!(rig.bubbles.state(&id("nope")), None);
}
