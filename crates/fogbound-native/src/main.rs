//! Headless rehearsal: plays the whole story against a manual clock and a
//! recording device, reading every bubble as a patient visitor would.
//!
//! Usage: `fogbound-native [seed]`. Set `RUST_LOG=debug` to see every cue.

use std::rc::Rc;

use fogbound_core::bubble::{expansion_ms, PopOutcome};
use fogbound_core::constants::PAGE_SWAP_MS;
use fogbound_core::scene::AdvanceOutcome;
use fogbound_core::testing::{RecordingDevice, RecordingStage, StageEvent};
use fogbound_core::{
    BubbleCue, Collaborators, ManualClock, SceneCue, Scheduler, Story, StoryConfig,
};

/// Time a visitor spends on a cleared scene before looking for the next one.
const LINGER_MS: u64 = 8000;
/// Pause between reading one bubble and clicking the next.
const READER_PAUSE_MS: u64 = 1200;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let seed = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<u64>()
            .map_err(|e| anyhow::anyhow!("seed {arg:?}: {e}"))?,
        None => 0,
    };

    let config = StoryConfig::default_story()?;
    for problem in config.validate() {
        log::warn!("[config] {problem}");
    }

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

    log::info!("rehearsal starting (seed {seed})");
    story.begin();
    clock.advance(READER_PAUSE_MS);
    story.first_gesture();

    rehearse(&story, &clock)?;

    device.finish_all();
    clock.run_until_idle();
    summarize(&stage, &device, clock.now_ms());
    Ok(())
}

fn rehearse(story: &Story, clock: &ManualClock) -> anyhow::Result<()> {
    while !story.is_finished() {
        let scene = story.current_scene();
        let bubbles = story.bubbles().ids_in(scene);
        log::info!("[story] {scene}: {} bubble(s)", bubbles.len());

        if bubbles.is_empty() {
            match story.continue_from(scene) {
                AdvanceOutcome::Started { .. } | AdvanceOutcome::Finished => {}
                other => anyhow::bail!("{scene} cannot continue: {other:?}"),
            }
        }

        for id in &bubbles {
            if !story.expand(id) {
                log::warn!("[story] {id} refused to expand");
                continue;
            }
            clock.advance(expansion_ms() as u64);
            let mut pages = 1;
            while story.next_page(id) {
                clock.advance(PAGE_SWAP_MS as u64);
                pages += 1;
            }
            clock.advance(READER_PAUSE_MS);
            match story.pop(id) {
                PopOutcome::SceneCleared(s) => log::info!("[story] {s} cleared"),
                PopOutcome::Rejected => log::warn!("[story] {id} refused to pop"),
                _ => {}
            }
            log::debug!("[story] read {id} over {pages} page(s)");
        }

        if story.is_finished() {
            break;
        }
        clock.advance(LINGER_MS);
        if story.current_scene() == scene {
            anyhow::bail!("story stalled on {scene}");
        }
    }
    Ok(())
}

fn summarize(stage: &RecordingStage, device: &RecordingDevice, now: u64) {
    let transitions =
        stage.count(|e| matches!(e, StageEvent::Scene(SceneCue::MarkTransitioning(_))));
    let pops = stage.count(|e| matches!(e, StageEvent::Bubble(BubbleCue::Pop(_))));
    log::info!(
        "rehearsal finished at {:.1}s: {} transition(s), {} bubble(s) popped, {} voice(s) loaded",
        now as f64 / 1000.0,
        transitions,
        pops,
        device.load_count()
    );
    for voice in device.playing() {
        if let Some(record) = device.voice(voice) {
            log::info!("[audio] still playing {} at {:.2}", record.source, record.volume);
        }
    }
}
