//! The whole narrative wired together, and the surface the UI talks to.

use crate::bubble::{BubbleController, PopOutcome};
use crate::clock::{Scheduler, TimerId};
use crate::config::{StoryConfig, CROW_TRACK};
use crate::constants::{CROW_DELAY_MAX_MS, CROW_DELAY_MIN_MS, INITIAL_AMBIENT_FADE_MS};
use crate::device::PlaybackDevice;
use crate::ids::{BubbleId, SceneId, TrackId};
use crate::mixer::AudioMixer;
use crate::scene::{AdvanceOutcome, SceneController};
use crate::stage::{ContentProvider, Stage};
use crate::transition::TransitionEngine;
use rand::prelude::*;
use std::cell::Cell;
use std::rc::Rc;

/// External capabilities the story runs on.
pub struct Collaborators {
    pub device: Rc<dyn PlaybackDevice>,
    pub stage: Rc<dyn Stage>,
    pub scheduler: Rc<dyn Scheduler>,
    pub content: Rc<dyn ContentProvider>,
}

pub struct Story {
    scheduler: Rc<dyn Scheduler>,
    mixer: AudioMixer,
    engine: TransitionEngine,
    scenes: SceneController,
    bubbles: BubbleController,
    crow: Rc<Cell<Option<TimerId>>>,
    crow_delay_ms: u32,
    began: Cell<bool>,
}

impl Story {
    pub fn new(config: &StoryConfig, parts: Collaborators, seed: u64) -> Self {
        let Collaborators {
            device,
            stage,
            scheduler,
            content,
        } = parts;
        let mixer = AudioMixer::new(
            config.ambience.clone(),
            config.tracks.clone(),
            device,
            scheduler.clone(),
        );
        let engine = TransitionEngine::new(mixer.clone(), stage.clone(), scheduler.clone());
        // bubbles and the crow draw from independent streams
        let mut rng = StdRng::seed_from_u64(seed);
        let bubbles = BubbleController::new(
            config.personas.clone(),
            mixer.clone(),
            stage.clone(),
            scheduler.clone(),
            rng.gen(),
        );
        let crow_delay_ms = rng.gen_range(CROW_DELAY_MIN_MS..=CROW_DELAY_MAX_MS);
        let scenes = SceneController::new(
            config.transitions.clone(),
            engine.clone(),
            bubbles.clone(),
            content,
            stage,
        );
        Self {
            scheduler,
            mixer,
            engine,
            scenes,
            bubbles,
            crow: Rc::new(Cell::new(None)),
            crow_delay_ms,
            began: Cell::new(false),
        }
    }

    /// Start the opening scene: ambience fades in from silence, the first
    /// bubbles spawn and the crow is scheduled. Only the first call counts.
    pub fn begin(&self) {
        if self.began.replace(true) {
            return;
        }
        log::info!("[story] begin");
        self.mixer.start_ambient(SceneId::FIRST);
        self.mixer.fade_ambient_in(INITIAL_AMBIENT_FADE_MS);
        self.scenes.begin();

        let mixer = self.mixer.clone();
        let scenes = self.scenes.clone();
        let crow = self.crow.clone();
        let timer = self.scheduler.after(
            self.crow_delay_ms,
            Box::new(move || {
                crow.set(None);
                if scenes.current_scene() == SceneId::FIRST {
                    log::debug!("[story] crow");
                    mixer.play_effect(&TrackId::from(CROW_TRACK), None);
                }
            }),
        );
        self.crow.set(Some(timer));
        log::debug!("[story] crow due in {}ms", self.crow_delay_ms);
    }

    /// First user interaction: lift the autoplay mute.
    pub fn first_gesture(&self) {
        self.mixer.unmute();
    }

    pub fn expand(&self, bubble: &BubbleId) -> bool {
        let expanded = self.bubbles.expand(bubble);
        if expanded {
            if let Some(timer) = self.crow.take() {
                self.scheduler.cancel(timer);
                log::debug!("[story] crow cancelled");
            }
        }
        expanded
    }

    pub fn next_page(&self, bubble: &BubbleId) -> bool {
        self.bubbles.next_page(bubble)
    }

    pub fn pop(&self, bubble: &BubbleId) -> PopOutcome {
        let outcome = self.bubbles.pop(bubble);
        if let PopOutcome::SceneCleared(scene) = outcome {
            self.scenes.advance_requested(scene);
        }
        outcome
    }

    /// The scene's continue affordance was used.
    pub fn continue_from(&self, scene: SceneId) -> AdvanceOutcome {
        self.scenes.advance_requested(scene)
    }

    pub fn current_scene(&self) -> SceneId {
        self.scenes.current_scene()
    }

    pub fn is_finished(&self) -> bool {
        self.scenes.is_finished()
    }

    pub fn crow_pending(&self) -> bool {
        self.crow.get().is_some()
    }

    pub fn mixer(&self) -> &AudioMixer {
        &self.mixer
    }

    pub fn engine(&self) -> &TransitionEngine {
        &self.engine
    }

    pub fn scenes(&self) -> &SceneController {
        &self.scenes
    }

    pub fn bubbles(&self) -> &BubbleController {
        &self.bubbles
    }
}
