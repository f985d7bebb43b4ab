//! Linear scene chain 1 -> 2 -> ... -> 9.
//!
//! Advancement requests are honoured only for the current scene and only
//! while idle, which absorbs racing "last bubble popped" signals.

use crate::bubble::BubbleController;
use crate::config::TransitionTable;
use crate::error::StoryError;
use crate::ids::SceneId;
use crate::stage::{ContentProvider, SceneCue, Stage};
use crate::transition::{RunOutcome, TransitionEngine};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneState {
    Pending,
    Active,
    TransitioningOut,
    TransitioningIn,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    Idle(SceneId),
    Transitioning { from: SceneId, to: SceneId },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Started { to: SceneId },
    /// Wrong scene, already transitioning, or the story is over.
    Ignored,
    /// There is no scene after this one.
    Finished,
    /// No transition configured; the scene stays put.
    Missing,
}

struct Shared {
    state: Cell<ControllerState>,
    /// Live scenes: one, or two while transitioning.
    scenes: RefCell<Vec<(SceneId, SceneState)>>,
    finished: Cell<bool>,
    transitions: Rc<TransitionTable>,
    engine: TransitionEngine,
    bubbles: BubbleController,
    content: Rc<dyn ContentProvider>,
    stage: Rc<dyn Stage>,
}

#[derive(Clone)]
pub struct SceneController {
    shared: Rc<Shared>,
}

impl SceneController {
    pub fn new(
        transitions: Rc<TransitionTable>,
        engine: TransitionEngine,
        bubbles: BubbleController,
        content: Rc<dyn ContentProvider>,
        stage: Rc<dyn Stage>,
    ) -> Self {
        Self {
            shared: Rc::new(Shared {
                state: Cell::new(ControllerState::Idle(SceneId::FIRST)),
                scenes: RefCell::new(Vec::new()),
                finished: Cell::new(false),
                transitions,
                engine,
                bubbles,
                content,
                stage,
            }),
        }
    }

    /// Activate and populate the first scene.
    pub fn begin(&self) {
        let shared = &self.shared;
        let first = SceneId::FIRST;
        *shared.scenes.borrow_mut() = vec![(first, SceneState::Active)];
        shared.state.set(ControllerState::Idle(first));
        shared.stage.scene_cue(SceneCue::Activate(first));
        log::info!("[scene] {first} active");
        Self::populate(shared, first);
    }

    pub fn current_scene(&self) -> SceneId {
        match self.shared.state.get() {
            ControllerState::Idle(scene) => scene,
            ControllerState::Transitioning { from, .. } => from,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.shared.state.get()
    }

    pub fn scene_state(&self, scene: SceneId) -> SceneState {
        self.shared
            .scenes
            .borrow()
            .iter()
            .find(|(id, _)| *id == scene)
            .map(|(_, s)| *s)
            .unwrap_or(SceneState::Pending)
    }

    pub fn is_finished(&self) -> bool {
        self.shared.finished.get()
    }

    /// `from` has been consumed (all bubbles popped, or its continue
    /// affordance used). Start the transition to the next scene.
    pub fn advance_requested(&self, from: SceneId) -> AdvanceOutcome {
        let shared = &self.shared;
        match shared.state.get() {
            ControllerState::Idle(current) if current == from && !shared.finished.get() => {}
            state => {
                log::debug!("[scene] advance from {from} ignored in {state:?}");
                return AdvanceOutcome::Ignored;
            }
        }
        let Some(to) = from.next() else {
            shared.finished.set(true);
            shared.stage.scene_cue(SceneCue::Finale);
            log::info!("[scene] story finished");
            return AdvanceOutcome::Finished;
        };
        let Some(spec) = shared.transitions.get(from, to) else {
            log::warn!("[scene] {}", StoryError::NoTransition { from, to });
            return AdvanceOutcome::Missing;
        };

        shared.state.set(ControllerState::Transitioning { from, to });
        {
            let mut scenes = shared.scenes.borrow_mut();
            for (id, state) in scenes.iter_mut() {
                if *id == from {
                    *state = SceneState::TransitioningOut;
                }
            }
            scenes.push((to, SceneState::TransitioningIn));
        }

        let weak = Rc::downgrade(shared);
        let outcome = shared
            .engine
            .run(spec, Box::new(move || Self::commit(&weak, from, to)));
        if outcome == RunOutcome::Busy {
            // engine still finishing something else; stay where we are
            shared.scenes.borrow_mut().retain(|(id, _)| *id != to);
            for (id, state) in shared.scenes.borrow_mut().iter_mut() {
                if *id == from {
                    *state = SceneState::Active;
                }
            }
            shared.state.set(ControllerState::Idle(from));
            return AdvanceOutcome::Ignored;
        }
        AdvanceOutcome::Started { to }
    }

    fn commit(weak: &Weak<Shared>, from: SceneId, to: SceneId) {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        if shared.state.get() != (ControllerState::Transitioning { from, to }) {
            log::warn!("[scene] stale completion {from}->{to} ignored");
            return;
        }
        {
            let mut scenes = shared.scenes.borrow_mut();
            scenes.retain(|(id, _)| *id != from);
            for (id, state) in scenes.iter_mut() {
                if *id == to {
                    *state = SceneState::Active;
                }
            }
        }
        shared.bubbles.discard_scene(from);
        shared.stage.scene_cue(SceneCue::TearDown(from));
        shared.state.set(ControllerState::Idle(to));
        shared.stage.scene_cue(SceneCue::Activate(to));
        log::info!("[scene] {to} active");
        Self::populate(&shared, to);
    }

    fn populate(shared: &Shared, scene: SceneId) {
        let defs = shared.content.bubbles_for(scene);
        if shared.bubbles.populate(scene, defs) == 0 {
            shared.stage.scene_cue(SceneCue::ShowContinue(scene));
        }
    }
}
