//! Timed handoff between two adjacent scenes.
//!
//! A [`TransitionSpec`] is a declarative timeline: visual cues and audio
//! moves at fixed offsets from the start, plus completion cues at the end.
//! The [`TransitionEngine`] plays one spec at a time; a run requested while
//! another is in flight is rejected.

use crate::clock::{Scheduler, Task};
use crate::error::ConfigError;
use crate::ids::{LayerId, SceneId, TrackId};
use crate::mixer::AudioMixer;
use crate::stage::{SceneCue, Stage};
use std::cell::Cell;
use std::rc::{Rc, Weak};

#[derive(Clone, Debug, PartialEq)]
pub enum PhaseEffect {
    Scene(SceneCue),
    FadeAmbient { level: f32, duration_ms: u32 },
    /// Fire-and-forget sound, e.g. a gust at the start of a transition.
    Sting(TrackId),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Phase {
    pub offset_ms: u32,
    pub effect: PhaseEffect,
}

/// How ambience moves across the transition.
#[derive(Clone, Debug, PartialEq)]
pub enum AmbientPlan {
    /// Dip the current layers to `partial_level`, then retarget them (and
    /// start any new ones) for the next scene and fade back in.
    Continue { partial_level: f32 },
    /// Fade the whole palette out and bring in a different set of layers.
    Switch { layers: Vec<LayerId> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransitionSpec {
    from: SceneId,
    to: SceneId,
    duration_ms: u32,
    audio_fade_out_ms: u32,
    audio_fade_in_ms: u32,
    ambient: AmbientPlan,
    phases: Vec<Phase>,
    on_complete: Vec<SceneCue>,
}

impl TransitionSpec {
    pub fn builder(from: SceneId, to: SceneId, duration_ms: u32) -> TransitionBuilder {
        TransitionBuilder {
            spec: TransitionSpec {
                from,
                to,
                duration_ms,
                audio_fade_out_ms: 0,
                audio_fade_in_ms: 0,
                ambient: AmbientPlan::Continue { partial_level: 0.0 },
                phases: Vec::new(),
                on_complete: Vec::new(),
            },
        }
    }

    pub fn from(&self) -> SceneId {
        self.from
    }

    pub fn to(&self) -> SceneId {
        self.to
    }

    pub fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    pub fn audio_fade_out_ms(&self) -> u32 {
        self.audio_fade_out_ms
    }

    pub fn audio_fade_in_ms(&self) -> u32 {
        self.audio_fade_in_ms
    }

    pub fn ambient(&self) -> &AmbientPlan {
        &self.ambient
    }

    /// Phases in start order.
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn on_complete(&self) -> &[SceneCue] {
        &self.on_complete
    }
}

pub struct TransitionBuilder {
    spec: TransitionSpec,
}

impl TransitionBuilder {
    /// `fade_out_ms` is the length of the dip at the start; `fade_in_ms` is
    /// the offset at which the next scene's ambience comes in.
    pub fn audio(mut self, fade_out_ms: u32, fade_in_ms: u32) -> Self {
        self.spec.audio_fade_out_ms = fade_out_ms;
        self.spec.audio_fade_in_ms = fade_in_ms;
        self
    }

    pub fn partial_level(mut self, level: f32) -> Self {
        self.spec.ambient = AmbientPlan::Continue {
            partial_level: level,
        };
        self
    }

    pub fn switch_palette(mut self, layers: &[&str]) -> Self {
        self.spec.ambient = AmbientPlan::Switch {
            layers: layers.iter().map(|l| LayerId::from(*l)).collect(),
        };
        self
    }

    pub fn phase(mut self, offset_ms: u32, effect: PhaseEffect) -> Self {
        self.spec.phases.push(Phase { offset_ms, effect });
        self
    }

    pub fn cue(self, offset_ms: u32, cue: SceneCue) -> Self {
        self.phase(offset_ms, PhaseEffect::Scene(cue))
    }

    pub fn on_complete(mut self, cue: SceneCue) -> Self {
        self.spec.on_complete.push(cue);
        self
    }

    pub fn build(mut self) -> Result<TransitionSpec, ConfigError> {
        let s = &mut self.spec;
        let (from, to, duration_ms) = (s.from, s.to, s.duration_ms);
        if from.next() != Some(to) {
            return Err(ConfigError::NotAdjacent { from, to });
        }
        for fade_ms in [s.audio_fade_out_ms, s.audio_fade_in_ms] {
            if fade_ms > duration_ms {
                return Err(ConfigError::FadeExceedsDuration {
                    from,
                    to,
                    fade_ms,
                    duration_ms,
                });
            }
        }
        if let AmbientPlan::Continue { partial_level } = s.ambient {
            if !(0.0..=1.0).contains(&partial_level) {
                return Err(ConfigError::LevelOutOfRange(partial_level));
            }
        }
        if let Some(p) = s.phases.iter().find(|p| p.offset_ms > duration_ms) {
            return Err(ConfigError::PhaseOutOfRange {
                from,
                to,
                offset_ms: p.offset_ms,
                duration_ms,
            });
        }
        // stable: equal offsets keep declaration order
        s.phases.sort_by_key(|p| p.offset_ms);
        Ok(self.spec)
    }
}

/// A callback that runs at most once, however many times it is fired.
#[derive(Clone)]
pub struct Completion {
    fired: Rc<Cell<bool>>,
    task: Rc<Cell<Option<Task>>>,
}

impl Completion {
    pub fn new(task: Task) -> Self {
        Self {
            fired: Rc::new(Cell::new(false)),
            task: Rc::new(Cell::new(Some(task))),
        }
    }

    /// Returns false if this completion had already fired.
    pub fn fire(&self) -> bool {
        if self.fired.replace(true) {
            log::warn!("[transition] completion fired twice; ignored");
            return false;
        }
        if let Some(task) = self.task.take() {
            task();
        }
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired.get()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running { from: SceneId, to: SceneId },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Started,
    /// Another transition is running; nothing was done.
    Busy,
}

struct Shared {
    state: Cell<EngineState>,
    run: Cell<u64>,
    mixer: AudioMixer,
    stage: Rc<dyn Stage>,
    scheduler: Rc<dyn Scheduler>,
}

#[derive(Clone)]
pub struct TransitionEngine {
    shared: Rc<Shared>,
}

impl TransitionEngine {
    pub fn new(mixer: AudioMixer, stage: Rc<dyn Stage>, scheduler: Rc<dyn Scheduler>) -> Self {
        Self {
            shared: Rc::new(Shared {
                state: Cell::new(EngineState::Idle),
                run: Cell::new(0),
                mixer,
                stage,
                scheduler,
            }),
        }
    }

    pub fn state(&self) -> EngineState {
        self.shared.state.get()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), EngineState::Running { .. })
    }

    /// Start `spec`. Offset-zero effects happen before this returns; the rest
    /// are scheduled. `on_complete` runs exactly once, `duration_ms` later,
    /// after the spec's completion cues.
    pub fn run(&self, spec: Rc<TransitionSpec>, on_complete: Task) -> RunOutcome {
        let shared = &self.shared;
        if let EngineState::Running { from, to } = shared.state.get() {
            log::debug!(
                "[transition] {}->{} rejected: {from}->{to} still running",
                spec.from,
                spec.to
            );
            return RunOutcome::Busy;
        }
        let run = shared.run.get() + 1;
        shared.run.set(run);
        shared.state.set(EngineState::Running {
            from: spec.from,
            to: spec.to,
        });
        log::info!(
            "[transition] {}->{} started ({}ms)",
            spec.from,
            spec.to,
            spec.duration_ms
        );

        shared
            .stage
            .scene_cue(SceneCue::MarkTransitioning(spec.from));
        match &spec.ambient {
            AmbientPlan::Continue { partial_level } => {
                shared
                    .mixer
                    .fade_ambient_to(*partial_level, spec.audio_fade_out_ms);
                let weak = Rc::downgrade(shared);
                let to = spec.to;
                let fade_in_ms = spec.duration_ms - spec.audio_fade_in_ms;
                shared.scheduler.after(
                    spec.audio_fade_in_ms,
                    Box::new(move || {
                        if let Some(shared) = live_run(&weak, run) {
                            shared.mixer.start_ambient(to);
                            shared.mixer.fade_ambient_in(fade_in_ms);
                        }
                    }),
                );
            }
            AmbientPlan::Switch { layers } => {
                shared.mixer.switch_ambient_set(
                    layers,
                    spec.audio_fade_out_ms,
                    spec.duration_ms - spec.audio_fade_out_ms,
                );
            }
        }

        for (index, phase) in spec.phases.iter().enumerate() {
            if phase.offset_ms == 0 {
                apply(shared, &phase.effect);
                continue;
            }
            let weak = Rc::downgrade(shared);
            let spec = spec.clone();
            shared.scheduler.after(
                phase.offset_ms,
                Box::new(move || {
                    if let Some(shared) = live_run(&weak, run) {
                        apply(&shared, &spec.phases[index].effect);
                    }
                }),
            );
        }

        let completion = Completion::new(on_complete);
        let weak = Rc::downgrade(shared);
        shared.scheduler.after(
            spec.duration_ms,
            Box::new(move || {
                let Some(shared) = live_run(&weak, run) else {
                    return;
                };
                if completion.has_fired() {
                    return;
                }
                for cue in &spec.on_complete {
                    shared.stage.scene_cue(cue.clone());
                }
                shared.state.set(EngineState::Idle);
                log::info!("[transition] {}->{} complete", spec.from, spec.to);
                completion.fire();
            }),
        );
        RunOutcome::Started
    }
}

/// The engine, if it is still running the given run.
fn live_run(weak: &Weak<Shared>, run: u64) -> Option<Rc<Shared>> {
    let shared = weak.upgrade()?;
    (shared.run.get() == run && matches!(shared.state.get(), EngineState::Running { .. }))
        .then_some(shared)
}

fn apply(shared: &Shared, effect: &PhaseEffect) {
    match effect {
        PhaseEffect::Scene(cue) => shared.stage.scene_cue(cue.clone()),
        PhaseEffect::FadeAmbient { level, duration_ms } => {
            shared.mixer.fade_ambient_to(*level, *duration_ms)
        }
        PhaseEffect::Sting(track) => shared.mixer.play_effect(track, None),
    }
}
