//! Story tables: ambience, tracks, personas, transitions and content.
//!
//! Everything here is built in code once at startup and shared read-only
//! behind `Rc`. [`StoryConfig::default_story`] is the shipped story.

use crate::constants::{CROW_VOLUME, DEFAULT_ONE_SHOT_VOLUME, POP_VOLUME};
use crate::error::{ConfigError, StoryError};
use crate::ids::{LayerId, PersonaId, SceneId, TrackId};
use crate::mixer::POP_TRACK;
use crate::persona::{Decoration, EntranceStyle, IdleAnimation, PersonaSpec};
use crate::stage::{BubbleDef, ContentProvider, SceneCue};
use crate::transition::{PhaseEffect, TransitionSpec};
use fnv::FnvHashMap;
use std::rc::Rc;

/// Track played on the opening scene unless a bubble is opened first.
pub const CROW_TRACK: &str = "crow";

#[derive(Clone, Debug, PartialEq)]
pub struct LayerSpec {
    pub source: String,
    /// Volume used when the layer arrives through a palette switch.
    pub base_volume: f32,
}

#[derive(Clone, Debug, Default)]
pub struct AmbienceConfig {
    layers: FnvHashMap<LayerId, LayerSpec>,
    scenes: FnvHashMap<SceneId, Vec<(LayerId, f32)>>,
}

impl AmbienceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(mut self, id: &str, source: &str, base_volume: f32) -> Self {
        self.layers.insert(
            LayerId::from(id),
            LayerSpec {
                source: source.to_owned(),
                base_volume,
            },
        );
        self
    }

    pub fn scene(mut self, scene: SceneId, levels: &[(&str, f32)]) -> Self {
        self.scenes.insert(
            scene,
            levels
                .iter()
                .map(|(id, v)| (LayerId::from(*id), *v))
                .collect(),
        );
        self
    }

    pub fn layer_spec(&self, id: &LayerId) -> Option<&LayerSpec> {
        self.layers.get(id)
    }

    pub fn scene_levels(&self, scene: SceneId) -> Option<&[(LayerId, f32)]> {
        self.scenes.get(&scene).map(Vec::as_slice)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackSpec {
    pub source: String,
    pub volume: f32,
}

/// Every one-shot sound, keyed by track id.
#[derive(Clone, Debug, Default)]
pub struct TrackCatalog {
    tracks: FnvHashMap<TrackId, TrackSpec>,
}

impl TrackCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(mut self, id: &str, source: &str, volume: f32) -> Self {
        self.tracks.insert(
            TrackId::from(id),
            TrackSpec {
                source: source.to_owned(),
                volume,
            },
        );
        self
    }

    pub fn get(&self, id: &TrackId) -> Option<&TrackSpec> {
        self.tracks.get(id)
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.tracks.contains_key(id)
    }
}

#[derive(Clone, Debug, Default)]
pub struct PersonaCatalog {
    personas: FnvHashMap<PersonaId, PersonaSpec>,
}

impl PersonaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persona(
        mut self,
        id: &str,
        entrance: EntranceStyle,
        idle: IdleAnimation,
        decoration: Option<Decoration>,
    ) -> Self {
        self.personas.insert(
            PersonaId::from(id),
            PersonaSpec {
                entrance,
                idle,
                decoration,
            },
        );
        self
    }

    pub fn get(&self, id: &PersonaId) -> Option<&PersonaSpec> {
        self.personas.get(id)
    }
}

/// One validated transition per adjacent scene pair.
#[derive(Clone, Debug, Default)]
pub struct TransitionTable {
    specs: FnvHashMap<(SceneId, SceneId), Rc<TransitionSpec>>,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, spec: TransitionSpec) {
        self.specs.insert((spec.from(), spec.to()), Rc::new(spec));
    }

    pub fn get(&self, from: SceneId, to: SceneId) -> Option<Rc<TransitionSpec>> {
        self.specs.get(&(from, to)).cloned()
    }
}

/// Content provider backed by a fixed table.
#[derive(Clone, Debug, Default)]
pub struct StaticContent {
    scenes: FnvHashMap<SceneId, Vec<BubbleDef>>,
}

impl StaticContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scene(mut self, scene: SceneId, bubbles: Vec<BubbleDef>) -> Self {
        self.scenes.insert(scene, bubbles);
        self
    }

    fn all(&self) -> impl Iterator<Item = &BubbleDef> {
        self.scenes.values().flatten()
    }
}

impl ContentProvider for StaticContent {
    fn bubbles_for(&self, scene: SceneId) -> Vec<BubbleDef> {
        self.scenes.get(&scene).cloned().unwrap_or_default()
    }
}

#[derive(Clone, Debug)]
pub struct StoryConfig {
    pub ambience: Rc<AmbienceConfig>,
    pub tracks: Rc<TrackCatalog>,
    pub personas: Rc<PersonaCatalog>,
    pub transitions: Rc<TransitionTable>,
    pub content: Rc<StaticContent>,
}

impl StoryConfig {
    /// Every missing piece the story would trip over at runtime.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        for scene in SceneId::ALL {
            match self.ambience.scene_levels(scene) {
                None => errors.push(StoryError::NoAmbience(scene).into()),
                Some(levels) => {
                    for (layer, _) in levels {
                        if self.ambience.layer_spec(layer).is_none() {
                            errors.push(StoryError::NoLayer(layer.clone()).into());
                        }
                    }
                }
            }
            if let Some(to) = scene.next() {
                if self.transitions.get(scene, to).is_none() {
                    errors.push(StoryError::NoTransition { from: scene, to }.into());
                }
            }
        }
        for def in self.content.all() {
            if self.personas.get(&def.persona).is_none() {
                errors.push(StoryError::NoPersona(def.persona.clone()).into());
            }
            for track in def.page_tracks.iter().flatten() {
                if !self.tracks.contains(track) {
                    errors.push(StoryError::NoTrack(track.clone()).into());
                }
            }
        }
        for fixed in [POP_TRACK, CROW_TRACK] {
            let id = TrackId::from(fixed);
            if !self.tracks.contains(&id) {
                errors.push(StoryError::NoTrack(id).into());
            }
        }
        errors
    }

    /// The shipped nine-scene story.
    pub fn default_story() -> Result<Self, ConfigError> {
        let [s1, s2, s3, s4, s5, s6, s7, s8, s9] = SceneId::ALL;

        let ambience = AmbienceConfig::new()
            .layer("wind", "audio/ambience/wind.mp3", 0.35)
            .layer("frogs", "audio/ambience/frogs.mp3", 0.25)
            .layer("water", "audio/ambience/water.mp3", 0.3)
            .layer("crickets", "audio/ambience/crickets.mp3", 0.2)
            .layer("choir", "audio/ambience/choir.mp3", 0.4)
            .layer("bells", "audio/ambience/bells.mp3", 0.2)
            .scene(s1, &[("wind", 0.35)])
            .scene(s2, &[("wind", 0.3), ("frogs", 0.25)])
            .scene(s3, &[("wind", 0.25), ("frogs", 0.25), ("water", 0.2)])
            .scene(s4, &[("frogs", 0.2), ("water", 0.35)])
            .scene(s5, &[("water", 0.3), ("crickets", 0.2)])
            .scene(s6, &[("wind", 0.4), ("crickets", 0.25)])
            .scene(s7, &[("wind", 0.45), ("crickets", 0.1)])
            .scene(s8, &[("wind", 0.2)])
            .scene(s9, &[("choir", 0.4), ("bells", 0.2)]);

        let mut tracks = TrackCatalog::new()
            .track(POP_TRACK, "audio/fx/pop.mp3", POP_VOLUME)
            .track(CROW_TRACK, "audio/fx/crow.mp3", CROW_VOLUME)
            .track("gust", "audio/fx/gust.mp3", 0.5);
        for persona in ["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta"] {
            for page in 1..=3 {
                let id = format!("{persona}-{page}");
                let source = format!("audio/voices/{persona}-{page}.mp3");
                tracks = tracks.track(&id, &source, DEFAULT_ONE_SHOT_VOLUME);
            }
        }

        use Decoration::*;
        use EntranceStyle::*;
        use IdleAnimation::*;
        let personas = PersonaCatalog::new()
            .persona("narrator", Fade, Still, None)
            .persona("alpha", Drift, Bob, None)
            .persona("beta", Rise, Sway, Some(Leaves))
            .persona("gamma", Drift, Pulse, Some(Ripples))
            .persona("delta", Swoop, Bob, Some(Feathers))
            .persona("epsilon", Rise, Pulse, Some(Sparks))
            .persona("zeta", Fade, Sway, None)
            .persona("eta", Drift, Bob, Some(Ripples))
            .persona("theta", Swoop, Pulse, Some(Sparks));

        let content = StaticContent::new()
            .scene(s1, vec![BubbleDef::new("s1-narrator", "narrator", 3)])
            .scene(
                s2,
                vec![
                    BubbleDef::new("s2-alpha", "alpha", 4).with_tracks(&["alpha-1"]),
                    BubbleDef::new("s2-beta", "beta", 7).with_tracks(&["beta-1", "beta-2"]),
                    BubbleDef::new("s2-gamma", "gamma", 3).with_tracks(&["gamma-1"]),
                ],
            )
            .scene(
                s3,
                vec![
                    BubbleDef::new("s3-delta", "delta", 10).with_tracks(&["delta-1", "delta-2"]),
                    BubbleDef::new("s3-alpha", "alpha", 5).with_tracks(&["alpha-2"]),
                ],
            )
            .scene(
                s4,
                vec![
                    BubbleDef::new("s4-epsilon", "epsilon", 11)
                        .with_tracks(&["epsilon-1", "epsilon-2", "epsilon-3"]),
                    BubbleDef::new("s4-beta", "beta", 2).with_tracks(&["beta-3"]),
                ],
            )
            // intermission: continue affordance only
            .scene(s5, Vec::new())
            .scene(
                s6,
                vec![
                    BubbleDef::new("s6-zeta", "zeta", 6).with_tracks(&["zeta-1", ""]),
                    BubbleDef::new("s6-eta", "eta", 4).with_tracks(&["eta-1"]),
                    BubbleDef::new("s6-gamma", "gamma", 8).with_tracks(&["gamma-2", "gamma-3"]),
                ],
            )
            .scene(
                s7,
                vec![
                    BubbleDef::new("s7-theta", "theta", 9).with_tracks(&["theta-1", "theta-2"]),
                    BubbleDef::new("s7-delta", "delta", 3).with_tracks(&["delta-3"]),
                ],
            )
            .scene(
                s8,
                vec![BubbleDef::new("s8-epsilon", "epsilon", 5).with_tracks(&["epsilon-3"])],
            )
            .scene(
                s9,
                vec![
                    BubbleDef::new("s9-narrator", "narrator", 12),
                    BubbleDef::new("s9-eta", "eta", 3).with_tracks(&["eta-2"]),
                ],
            );

        let mut transitions = TransitionTable::new();
        for from in [s1, s2, s3, s4, s5, s6, s7] {
            let Some(to) = from.next() else { continue };
            transitions.insert(standard_transition(from, to)?);
        }
        transitions.insert(
            TransitionSpec::builder(s8, s9, 8000)
                .audio(3000, 3000)
                .switch_palette(&["choir", "bells"])
                .cue(0, SceneCue::ExitDecorations(s8))
                .cue(0, SceneCue::Fog(1.0))
                .cue(3000, SceneCue::Background(s9))
                .cue(5000, SceneCue::EnterDecorations(s9))
                .on_complete(SceneCue::Fog(0.2))
                .build()?,
        );

        Ok(Self {
            ambience: Rc::new(ambience),
            tracks: Rc::new(tracks),
            personas: Rc::new(personas),
            transitions: Rc::new(transitions),
            content: Rc::new(content),
        })
    }
}

/// Fog thickens as the story goes on.
fn fog_for(scene: SceneId) -> f32 {
    0.2 + 0.08 * (scene.get() - 1) as f32
}

fn standard_transition(from: SceneId, to: SceneId) -> Result<TransitionSpec, ConfigError> {
    TransitionSpec::builder(from, to, 5500)
        .audio(1500, 2500)
        .partial_level(0.3)
        .cue(0, SceneCue::ExitDecorations(from))
        .phase(0, PhaseEffect::Sting(TrackId::from("gust")))
        .cue(800, SceneCue::Fog(0.85))
        .cue(2500, SceneCue::Background(to))
        .cue(3500, SceneCue::EnterDecorations(to))
        .cue(4500, SceneCue::Fog(0.5))
        .on_complete(SceneCue::Fog(fog_for(to)))
        .build()
}
