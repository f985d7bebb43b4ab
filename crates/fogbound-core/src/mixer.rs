//! Ambient layer mixing and exclusive one-shot tracks.
//!
//! Ambient layers are created once, loop forever and are only ever
//! retargeted: a new scene moves their volume, it never restarts them.
//! Volume moves are envelopes stepped by the scheduler. An envelope owns a
//! layer until a newer envelope claims it, so the last fade started on a
//! layer wins and always departs from the layer's current volume.
//!
//! One-shot tracks live in a single registry keyed by handle. Each belongs to
//! an exclusivity group and starting a track stops whatever else its group
//! was playing.

use crate::config::{AmbienceConfig, TrackCatalog};
use crate::clock::{Scheduler, TimerId};
use crate::constants::{AMBIENT_RETARGET_MS, FADE_MIN_STEPS, FADE_STEP_MS, POP_VOLUME};
use crate::device::{PlayReport, PlaybackDevice, VoiceId};
use crate::error::StoryError;
use crate::ids::{GroupId, LayerId, SceneId, TrackId};
use fnv::FnvHashMap;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Track played by [`AudioMixer::play_pop`].
pub const POP_TRACK: &str = "pop";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OneShotHandle(u64);

#[derive(Clone, Debug, PartialEq)]
pub struct OneShotOptions {
    pub group: GroupId,
    /// Overrides the catalog volume.
    pub volume: Option<f32>,
    pub looping: bool,
}

impl OneShotOptions {
    pub fn in_group(group: GroupId) -> Self {
        Self {
            group,
            volume: None,
            looping: false,
        }
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }
}

/// What an envelope does to a layer it leaves at zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Silence {
    Keep,
    /// Pause where it is, so a later fade in resumes mid-loop.
    Pause,
    Rewind,
}

struct AmbientLayer {
    id: LayerId,
    voice: VoiceId,
    volume: f32,
    /// Volume configured for the current scene.
    target: f32,
    playing: bool,
    /// Envelope currently allowed to move this layer.
    driver: Option<u64>,
}

struct Envelope {
    id: u64,
    /// (layer, start volume, target volume)
    layers: SmallVec<[(LayerId, f32, f32); 4]>,
    duration_ms: u32,
    steps: u32,
    step: u32,
    silence: Silence,
}

impl Envelope {
    /// Delay until step `step + 1`, spaced so the last step lands exactly on
    /// the duration.
    fn next_delay(&self) -> u32 {
        let at = |k: u32| (self.duration_ms as u64 * k as u64 / self.steps as u64) as u32;
        at(self.step + 1) - at(self.step)
    }
}

struct OneShot {
    track: TrackId,
    voice: VoiceId,
    group: GroupId,
}

#[derive(Default)]
struct MixerState {
    layers: Vec<AmbientLayer>,
    unmuted: bool,
    next_envelope: u64,
    one_shots: FnvHashMap<OneShotHandle, OneShot>,
    groups: FnvHashMap<GroupId, OneShotHandle>,
    next_handle: u64,
    /// Next step of the live envelope. Every envelope claims every layer, so
    /// there is at most one.
    pending_step: Option<TimerId>,
}

struct Shared {
    state: RefCell<MixerState>,
    ambience: Rc<AmbienceConfig>,
    tracks: Rc<TrackCatalog>,
    device: Rc<dyn PlaybackDevice>,
    scheduler: Rc<dyn Scheduler>,
}

/// Cheap to clone; clones share one mix.
#[derive(Clone)]
pub struct AudioMixer {
    shared: Rc<Shared>,
}

fn report(what: String) -> PlayReport {
    Box::new(move |result| {
        if let Err(e) = result {
            // carry on as if playing silently
            log::debug!("[mixer] {what}: {e}");
        }
    })
}

fn steps_for(duration_ms: u32) -> u32 {
    if duration_ms == 0 {
        return 1;
    }
    FADE_MIN_STEPS.max(duration_ms.div_ceil(FADE_STEP_MS))
}

impl AudioMixer {
    pub fn new(
        ambience: Rc<AmbienceConfig>,
        tracks: Rc<TrackCatalog>,
        device: Rc<dyn PlaybackDevice>,
        scheduler: Rc<dyn Scheduler>,
    ) -> Self {
        Self {
            shared: Rc::new(Shared {
                state: RefCell::new(MixerState::default()),
                ambience,
                tracks,
                device,
                scheduler,
            }),
        }
    }

    // ---------------- Ambient layers ----------------

    /// Make sure every layer the scene uses exists and retarget each layer to
    /// the scene's volume over [`AMBIENT_RETARGET_MS`]. New layers start
    /// silent; existing layers keep playing. Layers the scene does not use are
    /// aimed at zero but left running. A fade started right after this call
    /// takes over the move with its own duration.
    pub fn start_ambient(&self, scene: SceneId) {
        let Some(levels) = self.shared.ambience.scene_levels(scene) else {
            log::warn!("[mixer] {}", StoryError::NoAmbience(scene));
            return;
        };
        self.ensure_layers(scene, levels);
        self.start_envelope(AMBIENT_RETARGET_MS, Silence::Keep, |l| l.target);
    }

    fn ensure_layers(&self, scene: SceneId, levels: &[(LayerId, f32)]) {
        let shared = &self.shared;
        let mut st = shared.state.borrow_mut();
        for layer in st.layers.iter_mut() {
            if !levels.iter().any(|(id, _)| *id == layer.id) {
                layer.target = 0.0;
            }
        }
        for (id, volume) in levels {
            if let Some(layer) = st.layers.iter_mut().find(|l| l.id == *id) {
                layer.target = *volume;
                continue;
            }
            let Some(spec) = shared.ambience.layer_spec(id) else {
                log::warn!("[mixer] {}", StoryError::NoLayer(id.clone()));
                continue;
            };
            let voice = shared.device.load(&spec.source, true);
            shared.device.set_muted(voice, !st.unmuted);
            shared.device.set_volume(voice, 0.0);
            shared
                .device
                .play(voice, report(format!("ambient layer {id}")));
            log::info!("[mixer] layer {id} started for {scene} (target {volume:.2})");
            st.layers.push(AmbientLayer {
                id: id.clone(),
                voice,
                volume: 0.0,
                target: *volume,
                playing: true,
                driver: None,
            });
        }
    }

    /// Unmute every layer. Only the first call does anything.
    pub fn unmute(&self) {
        let mut st = self.shared.state.borrow_mut();
        if st.unmuted {
            return;
        }
        st.unmuted = true;
        for layer in &st.layers {
            self.shared.device.set_muted(layer.voice, false);
        }
        log::info!("[mixer] unmuted {} ambient layers", st.layers.len());
    }

    /// Fade every layer to `level` times its scene volume. At level zero the
    /// layers pause once silent, keeping their position.
    pub fn fade_ambient_to(&self, level: f32, duration_ms: u32) {
        let level = level.clamp(0.0, 1.0);
        let silence = if level == 0.0 {
            Silence::Pause
        } else {
            Silence::Keep
        };
        self.start_envelope(duration_ms, silence, |l| l.target * level);
    }

    /// Fade every layer to silence, then pause and rewind it.
    pub fn fade_ambient_out(&self, duration_ms: u32) {
        self.start_envelope(duration_ms, Silence::Rewind, |_| 0.0);
    }

    /// Fade every layer to its scene volume, resuming paused layers.
    pub fn fade_ambient_in(&self, duration_ms: u32) {
        self.start_envelope(duration_ms, Silence::Keep, |l| l.target);
    }

    /// Replace the whole ambience palette. The current layers fade out and are
    /// released before the new ones are created, so the two sets are never
    /// audible together.
    pub fn switch_ambient_set(&self, layers: &[LayerId], fade_out_ms: u32, fade_in_ms: u32) {
        let old: SmallVec<[LayerId; 4]> = self
            .shared
            .state
            .borrow()
            .layers
            .iter()
            .map(|l| l.id.clone())
            .collect();
        self.fade_ambient_out(fade_out_ms);

        let weak = Rc::downgrade(&self.shared);
        let incoming = layers.to_vec();
        self.shared.scheduler.after(
            fade_out_ms,
            Box::new(move || {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                let mixer = AudioMixer { shared };
                mixer.release_layers(&old);
                mixer.create_palette(&incoming);
                mixer.fade_ambient_in(fade_in_ms);
            }),
        );
    }

    fn release_layers(&self, ids: &[LayerId]) {
        let device = &self.shared.device;
        let mut st = self.shared.state.borrow_mut();
        st.layers.retain(|layer| {
            if !ids.contains(&layer.id) {
                return true;
            }
            device.set_volume(layer.voice, 0.0);
            device.pause(layer.voice);
            device.release(layer.voice);
            log::info!("[mixer] layer {} released", layer.id);
            false
        });
    }

    fn create_palette(&self, ids: &[LayerId]) {
        let shared = &self.shared;
        let mut st = shared.state.borrow_mut();
        for id in ids {
            if st.layers.iter().any(|l| l.id == *id) {
                continue;
            }
            let Some(spec) = shared.ambience.layer_spec(id) else {
                log::warn!("[mixer] {}", StoryError::NoLayer(id.clone()));
                continue;
            };
            let voice = shared.device.load(&spec.source, true);
            shared.device.set_muted(voice, !st.unmuted);
            shared.device.set_volume(voice, 0.0);
            shared
                .device
                .play(voice, report(format!("ambient layer {id}")));
            st.layers.push(AmbientLayer {
                id: id.clone(),
                voice,
                volume: 0.0,
                target: spec.base_volume,
                playing: true,
                driver: None,
            });
        }
    }

    fn start_envelope(
        &self,
        duration_ms: u32,
        silence: Silence,
        target_of: impl Fn(&AmbientLayer) -> f32,
    ) {
        let (superseded, envelope) = {
            let mut st = self.shared.state.borrow_mut();
            let superseded = st.pending_step.take();
            let id = st.next_envelope;
            st.next_envelope += 1;
            let mut layers = SmallVec::new();
            for layer in st.layers.iter_mut() {
                let target = target_of(layer);
                layer.driver = Some(id);
                if target > 0.0 && !layer.playing {
                    self.shared
                        .device
                        .play(layer.voice, report(format!("ambient layer {}", layer.id)));
                    layer.playing = true;
                }
                layers.push((layer.id.clone(), layer.volume, target));
            }
            let envelope = (!layers.is_empty()).then(|| Envelope {
                id,
                layers,
                duration_ms,
                steps: steps_for(duration_ms),
                step: 0,
                silence,
            });
            (superseded, envelope)
        };
        if let Some(timer) = superseded {
            self.shared.scheduler.cancel(timer);
        }
        let Some(envelope) = envelope else {
            return;
        };
        log::debug!(
            "[mixer] envelope {} over {} layers, {}ms",
            envelope.id,
            envelope.layers.len(),
            duration_ms
        );
        if duration_ms == 0 {
            Self::step_envelope(&Rc::downgrade(&self.shared), envelope);
        } else {
            Self::schedule_step(&self.shared, envelope);
        }
    }

    fn schedule_step(shared: &Rc<Shared>, envelope: Envelope) {
        let weak = Rc::downgrade(shared);
        let delay = envelope.next_delay();
        let timer = shared
            .scheduler
            .after(delay, Box::new(move || Self::step_envelope(&weak, envelope)));
        shared.state.borrow_mut().pending_step = Some(timer);
    }

    fn step_envelope(weak: &Weak<Shared>, mut envelope: Envelope) {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        envelope.step += 1;
        let done = envelope.step >= envelope.steps;
        let progress = envelope.step as f32 / envelope.steps as f32;
        let mut live = false;
        {
            let mut st = shared.state.borrow_mut();
            st.pending_step = None;
            for (id, start, target) in &envelope.layers {
                let Some(layer) = st.layers.iter_mut().find(|l| l.id == *id) else {
                    continue;
                };
                if layer.driver != Some(envelope.id) {
                    // superseded by a newer envelope
                    continue;
                }
                live = true;
                // snap the last step to kill accumulated drift
                let volume = if done {
                    *target
                } else {
                    start + (target - start) * progress
                };
                layer.volume = volume;
                shared.device.set_volume(layer.voice, volume);
                if done {
                    layer.driver = None;
                    if envelope.silence != Silence::Keep && volume == 0.0 && layer.playing {
                        shared.device.pause(layer.voice);
                        if envelope.silence == Silence::Rewind {
                            shared.device.set_current_time(layer.voice, 0.0);
                        }
                        layer.playing = false;
                    }
                }
            }
        }
        if live && !done {
            Self::schedule_step(&shared, envelope);
        }
    }

    pub fn layer_ids(&self) -> Vec<LayerId> {
        self.shared
            .state
            .borrow()
            .layers
            .iter()
            .map(|l| l.id.clone())
            .collect()
    }

    pub fn layer_volume(&self, id: &LayerId) -> Option<f32> {
        self.with_layer(id, |l| l.volume)
    }

    pub fn layer_voice(&self, id: &LayerId) -> Option<VoiceId> {
        self.with_layer(id, |l| l.voice)
    }

    pub fn is_layer_playing(&self, id: &LayerId) -> bool {
        self.with_layer(id, |l| l.playing).unwrap_or(false)
    }

    pub fn is_unmuted(&self) -> bool {
        self.shared.state.borrow().unmuted
    }

    fn with_layer<T>(&self, id: &LayerId, f: impl FnOnce(&AmbientLayer) -> T) -> Option<T> {
        self.shared
            .state
            .borrow()
            .layers
            .iter()
            .find(|l| l.id == *id)
            .map(f)
    }

    // ---------------- One-shot tracks ----------------

    /// Play `track`, first stopping whatever its group is playing. Returns
    /// `None` only when the track is not in the catalog.
    pub fn play_one_shot(&self, track: &TrackId, options: OneShotOptions) -> Option<OneShotHandle> {
        let shared = &self.shared;
        let Some(spec) = shared.tracks.get(track) else {
            log::warn!("[mixer] {}", StoryError::NoTrack(track.clone()));
            return None;
        };
        let handle = {
            let mut st = shared.state.borrow_mut();
            if let Some(previous) = st.groups.get(&options.group).copied() {
                Self::stop_locked(shared, &mut st, previous);
            }
            let handle = OneShotHandle(st.next_handle);
            st.next_handle += 1;
            let voice = shared.device.load(&spec.source, options.looping);
            shared
                .device
                .set_volume(voice, options.volume.unwrap_or(spec.volume));
            st.one_shots.insert(
                handle,
                OneShot {
                    track: track.clone(),
                    voice,
                    group: options.group.clone(),
                },
            );
            st.groups.insert(options.group.clone(), handle);

            let weak = Rc::downgrade(shared);
            shared.device.on_ended(
                voice,
                Box::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        let mut st = shared.state.borrow_mut();
                        if st.one_shots.contains_key(&handle) {
                            log::debug!("[mixer] one-shot {handle:?} ended");
                            Self::stop_locked(&shared, &mut st, handle);
                        }
                    }
                }),
            );
            shared.device.play(voice, report(format!("track {track}")));
            handle
        };
        log::debug!("[mixer] {track} playing in group {}", options.group);
        Some(handle)
    }

    /// Pause, rewind and release. Stopping a stopped handle does nothing.
    pub fn stop_one_shot(&self, handle: OneShotHandle) {
        let mut st = self.shared.state.borrow_mut();
        Self::stop_locked(&self.shared, &mut st, handle);
    }

    fn stop_locked(shared: &Shared, st: &mut MixerState, handle: OneShotHandle) {
        let Some(shot) = st.one_shots.remove(&handle) else {
            return;
        };
        if st.groups.get(&shot.group) == Some(&handle) {
            st.groups.remove(&shot.group);
        }
        shared.device.pause(shot.voice);
        shared.device.set_current_time(shot.voice, 0.0);
        shared.device.release(shot.voice);
        log::debug!("[mixer] {} stopped", shot.track);
    }

    pub fn is_playing(&self, handle: OneShotHandle) -> bool {
        self.shared.state.borrow().one_shots.contains_key(&handle)
    }

    /// The handle currently playing in `group`.
    pub fn playing_in_group(&self, group: &GroupId) -> Option<OneShotHandle> {
        self.shared.state.borrow().groups.get(group).copied()
    }

    /// Short pop effect. Untracked and never exclusive.
    pub fn play_pop(&self) {
        self.play_effect(&TrackId::from(POP_TRACK), Some(POP_VOLUME));
    }

    /// Fire-and-forget: the voice is released when it ends, or straight away
    /// if the device refuses to play it.
    pub fn play_effect(&self, track: &TrackId, volume: Option<f32>) {
        let shared = &self.shared;
        let Some(spec) = shared.tracks.get(track) else {
            log::warn!("[mixer] {}", StoryError::NoTrack(track.clone()));
            return;
        };
        let voice = shared.device.load(&spec.source, false);
        shared
            .device
            .set_volume(voice, volume.unwrap_or(spec.volume));
        let weak = Rc::downgrade(shared);
        shared.device.on_ended(
            voice,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.device.release(voice);
                }
            }),
        );
        let weak = Rc::downgrade(shared);
        let what = format!("effect {track}");
        shared.device.play(
            voice,
            Box::new(move |result| {
                if let Err(e) = result {
                    log::debug!("[mixer] {what}: {e}");
                    if let Some(shared) = weak.upgrade() {
                        shared.device.release(voice);
                    }
                }
            }),
        );
    }
}
