//! Recording doubles for the device and stage. Used by the tests and by the
//! headless rehearsal runner.

use crate::clock::{Scheduler, Task};
use crate::device::{PlayReport, PlaybackDevice, VoiceId};
use crate::error::PlaybackError;
use crate::stage::{BubbleCue, SceneCue, Stage};
use fnv::FnvHashMap;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCall {
    Load {
        voice: VoiceId,
        source: String,
        looping: bool,
    },
    Play(VoiceId),
    Pause(VoiceId),
    Seek(VoiceId, f64),
    Volume(VoiceId, f32),
    Muted(VoiceId, bool),
    Release(VoiceId),
}

/// Last known state of one voice.
#[derive(Clone, Debug, PartialEq)]
pub struct VoiceRecord {
    pub source: String,
    pub looping: bool,
    pub playing: bool,
    pub volume: f32,
    pub muted: bool,
    pub position: f64,
    pub released: bool,
    pub plays: u32,
}

#[derive(Default)]
pub struct RecordingDevice {
    voices: RefCell<Vec<VoiceRecord>>,
    calls: RefCell<Vec<DeviceCall>>,
    ended: RefCell<FnvHashMap<VoiceId, Task>>,
    refuse_play: Cell<bool>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `play` fail the way a blocked autoplay does.
    pub fn refuse_play(&self, refuse: bool) {
        self.refuse_play.set(refuse);
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn voice(&self, voice: VoiceId) -> Option<VoiceRecord> {
        self.voices.borrow().get(voice.raw() as usize).cloned()
    }

    /// Every voice ever loaded from `source`, oldest first.
    pub fn voices_for(&self, source: &str) -> Vec<VoiceId> {
        self.voices
            .borrow()
            .iter()
            .enumerate()
            .filter(|(_, v)| v.source == source)
            .map(|(i, _)| VoiceId::from_raw(i as u64))
            .collect()
    }

    pub fn load_count(&self) -> usize {
        self.voices.borrow().len()
    }

    /// Unreleased voices currently playing.
    pub fn playing(&self) -> Vec<VoiceId> {
        self.voices
            .borrow()
            .iter()
            .enumerate()
            .filter(|(_, v)| v.playing && !v.released)
            .map(|(i, _)| VoiceId::from_raw(i as u64))
            .collect()
    }

    /// Simulate `voice` reaching its natural end.
    pub fn finish(&self, voice: VoiceId) {
        self.update(voice, |v| {
            v.playing = false;
        });
        // the task may call back into the device
        let task = self.ended.borrow_mut().remove(&voice);
        if let Some(task) = task {
            task();
        }
    }

    /// End every playing non-looping voice.
    pub fn finish_all(&self) {
        let done: Vec<VoiceId> = self
            .voices
            .borrow()
            .iter()
            .enumerate()
            .filter(|(_, v)| v.playing && !v.looping && !v.released)
            .map(|(i, _)| VoiceId::from_raw(i as u64))
            .collect();
        for voice in done {
            self.finish(voice);
        }
    }

    fn update(&self, voice: VoiceId, f: impl FnOnce(&mut VoiceRecord)) -> bool {
        let mut voices = self.voices.borrow_mut();
        match voices.get_mut(voice.raw() as usize) {
            Some(v) if !v.released => {
                f(v);
                true
            }
            _ => false,
        }
    }
}

impl PlaybackDevice for RecordingDevice {
    fn load(&self, source: &str, looping: bool) -> VoiceId {
        let voice = {
            let mut voices = self.voices.borrow_mut();
            voices.push(VoiceRecord {
                source: source.to_string(),
                looping,
                playing: false,
                volume: 1.0,
                muted: false,
                position: 0.0,
                released: false,
                plays: 0,
            });
            VoiceId::from_raw(voices.len() as u64 - 1)
        };
        self.calls.borrow_mut().push(DeviceCall::Load {
            voice,
            source: source.to_string(),
            looping,
        });
        voice
    }

    fn play(&self, voice: VoiceId, report: PlayReport) {
        self.calls.borrow_mut().push(DeviceCall::Play(voice));
        if self.refuse_play.get() {
            report(Err(PlaybackError::Unavailable(
                "play() refused before user gesture".to_string(),
            )));
            return;
        }
        let started = self.update(voice, |v| {
            v.playing = true;
            v.plays += 1;
        });
        if started {
            report(Ok(()));
        } else {
            report(Err(PlaybackError::Released));
        }
    }

    fn pause(&self, voice: VoiceId) {
        self.calls.borrow_mut().push(DeviceCall::Pause(voice));
        self.update(voice, |v| v.playing = false);
    }

    fn set_current_time(&self, voice: VoiceId, seconds: f64) {
        self.calls.borrow_mut().push(DeviceCall::Seek(voice, seconds));
        self.update(voice, |v| v.position = seconds);
    }

    fn set_volume(&self, voice: VoiceId, volume: f32) {
        self.calls.borrow_mut().push(DeviceCall::Volume(voice, volume));
        self.update(voice, |v| v.volume = volume);
    }

    fn set_muted(&self, voice: VoiceId, muted: bool) {
        self.calls.borrow_mut().push(DeviceCall::Muted(voice, muted));
        self.update(voice, |v| v.muted = muted);
    }

    fn on_ended(&self, voice: VoiceId, task: Task) {
        self.ended.borrow_mut().insert(voice, task);
    }

    fn release(&self, voice: VoiceId) {
        self.calls.borrow_mut().push(DeviceCall::Release(voice));
        self.update(voice, |v| {
            v.playing = false;
            v.released = true;
        });
        self.ended.borrow_mut().remove(&voice);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StageEvent {
    Scene(SceneCue),
    Bubble(BubbleCue),
}

/// Stage that remembers every cue, stamped with the time it arrived.
#[derive(Default)]
pub struct RecordingStage {
    clock: Option<Rc<dyn Scheduler>>,
    events: RefCell<Vec<(u64, StageEvent)>>,
}

impl RecordingStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timed(clock: Rc<dyn Scheduler>) -> Self {
        Self {
            clock: Some(clock),
            events: RefCell::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<(u64, StageEvent)> {
        self.events.borrow().clone()
    }

    pub fn scene_cues(&self) -> Vec<SceneCue> {
        self.events
            .borrow()
            .iter()
            .filter_map(|(_, e)| match e {
                StageEvent::Scene(cue) => Some(cue.clone()),
                StageEvent::Bubble(_) => None,
            })
            .collect()
    }

    pub fn bubble_cues(&self) -> Vec<BubbleCue> {
        self.events
            .borrow()
            .iter()
            .filter_map(|(_, e)| match e {
                StageEvent::Bubble(cue) => Some(cue.clone()),
                StageEvent::Scene(_) => None,
            })
            .collect()
    }

    /// Arrival time of the first event matching `pred`.
    pub fn time_of(&self, pred: impl Fn(&StageEvent) -> bool) -> Option<u64> {
        self.events
            .borrow()
            .iter()
            .find(|(_, e)| pred(e))
            .map(|(t, _)| *t)
    }

    pub fn count(&self, pred: impl Fn(&StageEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|(_, e)| pred(e)).count()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    fn record(&self, event: StageEvent) {
        let now = self.clock.as_ref().map_or(0, |c| c.now_ms());
        log::trace!("[stage] {now}ms {event:?}");
        self.events.borrow_mut().push((now, event));
    }
}

impl Stage for RecordingStage {
    fn scene_cue(&self, cue: SceneCue) {
        self.record(StageEvent::Scene(cue));
    }

    fn bubble_cue(&self, cue: BubbleCue) {
        self.record(StageEvent::Bubble(cue));
    }
}
