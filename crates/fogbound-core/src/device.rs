//! Playback capability consumed by the mixer.

use crate::clock::Task;
use crate::error::PlaybackError;

/// Handle to one loaded sound on the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(u64);

impl VoiceId {
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        VoiceId(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Called once playback has started or been refused.
pub type PlayReport = Box<dyn FnOnce(Result<(), PlaybackError>)>;

/// Something that can play sounds: an `<audio>` element per voice on the
/// web, a recorder in tests.
///
/// Voices are loaded paused at position 0 with volume 1.
pub trait PlaybackDevice {
    fn load(&self, source: &str, looping: bool) -> VoiceId;

    /// Start or resume playback. `report` may run synchronously or later.
    fn play(&self, voice: VoiceId, report: PlayReport);

    fn pause(&self, voice: VoiceId);

    fn set_current_time(&self, voice: VoiceId, seconds: f64);

    fn set_volume(&self, voice: VoiceId, volume: f32);

    fn set_muted(&self, voice: VoiceId, muted: bool);

    /// Register `task` to run when a non-looping voice reaches its end.
    fn on_ended(&self, voice: VoiceId, task: Task);

    /// Forget the voice. Further calls with it are ignored.
    fn release(&self, voice: VoiceId);
}
