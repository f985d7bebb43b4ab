use fnv::FnvHashMap;
use fogbound_core::clock::Task;
use fogbound_core::device::{PlayReport, PlaybackDevice, VoiceId};
use fogbound_core::error::PlaybackError;
use std::cell::{Cell, RefCell};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys as web;

/// One `<audio>` element per voice.
#[derive(Default)]
pub struct HtmlAudioDevice {
    voices: RefCell<FnvHashMap<u64, web::HtmlAudioElement>>,
    next_id: Cell<u64>,
}

fn create_element(source: &str, looping: bool) -> Result<web::HtmlAudioElement, ()> {
    match web::HtmlAudioElement::new_with_src(source) {
        Ok(el) => {
            el.set_loop(looping);
            el.set_preload("auto");
            Ok(el)
        }
        Err(e) => {
            log::error!("[audio] <audio src={source}> error: {:?}", e);
            Err(())
        }
    }
}

impl HtmlAudioDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn element(&self, voice: VoiceId) -> Option<web::HtmlAudioElement> {
        self.voices.borrow().get(&voice.raw()).cloned()
    }
}

impl PlaybackDevice for HtmlAudioDevice {
    fn load(&self, source: &str, looping: bool) -> VoiceId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        // a failed element leaves the id unbacked; every later call is a no-op
        if let Ok(el) = create_element(source, looping) {
            self.voices.borrow_mut().insert(id, el);
        }
        VoiceId::from_raw(id)
    }

    fn play(&self, voice: VoiceId, report: PlayReport) {
        let Some(el) = self.element(voice) else {
            report(Err(PlaybackError::Released));
            return;
        };
        match el.play() {
            Ok(promise) => spawn_local(async move {
                let result = JsFuture::from(promise)
                    .await
                    .map(|_| ())
                    .map_err(|e| PlaybackError::Unavailable(format!("{:?}", e)));
                report(result);
            }),
            Err(e) => report(Err(PlaybackError::Unavailable(format!("{:?}", e)))),
        }
    }

    fn pause(&self, voice: VoiceId) {
        if let Some(el) = self.element(voice) {
            _ = el.pause();
        }
    }

    fn set_current_time(&self, voice: VoiceId, seconds: f64) {
        if let Some(el) = self.element(voice) {
            el.set_current_time(seconds);
        }
    }

    fn set_volume(&self, voice: VoiceId, volume: f32) {
        if let Some(el) = self.element(voice) {
            el.set_volume(volume.clamp(0.0, 1.0) as f64);
        }
    }

    fn set_muted(&self, voice: VoiceId, muted: bool) {
        if let Some(el) = self.element(voice) {
            el.set_muted(muted);
        }
    }

    fn on_ended(&self, voice: VoiceId, task: Task) {
        if let Some(el) = self.element(voice) {
            // freed by JS after the single call
            let callback = Closure::once_into_js(move || task());
            el.set_onended(Some(callback.unchecked_ref()));
        }
    }

    fn release(&self, voice: VoiceId) {
        let el = self.voices.borrow_mut().remove(&voice.raw());
        if let Some(el) = el {
            el.set_onended(None);
            _ = el.pause();
            _ = el.remove_attribute("src");
            el.load();
        }
    }
}
