#![cfg(target_arch = "wasm32")]
use fogbound_core::config::StoryConfig;
use fogbound_core::story::{Collaborators, Story};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use wasm_bindgen::prelude::*;
use web_sys as web;

mod audio;
mod constants;
mod dom;
mod events;
mod gesture;
mod overlay;
mod scheduler;
mod stage;

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("fogbound-web starting");

    if let Err(e) = init() {
        log::error!("init error: {:?}", e);
    }
    Ok(())
}

fn init() -> anyhow::Result<()> {
    static STARTED: AtomicBool = AtomicBool::new(false);
    if STARTED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let window = web::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| anyhow::anyhow!("no document"))?;
    let root = document
        .get_element_by_id(constants::STORY_ROOT_ID)
        .ok_or_else(|| anyhow::anyhow!("missing #{}", constants::STORY_ROOT_ID))?;

    let config = StoryConfig::default_story()?;
    for problem in config.validate() {
        log::warn!("[config] {problem}");
    }

    let story = Rc::new(Story::new(
        &config,
        Collaborators {
            device: Rc::new(audio::HtmlAudioDevice::new()),
            stage: Rc::new(stage::DomStage::new(document.clone())),
            scheduler: Rc::new(scheduler::WebScheduler::new(window)),
            content: config.content.clone(),
        },
        rand::random(),
    ));

    events::wire_first_gesture(&document, story.clone());
    events::wire_bubble_clicks(&root, story.clone());
    events::wire_continue(&document, story.clone());

    // ambience starts muted until the first gesture
    story.begin();
    Ok(())
}
