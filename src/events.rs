use crate::constants::*;
use crate::dom;
use crate::gesture::{click_action, ClickAction};
use crate::overlay;
use fogbound_core::ids::{BubbleId, SceneId};
use fogbound_core::story::Story;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys as web;

/// One delegated listener on the story root routes every bubble click.
pub fn wire_bubble_clicks(root: &web::Element, story: Rc<Story>) {
    let closure = Closure::wrap(Box::new(move |ev: web::MouseEvent| {
        let Some(target) = ev
            .target()
            .and_then(|t| t.dyn_into::<web::Element>().ok())
        else {
            return;
        };
        let Some(bubble) = target
            .closest(BUBBLE_SELECTOR)
            .ok()
            .flatten()
            .and_then(|el| el.get_attribute(BUBBLE_ID_ATTR))
        else {
            return;
        };
        on_bubble_click(&story, &BubbleId::new(bubble));
    }) as Box<dyn FnMut(_)>);
    _ = root.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
    closure.forget();
}

fn on_bubble_click(story: &Story, id: &BubbleId) {
    let bubbles = story.bubbles();
    let action = click_action(
        bubbles.state(id),
        bubbles.current_page(id).unwrap_or(0),
        bubbles.total_pages(id).unwrap_or(0),
    );
    log::debug!("[gesture] {id}: {:?}", action);
    match action {
        ClickAction::Expand => {
            story.expand(id);
        }
        ClickAction::NextPage => {
            story.next_page(id);
        }
        ClickAction::Pop => {
            story.pop(id);
        }
        ClickAction::Ignore => {}
    }
}

pub fn wire_continue(document: &web::Document, story: Rc<Story>) {
    let doc = document.clone();
    dom::add_click_listener(document, CONTINUE_BUTTON_ID, move || {
        let Some(scene) = overlay::continue_scene(&doc).and_then(SceneId::new) else {
            return;
        };
        log::info!("[gesture] continue from {scene}");
        overlay::hide_continue(&doc);
        story.continue_from(scene);
    });
}

/// The first pointer press anywhere lifts the autoplay mute and dismisses
/// the start overlay.
pub fn wire_first_gesture(document: &web::Document, story: Rc<Story>) {
    let doc = document.clone();
    let closure = Closure::wrap(Box::new(move || {
        if !story.mixer().is_unmuted() {
            log::info!("[gesture] first interaction; unmuting");
            story.first_gesture();
            overlay::hide_start(&doc);
        }
    }) as Box<dyn FnMut()>);
    for event in ["pointerdown", "keydown"] {
        _ = document.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
    }
    closure.forget();

    // the overlay's own button, for visitors who reach it by keyboard focus
    let doc = document.clone();
    dom::add_click_listener(document, START_BUTTON_ID, move || overlay::hide_start(&doc));
}
