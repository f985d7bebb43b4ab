use crate::constants::*;
use web_sys as web;

#[inline]
fn show_el(document: &web::Document, id: &str) -> Option<web::Element> {
    let el = document.get_element_by_id(id)?;
    _ = el.class_list().remove_1(CLASS_HIDDEN);
    // fallback for environments without the stylesheet
    _ = el.set_attribute("style", "");
    Some(el)
}

#[inline]
fn hide_el(document: &web::Document, id: &str) {
    if let Some(el) = document.get_element_by_id(id) {
        _ = el.class_list().add_1(CLASS_HIDDEN);
        _ = el.set_attribute("style", "display:none");
    }
}

#[inline]
fn is_hidden(document: &web::Document, id: &str) -> bool {
    if let Some(el) = document.get_element_by_id(id) {
        if el.class_list().contains(CLASS_HIDDEN) {
            return true;
        }
        return el
            .get_attribute("style")
            .map(|s| s.contains("display:none"))
            .unwrap_or(false);
    }
    true
}

pub fn hide_start(document: &web::Document) {
    hide_el(document, START_OVERLAY_ID);
}

/// Offer the continue button for `scene`. The scene number rides along so a
/// late click on a stale button cannot advance the wrong scene.
pub fn show_continue(document: &web::Document, scene: u8) {
    if let Some(el) = show_el(document, CONTINUE_BUTTON_ID) {
        _ = el.set_attribute(SCENE_ATTR, &scene.to_string());
    }
}

pub fn hide_continue(document: &web::Document) {
    hide_el(document, CONTINUE_BUTTON_ID);
}

/// Scene the continue button was shown for.
pub fn continue_scene(document: &web::Document) -> Option<u8> {
    if is_hidden(document, CONTINUE_BUTTON_ID) {
        return None;
    }
    document
        .get_element_by_id(CONTINUE_BUTTON_ID)?
        .get_attribute(SCENE_ATTR)?
        .parse()
        .ok()
}

pub fn show_finale(document: &web::Document) {
    if show_el(document, FINALE_ID).is_none() {
        log::warn!("[overlay] missing #{FINALE_ID}");
    }
}
