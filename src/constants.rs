/// Element ids and class names shared with `index.html` and the stylesheet.
///
/// The page supplies one `<section id="scene-N">` per scene, each holding a
/// `.bubbles` layer and a `.decorations` layer, plus a `<template
/// id="bubble-ID">` per bubble with one `.sentence` element per sentence.
// Page elements
pub const START_OVERLAY_ID: &str = "start-overlay";
pub const START_BUTTON_ID: &str = "start-ok";
pub const CONTINUE_BUTTON_ID: &str = "continue";
pub const FOG_ID: &str = "fog";
pub const BACKDROP_ID: &str = "backdrop";
pub const FINALE_ID: &str = "finale";
pub const STORY_ROOT_ID: &str = "story";

// Selectors inside a scene / bubble
pub const BUBBLE_LAYER_SELECTOR: &str = ".bubbles";
pub const DECORATION_LAYER_SELECTOR: &str = ".decorations";
pub const BUBBLE_SELECTOR: &str = ".bubble";
pub const SENTENCE_SELECTOR: &str = ".sentence";

// Data attributes
pub const BUBBLE_ID_ATTR: &str = "data-bubble";
pub const SCENE_ATTR: &str = "data-scene";
pub const PAGE_ATTR: &str = "data-page";

// State classes
pub const CLASS_HIDDEN: &str = "hidden";
pub const CLASS_BUBBLE: &str = "bubble";
pub const CLASS_ENTERED: &str = "entered"; // entrance animation runs
pub const CLASS_EXPANDED: &str = "expanded";
pub const CLASS_EMPHASIS: &str = "emphasis"; // scene background dims behind an open bubble
pub const CLASS_POPPED: &str = "popped";
pub const CLASS_ACTIVE: &str = "active";
pub const CLASS_TRANSITIONING: &str = "transitioning"; // no pointer events while leaving
pub const CLASS_DONE: &str = "done";
pub const CLASS_ON_PAGE: &str = "on-page";
pub const CLASS_SHOWN: &str = "shown";
pub const CLASS_DECOR_ENTER: &str = "decor-enter";
pub const CLASS_DECOR_EXIT: &str = "decor-exit";

// Fog opacity never fully hides the scene
pub const FOG_OPACITY_MAX: f32 = 0.92;

pub fn scene_element_id(scene: u8) -> String {
    format!("scene-{scene}")
}

pub fn bubble_template_id(bubble: &str) -> String {
    format!("bubble-{bubble}")
}

pub fn backdrop_class(scene: u8) -> String {
    format!("backdrop-{scene}")
}

/// Fog level in [0, 1] to a CSS opacity string.
pub fn fog_opacity(level: f32) -> String {
    format!("{:.3}", level.clamp(0.0, 1.0) * FOG_OPACITY_MAX)
}

/// Expanded bubble box: size in px around an anchor given in viewport
/// fractions. Returns (left, top, width, height) as CSS values.
pub fn bubble_box_css(size: f32, anchor_x: f32, anchor_y: f32) -> [String; 4] {
    let half = size / 2.0;
    [
        format!("calc({:.2}% - {half:.0}px)", anchor_x * 100.0),
        format!("calc({:.2}% - {half:.0}px)", anchor_y * 100.0),
        format!("{size:.0}px"),
        format!("{size:.0}px"),
    ]
}
