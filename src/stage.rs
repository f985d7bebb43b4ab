use crate::constants::*;
use crate::dom;
use crate::overlay;
use fnv::FnvHashMap;
use fogbound_core::ids::{BubbleId, SceneId};
use fogbound_core::persona::PersonaSpec;
use fogbound_core::stage::{BubbleCue, BubbleLayout, SceneCue, Stage};
use glam::Vec2;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::ops::Range;
use wasm_bindgen::JsCast;
use web_sys as web;

/// Renders cues by flipping classes on the page's markup. All motion lives
/// in the stylesheet.
pub struct DomStage {
    document: web::Document,
    bubbles: RefCell<FnvHashMap<BubbleId, web::Element>>,
}

impl DomStage {
    pub fn new(document: web::Document) -> Self {
        Self {
            document,
            bubbles: RefCell::new(FnvHashMap::default()),
        }
    }

    fn scene_el(&self, scene: SceneId) -> Option<web::Element> {
        let el = self
            .document
            .get_element_by_id(&scene_element_id(scene.get()));
        if el.is_none() {
            log::warn!("[stage] missing #{}", scene_element_id(scene.get()));
        }
        el
    }

    fn decorations(&self, scene: SceneId) -> Option<web::Element> {
        self.scene_el(scene)?
            .query_selector(DECORATION_LAYER_SELECTOR)
            .ok()
            .flatten()
    }

    fn bubble(&self, id: &BubbleId) -> Option<web::Element> {
        self.bubbles.borrow().get(id).cloned()
    }

    fn spawn(&self, bubble: &BubbleId, scene: SceneId, persona: &PersonaSpec, idle_delay_ms: u32) {
        let Some(layer) = self
            .scene_el(scene)
            .and_then(|s| s.query_selector(BUBBLE_LAYER_SELECTOR).ok().flatten())
        else {
            return;
        };
        let Ok(el) = self.document.create_element("div") else {
            log::error!("[stage] could not create bubble {bubble}");
            return;
        };
        let mut classes: SmallVec<[&str; 4]> = SmallVec::new();
        classes.push(CLASS_BUBBLE);
        classes.push(persona.entrance.class_name());
        classes.push(persona.idle.class_name());
        if let Some(decoration) = persona.decoration {
            classes.push(decoration.class_name());
        }
        el.set_class_name(&classes.join(" "));
        _ = el.set_attribute(BUBBLE_ID_ATTR, bubble.as_str());
        dom::set_style(&el, "animation-delay", &format!("{idle_delay_ms}ms"));

        // sentences come from the page's template for this bubble
        let template = self
            .document
            .get_element_by_id(&bubble_template_id(bubble.as_str()))
            .and_then(|t| t.dyn_into::<web::HtmlTemplateElement>().ok());
        match template {
            Some(t) => {
                if let Ok(copy) = t.content().clone_node_with_deep(true) {
                    _ = el.append_child(&copy);
                }
            }
            None => log::warn!("[stage] no template for {bubble}"),
        }
        _ = layer.append_child(&el);
        self.bubbles.borrow_mut().insert(bubble.clone(), el);
    }

    fn resize(&self, bubble: &BubbleId, layout: BubbleLayout) {
        let Some(el) = self.bubble(bubble) else {
            return;
        };
        let size = layout.size.max_element();
        let anchor = layout.anchor.clamp(Vec2::ZERO, Vec2::ONE);
        let [left, top, width, height] = bubble_box_css(size, anchor.x, anchor.y);
        dom::set_style(&el, "left", &left);
        dom::set_style(&el, "top", &top);
        dom::set_style(&el, "width", &width);
        dom::set_style(&el, "height", &height);
        dom::set_class(&el, CLASS_EXPANDED, true);
    }

    fn reveal_page(&self, bubble: &BubbleId, page: usize, total_pages: usize, sentences: Range<usize>) {
        let Some(el) = self.bubble(bubble) else {
            return;
        };
        _ = el.set_attribute(PAGE_ATTR, &format!("{page}/{total_pages}"));
        for (i, sentence) in dom::select_all(&el, SENTENCE_SELECTOR).iter().enumerate() {
            dom::set_class(sentence, CLASS_ON_PAGE, sentences.contains(&i));
            dom::set_class(sentence, CLASS_SHOWN, false);
        }
    }

    fn show_sentence(&self, bubble: &BubbleId, index: usize) {
        let Some(el) = self.bubble(bubble) else {
            return;
        };
        if let Some(sentence) = dom::select_all(&el, SENTENCE_SELECTOR).get(index) {
            dom::set_class(sentence, CLASS_SHOWN, true);
        }
    }

    fn set_emphasis(&self, bubble: &BubbleId, on: bool) {
        let scene = self
            .bubble(bubble)
            .and_then(|el| el.closest("section").ok().flatten());
        if let Some(scene) = scene {
            dom::set_class(&scene, CLASS_EMPHASIS, on);
        }
    }

    fn remove_bubble(&self, bubble: &BubbleId) {
        let el = self.bubbles.borrow_mut().remove(bubble);
        if let Some(el) = el {
            el.remove();
        }
    }
}

impl Stage for DomStage {
    fn scene_cue(&self, cue: SceneCue) {
        log::debug!("[stage] {:?}", cue);
        match cue {
            SceneCue::MarkTransitioning(scene) => {
                overlay::hide_continue(&self.document);
                if let Some(el) = self.scene_el(scene) {
                    dom::set_class(&el, CLASS_TRANSITIONING, true);
                }
            }
            SceneCue::ExitDecorations(scene) => {
                if let Some(el) = self.decorations(scene) {
                    dom::set_class(&el, CLASS_DECOR_ENTER, false);
                    dom::set_class(&el, CLASS_DECOR_EXIT, true);
                }
            }
            SceneCue::EnterDecorations(scene) => {
                if let Some(el) = self.decorations(scene) {
                    dom::set_class(&el, CLASS_DECOR_EXIT, false);
                    dom::set_class(&el, CLASS_DECOR_ENTER, true);
                }
            }
            SceneCue::Fog(level) => {
                if let Some(el) = self.document.get_element_by_id(FOG_ID) {
                    dom::set_style(&el, "opacity", &fog_opacity(level));
                }
            }
            SceneCue::Background(scene) => {
                if let Some(el) = self.document.get_element_by_id(BACKDROP_ID) {
                    el.set_class_name(&backdrop_class(scene.get()));
                }
            }
            SceneCue::Activate(scene) => {
                if let Some(el) = self.scene_el(scene) {
                    dom::set_class(&el, CLASS_ACTIVE, true);
                }
            }
            SceneCue::TearDown(scene) => {
                if let Some(el) = self.scene_el(scene) {
                    dom::set_class(&el, CLASS_ACTIVE, false);
                    dom::set_class(&el, CLASS_TRANSITIONING, false);
                    dom::set_class(&el, CLASS_EMPHASIS, false);
                    dom::set_class(&el, CLASS_DONE, true);
                    if let Ok(Some(layer)) = el.query_selector(BUBBLE_LAYER_SELECTOR) {
                        layer.set_inner_html("");
                    }
                }
            }
            SceneCue::ShowContinue(scene) => overlay::show_continue(&self.document, scene.get()),
            SceneCue::Finale => overlay::show_finale(&self.document),
        }
    }

    fn bubble_cue(&self, cue: BubbleCue) {
        log::debug!("[stage] {:?}", cue);
        match cue {
            BubbleCue::Spawn {
                bubble,
                scene,
                persona,
                idle_delay_ms,
            } => self.spawn(&bubble, scene, &persona, idle_delay_ms),
            BubbleCue::Enter(bubble) => {
                if let Some(el) = self.bubble(&bubble) {
                    dom::set_class(&el, CLASS_ENTERED, true);
                }
            }
            BubbleCue::Resize { bubble, layout } => self.resize(&bubble, layout),
            BubbleCue::Emphasis(bubble) => self.set_emphasis(&bubble, true),
            BubbleCue::RevealPage {
                bubble,
                page,
                total_pages,
                sentences,
            } => self.reveal_page(&bubble, page, total_pages, sentences),
            BubbleCue::ShowSentence { bubble, index } => self.show_sentence(&bubble, index),
            BubbleCue::PageOut { bubble, .. } => {
                if let Some(el) = self.bubble(&bubble) {
                    for sentence in dom::select_all(&el, SENTENCE_SELECTOR) {
                        dom::set_class(&sentence, CLASS_ON_PAGE, false);
                    }
                }
            }
            BubbleCue::Pop(bubble) => {
                self.set_emphasis(&bubble, false);
                // the element stays for the pop animation; teardown clears it
                let el = self.bubbles.borrow_mut().remove(&bubble);
                if let Some(el) = el {
                    dom::set_class(&el, CLASS_POPPED, true);
                }
            }
            BubbleCue::Discard(bubble) => self.remove_bubble(&bubble),
        }
    }
}
