//! Per-bubble state machine: expansion, pagination, page audio and pop.
//!
//! ```text
//! idle --expand--> expanding --(phases elapse)--> revealed
//! revealed --next_page [page < total]--> paginating --(page shown)--> revealed
//! revealed|paginating --pop [page == total]--> popped (removed)
//! ```
//!
//! Calls that do not fit the current state are ignored: the UI cannot stop
//! duplicate clicks, so a second `expand` or an early `pop` is not an error.
//! Scheduled steps check that their bubble still exists and is still where
//! they left it before doing anything.

use crate::clock::Scheduler;
use crate::config::PersonaCatalog;
use crate::constants::*;
use crate::error::StoryError;
use crate::ids::{BubbleId, GroupId, SceneId};
use crate::mixer::{AudioMixer, OneShotHandle, OneShotOptions};
use crate::stage::{BubbleCue, BubbleDef, BubbleLayout, Stage};
use glam::Vec2;
use rand::prelude::*;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::ops::Range;
use std::rc::{Rc, Weak};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BubbleState {
    Idle,
    Expanding,
    Revealed,
    Paginating,
    Popped,
}

/// Expansion steps, in order, with how long each one takes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpandPhase {
    Resize,
    Emphasis,
    Reveal,
}

pub const EXPAND_PHASES: [(ExpandPhase, u32); 3] = [
    (ExpandPhase::Resize, EXPAND_RESIZE_MS),
    (ExpandPhase::Emphasis, EXPAND_EMPHASIS_MS),
    (ExpandPhase::Reveal, EXPAND_REVEAL_MS),
];

/// Total time from `expand` to `revealed`.
pub fn expansion_ms() -> u32 {
    EXPAND_PHASES.iter().map(|(_, ms)| ms).sum()
}

/// Pages needed for `sentence_count` sentences. Never less than one.
pub fn total_pages(sentence_count: usize) -> usize {
    sentence_count.div_ceil(SENTENCES_PER_PAGE).max(1)
}

/// Expanded diameter: 520 up to three sentences, +80 per sentence above
/// that, capped at five.
pub fn expanded_size(sentence_count: usize) -> f32 {
    let extra = sentence_count
        .min(BUBBLE_SIZE_CAP_SENTENCES)
        .saturating_sub(BUBBLE_BASE_SENTENCES);
    BUBBLE_BASE_SIZE + extra as f32 * BUBBLE_SIZE_PER_SENTENCE
}

/// Delay between sentence reveals on a page holding `sentences` sentences.
pub fn stagger_ms(sentences: usize) -> u32 {
    match sentences {
        0..=3 => STAGGER_SPARSE_MS,
        4..=6 => STAGGER_MEDIUM_MS,
        7..=10 => STAGGER_DENSE_MS,
        _ => STAGGER_CROWDED_MS,
    }
}

/// Sentence indices shown on `page` (1-based).
pub fn page_range(page: usize, sentence_count: usize) -> Range<usize> {
    let start = (page.saturating_sub(1) * SENTENCES_PER_PAGE).min(sentence_count);
    let end = (page * SENTENCES_PER_PAGE).min(sentence_count);
    start..end
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PopOutcome {
    /// Not on its last page, not revealed, or unknown. Nothing happened.
    Rejected,
    Popped { remaining: usize },
    /// The last bubble of the scene went.
    SceneCleared(SceneId),
}

struct Bubble {
    def: BubbleDef,
    scene: SceneId,
    state: BubbleState,
    current_page: usize,
    total_pages: usize,
    layout: BubbleLayout,
    /// Every track started for this bubble, any page.
    handles: SmallVec<[OneShotHandle; 4]>,
    active: Option<OneShotHandle>,
}

impl Bubble {
    fn id(&self) -> &BubbleId {
        &self.def.id
    }
}

struct Shared {
    bubbles: RefCell<Vec<Bubble>>,
    personas: Rc<PersonaCatalog>,
    mixer: AudioMixer,
    stage: Rc<dyn Stage>,
    scheduler: Rc<dyn Scheduler>,
    rng: RefCell<StdRng>,
}

#[derive(Clone)]
pub struct BubbleController {
    shared: Rc<Shared>,
}

impl BubbleController {
    pub fn new(
        personas: Rc<PersonaCatalog>,
        mixer: AudioMixer,
        stage: Rc<dyn Stage>,
        scheduler: Rc<dyn Scheduler>,
        seed: u64,
    ) -> Self {
        Self {
            shared: Rc::new(Shared {
                bubbles: RefCell::new(Vec::new()),
                personas,
                mixer,
                stage,
                scheduler,
                rng: RefCell::new(StdRng::seed_from_u64(seed)),
            }),
        }
    }

    /// Take ownership of a freshly populated scene's bubbles. Returns how many
    /// were spawned.
    pub fn populate(&self, scene: SceneId, defs: Vec<BubbleDef>) -> usize {
        let shared = &self.shared;
        let mut spawned = 0;
        for def in defs {
            if self.exists(&def.id) {
                log::warn!("[bubble] {} already on stage; skipped", def.id);
                continue;
            }
            let persona = match shared.personas.get(&def.persona) {
                Some(p) => p.clone(),
                None => {
                    log::warn!("[bubble] {}", StoryError::NoPersona(def.persona.clone()));
                    Default::default()
                }
            };
            let idle_delay_ms = shared.rng.borrow_mut().gen_range(0..=IDLE_DELAY_MAX_MS);
            let size = expanded_size(def.sentence_count);
            let id = def.id.clone();
            shared.bubbles.borrow_mut().push(Bubble {
                scene,
                state: BubbleState::Idle,
                current_page: 1,
                total_pages: total_pages(def.sentence_count),
                layout: BubbleLayout {
                    size: Vec2::splat(size),
                    anchor: Vec2::splat(0.5),
                },
                handles: SmallVec::new(),
                active: None,
                def,
            });
            shared.stage.bubble_cue(BubbleCue::Spawn {
                bubble: id.clone(),
                scene,
                persona,
                idle_delay_ms,
            });
            // entrance on the next paint so the spawn state is rendered first
            let weak = Rc::downgrade(shared);
            shared.scheduler.next_frame(Box::new(move || {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                let still_idle = shared
                    .bubbles
                    .borrow()
                    .iter()
                    .any(|b| *b.id() == id && b.state == BubbleState::Idle);
                if still_idle {
                    shared.stage.bubble_cue(BubbleCue::Enter(id));
                }
            }));
            spawned += 1;
        }
        log::info!("[bubble] {spawned} bubbles spawned for {scene}");
        spawned
    }

    /// Open an idle bubble. Returns false (and does nothing) otherwise.
    pub fn expand(&self, id: &BubbleId) -> bool {
        {
            let mut bubbles = self.shared.bubbles.borrow_mut();
            let Some(bubble) = bubbles.iter_mut().find(|b| b.id() == id) else {
                log::debug!("[bubble] expand: {}", StoryError::NoBubble(id.clone()));
                return false;
            };
            if bubble.state != BubbleState::Idle {
                log::debug!("[bubble] expand {id} ignored in {:?}", bubble.state);
                return false;
            }
            bubble.state = BubbleState::Expanding;
            bubble.total_pages = total_pages(bubble.def.sentence_count);
            bubble.current_page = 1;
        }
        log::debug!("[bubble] {id} expanding");
        Self::run_phase(&Rc::downgrade(&self.shared), id.clone(), 0);
        true
    }

    /// Apply expansion phase `index`, then chain the next one once its
    /// duration has elapsed.
    fn run_phase(weak: &Weak<Shared>, id: BubbleId, index: usize) {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let Some((phase, duration)) = EXPAND_PHASES.get(index).copied() else {
            Self::finish_expand(&shared, &id);
            return;
        };
        {
            let bubbles = shared.bubbles.borrow();
            let Some(bubble) = bubbles
                .iter()
                .find(|b| *b.id() == id && b.state == BubbleState::Expanding)
            else {
                return;
            };
            let cue = match phase {
                ExpandPhase::Resize => BubbleCue::Resize {
                    bubble: id.clone(),
                    layout: bubble.layout,
                },
                ExpandPhase::Emphasis => BubbleCue::Emphasis(id.clone()),
                ExpandPhase::Reveal => BubbleCue::RevealPage {
                    bubble: id.clone(),
                    page: 1,
                    total_pages: bubble.total_pages,
                    sentences: page_range(1, bubble.def.sentence_count),
                },
            };
            shared.stage.bubble_cue(cue);
        }
        let next = weak.clone();
        shared.scheduler.after(
            duration,
            Box::new(move || Self::run_phase(&next, id, index + 1)),
        );
    }

    fn finish_expand(shared: &Rc<Shared>, id: &BubbleId) {
        let sentences = {
            let mut bubbles = shared.bubbles.borrow_mut();
            let Some(bubble) = bubbles
                .iter_mut()
                .find(|b| b.id() == id && b.state == BubbleState::Expanding)
            else {
                return;
            };
            bubble.state = BubbleState::Revealed;
            Self::start_page_audio(shared, bubble);
            page_range(1, bubble.def.sentence_count)
        };
        log::debug!("[bubble] {id} revealed");
        Self::schedule_sentences(shared, id, 1, sentences);
    }

    /// Turn to the next page. Only valid from `revealed` before the last page.
    pub fn next_page(&self, id: &BubbleId) -> bool {
        let shared = &self.shared;
        let page = {
            let mut bubbles = shared.bubbles.borrow_mut();
            let Some(bubble) = bubbles.iter_mut().find(|b| b.id() == id) else {
                log::debug!("[bubble] next_page: {}", StoryError::NoBubble(id.clone()));
                return false;
            };
            if bubble.state != BubbleState::Revealed || bubble.current_page >= bubble.total_pages
            {
                log::debug!(
                    "[bubble] next_page {id} ignored in {:?} on page {}/{}",
                    bubble.state,
                    bubble.current_page,
                    bubble.total_pages
                );
                return false;
            }
            shared.stage.bubble_cue(BubbleCue::PageOut {
                bubble: id.clone(),
                page: bubble.current_page,
            });
            bubble.current_page += 1;
            bubble.state = BubbleState::Paginating;
            Self::start_page_audio(shared, bubble);
            bubble.current_page
        };

        let weak = Rc::downgrade(shared);
        let id = id.clone();
        shared.scheduler.after(
            PAGE_SWAP_MS,
            Box::new(move || {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                let shown = {
                    let mut bubbles = shared.bubbles.borrow_mut();
                    let Some(bubble) = bubbles.iter_mut().find(|b| {
                        *b.id() == id && b.state == BubbleState::Paginating && b.current_page == page
                    }) else {
                        return;
                    };
                    bubble.state = BubbleState::Revealed;
                    let sentences = page_range(page, bubble.def.sentence_count);
                    shared.stage.bubble_cue(BubbleCue::RevealPage {
                        bubble: id.clone(),
                        page,
                        total_pages: bubble.total_pages,
                        sentences: sentences.clone(),
                    });
                    sentences
                };
                Self::schedule_sentences(&shared, &id, page, shown);
            }),
        );
        true
    }

    /// Swap to the track bound to the bubble's current page, if it has one.
    /// Pages without a track leave the previous one playing.
    fn start_page_audio(shared: &Shared, bubble: &mut Bubble) {
        let Some(track) = bubble.def.track_for_page(bubble.current_page).cloned() else {
            return;
        };
        if let Some(previous) = bubble.active.take() {
            shared.mixer.stop_one_shot(previous);
        }
        let group = GroupId::for_bubble(bubble.id());
        if let Some(handle) = shared
            .mixer
            .play_one_shot(&track, OneShotOptions::in_group(group))
        {
            bubble.handles.push(handle);
            bubble.active = Some(handle);
        }
    }

    fn schedule_sentences(shared: &Rc<Shared>, id: &BubbleId, page: usize, sentences: Range<usize>) {
        let stagger = stagger_ms(sentences.len());
        for (k, index) in sentences.enumerate() {
            let weak = Rc::downgrade(shared);
            let id = id.clone();
            shared.scheduler.after(
                stagger * k as u32,
                Box::new(move || {
                    let Some(shared) = weak.upgrade() else {
                        return;
                    };
                    let on_page = shared.bubbles.borrow().iter().any(|b| {
                        *b.id() == id && b.current_page == page && b.state == BubbleState::Revealed
                    });
                    if on_page {
                        shared
                            .stage
                            .bubble_cue(BubbleCue::ShowSentence { bubble: id, index });
                    }
                }),
            );
        }
    }

    /// Pop a bubble that is showing its last page: play the pop, silence every
    /// track it ever started and remove it.
    pub fn pop(&self, id: &BubbleId) -> PopOutcome {
        let shared = &self.shared;
        let scene = {
            let mut bubbles = shared.bubbles.borrow_mut();
            let Some(index) = bubbles.iter().position(|b| b.id() == id) else {
                log::debug!("[bubble] pop: {}", StoryError::NoBubble(id.clone()));
                return PopOutcome::Rejected;
            };
            let bubble = &mut bubbles[index];
            let poppable = matches!(bubble.state, BubbleState::Revealed | BubbleState::Paginating)
                && bubble.current_page == bubble.total_pages;
            if !poppable {
                log::debug!(
                    "[bubble] pop {id} rejected in {:?} on page {}/{}",
                    bubble.state,
                    bubble.current_page,
                    bubble.total_pages
                );
                return PopOutcome::Rejected;
            }
            shared.mixer.play_pop();
            for handle in bubble.handles.drain(..) {
                shared.mixer.stop_one_shot(handle);
            }
            bubble.active = None;
            bubble.state = BubbleState::Popped;
            shared.stage.bubble_cue(BubbleCue::Pop(id.clone()));
            bubbles.remove(index).scene
        };
        let remaining = self.remaining(scene);
        log::info!("[bubble] {id} popped; {remaining} left in {scene}");
        if remaining == 0 {
            PopOutcome::SceneCleared(scene)
        } else {
            PopOutcome::Popped { remaining }
        }
    }

    /// Drop every bubble still owned by `scene`, silencing their tracks.
    pub fn discard_scene(&self, scene: SceneId) {
        let shared = &self.shared;
        let discarded: Vec<Bubble> = {
            let mut bubbles = shared.bubbles.borrow_mut();
            let (gone, kept) = bubbles.drain(..).partition(|b| b.scene == scene);
            *bubbles = kept;
            gone
        };
        for bubble in discarded {
            for handle in &bubble.handles {
                shared.mixer.stop_one_shot(*handle);
            }
            shared.stage.bubble_cue(BubbleCue::Discard(bubble.def.id));
        }
    }

    /// Bubbles of `scene` not yet popped.
    pub fn remaining(&self, scene: SceneId) -> usize {
        self.shared
            .bubbles
            .borrow()
            .iter()
            .filter(|b| b.scene == scene && b.state != BubbleState::Popped)
            .count()
    }

    pub fn ids_in(&self, scene: SceneId) -> Vec<BubbleId> {
        self.shared
            .bubbles
            .borrow()
            .iter()
            .filter(|b| b.scene == scene)
            .map(|b| b.id().clone())
            .collect()
    }

    pub fn exists(&self, id: &BubbleId) -> bool {
        self.shared.bubbles.borrow().iter().any(|b| b.id() == id)
    }

    pub fn state(&self, id: &BubbleId) -> Option<BubbleState> {
        self.with(id, |b| b.state)
    }

    pub fn current_page(&self, id: &BubbleId) -> Option<usize> {
        self.with(id, |b| b.current_page)
    }

    pub fn total_pages(&self, id: &BubbleId) -> Option<usize> {
        self.with(id, |b| b.total_pages)
    }

    pub fn layout(&self, id: &BubbleId) -> Option<BubbleLayout> {
        self.with(id, |b| b.layout)
    }

    /// The track handle playing for the bubble's current page.
    pub fn active_track(&self, id: &BubbleId) -> Option<OneShotHandle> {
        self.with(id, |b| b.active).flatten()
    }

    fn with<T>(&self, id: &BubbleId, f: impl FnOnce(&Bubble) -> T) -> Option<T> {
        self.shared.bubbles.borrow().iter().find(|b| b.id() == id).map(f)
    }
}
