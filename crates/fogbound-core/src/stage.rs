//! Collaborators on the visual side: the stage that renders cues and the
//! content provider that says which bubbles a scene holds.

use crate::ids::{BubbleId, PersonaId, SceneId, TrackId};
use crate::persona::PersonaSpec;
use glam::Vec2;
use std::ops::Range;

/// Scene-level visual effects. The stage decides what they look like.
#[derive(Clone, Debug, PartialEq)]
pub enum SceneCue {
    /// The scene is leaving; its bubbles and decorations stop reacting.
    MarkTransitioning(SceneId),
    ExitDecorations(SceneId),
    EnterDecorations(SceneId),
    /// Fog/background intensity in \[0, 1\].
    Fog(f32),
    Background(SceneId),
    Activate(SceneId),
    TearDown(SceneId),
    /// The scene has no bubbles; offer a way to move on.
    ShowContinue(SceneId),
    Finale,
}

/// Expanded bubble geometry: `size` in px, `anchor` in normalized viewport
/// coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BubbleLayout {
    pub size: Vec2,
    pub anchor: Vec2,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BubbleCue {
    Spawn {
        bubble: BubbleId,
        scene: SceneId,
        persona: PersonaSpec,
        idle_delay_ms: u32,
    },
    Enter(BubbleId),
    Resize {
        bubble: BubbleId,
        layout: BubbleLayout,
    },
    Emphasis(BubbleId),
    RevealPage {
        bubble: BubbleId,
        page: usize,
        total_pages: usize,
        sentences: Range<usize>,
    },
    ShowSentence {
        bubble: BubbleId,
        index: usize,
    },
    PageOut {
        bubble: BubbleId,
        page: usize,
    },
    Pop(BubbleId),
    Discard(BubbleId),
}

/// The decoration/visual layer.
pub trait Stage {
    fn scene_cue(&self, cue: SceneCue);
    fn bubble_cue(&self, cue: BubbleCue);
}

/// One bubble as supplied by the content provider.
#[derive(Clone, Debug, PartialEq)]
pub struct BubbleDef {
    pub id: BubbleId,
    pub persona: PersonaId,
    pub sentence_count: usize,
    /// Track to play when each page is shown, indexed from page 1.
    pub page_tracks: Vec<Option<TrackId>>,
}

impl BubbleDef {
    pub fn new(id: &str, persona: &str, sentence_count: usize) -> Self {
        Self {
            id: BubbleId::from(id),
            persona: PersonaId::from(persona),
            sentence_count,
            page_tracks: Vec::new(),
        }
    }

    pub fn with_tracks(mut self, tracks: &[&str]) -> Self {
        self.page_tracks = tracks
            .iter()
            .map(|t| (!t.is_empty()).then(|| TrackId::from(*t)))
            .collect();
        self
    }

    /// Track bound to `page` (1-based), if any.
    pub fn track_for_page(&self, page: usize) -> Option<&TrackId> {
        page.checked_sub(1)
            .and_then(|i| self.page_tracks.get(i))
            .and_then(Option::as_ref)
    }
}

pub trait ContentProvider {
    fn bubbles_for(&self, scene: SceneId) -> Vec<BubbleDef>;
}
