//! Error types.
//!
//! None of these ever reach the viewer. Configuration problems are reported
//! when the story tables are validated, playback and lookup failures are
//! logged where they happen and the timeline carries on.

use crate::ids::{BubbleId, LayerId, PersonaId, SceneId, TrackId};
use thiserror::Error;

/// A story table that cannot be used as written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("transition {from}->{to}: audio fade {fade_ms}ms exceeds duration {duration_ms}ms")]
    FadeExceedsDuration {
        from: SceneId,
        to: SceneId,
        fade_ms: u32,
        duration_ms: u32,
    },

    #[error("transition {from}->{to}: phase at {offset_ms}ms lies outside [0, {duration_ms}]")]
    PhaseOutOfRange {
        from: SceneId,
        to: SceneId,
        offset_ms: u32,
        duration_ms: u32,
    },

    #[error("transition {from}->{to} does not join adjacent scenes")]
    NotAdjacent { from: SceneId, to: SceneId },

    #[error("partial fade level {0} is outside [0, 1]")]
    LevelOutOfRange(f32),

    #[error(transparent)]
    Missing(#[from] StoryError),
}

/// A lookup that found nothing. Logged and skipped at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoryError {
    #[error("no ambience configured for {0}")]
    NoAmbience(SceneId),

    #[error("no ambient layer named {0}")]
    NoLayer(LayerId),

    #[error("no transition configured for {from}->{to}")]
    NoTransition { from: SceneId, to: SceneId },

    #[error("no track named {0}")]
    NoTrack(TrackId),

    #[error("no persona named {0}")]
    NoPersona(PersonaId),

    #[error("no bubble named {0}")]
    NoBubble(BubbleId),
}

/// The device would not start a sound.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("playback unavailable: {0}")]
    Unavailable(String),

    #[error("voice was released before playback started")]
    Released,
}
