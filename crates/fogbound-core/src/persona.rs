//! Personas: the per-bubble identity selected once at spawn.
//!
//! A persona replaces branching on bubble kinds. Its entrance, idle motion
//! and decoration are plain data handed to the visual layer; its voice lives
//! in the bubble's page-to-track binding.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntranceStyle {
    Drift,
    Rise,
    Fade,
    Swoop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdleAnimation {
    Bob,
    Sway,
    Pulse,
    Still,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decoration {
    Feathers,
    Sparks,
    Ripples,
    Leaves,
}

impl EntranceStyle {
    pub fn class_name(self) -> &'static str {
        match self {
            EntranceStyle::Drift => "enter-drift",
            EntranceStyle::Rise => "enter-rise",
            EntranceStyle::Fade => "enter-fade",
            EntranceStyle::Swoop => "enter-swoop",
        }
    }
}

impl IdleAnimation {
    pub fn class_name(self) -> &'static str {
        match self {
            IdleAnimation::Bob => "idle-bob",
            IdleAnimation::Sway => "idle-sway",
            IdleAnimation::Pulse => "idle-pulse",
            IdleAnimation::Still => "idle-still",
        }
    }
}

impl Decoration {
    pub fn class_name(self) -> &'static str {
        match self {
            Decoration::Feathers => "deco-feathers",
            Decoration::Sparks => "deco-sparks",
            Decoration::Ripples => "deco-ripples",
            Decoration::Leaves => "deco-leaves",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PersonaSpec {
    pub entrance: EntranceStyle,
    pub idle: IdleAnimation,
    pub decoration: Option<Decoration>,
}

impl Default for PersonaSpec {
    fn default() -> Self {
        Self {
            entrance: EntranceStyle::Fade,
            idle: IdleAnimation::Bob,
            decoration: None,
        }
    }
}
