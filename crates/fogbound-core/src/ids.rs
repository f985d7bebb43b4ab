//! Identifier newtypes shared by every subsystem.

use std::fmt;

/// One of the nine scenes, ordered 1..=9.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(u8);

impl SceneId {
    pub const FIRST: SceneId = SceneId(1);
    pub const LAST: SceneId = SceneId(9);

    pub const ALL: [SceneId; 9] = [
        SceneId(1),
        SceneId(2),
        SceneId(3),
        SceneId(4),
        SceneId(5),
        SceneId(6),
        SceneId(7),
        SceneId(8),
        SceneId(9),
    ];

    /// Returns `None` outside 1..=9.
    pub fn new(n: u8) -> Option<Self> {
        (Self::FIRST.0..=Self::LAST.0)
            .contains(&n)
            .then_some(SceneId(n))
    }

    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }

    /// The scene that follows this one in the linear chain.
    pub fn next(self) -> Option<SceneId> {
        SceneId::new(self.0 + 1)
    }

    #[inline]
    pub fn is_last(self) -> bool {
        self == Self::LAST
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene-{}", self.0)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_id!(
    /// Named ambience channel, e.g. `frogs` or `wind`.
    LayerId
);
string_id!(
    /// Key into the one-shot track registry.
    TrackId
);
string_id!(
    /// Identity/config bundle attached to a bubble.
    PersonaId
);
string_id!(BubbleId);
string_id!(
    /// Tracks sharing a group never play at the same time.
    GroupId
);

impl GroupId {
    /// Each bubble owns its own exclusivity group so that its page tracks
    /// never overlap each other.
    pub fn for_bubble(bubble: &BubbleId) -> Self {
        GroupId(format!("bubble:{}", bubble.as_str()))
    }
}
