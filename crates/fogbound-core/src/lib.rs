pub mod bubble;
pub mod clock;
pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod ids;
pub mod mixer;
pub mod persona;
pub mod scene;
pub mod stage;
pub mod story;
pub mod testing;
pub mod transition;

pub use bubble::{BubbleController, BubbleState, PopOutcome};
pub use clock::{ManualClock, Scheduler, Task, TimerId};
pub use config::StoryConfig;
pub use device::{PlaybackDevice, VoiceId};
pub use error::{ConfigError, PlaybackError, StoryError};
pub use ids::*;
pub use mixer::AudioMixer;
pub use scene::{AdvanceOutcome, SceneController};
pub use stage::{BubbleCue, BubbleDef, ContentProvider, SceneCue, Stage};
pub use story::{Collaborators, Story};
pub use transition::{TransitionEngine, TransitionSpec};
