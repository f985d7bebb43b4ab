// Timing and layout constants shared by the web and native front-ends.

// Pagination
pub const SENTENCES_PER_PAGE: usize = 5;

// Expanded bubble size (px)
pub const BUBBLE_BASE_SIZE: f32 = 520.0; // up to 3 sentences
pub const BUBBLE_SIZE_PER_SENTENCE: f32 = 80.0; // added per sentence above 3
pub const BUBBLE_BASE_SENTENCES: usize = 3;
pub const BUBBLE_SIZE_CAP_SENTENCES: usize = 5; // 520 + 2 * 80 = 680

// Expansion choreography (each phase waits for the previous one)
pub const EXPAND_RESIZE_MS: u32 = 600; // size/position change
pub const EXPAND_EMPHASIS_MS: u32 = 500; // background emphasis change
pub const EXPAND_REVEAL_MS: u32 = 300; // content fades in

// Pagination choreography
pub const PAGE_SWAP_MS: u32 = 400; // old page out before new page in

// Sentence reveal stagger by sentences on the page
pub const STAGGER_SPARSE_MS: u32 = 5000; // <= 3 sentences
pub const STAGGER_MEDIUM_MS: u32 = 3000; // <= 6
pub const STAGGER_DENSE_MS: u32 = 2000; // <= 10
pub const STAGGER_CROWDED_MS: u32 = 1500; // anything longer

// Volume envelopes
pub const FADE_MIN_STEPS: u32 = 20;
pub const FADE_STEP_MS: u32 = 25; // preferred step length for long fades
pub const INITIAL_AMBIENT_FADE_MS: u32 = 2000; // first scene fades in from silence
pub const AMBIENT_RETARGET_MS: u32 = 1500; // scene volumes applied by start_ambient alone

// One-shot effects
pub const POP_VOLUME: f32 = 0.6;
pub const DEFAULT_ONE_SHOT_VOLUME: f32 = 0.8;

// Crow cue on the opening scene (cancelled if a bubble is opened first)
pub const CROW_DELAY_MIN_MS: u32 = 6000;
pub const CROW_DELAY_MAX_MS: u32 = 9000;
pub const CROW_VOLUME: f32 = 0.5;

// Idle bob animation offset per bubble
pub const IDLE_DELAY_MAX_MS: u32 = 2400;

// Paint-aligned callbacks on the manual clock
pub const FRAME_INTERVAL_MS: u32 = 16;
