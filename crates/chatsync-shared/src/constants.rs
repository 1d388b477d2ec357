/// Number of messages requested per history page
pub const PAGE_SIZE: usize = 25;

/// Distance in points from an edge that triggers load-more
pub const LOAD_MORE_THRESHOLD: f64 = 800.0;

/// Minimum gap between two processed scroll-position events
pub const SCROLL_DEBOUNCE_MS: u64 = 500;

/// Window after a programmatic scroll during which load-more is suppressed
pub const EXCESSIVE_LOADING_SUPPRESSION_MS: u64 = 1_000;

/// How long a highlighted row stays highlighted
pub const HIGHLIGHT_DURATION_MS: u64 = 2_500;

/// Buffer size of the engine command channel
pub const COMMAND_BUFFER: usize = 256;

/// Scenario-key prefixes used to tag outstanding requests
pub const KEY_UNREAD_TOP: &str = "TOP-UNREAD-SCENARIO";
pub const KEY_UNREAD_BOTTOM: &str = "BOTTOM-UNREAD-SCENARIO";
pub const KEY_CAUGHT_UP: &str = "TOP-CAUGHT-UP-SCENARIO";
pub const KEY_MORE_TOP: &str = "MORE-TOP";
pub const KEY_MORE_BOTTOM: &str = "MORE-BOTTOM";
pub const KEY_RECONNECT: &str = "RECONNECT-BOTTOM";
pub const KEY_MOVE_TO_TOP: &str = "MOVE-TO-TOP";
pub const KEY_MOVE_TO_BOTTOM: &str = "MOVE-TO-BOTTOM";
pub const KEY_OFFSET: &str = "OFFSET-FETCH";
pub const KEY_REACTIONS: &str = "REACTION-SUMMARY";

/// Application name used for the cache directory
pub const APP_NAME: &str = "chatsync";
