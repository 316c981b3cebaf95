//! Tunable economy constants shared across modules.

/// Inventory slots available in the lobby.
pub const FULL_CAPACITY: usize = 30;

/// Inventory slots available while inside the maze on an expedition.
/// Strictly smaller than [`FULL_CAPACITY`].
pub const EXPEDITION_CAPACITY: usize = 12;

/// Neutral luck multiplier; leaves the rarity pool untouched.
pub const DEFAULT_LUCK: f64 = 1.0;

/// Bounded attempts for a single persistence save.
pub const SAVE_ATTEMPTS: u32 = 3;

/// Backoff between save attempts, in milliseconds.
pub const SAVE_BACKOFF_MS: u64 = 250;

/// Interval between periodic autosaves for a live session, in seconds.
pub const AUTOSAVE_INTERVAL_SECS: u64 = 120;
