/// The default amount of messages sent to a member joining a room
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Configuration for the collab system
#[derive(Debug, Clone)]
pub struct Config {
    /// How many of the latest messages are included when joining a room
    pub history_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}
