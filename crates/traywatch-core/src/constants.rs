//! Application-wide constants
//!
//! Centralized location for environment variable names, protocol strings
//! and timing values that are used across multiple modules.

use std::time::Duration;

/// Directory name under the user config dir holding `config.yaml`
pub const CONFIG_DIR_NAME: &str = "mm-traywatch";
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Keyring service used for the access token
pub const KEYRING_SERVICE: &str = "mm-traywatch";

// Environment overrides
pub mod env {
    pub const CONFIG_PATH: &str = "MM_TRAYWATCH_CONFIG";
    pub const TOKEN: &str = "MM_TRAYWATCH_PAT";
    pub const HOST: &str = "MM_TRAYWATCH_HOST";
    pub const THEME: &str = "MM_TRAYWATCH_THEME";
    pub const DEBUG: &str = "MM_TRAYWATCH_DEBUG";
}

// Reconnect backoff
/// First backoff duration, and the value restored after a clean connect
pub const BACKOFF_BASE: Duration = Duration::from_secs(1);
/// Hard ceiling on a single wait
pub const BACKOFF_MAX_WAIT: Duration = Duration::from_secs(60);
/// The duration only keeps doubling while it is below this value
pub const BACKOFF_GROWTH_LIMIT: Duration = Duration::from_secs(30);
/// Upper bound (exclusive) of the random jitter fraction
pub const BACKOFF_JITTER: f64 = 0.2;

// Diagnostic reporter
pub const REPORT_INITIAL_DELAY: Duration = Duration::from_secs(3);
pub const REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Posts whose type starts with this are generated by the server
/// ("user joined the channel" and friends) and never count as unread.
pub const SYSTEM_POST_PREFIX: &str = "system_";

// WebSocket event names
pub mod events {
    pub const POSTED: &str = "posted";
    pub const MULTIPLE_CHANNELS_VIEWED: &str = "multiple_channels_viewed";
}

// Channel type tags as sent by the server
pub mod channel_types {
    pub const DIRECT: &str = "D";
    pub const GROUP: &str = "G";
    pub const OPEN: &str = "O";
    pub const PRIVATE: &str = "P";
}
