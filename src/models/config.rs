use crate::models::bottle::AppShortcut;
use serde::{Deserialize, Serialize};

/// Application preferences from `config.yaml`
///
/// Every field has a default so a missing or partial file still loads.
/// Values can be overridden with `WINECELLAR_<FIELD>` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Root directory holding one sub-directory per bottle.
    /// Empty means `~/.winecellar/prefixes`.
    pub prefixes_dir: String,

    /// Bottle selected at start-up, if present
    pub default_bottle: String,

    /// Use 64-bit as the default for new bottles
    pub prefer_wine64: bool,

    /// Log at debug level instead of info
    pub debug_logging: bool,

    /// Mirror log output to stderr
    pub log_to_console: bool,

    /// Upper bound for a single blocking Wine command, 0 disables the limit
    pub command_timeout_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            prefixes_dir: String::new(),
            default_bottle: String::new(),
            prefer_wine64: false,
            debug_logging: false,
            log_to_console: true,
            command_timeout_secs: default_command_timeout(),
        }
    }
}

fn default_command_timeout() -> u64 {
    900
}

/// Per-bottle settings stored as `.winecellar.yaml` inside the prefix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleConfig {
    #[serde(default)]
    pub description: String,

    #[serde(default = "default_debug_log_level")]
    pub debug_log_level: u8,

    #[serde(default)]
    pub logging_enabled: bool,

    #[serde(default)]
    pub apps: Vec<AppShortcut>,
}

impl Default for BottleConfig {
    fn default() -> Self {
        Self {
            description: String::new(),
            debug_log_level: default_debug_log_level(),
            logging_enabled: false,
            apps: Vec::new(),
        }
    }
}

fn default_debug_log_level() -> u8 {
    1
}
