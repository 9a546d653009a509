// winecellar - Manager for Wine bottles (isolated Wine prefixes)
//
// This is the library crate containing the core logic and data structures.
// The binary crate (main.rs) provides the console entry point.

pub mod config;
pub mod logging;
pub mod manager;
pub mod models;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use manager::{
    BottleManager, CloneBottleRequest, JobEvent, ManagerError, NewBottleRequest,
    UpdateBottleRequest,
};
pub use models::{AppState, BottleConfig, BottleRecord, GeneralConfig, JobKind};
pub use state::StateManager;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
