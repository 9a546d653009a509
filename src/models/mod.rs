//! Data models for winecellar.
//!
//! - [`BottleRecord`]: probed snapshot of one Wine prefix, plus the enums describing it
//!   ([`Windows`], [`Bit`], [`AudioDriver`], [`BottleStatus`])
//! - [`AppState`]: entity store, active selection and error slot behind one lock
//! - [`GeneralConfig`]: application preferences from `config.yaml`
//! - [`BottleConfig`]: per-bottle settings from `.winecellar.yaml`
//!
//! State updates go through [`StateManager`](crate::state::StateManager)'s `update()`
//! so change events are emitted consistently.

pub mod app_state;
pub mod bottle;
pub mod config;

pub use app_state::{AppState, JobKind, MAX_CONCURRENT_LIFECYCLE_JOBS};
pub use bottle::{
    AppShortcut, AudioDriver, Bit, BottleRecord, BottleStatus, DEFAULT_BOTTLE_INDEX,
    SUPPORTED_WINDOWS, Windows, is_supported, validate_bottle_name,
};
pub use config::{BottleConfig, GeneralConfig};
