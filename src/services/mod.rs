//! Services module - bottle logic that talks to the filesystem and to Wine.
//!
//! Nothing here knows about the interface or about threads; callers decide
//! where the blocking calls run.
//!
//! # Components
//!
//! - [`registry`]: Parser for Wine's `system.reg` / `user.reg` files
//! - [`probe`]: Builds a [`BottleRecord`](crate::models::BottleRecord) from a prefix directory
//! - [`scan`]: [`BottleScanner`], rebuilds the whole collection from the prefixes directory
//! - [`runner`]: [`CommandRunner`] seam and the tokio backed [`WineRunner`]. Sets
//!   `WINEPREFIX` on the child only.
//! - [`packages`]: Winetricks verbs for installable components
//! - [`tools`]: Commands for the external programs a bottle can open
//!
//! # Usage Example
//!
//! ```ignore
//! use winecellar::services::{BottleScanner, WineRunner};
//!
//! let runner = Arc::new(WineRunner::new(runtime.handle().clone(), None));
//! let scanner = BottleScanner::new("/home/me/.winecellar/prefixes", runner);
//! let scan = scanner.rebuild()?;
//! println!("{} bottles, wine {}", scan.bottles.len(), scan.wine_version);
//! ```

pub mod packages;
pub mod probe;
pub mod registry;
pub mod runner;
pub mod scan;
pub mod tools;

pub use packages::Package;
pub use probe::{ProbeError, probe_bottle};
pub use registry::RegistryFile;
pub use runner::{CommandRunner, PREFIX_ENV, RunnerError, WineCommand, WineRunner};
pub use scan::{BottleScanner, ScanResult, UNKNOWN_WINE_VERSION};
pub use tools::Tool;
