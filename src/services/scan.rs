use crate::models::BottleRecord;
use crate::services::probe::{self, ProbeError};
use crate::services::runner::{CommandRunner, WineCommand};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::Arc;

/// Shown when `wine --version` can't be run
pub const UNKNOWN_WINE_VERSION: &str = "unknown";

/// Result of a full directory scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub bottles: Vec<BottleRecord>,
    pub wine_version: String,
}

/// Rebuilds the bottle collection from the prefixes directory.
///
/// Each immediate sub-directory containing `system.reg` becomes one record.
/// Records are sorted by name so repeated scans of an unchanged directory
/// produce identical collections regardless of directory listing order.
#[derive(Clone)]
pub struct BottleScanner {
    prefixes_dir: Utf8PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl BottleScanner {
    pub fn new(prefixes_dir: impl Into<Utf8PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            prefixes_dir: prefixes_dir.into(),
            runner,
        }
    }

    pub fn prefixes_dir(&self) -> &Utf8Path {
        &self.prefixes_dir
    }

    /// Path a bottle with this name lives at
    pub fn prefix_for(&self, name: &str) -> Utf8PathBuf {
        self.prefixes_dir.join(name)
    }

    /// Ask Wine for its version. Blocks on a subprocess.
    pub fn wine_version(&self) -> String {
        match self.runner.run(&WineCommand::new("wine").arg("--version"), None) {
            Ok(output) => probe::parse_wine_version(&output)
                .unwrap_or_else(|| UNKNOWN_WINE_VERSION.to_string()),
            Err(e) => {
                tracing::warn!("Could not determine Wine version: {}", e);
                UNKNOWN_WINE_VERSION.to_string()
            }
        }
    }

    /// Scan the prefixes directory and probe every bottle in it.
    ///
    /// A missing directory is an empty collection, not an error. Directories
    /// that aren't Wine prefixes are skipped with a log line.
    pub fn rebuild(&self) -> Result<ScanResult> {
        let wine_version = self.wine_version();

        if !self.prefixes_dir.exists() {
            tracing::info!("Prefixes directory {} does not exist yet", self.prefixes_dir);
            return Ok(ScanResult {
                bottles: Vec::new(),
                wine_version,
            });
        }

        let entries = fs::read_dir(&self.prefixes_dir)
            .with_context(|| format!("Failed to list prefixes directory: {}", self.prefixes_dir))?;

        let mut bottles = Vec::new();
        for entry in entries {
            let entry = entry
                .with_context(|| format!("Failed to read entry in {}", self.prefixes_dir))?;
            let Ok(path) = Utf8PathBuf::try_from(entry.path()) else {
                tracing::warn!("Skipping non UTF-8 path {:?}", entry.path());
                continue;
            };
            if !path.is_dir() {
                continue;
            }

            match probe::probe_bottle(&path, &wine_version) {
                Ok(record) => bottles.push(record),
                Err(ProbeError::NotABottle(_)) => {
                    tracing::debug!("Skipping {}: not a Wine prefix", path);
                }
                Err(e) => tracing::warn!("Skipping {}: {}", path, e),
            }
        }

        bottles.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::info!("Found {} bottle(s) in {}", bottles.len(), self.prefixes_dir);
        Ok(ScanResult {
            bottles,
            wine_version,
        })
    }

    /// Probe a single bottle, e.g. right after creating it
    pub fn probe(&self, prefix: &Utf8Path, wine_version: &str) -> Result<BottleRecord, ProbeError> {
        probe::probe_bottle(prefix, wine_version)
    }
}
