use crate::config::ConfigManager;
use crate::models::{AudioDriver, Bit, BottleRecord, BottleStatus, Windows};
use crate::services::registry::RegistryFile;
use camino::Utf8Path;
use chrono::{DateTime, Utc};
use std::fs;
use thiserror::Error;

const WINE_KEY: &str = r"Software\Wine";
const DRIVERS_KEY: &str = r"Software\Wine\Drivers";
const EXPLORER_KEY: &str = r"Software\Wine\Explorer";
const DESKTOPS_KEY: &str = r"Software\Wine\Explorer\Desktops";
const NT_VERSION_KEY: &str = r"Software\Microsoft\Windows NT\CurrentVersion";
const WIN9X_VERSION_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion";
const PRODUCT_OPTIONS_KEY: &str = r"System\CurrentControlSet\Control\ProductOptions";

/// Windows version assumed when the registry doesn't say
pub const FALLBACK_WINDOWS: Windows = Windows::Windows10;

/// Why a directory could not be turned into a [`BottleRecord`]
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("{0} has no usable directory name")]
    InvalidPath(String),

    #[error("{0} is not a Wine prefix (system.reg missing)")]
    NotABottle(String),

    #[error("Failed to read registry of {path}: {message}")]
    Registry { path: String, message: String },
}

/// Build a record for one prefix directory from its files.
///
/// Only reads files; never runs Wine. `wine_version` is the version string
/// probed once per scan.
pub fn probe_bottle(prefix: &Utf8Path, wine_version: &str) -> Result<BottleRecord, ProbeError> {
    let name = prefix
        .file_name()
        .ok_or_else(|| ProbeError::InvalidPath(prefix.to_string()))?
        .to_string();

    let system_reg_path = prefix.join("system.reg");
    if !system_reg_path.is_file() {
        return Err(ProbeError::NotABottle(prefix.to_string()));
    }
    let system = RegistryFile::load(&system_reg_path).map_err(|e| ProbeError::Registry {
        path: system_reg_path.to_string(),
        message: format!("{:#}", e),
    })?;

    let user_reg_path = prefix.join("user.reg");
    let user = if user_reg_path.is_file() {
        RegistryFile::load(&user_reg_path).map_err(|e| ProbeError::Registry {
            path: user_reg_path.to_string(),
            message: format!("{:#}", e),
        })?
    } else {
        tracing::warn!("{} has no user.reg", prefix);
        RegistryFile::default()
    };

    let bit = system
        .arch()
        .and_then(Bit::from_wine_arch)
        .unwrap_or(Bit::Win32);

    let windows = detect_windows(&user, &system, bit).unwrap_or_else(|| {
        tracing::debug!(
            "Could not determine Windows version of {}, assuming {}",
            prefix,
            FALLBACK_WINDOWS
        );
        FALLBACK_WINDOWS
    });

    let status = if user_reg_path.is_file() && prefix.join("drive_c").is_dir() {
        BottleStatus::Healthy
    } else {
        BottleStatus::Broken
    };

    let bottle_config = ConfigManager::load_bottle_config(prefix).unwrap_or_else(|e| {
        tracing::warn!("Ignoring unreadable bottle config of {}: {:#}", prefix, e);
        Default::default()
    });

    Ok(BottleRecord {
        name,
        prefix: prefix.to_path_buf(),
        windows,
        bit,
        audio: detect_audio(&user),
        virtual_desktop: detect_virtual_desktop(&user),
        wine_version: wine_version.to_string(),
        last_update: read_update_timestamp(prefix),
        status,
        description: bottle_config.description,
        debug_log_level: bottle_config.debug_log_level,
        logging_enabled: bottle_config.logging_enabled,
        apps: bottle_config.apps,
    })
}

/// Determine the emulated Windows version.
///
/// `[Software\\Wine] "Version"` (written by winecfg/winetricks) wins; otherwise
/// the version numbers Wine put in `system.reg` are matched.
pub fn detect_windows(user: &RegistryFile, system: &RegistryFile, bit: Bit) -> Option<Windows> {
    if let Some(version) = user.value(WINE_KEY, "Version") {
        if let Some(windows) = Windows::from_winetricks_verb(version) {
            return Some(windows);
        }
        tracing::warn!("Unknown Wine version override '{}'", version);
    }

    if let Some(current) = system.value(NT_VERSION_KEY, "CurrentVersion") {
        let build = system
            .value(NT_VERSION_KEY, "CurrentBuild")
            .or_else(|| system.value(NT_VERSION_KEY, "CurrentBuildNumber"))
            .and_then(|b| b.trim().parse::<u32>().ok())
            .unwrap_or(0);
        let server = system
            .value(PRODUCT_OPTIONS_KEY, "ProductType")
            .map(|p| p.eq_ignore_ascii_case("ServerNT"))
            .unwrap_or(false);

        let windows = match current.trim() {
            "10.0" if build >= 22000 => Some(Windows::Windows11),
            "10.0" => Some(Windows::Windows10),
            "6.3" => Some(Windows::Windows81),
            "6.2" => Some(Windows::Windows8),
            "6.1" if server => Some(Windows::Windows2008R2),
            "6.1" => Some(Windows::Windows7),
            "6.0" if server => Some(Windows::Windows2008),
            "6.0" => Some(Windows::WindowsVista),
            // 64-bit XP reports the 2003 kernel version
            "5.2" if !server && bit == Bit::Win64 => Some(Windows::WindowsXP),
            "5.2" => Some(Windows::Windows2003),
            "5.1" => Some(Windows::WindowsXP),
            "5.0" => Some(Windows::Windows2000),
            "4.0" => Some(Windows::WindowsNT40),
            "3.51" => Some(Windows::WindowsNT351),
            _ => None,
        };
        if windows.is_some() {
            return windows;
        }
    }

    let version = system.value(WIN9X_VERSION_KEY, "VersionNumber")?;
    if version.starts_with("4.90") {
        Some(Windows::WindowsME)
    } else if version.starts_with("4.10") {
        Some(Windows::Windows98)
    } else if version.starts_with("4.0") {
        Some(Windows::Windows95)
    } else {
        None
    }
}

/// Audio driver from `user.reg`; Wine's default (PulseAudio) when unset
pub fn detect_audio(user: &RegistryFile) -> AudioDriver {
    match user.value(DRIVERS_KEY, "Audio") {
        Some(value) => AudioDriver::from_registry_value(value).unwrap_or_else(|| {
            tracing::warn!("Unknown audio driver '{}', assuming default", value);
            AudioDriver::default()
        }),
        None => AudioDriver::default(),
    }
}

/// Virtual desktop resolution, or `None` when the desktop is disabled
pub fn detect_virtual_desktop(user: &RegistryFile) -> Option<String> {
    let desktop = user.value(EXPLORER_KEY, "Desktop")?;
    let resolution = user.value(DESKTOPS_KEY, desktop)?;
    let resolution = resolution.trim();
    if resolution.is_empty() {
        None
    } else {
        Some(resolution.to_string())
    }
}

/// Time Wine last updated the prefix, from `.update-timestamp`
pub fn read_update_timestamp(prefix: &Utf8Path) -> Option<DateTime<Utc>> {
    let content = fs::read_to_string(prefix.join(".update-timestamp")).ok()?;
    let secs = content.split_whitespace().next()?.parse::<i64>().ok()?;
    DateTime::from_timestamp(secs, 0)
}

/// Parse `wine --version` output ("wine-9.0 (Staging)") into "9.0 (Staging)"
pub fn parse_wine_version(output: &str) -> Option<String> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let version = line.strip_prefix("wine-").unwrap_or(line);
    Some(version.to_string())
}
