use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Windows versions a bottle can emulate.
///
/// Ordered from oldest to newest. The winetricks verb for each version is
/// returned by [`Windows::winetricks_verb`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Windows {
    Windows20,
    Windows30,
    Windows31,
    WindowsNT351,
    WindowsNT40,
    Windows95,
    Windows98,
    WindowsME,
    Windows2000,
    WindowsXP,
    Windows2003,
    WindowsVista,
    Windows2008,
    Windows7,
    Windows2008R2,
    Windows8,
    Windows81,
    Windows10,
    Windows11,
}

impl Windows {
    pub const ALL: [Windows; 19] = [
        Windows::Windows20,
        Windows::Windows30,
        Windows::Windows31,
        Windows::WindowsNT351,
        Windows::WindowsNT40,
        Windows::Windows95,
        Windows::Windows98,
        Windows::WindowsME,
        Windows::Windows2000,
        Windows::WindowsXP,
        Windows::Windows2003,
        Windows::WindowsVista,
        Windows::Windows2008,
        Windows::Windows7,
        Windows::Windows2008R2,
        Windows::Windows8,
        Windows::Windows81,
        Windows::Windows10,
        Windows::Windows11,
    ];

    /// Human readable name, e.g. "Windows 8.1"
    pub fn display_name(self) -> &'static str {
        match self {
            Windows::Windows20 => "Windows 2.0",
            Windows::Windows30 => "Windows 3.0",
            Windows::Windows31 => "Windows 3.1",
            Windows::WindowsNT351 => "Windows NT 3.51",
            Windows::WindowsNT40 => "Windows NT 4.0",
            Windows::Windows95 => "Windows 95",
            Windows::Windows98 => "Windows 98",
            Windows::WindowsME => "Windows ME",
            Windows::Windows2000 => "Windows 2000",
            Windows::WindowsXP => "Windows XP",
            Windows::Windows2003 => "Windows 2003",
            Windows::WindowsVista => "Windows Vista",
            Windows::Windows2008 => "Windows 2008",
            Windows::Windows7 => "Windows 7",
            Windows::Windows2008R2 => "Windows 2008 R2",
            Windows::Windows8 => "Windows 8",
            Windows::Windows81 => "Windows 8.1",
            Windows::Windows10 => "Windows 10",
            Windows::Windows11 => "Windows 11",
        }
    }

    /// Verb understood by `winetricks` to switch the prefix to this version.
    ///
    /// Wine writes the same string into `[Software\\Wine] "Version"`.
    pub fn winetricks_verb(self) -> &'static str {
        match self {
            Windows::Windows20 => "win20",
            Windows::Windows30 => "win30",
            Windows::Windows31 => "win31",
            Windows::WindowsNT351 => "nt351",
            Windows::WindowsNT40 => "nt40",
            Windows::Windows95 => "win95",
            Windows::Windows98 => "win98",
            Windows::WindowsME => "winme",
            Windows::Windows2000 => "win2k",
            Windows::WindowsXP => "winxp",
            Windows::Windows2003 => "win2k3",
            Windows::WindowsVista => "vista",
            Windows::Windows2008 => "win2k8",
            Windows::Windows7 => "win7",
            Windows::Windows2008R2 => "win2k8r2",
            Windows::Windows8 => "win8",
            Windows::Windows81 => "win81",
            Windows::Windows10 => "win10",
            Windows::Windows11 => "win11",
        }
    }

    /// Reverse of [`winetricks_verb`](Self::winetricks_verb), case-insensitive.
    pub fn from_winetricks_verb(verb: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|w| w.winetricks_verb().eq_ignore_ascii_case(verb.trim()))
    }
}

impl fmt::Display for Windows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Windows {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_winetricks_verb(s)
            .or_else(|| {
                Self::ALL
                    .into_iter()
                    .find(|w| w.display_name().eq_ignore_ascii_case(s.trim()))
            })
            .ok_or_else(|| format!("unknown Windows version: {}", s))
    }
}

/// Processor width of a prefix (`WINEARCH`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bit {
    Win32,
    Win64,
}

impl Bit {
    /// Value for the `WINEARCH` environment variable and the `#arch=` registry tag
    pub fn wine_arch(self) -> &'static str {
        match self {
            Bit::Win32 => "win32",
            Bit::Win64 => "win64",
        }
    }

    pub fn from_wine_arch(arch: &str) -> Option<Self> {
        match arch.trim() {
            "win32" => Some(Bit::Win32),
            "win64" => Some(Bit::Win64),
            _ => None,
        }
    }
}

impl fmt::Display for Bit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bit::Win32 => f.write_str("32-bit"),
            Bit::Win64 => f.write_str("64-bit"),
        }
    }
}

impl FromStr for Bit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "32" | "32-bit" | "win32" => Ok(Bit::Win32),
            "64" | "64-bit" | "win64" => Ok(Bit::Win64),
            other => Err(format!("unknown bitness: {}", other)),
        }
    }
}

/// Windows versions and the bitness Wine supports for each.
pub const SUPPORTED_WINDOWS: [(Windows, Bit); 29] = [
    (Windows::Windows20, Bit::Win32),
    (Windows::Windows30, Bit::Win32),
    (Windows::Windows31, Bit::Win32),
    (Windows::WindowsNT351, Bit::Win32),
    (Windows::WindowsNT40, Bit::Win32),
    (Windows::Windows95, Bit::Win32),
    (Windows::Windows98, Bit::Win32),
    (Windows::WindowsME, Bit::Win32),
    (Windows::Windows2000, Bit::Win32),
    (Windows::WindowsXP, Bit::Win32),
    (Windows::WindowsXP, Bit::Win64),
    (Windows::Windows2003, Bit::Win32),
    (Windows::Windows2003, Bit::Win64),
    (Windows::WindowsVista, Bit::Win32),
    (Windows::WindowsVista, Bit::Win64),
    (Windows::Windows2008, Bit::Win32),
    (Windows::Windows2008, Bit::Win64),
    (Windows::Windows7, Bit::Win32),
    (Windows::Windows7, Bit::Win64),
    (Windows::Windows2008R2, Bit::Win32),
    (Windows::Windows2008R2, Bit::Win64),
    (Windows::Windows8, Bit::Win32),
    (Windows::Windows8, Bit::Win64),
    (Windows::Windows81, Bit::Win32),
    (Windows::Windows81, Bit::Win64),
    (Windows::Windows10, Bit::Win32),
    (Windows::Windows10, Bit::Win64),
    (Windows::Windows11, Bit::Win32),
    (Windows::Windows11, Bit::Win64),
];

/// Index into [`SUPPORTED_WINDOWS`] used for new bottles (Windows 10, 32-bit)
pub const DEFAULT_BOTTLE_INDEX: usize = 25;

/// Check whether Wine can build a prefix of this version and bitness
pub fn is_supported(windows: Windows, bit: Bit) -> bool {
    SUPPORTED_WINDOWS.contains(&(windows, bit))
}

/// Audio backend configured in `[Software\\Wine\\Drivers]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AudioDriver {
    #[default]
    PulseAudio,
    Alsa,
    CoreAudio,
    Oss,
    Disabled,
}

impl AudioDriver {
    pub const ALL: [AudioDriver; 5] = [
        AudioDriver::PulseAudio,
        AudioDriver::Alsa,
        AudioDriver::CoreAudio,
        AudioDriver::Oss,
        AudioDriver::Disabled,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            AudioDriver::PulseAudio => "PulseAudio",
            AudioDriver::Alsa => "Advanced Linux Sound Architecture (ALSA)",
            AudioDriver::CoreAudio => "Mac Core Audio",
            AudioDriver::Oss => "Open Sound System (OSS)",
            AudioDriver::Disabled => "Disabled",
        }
    }

    /// Value passed as `winetricks sound=<value>`
    pub fn winetricks_value(self) -> &'static str {
        match self {
            AudioDriver::PulseAudio => "pulse",
            AudioDriver::Alsa => "alsa",
            AudioDriver::CoreAudio => "coreaudio",
            AudioDriver::Oss => "oss",
            AudioDriver::Disabled => "disabled",
        }
    }

    /// Map the registry `"Audio"` value back to a driver.
    ///
    /// Wine stores an empty string when sound is disabled.
    pub fn from_registry_value(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Some(AudioDriver::Disabled);
        }
        // The value may list several drivers ("pulse,alsa"); the first wins.
        let first = value.split(',').next().unwrap_or_default();
        Self::ALL
            .into_iter()
            .find(|a| a.winetricks_value().eq_ignore_ascii_case(first))
    }
}

impl fmt::Display for AudioDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for AudioDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("disabled") {
            return Ok(AudioDriver::Disabled);
        }
        Self::ALL
            .into_iter()
            .find(|a| a.winetricks_value().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown audio driver: {}", s))
    }
}

/// Health of a prefix as seen by the last probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BottleStatus {
    Healthy,
    Broken,
}

impl fmt::Display for BottleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BottleStatus::Healthy => f.write_str("Ready"),
            BottleStatus::Broken => f.write_str("Not Ready"),
        }
    }
}

/// Application shortcut stored in a bottle's settings file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppShortcut {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub command: String,
    #[serde(default)]
    pub icon: String,
}

/// Snapshot of one Wine prefix, produced by probing its directory.
///
/// Records are replaced wholesale on every scan; nothing holds a reference
/// into a collection across a rebuild. Use [`BottleRecord::prefix`] as the
/// stable identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct BottleRecord {
    pub name: String,
    pub prefix: Utf8PathBuf,
    pub windows: Windows,
    pub bit: Bit,
    pub audio: AudioDriver,
    /// `None` when the virtual desktop is disabled, else `WIDTHxHEIGHT`
    pub virtual_desktop: Option<String>,
    pub wine_version: String,
    pub last_update: Option<DateTime<Utc>>,
    pub status: BottleStatus,
    pub description: String,
    pub debug_log_level: u8,
    pub logging_enabled: bool,
    pub apps: Vec<AppShortcut>,
}

impl BottleRecord {
    /// Location of the emulated `C:` drive
    pub fn c_drive(&self) -> Utf8PathBuf {
        self.prefix.join("drive_c")
    }

    /// Log file written by launches when logging is enabled
    pub fn log_file(&self) -> Utf8PathBuf {
        log_file_for(&self.prefix)
    }

    pub fn is_healthy(&self) -> bool {
        self.status == BottleStatus::Healthy
    }
}

/// Path of the launch log inside a prefix
pub fn log_file_for(prefix: &Utf8Path) -> Utf8PathBuf {
    prefix.join("winecellar.log")
}

/// Validate a bottle name, which doubles as its directory name.
pub fn validate_bottle_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Bottle name can not be empty".to_string());
    }
    if trimmed != name {
        return Err("Bottle name can not start or end with whitespace".to_string());
    }
    if name == "." || name == ".." {
        return Err(format!("'{}' is not a valid bottle name", name));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err("Bottle name can not contain path separators".to_string());
    }
    Ok(())
}

/// Map a debug log level (0..=9) to a `WINEDEBUG` channel specification.
///
/// Level 1 is Wine's own default and leaves `WINEDEBUG` unset.
pub fn wine_debug_channels(level: u8) -> Option<&'static str> {
    match level {
        0 => Some("-all"),
        1 => None,
        2 => Some("-warn,-fixme"),
        3 => Some("-fixme"),
        4 => Some("+fps"),
        5 => Some("-d3d,-opengl"),
        6 => Some("+relay,+heap"),
        7 => Some("+relay,+msgbox"),
        8 => Some("+all,-relay"),
        _ => Some("+all"),
    }
}

/// Label shown for a debug log level
pub fn debug_log_level_label(level: u8) -> &'static str {
    match level {
        0 => "Off",
        1 => "Default",
        2 => "Only errors (Could improve performance)",
        3 => "Also log warnings (Recommended for debugging)",
        4 => "Log frames per seconds",
        5 => "Disable D3D/GL messages (Could improve performance)",
        6 => "Relay + Heap",
        7 => "Relay + Message box",
        8 => "All except relay (too verbose!)",
        9 => "All (too verbose!)",
        _ => "- Unknown Log Level -",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bottle_is_windows10_32bit() {
        assert_eq!(
            SUPPORTED_WINDOWS[DEFAULT_BOTTLE_INDEX],
            (Windows::Windows10, Bit::Win32)
        );
    }

    #[test]
    fn test_windows_verb_lookup() {
        for windows in Windows::ALL {
            assert_eq!(
                Windows::from_winetricks_verb(windows.winetricks_verb()),
                Some(windows)
            );
        }
        assert_eq!(Windows::from_winetricks_verb("WIN10"), Some(Windows::Windows10));
        assert_eq!(Windows::from_winetricks_verb("win12"), None);
    }

    #[test]
    fn test_windows_from_display_name() {
        assert_eq!("Windows 8.1".parse::<Windows>(), Ok(Windows::Windows81));
        assert_eq!("vista".parse::<Windows>(), Ok(Windows::WindowsVista));
        assert!("Windows 12".parse::<Windows>().is_err());
    }

    #[test]
    fn test_only_nt_versions_support_64bit() {
        assert!(is_supported(Windows::Windows7, Bit::Win64));
        assert!(is_supported(Windows::Windows98, Bit::Win32));
        assert!(!is_supported(Windows::Windows98, Bit::Win64));
        assert!(!is_supported(Windows::Windows2000, Bit::Win64));
    }

    #[test]
    fn test_audio_from_registry_value() {
        assert_eq!(AudioDriver::from_registry_value("pulse"), Some(AudioDriver::PulseAudio));
        assert_eq!(AudioDriver::from_registry_value("alsa,pulse"), Some(AudioDriver::Alsa));
        assert_eq!(AudioDriver::from_registry_value(""), Some(AudioDriver::Disabled));
        assert_eq!(AudioDriver::from_registry_value("jack"), None);
    }

    #[test]
    fn test_bit_parsing() {
        assert_eq!("64".parse::<Bit>(), Ok(Bit::Win64));
        assert_eq!("win32".parse::<Bit>(), Ok(Bit::Win32));
        assert_eq!(Bit::from_wine_arch("win64"), Some(Bit::Win64));
        assert_eq!(Bit::Win64.to_string(), "64-bit");
    }

    #[test]
    fn test_validate_bottle_name() {
        assert!(validate_bottle_name("Games").is_ok());
        assert!(validate_bottle_name("My Office 2010").is_ok());
        assert!(validate_bottle_name("").is_err());
        assert!(validate_bottle_name("   ").is_err());
        assert!(validate_bottle_name(" padded").is_err());
        assert!(validate_bottle_name("..").is_err());
        assert!(validate_bottle_name("a/b").is_err());
    }

    #[test]
    fn test_wine_debug_channels() {
        assert_eq!(wine_debug_channels(0), Some("-all"));
        assert_eq!(wine_debug_channels(1), None);
        assert_eq!(wine_debug_channels(9), Some("+all"));
        assert_eq!(debug_log_level_label(3), "Also log warnings (Recommended for debugging)");
    }
}
