use crate::models::{BottleRecord, bottle::wine_debug_channels};
use crate::services::runner::WineCommand;
use camino::Utf8PathBuf;
use std::fmt;

/// External program launched against the active bottle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tool {
    OpenCDrive,
    OpenLogFile,
    Explorer,
    Console,
    Winecfg,
    Winetricks,
    Uninstaller,
    TaskManager,
    RegistryEditor,
    Notepad,
    Wordpad,
    InternetExplorer,
    /// Emulate a Windows reboot (`wineboot -r`)
    Reboot,
    /// Update the prefix to the installed Wine version (`wineboot -u`)
    UpdatePrefix,
    /// Kill every process in the prefix (`wineserver -k`)
    KillProcesses,
    /// Run a Windows executable or MSI installer from the host filesystem
    RunProgram(Utf8PathBuf),
    /// Run the command of an app shortcut, by index in the bottle's list
    RunApp(usize),
}

impl Tool {
    /// Build the command for this tool in `bottle`.
    ///
    /// Returns `None` for [`Tool::RunApp`] with an index out of range.
    /// Commands that start Windows programs carry the bottle's `WINEDEBUG`
    /// setting and, when logging is enabled, write to its log file.
    pub fn command(&self, bottle: &BottleRecord) -> Option<WineCommand> {
        let command = match self {
            Tool::OpenCDrive => {
                return Some(WineCommand::new("xdg-open").arg(bottle.c_drive().as_str()));
            }
            Tool::OpenLogFile => {
                return Some(WineCommand::new("xdg-open").arg(bottle.log_file().as_str()));
            }
            Tool::Explorer => WineCommand::new("wine").arg("explorer"),
            Tool::Console => WineCommand::new("wine").arg("wineconsole"),
            Tool::Winecfg => WineCommand::new("winecfg"),
            Tool::Winetricks => return Some(WineCommand::new("winetricks").arg("--gui")),
            Tool::Uninstaller => WineCommand::new("wine").arg("uninstaller"),
            Tool::TaskManager => WineCommand::new("wine").arg("taskmgr"),
            Tool::RegistryEditor => WineCommand::new("wine").arg("regedit"),
            Tool::Notepad => WineCommand::new("wine").arg("notepad"),
            Tool::Wordpad => WineCommand::new("wine").arg("wordpad"),
            Tool::InternetExplorer => WineCommand::new("wine").arg("iexplore"),
            Tool::Reboot => WineCommand::new("wineboot").arg("-r"),
            Tool::UpdatePrefix => WineCommand::new("wineboot").arg("-u"),
            Tool::KillProcesses => return Some(WineCommand::new("wineserver").arg("-k")),
            Tool::RunProgram(path) => {
                let is_msi = path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("msi"))
                    .unwrap_or(false);
                if is_msi {
                    WineCommand::new("wine").args(["msiexec", "/i", path.as_str()])
                } else {
                    WineCommand::new("wine").args(["start", "/unix", path.as_str()])
                }
            }
            Tool::RunApp(index) => {
                let app = bottle.apps.get(*index)?;
                WineCommand::new("wine").arg(app.command.clone())
            }
        };
        Some(with_bottle_logging(command, bottle))
    }
}

fn with_bottle_logging(mut command: WineCommand, bottle: &BottleRecord) -> WineCommand {
    if let Some(channels) = wine_debug_channels(bottle.debug_log_level) {
        command = command.env("WINEDEBUG", channels);
    }
    if bottle.logging_enabled {
        command = command.log_to(bottle.log_file());
    }
    command
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::OpenCDrive => f.write_str("C: drive"),
            Tool::OpenLogFile => f.write_str("log file"),
            Tool::Explorer => f.write_str("Explorer"),
            Tool::Console => f.write_str("Console"),
            Tool::Winecfg => f.write_str("Wine configuration"),
            Tool::Winetricks => f.write_str("Winetricks"),
            Tool::Uninstaller => f.write_str("Uninstaller"),
            Tool::TaskManager => f.write_str("Task manager"),
            Tool::RegistryEditor => f.write_str("Registry editor"),
            Tool::Notepad => f.write_str("Notepad"),
            Tool::Wordpad => f.write_str("Wordpad"),
            Tool::InternetExplorer => f.write_str("Internet Explorer"),
            Tool::Reboot => f.write_str("Reboot"),
            Tool::UpdatePrefix => f.write_str("Prefix update"),
            Tool::KillProcesses => f.write_str("Kill processes"),
            Tool::RunProgram(path) => write!(f, "{}", path),
            Tool::RunApp(index) => write!(f, "app #{}", index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppShortcut, AudioDriver, Bit, BottleStatus, Windows};

    fn bottle() -> BottleRecord {
        BottleRecord {
            name: "Games".to_string(),
            prefix: Utf8PathBuf::from("/prefixes/Games"),
            windows: Windows::Windows10,
            bit: Bit::Win64,
            audio: AudioDriver::PulseAudio,
            virtual_desktop: None,
            wine_version: "9.0".to_string(),
            last_update: None,
            status: BottleStatus::Healthy,
            description: String::new(),
            debug_log_level: 1,
            logging_enabled: false,
            apps: vec![AppShortcut {
                name: "Game".to_string(),
                description: String::new(),
                command: r"C:\Games\game.exe".to_string(),
                icon: String::new(),
            }],
        }
    }

    #[test]
    fn test_run_program_picks_msiexec_for_msi() {
        let b = bottle();
        let msi = Tool::RunProgram("/tmp/Setup.MSI".into()).command(&b).unwrap();
        assert_eq!(msi.args, vec!["msiexec", "/i", "/tmp/Setup.MSI"]);

        let exe = Tool::RunProgram("/tmp/setup.exe".into()).command(&b).unwrap();
        assert_eq!(exe.args, vec!["start", "/unix", "/tmp/setup.exe"]);
    }

    #[test]
    fn test_open_c_drive_uses_prefix() {
        let cmd = Tool::OpenCDrive.command(&bottle()).unwrap();
        assert_eq!(cmd.program, "xdg-open");
        assert_eq!(cmd.args, vec!["/prefixes/Games/drive_c"]);
    }

    #[test]
    fn test_run_app_by_index() {
        let b = bottle();
        let cmd = Tool::RunApp(0).command(&b).unwrap();
        assert_eq!(cmd.args, vec![r"C:\Games\game.exe"]);
        assert!(Tool::RunApp(3).command(&b).is_none());
    }

    #[test]
    fn test_logging_settings_applied() {
        let mut b = bottle();
        b.debug_log_level = 0;
        b.logging_enabled = true;

        let cmd = Tool::Notepad.command(&b).unwrap();
        assert_eq!(cmd.env_value("WINEDEBUG"), Some("-all"));
        assert_eq!(cmd.log_file, Some(Utf8PathBuf::from("/prefixes/Games/winecellar.log")));

        let kill = Tool::KillProcesses.command(&b).unwrap();
        assert!(kill.log_file.is_none());
    }
}
