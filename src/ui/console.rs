//! Line-oriented console front-end used by the binary.
//!
//! [`ConsolePresenter`] renders to any writer. Each input line is split by
//! [`tokenize`] and parsed with clap into a [`ConsoleCommand`], which
//! [`parse_command`] then resolves against the selected bottle.

use crate::manager::{CloneBottleRequest, NewBottleRequest, UpdateBottleRequest};
use crate::models::bottle::debug_log_level_label;
use crate::models::{AppShortcut, AudioDriver, Bit, BottleRecord, JobKind, Windows};
use crate::services::packages::Package;
use crate::services::tools::Tool;
use crate::ui::controller::{Presenter, UserIntent};
use camino::{Utf8Path, Utf8PathBuf};
use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Why a console line could not be turned into a [`ConsoleAction`]
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("error: unterminated quote")]
    Unterminated,

    /// Rejected by clap; also carries the output of `help`
    #[error("{0}")]
    Clap(#[from] clap::Error),

    #[error("error: {0}")]
    Invalid(String),
}

impl ConsoleError {
    /// True when clap is printing help rather than reporting a mistake
    pub fn is_help(&self) -> bool {
        match self {
            ConsoleError::Clap(e) => matches!(
                e.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ),
            _ => false,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "winecellar",
    no_binary_name = true,
    disable_version_flag = true,
    about = "Manage Wine bottles"
)]
struct ConsoleLine {
    #[command(subcommand)]
    command: ConsoleCommand,
}

/// One console command as typed
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// Show all bottles
    #[command(visible_alias = "ls")]
    List,

    /// Details of the selected bottle
    Show,

    /// Rescan the prefixes directory
    Refresh,

    /// Select a bottle by name
    Select { name: String },

    /// Clear the selection
    Deselect,

    /// Create a new bottle
    Create(CreateArgs),

    /// Change settings of the selected bottle
    Update(UpdateArgs),

    /// Copy the selected bottle
    Clone {
        /// Name of the copy
        name: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Delete the selected bottle and its folder
    Delete,

    /// Start a tool in the selected bottle
    Run {
        #[command(subcommand)]
        tool: ToolCommand,
    },

    /// Install a package into the selected bottle
    Install {
        /// d3dx9, dxvk, vcrun, dotnet, corefonts or liberation
        package: String,

        /// Package version, e.g. 2015 for vcrun
        version: Option<String>,
    },

    /// Manage app shortcuts of the selected bottle
    App {
        #[command(subcommand)]
        action: AppCommand,
    },

    /// Bottle selected at start-up
    Default { name: String },

    /// Wait for the running job and pending installs
    Wait,

    /// Leave winecellar
    #[command(visible_alias = "exit")]
    Quit,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct CreateArgs {
    pub name: String,

    /// Windows version, e.g. win10, win7, winxp
    #[arg(long)]
    pub windows: Option<Windows>,

    /// 32 or 64
    #[arg(long)]
    pub bit: Option<Bit>,

    /// pulse, alsa, coreaudio, oss or disabled
    #[arg(long)]
    pub audio: Option<AudioDriver>,

    /// Virtual desktop resolution
    #[arg(long, value_name = "WxH")]
    pub desktop: Option<String>,

    /// Skip the Gecko and Mono installers
    #[arg(long)]
    pub no_gecko_mono: bool,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct UpdateArgs {
    /// Rename the bottle
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub windows: Option<Windows>,

    #[arg(long)]
    pub audio: Option<AudioDriver>,

    /// Virtual desktop resolution, or "off"
    #[arg(long, value_name = "WxH|off")]
    pub desktop: Option<String>,

    /// Debug log level, 0-9
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=9))]
    pub debug: Option<u8>,

    /// on or off
    #[arg(long, value_parser = clap::builder::BoolishValueParser::new())]
    pub logging: Option<bool>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ToolCommand {
    /// Open the C: drive in the file manager
    Cdrive,
    /// Open the bottle log file
    Log,
    Explorer,
    Console,
    Winecfg,
    Winetricks,
    Uninstaller,
    Taskmgr,
    Regedit,
    Notepad,
    Wordpad,
    Iexplore,
    /// Simulate a Windows reboot
    Reboot,
    /// Update the prefix to the installed Wine
    UpdatePrefix,
    /// Kill every process in the bottle
    Kill,
    /// Run a .exe or .msi file
    Program { path: Utf8PathBuf },
    /// Run an app shortcut by index
    App { index: usize },
}

impl From<ToolCommand> for Tool {
    fn from(command: ToolCommand) -> Self {
        match command {
            ToolCommand::Cdrive => Tool::OpenCDrive,
            ToolCommand::Log => Tool::OpenLogFile,
            ToolCommand::Explorer => Tool::Explorer,
            ToolCommand::Console => Tool::Console,
            ToolCommand::Winecfg => Tool::Winecfg,
            ToolCommand::Winetricks => Tool::Winetricks,
            ToolCommand::Uninstaller => Tool::Uninstaller,
            ToolCommand::Taskmgr => Tool::TaskManager,
            ToolCommand::Regedit => Tool::RegistryEditor,
            ToolCommand::Notepad => Tool::Notepad,
            ToolCommand::Wordpad => Tool::Wordpad,
            ToolCommand::Iexplore => Tool::InternetExplorer,
            ToolCommand::Reboot => Tool::Reboot,
            ToolCommand::UpdatePrefix => Tool::UpdatePrefix,
            ToolCommand::Kill => Tool::KillProcesses,
            ToolCommand::Program { path } => Tool::RunProgram(path),
            ToolCommand::App { index } => Tool::RunApp(index),
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Add an app shortcut
    Add {
        name: String,
        command: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Remove the app shortcut at INDEX
    Remove { index: usize },
}

/// What the console loop should do with one line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleAction {
    Intent(UserIntent),
    List,
    Show,
    Wait,
    SetDefault(String),
    Quit,
}

/// [`Presenter`] writing plain text
pub struct ConsolePresenter<W: Write> {
    out: W,
    assume_yes: bool,
}

impl<W: Write> ConsolePresenter<W> {
    /// With `assume_yes` every confirmation is answered yes without asking
    pub fn new(out: W, assume_yes: bool) -> Self {
        Self { out, assume_yes }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text) {
            tracing::warn!("Failed to write to console: {}", e);
        }
    }

    /// Print every detail of one bottle
    pub fn show_details(&mut self, bottle: &BottleRecord) {
        let last_update = bottle
            .last_update
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let details = [
            format!("Name:            {}", bottle.name),
            format!("Folder:          {}", bottle.prefix),
            format!("Windows:         {} ({})", bottle.windows, bottle.bit),
            format!("Wine:            {}", bottle.wine_version),
            format!("Audio driver:    {}", bottle.audio),
            format!(
                "Virtual desktop: {}",
                bottle.virtual_desktop.as_deref().unwrap_or("Disabled")
            ),
            format!("Last update:     {}", last_update),
            format!("Status:          {}", bottle.status),
            format!("Description:     {}", bottle.description),
            format!(
                "Debug log level: {} ({})",
                bottle.debug_log_level,
                debug_log_level_label(bottle.debug_log_level)
            ),
            format!("Logging:         {}", if bottle.logging_enabled { "on" } else { "off" }),
        ];
        for detail in details {
            self.line(&detail);
        }
        for (index, app) in bottle.apps.iter().enumerate() {
            self.line(&format!("  app #{}: {} ({})", index, app.name, app.command));
        }
    }
}

impl<W: Write> Presenter for ConsolePresenter<W> {
    fn show_bottles(&mut self, bottles: &[BottleRecord], active: Option<&Utf8Path>) {
        if bottles.is_empty() {
            self.line("No bottles yet. Use 'create <name>' to make one.");
            return;
        }
        for bottle in bottles {
            let marker = if Some(bottle.prefix.as_path()) == active { '*' } else { ' ' };
            self.line(&format!(
                "{} {:<20} {:<16} {:<7} {:<10} {}",
                marker,
                bottle.name,
                bottle.windows,
                bottle.bit,
                bottle.audio.winetricks_value(),
                bottle.status
            ));
        }
    }

    fn show_info(&mut self, message: &str) {
        self.line(message);
    }

    fn show_error(&mut self, message: &str) {
        self.line(&format!("error: {}", message));
    }

    fn set_busy(&mut self, job: Option<JobKind>) {
        if let Some(kind) = job {
            self.line(&format!("Running {} job in the background...", kind));
        }
    }

    fn confirm(&mut self, question: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        if let Err(e) = write!(self.out, "{} [y/N] ", question).and_then(|_| self.out.flush()) {
            tracing::warn!("Failed to write to console: {}", e);
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

/// Split a line on whitespace, keeping double-quoted parts together
pub fn tokenize(line: &str) -> Result<Vec<String>, ConsoleError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if in_quotes {
        return Err(ConsoleError::Unterminated);
    }
    if has_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Parse one console line.
///
/// `active` supplies the current values for `update`; `prefer_wine64` picks
/// the default bitness for `create`. Blank lines parse to `None`.
pub fn parse_command(
    line: &str,
    active: Option<&BottleRecord>,
    prefer_wine64: bool,
) -> Result<Option<ConsoleAction>, ConsoleError> {
    let tokens = tokenize(line)?;
    if tokens.is_empty() {
        return Ok(None);
    }
    let parsed = ConsoleLine::try_parse_from(tokens)?;
    parsed.command.resolve(active, prefer_wine64).map(Some)
}

impl ConsoleCommand {
    /// Turn the typed command into an action, filling in defaults
    pub fn resolve(
        self,
        active: Option<&BottleRecord>,
        prefer_wine64: bool,
    ) -> Result<ConsoleAction, ConsoleError> {
        let intent = match self {
            ConsoleCommand::List => return Ok(ConsoleAction::List),
            ConsoleCommand::Show => return Ok(ConsoleAction::Show),
            ConsoleCommand::Wait => return Ok(ConsoleAction::Wait),
            ConsoleCommand::Quit => return Ok(ConsoleAction::Quit),
            ConsoleCommand::Default { name } => return Ok(ConsoleAction::SetDefault(name)),
            ConsoleCommand::Refresh => UserIntent::Refresh,
            ConsoleCommand::Select { name } => UserIntent::Select(Some(name)),
            ConsoleCommand::Deselect => UserIntent::Select(None),
            ConsoleCommand::Create(args) => UserIntent::Create(args.into_request(prefer_wine64)),
            ConsoleCommand::Update(args) => {
                let active = active
                    .ok_or_else(|| ConsoleError::Invalid("No bottle selected".to_string()))?;
                UserIntent::Update(args.into_request(active))
            }
            ConsoleCommand::Clone { name, description } => {
                UserIntent::Clone(CloneBottleRequest { name, description })
            }
            ConsoleCommand::Delete => UserIntent::DeleteActive,
            ConsoleCommand::Run { tool } => UserIntent::Launch(tool.into()),
            ConsoleCommand::Install { package, version } => {
                let parsed = Package::parse(&package, version.as_deref()).ok_or_else(|| {
                    ConsoleError::Invalid(format!("Unknown package '{}'", package))
                })?;
                UserIntent::Install(parsed)
            }
            ConsoleCommand::App { action } => match action {
                AppCommand::Add {
                    name,
                    command,
                    description,
                } => UserIntent::AddApp(AppShortcut {
                    name,
                    description,
                    command,
                    icon: String::new(),
                }),
                AppCommand::Remove { index } => UserIntent::RemoveApp(index),
            },
        };
        Ok(ConsoleAction::Intent(intent))
    }
}

impl CreateArgs {
    fn into_request(self, prefer_wine64: bool) -> NewBottleRequest {
        let mut request = NewBottleRequest::new(self.name);
        if prefer_wine64 {
            request.bit = Bit::Win64;
        }
        if let Some(windows) = self.windows {
            request.windows = windows;
        }
        if let Some(bit) = self.bit {
            request.bit = bit;
        }
        if let Some(audio) = self.audio {
            request.audio = audio;
        }
        request.virtual_desktop = self.desktop.as_deref().and_then(parse_desktop);
        request.disable_gecko_mono = self.no_gecko_mono;
        request
    }
}

impl UpdateArgs {
    fn into_request(self, active: &BottleRecord) -> UpdateBottleRequest {
        let mut request = UpdateBottleRequest::from_record(active);
        if let Some(name) = self.name {
            request.name = name;
        }
        if let Some(description) = self.description {
            request.description = description;
        }
        if let Some(windows) = self.windows {
            request.windows = windows;
        }
        if let Some(audio) = self.audio {
            request.audio = audio;
        }
        if let Some(desktop) = self.desktop {
            request.virtual_desktop = parse_desktop(&desktop);
        }
        if let Some(level) = self.debug {
            request.debug_log_level = level;
        }
        if let Some(logging) = self.logging {
            request.logging_enabled = logging;
        }
        request
    }
}

fn parse_desktop(value: &str) -> Option<String> {
    match value {
        "" | "off" | "disabled" => None,
        resolution => Some(resolution.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BottleStatus;
    use clap::CommandFactory;

    fn active() -> BottleRecord {
        BottleRecord {
            name: "Games".to_string(),
            prefix: Utf8PathBuf::from("/prefixes/Games"),
            windows: Windows::Windows7,
            bit: Bit::Win64,
            audio: AudioDriver::PulseAudio,
            virtual_desktop: Some("800x600".to_string()),
            wine_version: "9.0".to_string(),
            last_update: None,
            status: BottleStatus::Healthy,
            description: "Old games".to_string(),
            debug_log_level: 1,
            logging_enabled: false,
            apps: Vec::new(),
        }
    }

    fn intent(line: &str) -> UserIntent {
        match parse_command(line, Some(&active()), false).unwrap() {
            Some(ConsoleAction::Intent(intent)) => intent,
            other => panic!("Expected an intent for '{}', got {:?}", line, other),
        }
    }

    #[test]
    fn test_command_definition_is_valid() {
        ConsoleLine::command().debug_assert();
    }

    #[test]
    fn test_tokenize_quotes() {
        assert_eq!(
            tokenize(r#"clone "My Copy" --description "a copy""#).unwrap(),
            vec!["clone", "My Copy", "--description", "a copy"]
        );
        assert_eq!(
            tokenize(r#"update --description="" "#).unwrap(),
            vec!["update", "--description="]
        );
        assert!(matches!(
            tokenize(r#"select "open"#),
            Err(ConsoleError::Unterminated)
        ));
        assert!(tokenize("   ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_create_with_options() {
        let UserIntent::Create(request) = intent(
            "create Office --windows winxp --bit 32 --audio alsa \
             --desktop 1024x768 --no-gecko-mono",
        ) else {
            panic!("not a create");
        };
        assert_eq!(request.name, "Office");
        assert_eq!(request.windows, Windows::WindowsXP);
        assert_eq!(request.bit, Bit::Win32);
        assert_eq!(request.audio, AudioDriver::Alsa);
        assert_eq!(request.virtual_desktop.as_deref(), Some("1024x768"));
        assert!(request.disable_gecko_mono);
    }

    #[test]
    fn test_parse_create_prefers_wine64() {
        let Some(ConsoleAction::Intent(UserIntent::Create(request))) =
            parse_command("create Games", None, true).unwrap()
        else {
            panic!("not a create");
        };
        assert_eq!(request.bit, Bit::Win64);
        assert_eq!(request.windows, Windows::Windows10);
    }

    #[test]
    fn test_parse_update_keeps_unmentioned_fields() {
        let UserIntent::Update(request) = intent("update --audio alsa --desktop off --logging on")
        else {
            panic!("not an update");
        };
        assert_eq!(request.name, "Games");
        assert_eq!(request.windows, Windows::Windows7);
        assert_eq!(request.audio, AudioDriver::Alsa);
        assert_eq!(request.virtual_desktop, None);
        assert_eq!(request.description, "Old games");
        assert!(request.logging_enabled);
    }

    #[test]
    fn test_parse_update_needs_selection_and_valid_level() {
        assert!(matches!(
            parse_command("update --audio alsa", None, false),
            Err(ConsoleError::Invalid(_))
        ));
        assert!(matches!(
            parse_command("update --debug 12", Some(&active()), false),
            Err(ConsoleError::Clap(_))
        ));
        assert!(parse_command("update --windows win99", Some(&active()), false).is_err());
    }

    #[test]
    fn test_parse_tools_and_apps() {
        assert_eq!(intent("run winecfg"), UserIntent::Launch(Tool::Winecfg));
        assert_eq!(
            intent("run update-prefix"),
            UserIntent::Launch(Tool::UpdatePrefix)
        );
        assert_eq!(
            intent("run program /tmp/setup.exe"),
            UserIntent::Launch(Tool::RunProgram("/tmp/setup.exe".into()))
        );
        assert_eq!(intent("run app 2"), UserIntent::Launch(Tool::RunApp(2)));
        assert_eq!(intent("app remove 1"), UserIntent::RemoveApp(1));
        assert!(matches!(
            intent(r#"app add Word winword.exe --description "Word processor""#),
            UserIntent::AddApp(app) if app.description == "Word processor"
        ));
        assert_eq!(
            intent("install vcrun 2015"),
            UserIntent::Install(Package::VisualCpp("2015".into()))
        );
    }

    #[test]
    fn test_parse_misc() {
        assert_eq!(parse_command("", None, false).unwrap(), None);
        assert_eq!(
            parse_command("quit", None, false).unwrap(),
            Some(ConsoleAction::Quit)
        );
        assert_eq!(
            parse_command("exit", None, false).unwrap(),
            Some(ConsoleAction::Quit)
        );
        assert_eq!(
            parse_command("ls", None, false).unwrap(),
            Some(ConsoleAction::List)
        );
        assert_eq!(
            parse_command("default Games", None, false).unwrap(),
            Some(ConsoleAction::SetDefault("Games".to_string()))
        );
        assert!(parse_command("frobnicate", None, false).is_err());
        assert!(parse_command("run spaceship", None, false).is_err());
        assert!(matches!(
            parse_command("install office", None, false),
            Err(ConsoleError::Invalid(_))
        ));
    }

    #[test]
    fn test_help_is_generated() {
        let err = parse_command("help", None, false).unwrap_err();
        assert!(err.is_help());
        let text = err.to_string();
        assert!(text.contains("create"));
        assert!(text.contains("Rescan the prefixes directory"));

        assert!(!parse_command("frobnicate", None, false)
            .unwrap_err()
            .is_help());
    }

    #[test]
    fn test_presenter_marks_active_bottle() {
        let mut presenter = ConsolePresenter::new(Vec::new(), true);
        let bottle = active();
        presenter.show_bottles(
            std::slice::from_ref(&bottle),
            Some(Utf8Path::new("/prefixes/Games")),
        );
        presenter.show_error("boom");
        assert!(presenter.confirm("Delete?"));

        let output = String::from_utf8(presenter.into_inner()).unwrap();
        assert!(output.starts_with("* Games"));
        assert!(output.contains("error: boom"));
    }
}
