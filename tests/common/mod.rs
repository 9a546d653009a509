//! Shared fixtures for integration tests.
//!
//! [`FakeWine`] stands in for the real Wine tools: `wineboot --init` lays out
//! a minimal prefix and `winetricks` verbs append the registry keys real
//! winetricks would write, so probing sees the same results.

#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use winecellar::services::{CommandRunner, RunnerError, WineCommand};
use winecellar::ui::EventDispatcher;
use winecellar::{BottleManager, JobEvent, StateManager};

pub const FAKE_WINE_VERSION: &str = "9.0";

#[derive(Default)]
pub struct FakeWine {
    calls: Mutex<Vec<(WineCommand, Option<Utf8PathBuf>)>>,
    launched: Mutex<Vec<(WineCommand, Option<Utf8PathBuf>)>>,
    fail_on: Mutex<Option<String>>,
    slow_on: Mutex<Option<(String, Duration)>>,
    create_dir_on: Mutex<Option<(String, Utf8PathBuf)>>,
    completed: Mutex<Vec<String>>,
}

impl FakeWine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every command whose text contains `needle` fail
    pub fn fail_on(&self, needle: &str) {
        *self.fail_on.lock().unwrap() = Some(needle.to_string());
    }

    /// Make every command whose text contains `needle` take `delay`
    pub fn slow_on(&self, needle: &str, delay: Duration) {
        *self.slow_on.lock().unwrap() = Some((needle.to_string(), delay));
    }

    /// Create `dir` when a command whose text contains `needle` runs
    pub fn create_dir_on(&self, needle: &str, dir: &Utf8Path) {
        *self.create_dir_on.lock().unwrap() = Some((needle.to_string(), dir.to_path_buf()));
    }

    /// Commands that ran to the end and succeeded
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(cmd, _)| cmd.to_string())
            .collect()
    }

    pub fn launched(&self) -> Vec<(WineCommand, Option<Utf8PathBuf>)> {
        self.launched.lock().unwrap().clone()
    }

    fn append_user_reg(prefix: &Utf8Path, text: &str) -> Result<(), RunnerError> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(prefix.join("user.reg"))
            .map_err(|source| RunnerError::Io {
                command: "winetricks".to_string(),
                source,
            })?;
        writeln!(file, "\n{}", text).map_err(|source| RunnerError::Io {
            command: "winetricks".to_string(),
            source,
        })
    }

    fn init_prefix(prefix: &Utf8Path, arch: &str) -> std::io::Result<()> {
        fs::create_dir_all(prefix.join("drive_c/windows/system32"))?;
        fs::create_dir_all(prefix.join("dosdevices"))?;
        fs::write(
            prefix.join("system.reg"),
            format!(
                "WINE REGISTRY Version 2\n;; All keys relative to \\\\Machine\n\n#arch={}\n",
                arch
            ),
        )?;
        fs::write(
            prefix.join("user.reg"),
            "WINE REGISTRY Version 2\n;; All keys relative to \\\\User\\\\S-1-5-21-0-0-0-1000\n",
        )?;
        fs::write(prefix.join(".update-timestamp"), "1700000000\n")?;
        #[cfg(unix)]
        std::os::unix::fs::symlink("../drive_c", prefix.join("dosdevices/c:"))?;
        Ok(())
    }

    fn winetricks(prefix: &Utf8Path, verb: &str) -> Result<(), RunnerError> {
        if let Some(audio) = verb.strip_prefix("sound=") {
            let value = if audio == "disabled" { "" } else { audio };
            return Self::append_user_reg(
                prefix,
                &format!("[Software\\\\Wine\\\\Drivers] 1700000000\n\"Audio\"=\"{}\"", value),
            );
        }
        if let Some(resolution) = verb.strip_prefix("vd=") {
            let value = if resolution == "off" { "" } else { resolution };
            return Self::append_user_reg(
                prefix,
                &format!(
                    concat!(
                        "[Software\\\\Wine\\\\Explorer] 1700000000\n\"Desktop\"=\"Default\"\n\n",
                        "[Software\\\\Wine\\\\Explorer\\\\Desktops] 1700000000\n\"Default\"=\"{}\""
                    ),
                    value
                ),
            );
        }
        // Anything else is treated as a Windows version verb
        Self::append_user_reg(
            prefix,
            &format!("[Software\\\\Wine] 1700000000\n\"Version\"=\"{}\"", verb),
        )
    }
}

impl CommandRunner for FakeWine {
    fn run<'a>(
        &self,
        command: &WineCommand,
        prefix: Option<&'a Utf8Path>,
    ) -> Result<String, RunnerError> {
        self.calls
            .lock()
            .unwrap()
            .push((command.clone(), prefix.map(Utf8Path::to_path_buf)));

        let text = command.to_string();
        let delay = match self.slow_on.lock().unwrap().as_ref() {
            Some((needle, delay)) if text.contains(needle.as_str()) => Some(*delay),
            _ => None,
        };
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        if let Some((needle, dir)) = self.create_dir_on.lock().unwrap().as_ref() {
            if text.contains(needle.as_str()) {
                fs::create_dir_all(dir).unwrap();
            }
        }

        let output = self.simulate(command, prefix)?;
        self.completed.lock().unwrap().push(text);
        Ok(output)
    }

    fn launch<'a>(
        &self,
        command: &WineCommand,
        prefix: Option<&'a Utf8Path>,
    ) -> Result<(), RunnerError> {
        self.launched
            .lock()
            .unwrap()
            .push((command.clone(), prefix.map(Utf8Path::to_path_buf)));
        Ok(())
    }
}

impl FakeWine {
    fn simulate(
        &self,
        command: &WineCommand,
        prefix: Option<&Utf8Path>,
    ) -> Result<String, RunnerError> {
        if let Some(needle) = self.fail_on.lock().unwrap().as_deref() {
            if command.to_string().contains(needle) {
                return Err(RunnerError::Failed {
                    command: command.to_string(),
                    code: 1,
                    diagnostic: format!("simulated failure of {}", needle),
                });
            }
        }

        let args: Vec<&str> = command.args.iter().map(String::as_str).collect();
        match (command.program.as_str(), args.as_slice()) {
            ("wine", ["--version"]) => Ok(format!("wine-{}\n", FAKE_WINE_VERSION)),
            ("wineboot", ["--init"]) => {
                let prefix = prefix.expect("wineboot needs a prefix");
                let arch = command.env_value("WINEARCH").unwrap_or("win64");
                Self::init_prefix(prefix, arch).map_err(|source| RunnerError::Io {
                    command: command.to_string(),
                    source,
                })?;
                Ok(String::new())
            }
            ("winetricks", ["-q", verb]) => {
                let prefix = prefix.expect("winetricks needs a prefix");
                Self::winetricks(prefix, verb)?;
                Ok(String::new())
            }
            ("winetricks", ["-q", "--force", _verb]) => Ok(String::new()),
            ("wine", ["uninstaller", "--list"]) => Ok(String::new()),
            ("wineserver", ["-k"]) => Ok(String::new()),
            _ => Ok(String::new()),
        }
    }
}

pub struct Harness {
    pub manager: BottleManager,
    pub dispatcher: EventDispatcher,
    pub wine: Arc<FakeWine>,
    pub root: Utf8PathBuf,
    _temp_dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().join("prefixes")).unwrap();
        let wine = FakeWine::new();
        let dispatcher = EventDispatcher::new();
        let manager = BottleManager::new(
            StateManager::new(),
            wine.clone(),
            root.clone(),
            dispatcher.clone_handle(),
        );
        Self {
            manager,
            dispatcher,
            wine,
            root,
            _temp_dir: temp_dir,
        }
    }

    /// Wait for the running job, join it and return its result
    pub fn finish_job(&mut self) -> Result<String, String> {
        loop {
            match self.dispatcher.next_blocking().expect("dispatcher closed") {
                JobEvent::JobFinished { result, .. } => {
                    self.manager.join_finished_job();
                    return result;
                }
                JobEvent::PackageInstalled { .. } => continue,
            }
        }
    }

    /// Create a bottle with default settings and wait for it
    pub fn create(&mut self, name: &str) -> Result<String, String> {
        self.manager
            .create(winecellar::NewBottleRequest::new(name))
            .map_err(|e| e.to_string())?;
        self.finish_job()
    }

    pub fn select(&self, name: &str) {
        self.manager.select_by_name(name).unwrap();
    }

    pub fn names(&self) -> Vec<String> {
        self.manager.bottles().into_iter().map(|b| b.name).collect()
    }
}
