use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

/// Environment variable naming the prefix a Wine command operates on
pub const PREFIX_ENV: &str = "WINEPREFIX";

/// Errors from running an external command.
///
/// Every variant renders to a single diagnostic line via `Display`, which is
/// what ends up in the error slot.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Command '{program}' not found. Is it installed and on your PATH?")]
    NotFound { program: String },

    #[error("Command '{command}' failed with exit code {code}: {diagnostic}")]
    Failed {
        command: String,
        code: i32,
        diagnostic: String,
    },

    #[error("Command '{command}' timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("Command '{command}' could not be run: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// An external command to run against a prefix.
///
/// # Example
/// ```ignore
/// let cmd = WineCommand::new("winetricks").arg("-q").arg("win10");
/// runner.run(&cmd, Some(prefix))?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WineCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Where `launch` sends stdout/stderr; discarded when `None`
    pub log_file: Option<Utf8PathBuf>,
}

impl WineCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn log_to(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Value of an environment override, if set
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for WineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Seam between bottle logic and the processes it shells out to.
///
/// `run` blocks until the command exits and must only be called from a
/// background thread. `launch` returns as soon as the process is spawned.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync {
    /// Run to completion, returning captured stdout
    fn run<'a>(
        &self,
        command: &WineCommand,
        prefix: Option<&'a Utf8Path>,
    ) -> Result<String, RunnerError>;

    /// Spawn without waiting for the process to finish
    fn launch<'a>(
        &self,
        command: &WineCommand,
        prefix: Option<&'a Utf8Path>,
    ) -> Result<(), RunnerError>;
}

/// [`CommandRunner`] backed by `tokio::process`.
///
/// Blocking calls are driven through a runtime [`Handle`](tokio::runtime::Handle),
/// so the runner can be used from plain worker threads while tokio handles
/// process I/O and timeouts.
#[derive(Clone)]
pub struct WineRunner {
    handle: tokio::runtime::Handle,
    timeout: Option<Duration>,
}

impl WineRunner {
    /// # Arguments
    /// * `handle` - Runtime used for process I/O
    /// * `timeout` - Limit for `run`; `None` waits indefinitely
    pub fn new(handle: tokio::runtime::Handle, timeout: Option<Duration>) -> Self {
        Self { handle, timeout }
    }

    fn build(command: &WineCommand, prefix: Option<&Utf8Path>) -> Command {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        // Scoped to the child: the parent's environment is never modified.
        if let Some(prefix) = prefix {
            cmd.env(PREFIX_ENV, prefix.as_str());
        }
        for (key, value) in &command.env {
            cmd.env(key, value);
        }
        cmd
    }

    fn map_spawn_error(command: &WineCommand, err: std::io::Error) -> RunnerError {
        if err.kind() == ErrorKind::NotFound {
            RunnerError::NotFound {
                program: command.program.clone(),
            }
        } else {
            RunnerError::Io {
                command: command.to_string(),
                source: err,
            }
        }
    }
}

impl CommandRunner for WineRunner {
    fn run<'a>(
        &self,
        command: &WineCommand,
        prefix: Option<&'a Utf8Path>,
    ) -> Result<String, RunnerError> {
        tracing::info!(
            "Executing: {} (prefix: {})",
            command,
            prefix.map(|p| p.as_str()).unwrap_or("-")
        );

        let start = Instant::now();
        let mut cmd = Self::build(command, prefix);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let limit = self.timeout;
        let output: std::io::Result<Option<std::process::Output>> =
            self.handle.block_on(async move {
                let child = cmd.spawn()?;
                match limit {
                    Some(limit) => match timeout(limit, child.wait_with_output()).await {
                        Ok(result) => result.map(Some),
                        Err(_) => Ok(None),
                    },
                    None => child.wait_with_output().await.map(Some),
                }
            });

        let output = match output {
            Ok(Some(output)) => output,
            Ok(None) => {
                let limit = self.timeout.unwrap_or_default();
                tracing::warn!("{} timed out after {:?}", command, limit);
                return Err(RunnerError::Timeout {
                    command: command.to_string(),
                    timeout: limit,
                });
            }
            Err(err) => return Err(Self::map_spawn_error(command, err)),
        };

        let exit_code = output.status.code().unwrap_or(-1);
        tracing::debug!(
            "{} completed in {:.2}s with exit code {}",
            command,
            start.elapsed().as_secs_f32(),
            exit_code
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let diagnostic = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(RunnerError::Failed {
                command: command.to_string(),
                code: exit_code,
                diagnostic,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn launch<'a>(
        &self,
        command: &WineCommand,
        prefix: Option<&'a Utf8Path>,
    ) -> Result<(), RunnerError> {
        tracing::info!(
            "Launching: {} (prefix: {})",
            command,
            prefix.map(|p| p.as_str()).unwrap_or("-")
        );

        let mut cmd = Self::build(command, prefix);
        cmd.stdin(Stdio::null());

        match &command.log_file {
            Some(log_file) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(log_file)
                    .map_err(|source| RunnerError::Io {
                        command: command.to_string(),
                        source,
                    })?;
                let stderr = file.try_clone().map_err(|source| RunnerError::Io {
                    command: command.to_string(),
                    source,
                })?;
                cmd.stdout(Stdio::from(file)).stderr(Stdio::from(stderr));
            }
            None => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        // Child processes must be spawned inside the runtime context
        let _guard = self.handle.enter();
        let mut child = cmd
            .spawn()
            .map_err(|err| Self::map_spawn_error(command, err))?;

        let label = command.to_string();
        self.handle.spawn(async move {
            match child.wait().await {
                Ok(status) => tracing::debug!("{} exited with {}", label, status),
                Err(e) => tracing::warn!("Failed to wait for {}: {}", label, e),
            }
        });

        Ok(())
    }
}
