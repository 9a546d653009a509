//! Bottle manager - owns the bottle lifecycle.
//!
//! [`BottleManager`] validates requests on the calling (interface) thread and
//! runs the slow part of every lifecycle operation on a dedicated worker
//! thread. At most [`MAX_CONCURRENT_LIFECYCLE_JOBS`] worker is alive at a time:
//! a new job is rejected with [`ManagerError::JobInProgress`] until the
//! previous worker has been joined through [`BottleManager::join_finished_job`].
//!
//! Workers write their results into the shared [`StateManager`] first and
//! only then send a [`JobEvent`] through the [`DispatchHandle`], so whoever
//! receives the event observes the updated state.
//!
//! Package installs are not lifecycle jobs. Each runs on its own short-lived
//! thread and may overlap with other installs or a running job. Their handles
//! are kept so that [`BottleManager::wait_for_installs`] can hold shutdown
//! until every install has finished.

mod jobs;

use crate::config::ConfigManager;
use crate::models::{
    AppShortcut, AudioDriver, Bit, BottleConfig, BottleRecord, JobKind, Windows,
    MAX_CONCURRENT_LIFECYCLE_JOBS, is_supported, validate_bottle_name,
};
use crate::services::packages::Package;
use crate::services::probe::ProbeError;
use crate::services::runner::{CommandRunner, RunnerError};
use crate::services::scan::BottleScanner;
use crate::services::tools::Tool;
use crate::state::StateManager;
use crate::ui::bridge::DispatchHandle;
use camino::{Utf8Path, Utf8PathBuf};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, LazyLock, Mutex};
use std::thread::{self, JoinHandle};
use thiserror::Error;

static RESOLUTION_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[1-9][0-9]{1,4}x[1-9][0-9]{1,4}$")
        .expect("Invalid resolution regex")
});

/// Errors reported by [`BottleManager`].
///
/// Validation variants are returned synchronously before any thread is
/// started; the rest come out of worker threads.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Invalid bottle name: {0}")]
    InvalidName(String),

    #[error("A bottle named '{0}' already exists")]
    DuplicateName(String),

    /// The name is free in the store but a non-bottle folder is in the way
    #[error("The prefixes directory already contains a folder named '{0}'")]
    PrefixDirExists(String),

    #[error("{windows} is not available as a {bit} bottle")]
    UnsupportedWindows { windows: Windows, bit: Bit },

    #[error("Invalid virtual desktop resolution '{0}', expected WIDTHxHEIGHT")]
    InvalidResolution(String),

    #[error("No bottle selected")]
    NoActiveBottle,

    #[error("Unknown bottle: {0}")]
    UnknownBottle(String),

    #[error("The selected bottle has no app #{0}")]
    UnknownApp(usize),

    #[error("A {0} job is still running, wait for it to finish")]
    JobInProgress(JobKind),

    #[error("Could not start worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("The {0} worker panicked")]
    Panicked(JobKind),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("{0:#}")]
    Config(anyhow::Error),
}

impl ManagerError {
    pub(crate) fn io(path: impl AsRef<Utf8Path>, source: std::io::Error) -> Self {
        ManagerError::Io {
            path: path.as_ref().to_string(),
            source,
        }
    }
}

/// Result delivered to the interface thread
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// A lifecycle job finished; the worker still has to be joined
    JobFinished {
        kind: JobKind,
        result: Result<String, String>,
    },

    /// A package install finished
    PackageInstalled {
        package: Package,
        result: Result<String, String>,
    },
}

/// Parameters of a new bottle
#[derive(Debug, Clone, PartialEq)]
pub struct NewBottleRequest {
    pub name: String,
    pub windows: Windows,
    pub bit: Bit,
    /// `WIDTHxHEIGHT`, or `None` for no virtual desktop
    pub virtual_desktop: Option<String>,
    /// Skip the Gecko and Mono installers and remove any Mono that slipped in
    pub disable_gecko_mono: bool,
    pub audio: AudioDriver,
}

impl NewBottleRequest {
    /// Request with the defaults used by the new-bottle form
    pub fn new(name: impl Into<String>) -> Self {
        let (windows, bit) =
            crate::models::SUPPORTED_WINDOWS[crate::models::DEFAULT_BOTTLE_INDEX];
        Self {
            name: name.into(),
            windows,
            bit,
            virtual_desktop: None,
            disable_gecko_mono: false,
            audio: AudioDriver::default(),
        }
    }
}

/// New settings for the active bottle.
///
/// Fields equal to the current record are left alone.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateBottleRequest {
    pub name: String,
    pub description: String,
    pub windows: Windows,
    pub virtual_desktop: Option<String>,
    pub audio: AudioDriver,
    pub debug_log_level: u8,
    pub logging_enabled: bool,
}

impl UpdateBottleRequest {
    /// Request that changes nothing, to be edited by the caller
    pub fn from_record(record: &BottleRecord) -> Self {
        Self {
            name: record.name.clone(),
            description: record.description.clone(),
            windows: record.windows,
            virtual_desktop: record.virtual_desktop.clone(),
            audio: record.audio,
            debug_log_level: record.debug_log_level,
            logging_enabled: record.logging_enabled,
        }
    }
}

/// Name and description of a copy of the active bottle
#[derive(Debug, Clone, PartialEq)]
pub struct CloneBottleRequest {
    pub name: String,
    pub description: String,
}

struct RunningJob {
    kind: JobKind,
    handle: JoinHandle<()>,
}

/// Everything a worker thread needs, cheap to clone
#[derive(Clone)]
pub(crate) struct JobContext {
    pub(crate) state: StateManager,
    pub(crate) runner: Arc<dyn CommandRunner>,
    pub(crate) scanner: BottleScanner,
}

impl JobContext {
    /// Wine version from the last scan, asking Wine if there was none yet
    pub(crate) fn wine_version(&self) -> String {
        let known = self.state.read(|s| s.wine_version.clone());
        if known.is_empty() {
            self.scanner.wine_version()
        } else {
            known
        }
    }
}

struct Inner {
    ctx: JobContext,
    events: DispatchHandle,
    job: Mutex<Option<RunningJob>>,
    installs: Mutex<Vec<JoinHandle<()>>>,
}

/// Creates, updates, clones and deletes bottles.
///
/// Cloning the manager is cheap; all clones share the same job slot.
///
/// # Example
/// ```ignore
/// let dispatcher = EventDispatcher::new();
/// let manager =
///     BottleManager::new(state, runner, prefixes_dir, dispatcher.clone_handle());
///
/// manager.create(NewBottleRequest::new("Games"))?;
/// // later, on the interface thread:
/// if let Some(JobEvent::JobFinished { .. }) = dispatcher.try_next() {
///     manager.join_finished_job();
/// }
/// ```
#[derive(Clone)]
pub struct BottleManager {
    inner: Arc<Inner>,
}

impl BottleManager {
    pub fn new(
        state: StateManager,
        runner: Arc<dyn CommandRunner>,
        prefixes_dir: impl Into<Utf8PathBuf>,
        events: DispatchHandle,
    ) -> Self {
        let scanner = BottleScanner::new(prefixes_dir, Arc::clone(&runner));
        Self {
            inner: Arc::new(Inner {
                ctx: JobContext {
                    state,
                    runner,
                    scanner,
                },
                events,
                job: Mutex::new(None),
                installs: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn state(&self) -> &StateManager {
        &self.inner.ctx.state
    }

    pub fn prefixes_dir(&self) -> &Utf8Path {
        self.inner.ctx.scanner.prefixes_dir()
    }

    /// Snapshot of the bottle collection
    pub fn bottles(&self) -> Vec<BottleRecord> {
        self.state().read(|s| s.bottles.clone())
    }

    /// Snapshot of the active bottle, resolved against the current collection
    pub fn active(&self) -> Option<BottleRecord> {
        self.state().read(|s| s.active_bottle().cloned())
    }

    /// Read and clear the error slot
    pub fn take_error(&self) -> Option<String> {
        self.state().take_error()
    }

    /// Kind of the lifecycle job that has not been joined yet
    pub fn running_job(&self) -> Option<JobKind> {
        self.inner.job.lock().unwrap().as_ref().map(|job| job.kind)
    }

    pub fn is_busy(&self) -> bool {
        self.running_job().is_some()
    }

    /// Join the worker of the last job and free the job slot.
    ///
    /// Call after receiving its [`JobEvent::JobFinished`]; the worker sends
    /// that event as its last action, so the join returns promptly.
    pub fn join_finished_job(&self) -> Option<JobKind> {
        let job = self.inner.job.lock().unwrap().take()?;
        if job.handle.join().is_err() {
            tracing::error!("Worker thread of {} job panicked", job.kind);
        }
        tracing::debug!("Joined {} job", job.kind);
        Some(job.kind)
    }

    /// Number of install threads that have not finished yet
    pub fn pending_installs(&self) -> usize {
        self.reap_installs();
        self.inner.installs.lock().unwrap().len()
    }

    /// Join install threads that have already finished
    pub fn reap_installs(&self) {
        let mut installs = self.inner.installs.lock().unwrap();
        let (finished, running): (Vec<_>, Vec<_>) =
            installs.drain(..).partition(|handle| handle.is_finished());
        *installs = running;
        drop(installs);

        for handle in finished {
            if handle.join().is_err() {
                tracing::error!("Install thread panicked");
            }
        }
    }

    /// Block until every install thread has finished. Returns how many were joined.
    ///
    /// Their [`JobEvent::PackageInstalled`] events are queued by then.
    pub fn wait_for_installs(&self) -> usize {
        let handles = std::mem::take(&mut *self.inner.installs.lock().unwrap());
        let count = handles.len();
        if count > 0 {
            tracing::info!("Waiting for {} package install(s)", count);
        }
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("Install thread panicked");
            }
        }
        count
    }

    /// Select a bottle. The prefix must be in the current collection.
    pub fn set_active(&self, prefix: Option<&Utf8Path>) -> Result<(), ManagerError> {
        match prefix {
            None => {
                self.state().set_active(None);
                Ok(())
            }
            Some(prefix) => {
                let known = self.state().read(|s| s.find(prefix).is_some());
                if !known {
                    return Err(self.reject(ManagerError::UnknownBottle(prefix.to_string())));
                }
                self.state().set_active(Some(prefix.to_path_buf()));
                Ok(())
            }
        }
    }

    /// Select a bottle by its name
    pub fn select_by_name(&self, name: &str) -> Result<(), ManagerError> {
        let prefix = self
            .state()
            .read(|s| s.find_by_name(name).map(|b| b.prefix.clone()));
        match prefix {
            Some(prefix) => self.set_active(Some(&prefix)),
            None => Err(self.reject(ManagerError::UnknownBottle(name.to_string()))),
        }
    }

    /// Rescan the prefixes directory in the background
    pub fn refresh(&self) -> Result<(), ManagerError> {
        self.spawn_job(JobKind::Refresh, jobs::refresh)
    }

    /// Create a bottle in the background
    pub fn create(&self, request: NewBottleRequest) -> Result<(), ManagerError> {
        self.validate_new_name(&request.name)
            .and_then(|_| {
                if is_supported(request.windows, request.bit) {
                    Ok(())
                } else {
                    Err(ManagerError::UnsupportedWindows {
                        windows: request.windows,
                        bit: request.bit,
                    })
                }
            })
            .and_then(|_| validate_resolution(request.virtual_desktop.as_deref()))
            .map_err(|e| self.reject(e))?;

        self.spawn_job(JobKind::Create, move |ctx| jobs::create(ctx, request))
    }

    /// Apply new settings to the active bottle in the background
    pub fn update(&self, request: UpdateBottleRequest) -> Result<(), ManagerError> {
        let current = self.require_active()?;

        let mut checks = validate_resolution(request.virtual_desktop.as_deref());
        if checks.is_ok() && request.name != current.name {
            checks = self.validate_new_name(&request.name);
        }
        if checks.is_ok() && !is_supported(request.windows, current.bit) {
            checks = Err(ManagerError::UnsupportedWindows {
                windows: request.windows,
                bit: current.bit,
            });
        }
        checks.map_err(|e| self.reject(e))?;

        self.spawn_job(JobKind::Update, move |ctx| jobs::update(ctx, current, request))
    }

    /// Copy the active bottle in the background
    pub fn clone_active(&self, request: CloneBottleRequest) -> Result<(), ManagerError> {
        let source = self.require_active()?;
        self.validate_new_name(&request.name)
            .map_err(|e| self.reject(e))?;

        self.spawn_job(JobKind::Clone, move |ctx| jobs::clone(ctx, source, request))
    }

    /// Delete the active bottle and its directory in the background
    pub fn delete_active(&self) -> Result<(), ManagerError> {
        let target = self.require_active()?;
        self.spawn_job(JobKind::Delete, move |ctx| jobs::delete(ctx, target))
    }

    /// Install a package into the active bottle on its own thread
    pub fn install(&self, package: Package) -> Result<(), ManagerError> {
        let bottle = self.require_active()?;
        let ctx = self.inner.ctx.clone();
        let events = self.inner.events.clone();

        self.reap_installs();
        let handle = thread::Builder::new()
            .name("winecellar-install".to_string())
            .spawn(move || {
                tracing::info!("Installing {} into {}", package, bottle.name);
                let result = ctx
                    .runner
                    .run(&package.command(), Some(&bottle.prefix))
                    .map(|_| format!("{} installed into '{}'", package, bottle.name))
                    .map_err(|e| {
                        let message = format!("Failed to install {}: {}", package, e);
                        ctx.state.set_error(message.clone());
                        message
                    });
                events.send(JobEvent::PackageInstalled { package, result });
            })
            .map_err(|e| self.reject(ManagerError::Spawn(e)))?;

        self.inner.installs.lock().unwrap().push(handle);
        Ok(())
    }

    /// Start an external tool against the active bottle; returns once spawned
    pub fn launch(&self, tool: Tool) -> Result<(), ManagerError> {
        let bottle = self.require_active()?;
        let command = match &tool {
            Tool::RunApp(index) => tool
                .command(&bottle)
                .ok_or(ManagerError::UnknownApp(*index)),
            _ => tool.command(&bottle).ok_or(ManagerError::NoActiveBottle),
        }
        .map_err(|e| self.reject(e))?;

        self.inner
            .ctx
            .runner
            .launch(&command, Some(&bottle.prefix))
            .map_err(|e| self.reject(e.into()))
    }

    /// Add an app shortcut to the active bottle
    pub fn add_app(&self, app: AppShortcut) -> Result<(), ManagerError> {
        let mut bottle = self.require_active()?;
        tracing::info!("Adding app '{}' to {}", app.name, bottle.name);
        bottle.apps.push(app);
        self.save_apps(bottle)
    }

    /// Remove the app shortcut at `index` from the active bottle
    pub fn remove_app(&self, index: usize) -> Result<(), ManagerError> {
        let mut bottle = self.require_active()?;
        if index >= bottle.apps.len() {
            return Err(self.reject(ManagerError::UnknownApp(index)));
        }
        let removed = bottle.apps.remove(index);
        tracing::info!("Removing app '{}' from {}", removed.name, bottle.name);
        self.save_apps(bottle)
    }

    fn save_apps(&self, bottle: BottleRecord) -> Result<(), ManagerError> {
        ConfigManager::save_bottle_config(&bottle.prefix, &bottle_config_of(&bottle))
            .map_err(|e| self.reject(ManagerError::Config(e)))?;
        self.state().upsert_bottle(bottle);
        Ok(())
    }

    fn require_active(&self) -> Result<BottleRecord, ManagerError> {
        self.active()
            .ok_or_else(|| self.reject(ManagerError::NoActiveBottle))
    }

    fn validate_new_name(&self, name: &str) -> Result<(), ManagerError> {
        validate_bottle_name(name).map_err(ManagerError::InvalidName)?;
        if self.state().read(|s| s.contains_name(name)) {
            return Err(ManagerError::DuplicateName(name.to_string()));
        }
        if self.inner.ctx.scanner.prefix_for(name).exists() {
            return Err(ManagerError::PrefixDirExists(name.to_string()));
        }
        Ok(())
    }

    /// Record a synchronous failure in the error slot and hand it back
    fn reject(&self, err: ManagerError) -> ManagerError {
        self.state().set_error(err.to_string());
        err
    }

    fn spawn_job<F>(&self, kind: JobKind, work: F) -> Result<(), ManagerError>
    where
        F: FnOnce(&JobContext) -> Result<String, ManagerError> + Send + 'static,
    {
        let mut slot = self.inner.job.lock().unwrap();
        if let Some(running) = slot.as_ref() {
            debug_assert_eq!(MAX_CONCURRENT_LIFECYCLE_JOBS, 1);
            return Err(self.reject(ManagerError::JobInProgress(running.kind)));
        }

        let ctx = self.inner.ctx.clone();
        let events = self.inner.events.clone();
        ctx.state.begin_job(kind);
        tracing::info!("Starting {} job", kind);

        let spawned = thread::Builder::new()
            .name(format!("winecellar-{}", kind))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| work(&ctx)))
                    .unwrap_or_else(|_| Err(ManagerError::Panicked(kind)));

                let result = result.map_err(|e| {
                    let message = e.to_string();
                    ctx.state.set_error(message.clone());
                    message
                });
                match &result {
                    Ok(message) => tracing::info!("{} job finished: {}", kind, message),
                    Err(message) => tracing::warn!("{} job failed: {}", kind, message),
                }

                ctx.state.end_job();
                events.send(JobEvent::JobFinished { kind, result });
            });

        match spawned {
            Ok(handle) => {
                *slot = Some(RunningJob { kind, handle });
                Ok(())
            }
            Err(e) => {
                self.state().end_job();
                Err(self.reject(ManagerError::Spawn(e)))
            }
        }
    }
}

/// Settings-file view of a record
pub(crate) fn bottle_config_of(record: &BottleRecord) -> BottleConfig {
    BottleConfig {
        description: record.description.clone(),
        debug_log_level: record.debug_log_level,
        logging_enabled: record.logging_enabled,
        apps: record.apps.clone(),
    }
}

fn validate_resolution(resolution: Option<&str>) -> Result<(), ManagerError> {
    match resolution {
        Some(res) if !RESOLUTION_RE.is_match(res) => {
            Err(ManagerError::InvalidResolution(res.to_string()))
        }
        _ => Ok(()),
    }
}
