// Interface Coordinator - Turns user intents into manager calls and job results
// into presenter updates
//
// This module contains the InterfaceCoordinator which coordinates between:
// - Presenter (whatever renders bottles and messages)
// - BottleManager (bottle lifecycle)
// - EventDispatcher (job results coming back from worker threads)
//
// Everything here runs on the interface thread.

use crate::config::ConfigManager;
use crate::manager::{
    BottleManager, CloneBottleRequest, JobEvent, NewBottleRequest, UpdateBottleRequest,
};
use crate::models::{AppShortcut, BottleRecord, GeneralConfig, JobKind};
use crate::services::packages::Package;
use crate::services::tools::Tool;
use crate::ui::bridge::EventDispatcher;
use camino::Utf8Path;

/// Rendering side of the interface.
///
/// Implementations only draw; they never call into the manager.
pub trait Presenter {
    /// Redraw the bottle list; `active` is the selected prefix, if any
    fn show_bottles(&mut self, bottles: &[BottleRecord], active: Option<&Utf8Path>);

    fn show_info(&mut self, message: &str);

    fn show_error(&mut self, message: &str);

    /// `Some(kind)` while a lifecycle job runs, `None` once it is dispatched
    fn set_busy(&mut self, job: Option<JobKind>);

    /// Ask a yes/no question before a destructive action
    fn confirm(&mut self, question: &str) -> bool;
}

/// Everything the user can ask for
#[derive(Debug, Clone, PartialEq)]
pub enum UserIntent {
    Refresh,
    /// Select by name, or clear the selection with `None`
    Select(Option<String>),
    Create(NewBottleRequest),
    Update(UpdateBottleRequest),
    Clone(CloneBottleRequest),
    DeleteActive,
    Launch(Tool),
    Install(Package),
    AddApp(AppShortcut),
    RemoveApp(usize),
    SavePreferences(GeneralConfig),
}

/// Single entry point for user intents and the sole consumer of job events
///
/// # Example
/// ```ignore
/// let dispatcher = EventDispatcher::new();
/// let manager = BottleManager::new(state, runner, prefixes_dir, dispatcher.clone_handle());
/// let mut coordinator =
///     InterfaceCoordinator::new(manager, dispatcher, presenter, config_manager, prefs);
///
/// coordinator.handle_intent(UserIntent::Refresh);
/// coordinator.wait_for_job();
/// ```
pub struct InterfaceCoordinator<P: Presenter> {
    manager: BottleManager,
    dispatcher: EventDispatcher,
    presenter: P,
    config_manager: ConfigManager,
    preferences: GeneralConfig,
}

impl<P: Presenter> InterfaceCoordinator<P> {
    pub fn new(
        manager: BottleManager,
        dispatcher: EventDispatcher,
        presenter: P,
        config_manager: ConfigManager,
        preferences: GeneralConfig,
    ) -> Self {
        Self {
            manager,
            dispatcher,
            presenter,
            config_manager,
            preferences,
        }
    }

    pub fn manager(&self) -> &BottleManager {
        &self.manager
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn preferences(&self) -> &GeneralConfig {
        &self.preferences
    }

    /// Handle one user intent.
    ///
    /// Failures are shown through the presenter; nothing here is fatal.
    pub fn handle_intent(&mut self, intent: UserIntent) {
        tracing::debug!("Handling intent {:?}", intent);

        let lifecycle = is_lifecycle(&intent);
        if lifecycle {
            if let Some(kind) = self.manager.running_job() {
                self.presenter
                    .show_error(&format!("A {} job is still running, wait for it to finish", kind));
                return;
            }
        }

        let outcome = match intent {
            UserIntent::Refresh => self.start_job(JobKind::Refresh, |m| m.refresh()),
            UserIntent::Select(Some(name)) => self.manager.select_by_name(&name),
            UserIntent::Select(None) => self.manager.set_active(None),
            UserIntent::Create(request) => self.start_job(JobKind::Create, |m| m.create(request)),
            UserIntent::Update(request) => self.start_job(JobKind::Update, |m| m.update(request)),
            UserIntent::Clone(request) => {
                self.start_job(JobKind::Clone, |m| m.clone_active(request))
            }
            UserIntent::DeleteActive => {
                let Some(active) = self.manager.active() else {
                    self.presenter.show_error("No bottle selected");
                    return;
                };
                let question = format!(
                    "Delete bottle '{}' and everything in {}?",
                    active.name, active.prefix
                );
                if !self.presenter.confirm(&question) {
                    self.presenter.show_info("Delete cancelled");
                    return;
                }
                self.start_job(JobKind::Delete, |m| m.delete_active())
            }
            UserIntent::Launch(tool) => {
                let label = tool.to_string();
                self.manager
                    .launch(tool)
                    .map(|_| self.presenter.show_info(&format!("Started {}", label)))
            }
            UserIntent::Install(package) => {
                let label = package.to_string();
                self.manager
                    .install(package)
                    .map(|_| self.presenter.show_info(&format!("Installing {}...", label)))
            }
            UserIntent::AddApp(app) => self.manager.add_app(app),
            UserIntent::RemoveApp(index) => self.manager.remove_app(index),
            UserIntent::SavePreferences(preferences) => {
                self.save_preferences(preferences);
                return;
            }
        };

        match outcome {
            // Jobs redraw when their result is dispatched
            Ok(()) if lifecycle => {}
            Ok(()) => self.show_bottles(),
            Err(e) => {
                // Same message as the error slot
                self.manager.take_error();
                self.presenter.show_error(&e.to_string());
            }
        }
    }

    fn start_job<F>(&mut self, kind: JobKind, start: F) -> Result<(), crate::manager::ManagerError>
    where
        F: FnOnce(&BottleManager) -> Result<(), crate::manager::ManagerError>,
    {
        start(&self.manager)?;
        self.presenter.set_busy(Some(kind));
        Ok(())
    }

    fn save_preferences(&mut self, preferences: GeneralConfig) {
        match self.config_manager.save_general_config(&preferences) {
            Ok(()) => {
                let needs_restart = preferences.prefixes_dir != self.preferences.prefixes_dir;
                self.preferences = preferences;
                if needs_restart {
                    self.presenter
                        .show_info("Preferences saved. Restart to use the new prefixes directory.");
                } else {
                    self.presenter.show_info("Preferences saved");
                }
            }
            Err(e) => self.presenter.show_error(&format!("{:#}", e)),
        }
    }

    /// Drain pending job events without blocking. Returns how many were handled.
    pub fn dispatch_signals(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.dispatcher.try_next() {
            self.dispatch(event);
            handled += 1;
        }
        handled
    }

    /// Block until the running lifecycle job (if any) has been dispatched
    pub fn wait_for_job(&mut self) {
        while self.manager.is_busy() {
            match self.dispatcher.next_blocking() {
                Some(event) => self.dispatch(event),
                None => break,
            }
        }
    }

    /// Block until the running job and every package install are dispatched.
    ///
    /// Call before shutting the runtime down; installs are never cancelled.
    pub fn wait_for_all(&mut self) {
        self.wait_for_job();
        self.manager.wait_for_installs();
        self.dispatch_signals();
    }

    fn dispatch(&mut self, event: JobEvent) {
        match event {
            JobEvent::JobFinished { kind, result } => {
                self.manager.join_finished_job();
                // The payload carries the same failure as the error slot
                self.manager.take_error();
                self.presenter.set_busy(None);
                match result {
                    Ok(message) => self.presenter.show_info(&message),
                    Err(message) => self.presenter.show_error(&message),
                }
                tracing::debug!("Dispatched {} job result", kind);
                self.show_bottles();
            }
            JobEvent::PackageInstalled { result, .. } => {
                self.manager.reap_installs();
                match result {
                    Ok(message) => self.presenter.show_info(&message),
                    Err(message) => {
                        self.manager.take_error();
                        self.presenter.show_error(&message);
                    }
                }
            }
        }
    }

    fn show_bottles(&mut self) {
        let (bottles, active) = self
            .manager
            .state()
            .read(|s| (s.bottles.clone(), s.active.clone()));
        self.presenter.show_bottles(&bottles, active.as_deref());
    }
}

fn is_lifecycle(intent: &UserIntent) -> bool {
    matches!(
        intent,
        UserIntent::Refresh
            | UserIntent::Create(_)
            | UserIntent::Update(_)
            | UserIntent::Clone(_)
            | UserIntent::DeleteActive
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::runner::MockCommandRunner;
    use crate::state::StateManager;
    use camino::Utf8PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingPresenter {
        infos: Vec<String>,
        errors: Vec<String>,
        busy: Vec<Option<JobKind>>,
        lists: Vec<usize>,
        answer: bool,
        questions: Vec<String>,
    }

    impl Presenter for RecordingPresenter {
        fn show_bottles(&mut self, bottles: &[BottleRecord], _active: Option<&Utf8Path>) {
            self.lists.push(bottles.len());
        }
        fn show_info(&mut self, message: &str) {
            self.infos.push(message.to_string());
        }
        fn show_error(&mut self, message: &str) {
            self.errors.push(message.to_string());
        }
        fn set_busy(&mut self, job: Option<JobKind>) {
            self.busy.push(job);
        }
        fn confirm(&mut self, question: &str) -> bool {
            self.questions.push(question.to_string());
            self.answer
        }
    }

    fn coordinator(
        runner: MockCommandRunner,
    ) -> (InterfaceCoordinator<RecordingPresenter>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let dispatcher = EventDispatcher::new();
        let manager = BottleManager::new(
            StateManager::new(),
            Arc::new(runner),
            root.join("prefixes"),
            dispatcher.clone_handle(),
        );
        let config_manager = ConfigManager::new(root.join("config")).unwrap();
        let coordinator = InterfaceCoordinator::new(
            manager,
            dispatcher,
            RecordingPresenter::default(),
            config_manager,
            GeneralConfig::default(),
        );
        (coordinator, temp_dir)
    }

    #[test]
    fn test_refresh_round_trip() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_, _| Ok("wine-9.0".to_string()));
        let (mut coordinator, _temp) = coordinator(runner);

        coordinator.handle_intent(UserIntent::Refresh);
        assert_eq!(coordinator.presenter().busy, vec![Some(JobKind::Refresh)]);

        coordinator.wait_for_job();

        let presenter = coordinator.presenter();
        assert_eq!(presenter.busy, vec![Some(JobKind::Refresh), None]);
        assert_eq!(presenter.infos, vec!["Found 0 bottle(s)".to_string()]);
        assert_eq!(presenter.lists, vec![0]);
        assert!(!coordinator.manager().is_busy());
    }

    #[test]
    fn test_lifecycle_intent_refused_while_job_unjoined() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_, _| Ok("wine-9.0".to_string()));
        let (mut coordinator, _temp) = coordinator(runner);

        coordinator.handle_intent(UserIntent::Refresh);
        coordinator.handle_intent(UserIntent::Create(NewBottleRequest::new("Second")));

        assert_eq!(coordinator.presenter().errors.len(), 1);
        assert!(coordinator.presenter().errors[0].contains("still running"));

        coordinator.wait_for_job();
        assert_eq!(coordinator.presenter().busy.len(), 2);
    }

    #[test]
    fn test_delete_without_selection_shows_error() {
        let (mut coordinator, _temp) = coordinator(MockCommandRunner::new());

        coordinator.handle_intent(UserIntent::DeleteActive);

        assert_eq!(coordinator.presenter().errors, vec!["No bottle selected".to_string()]);
        assert!(coordinator.presenter().questions.is_empty());
        assert!(!coordinator.manager().is_busy());
    }

    #[test]
    fn test_validation_error_is_shown_once() {
        let (mut coordinator, _temp) = coordinator(MockCommandRunner::new());

        coordinator.handle_intent(UserIntent::Create(NewBottleRequest::new("")));

        assert_eq!(coordinator.presenter().errors.len(), 1);
        assert!(coordinator.manager().take_error().is_none());
        assert!(coordinator.presenter().busy.is_empty());
    }

    #[test]
    fn test_wait_for_all_reports_slow_install() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_, _| {
            std::thread::sleep(std::time::Duration::from_millis(200));
            Ok(String::new())
        });
        let (mut coordinator, _temp) = coordinator(runner);
        let prefix = coordinator.manager().prefixes_dir().join("Games");
        coordinator.manager().state().upsert_bottle(BottleRecord {
            name: "Games".to_string(),
            prefix: prefix.clone(),
            windows: crate::models::Windows::Windows10,
            bit: crate::models::Bit::Win64,
            audio: crate::models::AudioDriver::PulseAudio,
            virtual_desktop: None,
            wine_version: "9.0".to_string(),
            last_update: None,
            status: crate::models::BottleStatus::Healthy,
            description: String::new(),
            debug_log_level: 1,
            logging_enabled: false,
            apps: Vec::new(),
        });
        coordinator.manager().set_active(Some(&prefix)).unwrap();

        coordinator.handle_intent(UserIntent::Install(Package::CoreFonts));
        assert!(coordinator.presenter().infos.is_empty());

        coordinator.wait_for_all();

        assert_eq!(coordinator.presenter().infos.len(), 1);
        assert!(coordinator.presenter().infos[0].contains("installed into 'Games'"));
        assert_eq!(coordinator.manager().pending_installs(), 0);
    }

    #[test]
    fn test_save_preferences() {
        let (mut coordinator, _temp) = coordinator(MockCommandRunner::new());
        let prefs = GeneralConfig {
            default_bottle: "Games".to_string(),
            ..GeneralConfig::default()
        };

        coordinator.handle_intent(UserIntent::SavePreferences(prefs));

        assert_eq!(coordinator.preferences().default_bottle, "Games");
        assert_eq!(coordinator.presenter().infos, vec!["Preferences saved".to_string()]);
    }
}
