//! winecellar - Manager for Wine bottles
//!
//! Main entry point for the console application.
//!
//! # Overview
//!
//! Initializes:
//! - Configuration loading ([`ConfigManager`], `config.yaml` + `WINECELLAR_*` env)
//! - Logging infrastructure (daily file rotation + optional stderr output)
//! - Tokio runtime (subprocess I/O and timeouts for Wine commands)
//! - State management ([`StateManager`])
//! - [`BottleManager`] and the [`InterfaceCoordinator`] with a console presenter
//!
//! Threading model:
//! - **Main thread**: the interface thread; reads commands and renders results
//! - **Lifecycle worker**: one std::thread per create/update/clone/delete/refresh
//! - **Install threads**: one std::thread per package install, joined before exit
//! - **Tokio workers**: drive the Wine subprocesses
//!
//! # Execution Flow
//!
//! 1. Load `config.yaml` from the platform config directory
//! 2. Initialize logging → `<config dir>/logs/winecellar.<date>`
//! 3. Create the tokio runtime
//! 4. Scan the prefixes directory and select the default bottle
//! 5. Read commands from stdin until `quit` or end of input
//! 6. Wait for a running job and any package installs, then shut down the
//!    runtime with a 5s timeout

use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use winecellar::services::WineRunner;
use winecellar::ui::{
    ConsoleAction, ConsolePresenter, EventDispatcher, InterfaceCoordinator, Presenter, UserIntent,
    parse_command,
};
use winecellar::{APP_NAME, BottleManager, ConfigManager, StateManager, VERSION};

fn main() -> Result<()> {
    let config_manager = ConfigManager::new(ConfigManager::default_config_dir()?)?;
    let preferences = config_manager.load_general_config()?;

    let _log_guard = winecellar::logging::setup_logging_with_console(
        &config_manager.log_dir(),
        "winecellar",
        preferences.debug_logging,
        preferences.log_to_console,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("winecellar-io")
        .build()?;

    let timeout = match preferences.command_timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    let runner = Arc::new(WineRunner::new(runtime.handle().clone(), timeout));

    let prefixes_dir = ConfigManager::prefixes_dir(&preferences)?;
    tracing::info!("Using prefixes directory {}", prefixes_dir);

    let dispatcher = EventDispatcher::new();
    let manager = BottleManager::new(
        StateManager::new(),
        runner,
        prefixes_dir,
        dispatcher.clone_handle(),
    );
    let presenter = ConsolePresenter::new(io::stdout(), false);
    let default_bottle = preferences.default_bottle.clone();
    let mut coordinator =
        InterfaceCoordinator::new(manager, dispatcher, presenter, config_manager, preferences);

    coordinator.handle_intent(UserIntent::Refresh);
    coordinator.wait_for_job();
    if !default_bottle.is_empty() {
        coordinator.handle_intent(UserIntent::Select(Some(default_bottle)));
    }

    run_console(&mut coordinator)?;

    let pending = coordinator.manager().pending_installs();
    if pending > 0 {
        println!("Waiting for {} package install(s) to finish", pending);
    }
    // Shutting the runtime down kills any Wine child still running
    coordinator.wait_for_all();
    tracing::info!("Shutting down");
    runtime.shutdown_timeout(Duration::from_secs(5));
    tracing::info!("Application shutdown complete");

    Ok(())
}

/// Read and execute commands until `quit` or end of input
fn run_console(
    coordinator: &mut InterfaceCoordinator<ConsolePresenter<io::Stdout>>,
) -> Result<()> {
    println!("{} {} - type 'help' for commands", APP_NAME, VERSION);
    let stdin = io::stdin();

    loop {
        coordinator.dispatch_signals();
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        // Results that arrived while waiting for input
        coordinator.dispatch_signals();

        let active = coordinator.manager().active();
        let prefer_wine64 = coordinator.preferences().prefer_wine64;
        let action = match parse_command(&line, active.as_ref(), prefer_wine64) {
            Ok(Some(action)) => action,
            Ok(None) => continue,
            Err(e) if e.is_help() => {
                println!("{}", e);
                continue;
            }
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        match action {
            ConsoleAction::Intent(intent) => coordinator.handle_intent(intent),
            ConsoleAction::List => {
                let bottles = coordinator.manager().bottles();
                let active = active.map(|b| b.prefix);
                coordinator.presenter_mut().show_bottles(&bottles, active.as_deref());
            }
            ConsoleAction::Show => match active {
                Some(bottle) => coordinator.presenter_mut().show_details(&bottle),
                None => println!("No bottle selected"),
            },
            ConsoleAction::Wait => coordinator.wait_for_all(),
            ConsoleAction::SetDefault(name) => {
                let mut preferences = coordinator.preferences().clone();
                preferences.default_bottle = name;
                coordinator.handle_intent(UserIntent::SavePreferences(preferences));
            }
            ConsoleAction::Quit => return Ok(()),
        }
    }
}
