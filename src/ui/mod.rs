// UI module - interface coordination and the console front-end
//
// This module contains:
// - EventDispatcher: Carries job results from worker threads to the interface thread
// - InterfaceCoordinator: Single entry point for user intents, drives a Presenter
// - ConsolePresenter: Plain text Presenter plus the command parser used by main.rs

pub mod bridge;
pub mod console;
pub mod controller;

pub use bridge::{DispatchHandle, EventDispatcher};
pub use console::{ConsoleAction, ConsoleCommand, ConsoleError, ConsolePresenter, parse_command};
pub use controller::{InterfaceCoordinator, Presenter, UserIntent};
