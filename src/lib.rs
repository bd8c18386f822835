pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod platform;
pub mod ui;

pub use error::{HubError, Result};
pub use orchestrator::HubManager;
