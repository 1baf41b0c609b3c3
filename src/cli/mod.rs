//! CLI module
//!
//! Provides:
//! - Argument parsing for the train, serve and predict modes
//! - Mode dispatch with settings loaded once per process

pub mod args;
pub mod dispatch;

// Re-exports
pub use args::{Args, Mode, PredictArgs};
pub use dispatch::run_cli_mode;
