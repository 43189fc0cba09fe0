//! Command-line interface

pub mod args;
pub mod commands;
pub mod context;

pub use args::{Cli, Commands, LogFormat};
pub use context::CommandContext;
