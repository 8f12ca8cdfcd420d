//! CLI module for aircast
//!
//! This module contains the argument types, command handlers and output helpers.

mod args;
mod commands;
mod logging;

pub use args::{Cli, Command, DriftArgs, GenerateArgs, PredictArgs, SearchArgs, TrainArgs};
pub use commands::run_command;
pub use logging::{init_tracing, log, LogLevel};
