//! Command-line interface module
//!
//! Provides argument parsing and command dispatch.

pub mod args;
pub mod commands;

pub use args::{Args, ParsedArguments, ParsedArgumentsBuilder, parse_args, usage};
pub use commands::{COMMANDS, CommandSpec, Dispatcher, Output, Plan, lookup, report};
