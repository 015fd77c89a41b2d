//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (path, list, get, set, init)
//! - [`run`] - Replay a recorded track through the tracking runtime

pub mod config;
pub mod run;
