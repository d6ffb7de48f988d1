//! Shared types and utilities for a3k
//!
//! This crate contains functionality used by both the `a3k-core` engine
//! and the `a3k` command line: the configuration file, the debug flags
//! that map onto tracing targets, performance timing, and SQL text helpers.

pub mod config;
pub mod debug;
pub mod perf;
pub mod text;

// Re-export commonly used types
pub use config::{Config, a3k_dir, config_path};
pub use debug::DebugFlag;
pub use perf::Timer;

/// Program name used in user agents and messages.
pub const PROGRAM_NAME: &str = "a3k";

/// Return the program's version string.
pub fn program_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Return the User-Agent sent with HTTP requests.
pub fn user_agent() -> String {
    format!("{PROGRAM_NAME}/{}", program_version())
}
