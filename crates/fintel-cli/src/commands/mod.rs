//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `analysis` - Categorize, patterns, anomalies, predict and analyze
//! - `config` - Engine configuration commands
//! - `core` - Shared utilities (engine setup, input loading, argument parsing)
//! - `prompts` - Prompt library management commands
//! - `remote` - Remote model connectivity check

pub mod analysis;
pub mod config;
pub mod core;
pub mod prompts;
pub mod remote;

// Re-export command functions for main.rs
pub use analysis::*;
pub use config::*;
pub use core::*;
pub use prompts::*;
pub use remote::*;

/// Truncate a string to a maximum length in characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
