//! User interface and interaction
//!
//! CLI parsing, result rendering, progress reporting and shell completion
//! generation.

pub mod cli;
pub mod color;
pub mod completion;
pub mod output;
pub mod progress;

// Re-export commonly used items
pub use cli::{Cli, Commands, FilterArgs, ProbeArgs, cli_to_config};
pub use completion::print_completions;
pub use output::OutputFormat;
pub use progress::ProgressReporter;
