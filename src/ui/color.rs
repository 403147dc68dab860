//! Terminal colors for text output

use crate::core::constants::display::{FAILURE_RATE_WARN, YIELD_GOOD};

pub struct Colors;

impl Colors {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";

    pub const GREEN: &'static str = "\x1b[32m";
    pub const YELLOW: &'static str = "\x1b[33m";

    pub const BRIGHT_RED: &'static str = "\x1b[91m";
    pub const BRIGHT_GREEN: &'static str = "\x1b[92m";
    pub const BRIGHT_CYAN: &'static str = "\x1b[96m";
}

/// Apply color to text if terminal supports it
pub fn colorize(text: &str, color: &str) -> String {
    if supports_formatting() {
        format!("{}{}{}", color, text, Colors::RESET)
    } else {
        text.to_string()
    }
}

pub fn bold(text: &str) -> String {
    colorize(text, Colors::BOLD)
}

/// Red above the warning threshold, green otherwise.
pub fn colorize_failure_rate(rate: f64) -> String {
    let text = format!("{rate:.2}%");
    if rate > FAILURE_RATE_WARN {
        colorize(&text, Colors::BRIGHT_RED)
    } else {
        colorize(&text, Colors::BRIGHT_GREEN)
    }
}

pub fn colorize_yield(yield_pct: f64) -> String {
    let text = format!("{yield_pct:.2}%");
    if yield_pct >= YIELD_GOOD {
        colorize(&text, Colors::BRIGHT_GREEN)
    } else {
        colorize(&text, Colors::YELLOW)
    }
}

/// Terminal capability detection
pub fn supports_formatting() -> bool {
    use std::env;
    use std::io::IsTerminal;

    if env::var("NO_COLOR").is_ok() || env::var("FORCE_COLOR").as_deref() == Ok("0") {
        return false;
    }

    if env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    // Disable formatting when running tests
    if cfg!(test) || env::var("RUST_TEST_TIME_UNIT").is_ok() {
        return false;
    }

    if !std::io::stdout().is_terminal() {
        return false;
    }

    match env::var("TERM") {
        Ok(term) if term == "dumb" || term.is_empty() => false,
        Ok(term) => {
            term.contains("color")
                || term.contains("256")
                || term.starts_with("xterm")
                || term.starts_with("screen")
                || term.starts_with("tmux")
                || term == "linux"
        }
        Err(_) => false,
    }
}
