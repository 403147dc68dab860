//! Shell completion generation for stagetime

use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io::Write;

use super::cli::Cli;

/// Write the completion script for `shell` to `out`.
pub fn write_completions<W: Write>(shell: Shell, out: &mut W) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, out);
}

/// Generate shell completions for the given shell on stdout
pub fn print_completions(shell: Shell) {
    write_completions(shell, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(shell: Shell) -> String {
        let mut buf = Vec::new();
        write_completions(shell, &mut buf);
        String::from_utf8(buf).unwrap_or_default()
    }

    #[test]
    fn test_completions_bash() {
        let script = script(Shell::Bash);
        assert!(!script.is_empty());
        assert!(script.contains("stagetime"));
        assert!(script.contains("--group-by"));
    }

    #[test]
    fn test_completions_zsh_and_fish() {
        assert!(script(Shell::Zsh).contains("stagetime"));
        assert!(script(Shell::Fish).contains("stagetime"));
    }
}
