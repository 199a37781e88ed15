//! Shell completion scripts

use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io::stdout;

/// Write the completion script for `shell` to stdout.
pub fn completions(shell: Shell) {
    let mut cmd = crate::Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut stdout());
}
