mod commands;
pub mod exit_codes;
pub mod output;
mod watch;

pub use commands::{Cli, Commands, ConfigCommands};

use anyhow::Result;

pub fn run(cli: Cli) -> Result<()> {
    commands::execute(cli)
}
