mod composite;
mod mask;
mod stylize;
mod utils;

use crate::cli::{Cli, Commands, GlobalOptions};
use stylemask::StyleMaskResult;

/// The main function to run the command based on CLI input.
pub fn run(cli: Cli) -> StyleMaskResult<()> {
    let Cli { global, command } = cli;
    dispatch(&global, command)
}

/// Dispatch the command to the appropriate handler.
fn dispatch(global: &GlobalOptions, command: Commands) -> StyleMaskResult<()> {
    match command {
        Commands::Mask(cmd) => mask::run(global, cmd),
        Commands::Composite(cmd) => composite::run(global, cmd),
        Commands::Stylize(cmd) => stylize::run(global, cmd),
    }
}
