//! Function for building the command line hierarchy.

use super::open_closed_map::create_open_closed_map_subcommand;
use clap::{self, Arg, Command};

/// Build the `pfss-trace` command line hierarchy.
pub fn build() -> Command<'static> {
    Command::new(clap::crate_name!())
        .version(clap::crate_version!())
        .author(clap::crate_authors!())
        .about(clap::crate_description!())
        .disable_help_subcommand(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("timing")
                .short('t')
                .long("timing")
                .help("Display elapsed time when done"),
        )
        .subcommand(create_open_closed_map_subcommand())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_hierarchy_is_consistent() {
        build().debug_assert();
    }
}
