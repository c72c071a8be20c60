//! Function for running the command line program.

use super::{build, open_closed_map::run_open_closed_map_subcommand};
use clap::ArgMatches;
use std::time::Instant;

/// Runs the `pfss-trace` command line program.
pub fn run() {
    run_with_args(build::build().get_matches());
}

/// Runs the `pfss-trace` command line program with the given parsed arguments.
pub fn run_with_args(arguments: ArgMatches) {
    let start_instant = Instant::now();

    if let Some(open_closed_map_arguments) = arguments.subcommand_matches("open-closed-map") {
        run_open_closed_map_subcommand(open_closed_map_arguments);
    }

    if arguments.is_present("timing") {
        println!("Elapsed time: {} s", start_instant.elapsed().as_secs_f64());
    }
}
