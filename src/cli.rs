//! Command line interface.

pub mod build;
pub mod open_closed_map;
pub mod run;
pub mod utils;
