//! The `pfss_trace` crate traces magnetic field lines through potential field
//! source surface solutions and classifies them as open or closed.

pub mod error;
pub mod field;
pub mod geometry;
pub mod io;
pub mod num;
pub mod seeding;
pub mod tracing;

#[cfg(feature = "cli")]
pub mod cli;
