//! File input/output and status reporting.

pub mod utils;

use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;

/// How much status information to print while working.
#[derive(Clone)]
pub enum Verbosity {
    Quiet,
    Messages,
    Progress(ProgressStyle),
}

impl Verbosity {
    /// Whether non-critical status messages should be printed.
    pub fn print_messages(&self) -> bool {
        !matches!(self, Self::Quiet)
    }

    /// Creates a progress bar for the given number of items, which is hidden
    /// unless progress should be shown.
    pub fn create_progress_bar(&self, length: usize) -> ProgressBar {
        match self {
            Self::Progress(style) => ProgressBar::new(length as u64).with_style(style.clone()),
            _ => ProgressBar::hidden(),
        }
    }
}

impl fmt::Debug for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Quiet => "Quiet",
            Self::Messages => "Messages",
            Self::Progress(_) => "Progress",
        })
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Self::Quiet
    }
}
