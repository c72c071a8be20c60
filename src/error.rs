//! Error types and macros for error reporting.

use crate::{geometry::Point3, tracing::ftr};
use std::{error, fmt};

#[cfg(feature = "serialization")]
use serde::Serialize;

/// Errors arising from seed validation, configuration or the tracing of individual field lines.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub enum TracingError {
    /// The seed batch is not an (n, 3) array.
    InvalidShape {
        /// Shape of the rejected seed array.
        shape: Vec<usize>,
    },
    /// A seed coordinate is NaN or infinite.
    InvalidSeedValue {
        /// Index of the offending seed in the batch.
        seed_index: usize,
        /// The offending coordinates.
        coords: [ftr; 3],
    },
    /// A seed lies outside the shell on which the field is defined.
    SeedOutsideShell {
        /// The offending seed.
        seed: Point3<ftr>,
        /// Distance of the seed from the origin.
        radius: ftr,
    },
    /// The tracer configuration is invalid.
    InvalidConfig {
        /// What went wrong.
        reason: String,
    },
    /// The field vanishes at a point on the field line, so no direction is defined.
    NullField {
        /// Where the null was encountered.
        position: Point3<ftr>,
    },
    /// The field has non-finite components at a point on the field line.
    InvalidFieldValue {
        /// Where the invalid value was encountered.
        position: Point3<ftr>,
    },
    /// The traced line cannot be given a consistent polarity.
    Classification {
        /// What went wrong.
        reason: String,
    },
    /// The requested quantity is not defined for this field line.
    NotApplicable {
        /// Name of the requested quantity.
        quantity: &'static str,
        /// Why it is not defined.
        reason: &'static str,
    },
}

impl fmt::Display for TracingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidShape { shape } => write!(
                f,
                "seeds must be a (n, 3) shaped array (got shape {:?})",
                shape
            ),
            Self::InvalidSeedValue { seed_index, coords } => write!(
                f,
                "seed {} has non-finite coordinates {:?}",
                seed_index, coords
            ),
            Self::SeedOutsideShell { seed, radius } => write!(
                f,
                "seed {} at radius {} lies outside the field shell",
                seed, radius
            ),
            Self::InvalidConfig { reason } => write!(f, "invalid tracer configuration: {}", reason),
            Self::NullField { position } => write!(f, "null field encountered at {}", position),
            Self::InvalidFieldValue { position } => {
                write!(f, "non-finite field value encountered at {}", position)
            }
            Self::Classification { reason } => {
                write!(f, "could not classify field line: {}", reason)
            }
            Self::NotApplicable { quantity, reason } => {
                write!(f, "{} is not applicable: {}", quantity, reason)
            }
        }
    }
}

impl error::Error for TracingError {}

#[cfg(not(feature = "for-testing"))]
#[macro_export]
macro_rules! exit_with_error {
    ($($print_arg:tt)*) => {{
        eprintln!($($print_arg)*);
        quit::with_code(1);
    }};
}

#[cfg(feature = "for-testing")]
#[macro_export]
macro_rules! exit_with_error {
    ($($print_arg:tt)*) => {{
        panic!($($print_arg)*);
    }};
}

#[macro_export]
macro_rules! exit_on_error {
    ($result:expr, $($print_arg:tt)*) => {
        match $result {
            Ok(value) => value,
            Err(err) => {
                $crate::exit_with_error!($($print_arg)*, err)
            }
        }
    };
}

#[macro_export]
macro_rules! exit_on_false {
    ($logic:expr, $($print_arg:tt)*) => {
        if $logic {
            true
        } else {
            $crate::exit_with_error!($($print_arg)*)
        }
    };
}
