//! Tracing field lines of a vector field.

pub mod adaptive;
pub mod field_line;
pub mod fixed_step;
pub mod stepping;
pub mod streamline;

use self::{
    field_line::{FieldLine, FieldLineSet},
    stepping::StepperFactory3,
};
use crate::{
    error::TracingError,
    field::FieldSolution,
    geometry::Point3,
    io::Verbosity,
    seeding,
};
use indicatif::ParallelProgressIterator;
use ndarray::ArrayViewD;
use rayon::prelude::*;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Floating-point precision to use for tracing.
#[allow(non_camel_case_types)]
pub type ftr = f64;

/// Configuration parameters shared by all tracers.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct TracerConfig {
    /// Absolute error tolerance for the integration.
    pub tolerance_absolute: ftr,
    /// Relative error tolerance for the integration.
    pub tolerance_relative: ftr,
    /// Maximum number of steps to take in each direction from a seed before
    /// giving up on reaching a boundary.
    pub max_steps: usize,
    /// Number of worker threads to use, or `None` to use the global thread pool.
    pub n_threads: Option<usize>,
    /// How much status information to print while tracing.
    #[cfg_attr(feature = "serialization", serde(skip))]
    pub verbosity: Verbosity,
}

impl TracerConfig {
    pub const DEFAULT_TOLERANCE_ABSOLUTE: ftr = 1e-4;
    pub const DEFAULT_TOLERANCE_RELATIVE: ftr = 1e-4;
    pub const DEFAULT_MAX_STEPS: usize = 1000;

    /// Checks that the parameters are valid.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` describing the first invalid parameter.
    pub fn validate(&self) -> Result<(), TracingError> {
        let invalid = |reason: &str| {
            Err(TracingError::InvalidConfig {
                reason: reason.to_string(),
            })
        };
        if !(self.tolerance_absolute > 0.0 && self.tolerance_absolute.is_finite()) {
            return invalid("absolute tolerance must be finite and larger than zero");
        }
        if !(self.tolerance_relative > 0.0 && self.tolerance_relative.is_finite()) {
            return invalid("relative tolerance must be finite and larger than zero");
        }
        if self.max_steps == 0 {
            return invalid("maximum number of steps must be larger than zero");
        }
        if self.n_threads == Some(0) {
            return invalid("number of threads must be larger than zero");
        }
        Ok(())
    }
}

impl Default for TracerConfig {
    fn default() -> Self {
        TracerConfig {
            tolerance_absolute: Self::DEFAULT_TOLERANCE_ABSOLUTE,
            tolerance_relative: Self::DEFAULT_TOLERANCE_RELATIVE,
            max_steps: Self::DEFAULT_MAX_STEPS,
            n_threads: None,
            verbosity: Verbosity::default(),
        }
    }
}

/// Defines the properties of a field line tracer.
///
/// All tracers accept the same seeds and configuration, report the same
/// errors and return one result per seed in seed order.
pub trait Tracer {
    /// Traces the field line through each of the given seed points.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` or `InvalidSeedValue` before any tracing is done.
    /// Errors for individual seeds are stored in the returned set.
    fn trace_points<S: FieldSolution>(
        &self,
        seeds: &[Point3<ftr>],
        field: &S,
        config: &TracerConfig,
    ) -> Result<FieldLineSet, TracingError>;

    /// Traces the field line through each seed in the given `(n, 3)` array of
    /// Cartesian seed coordinates.
    ///
    /// # Errors
    ///
    /// `InvalidConfig`, `InvalidShape` or `InvalidSeedValue` before any
    /// tracing is done. Errors for individual seeds are stored in the returned set.
    fn trace<S: FieldSolution>(
        &self,
        seeds: ArrayViewD<'_, ftr>,
        field: &S,
        config: &TracerConfig,
    ) -> Result<FieldLineSet, TracingError> {
        config.validate()?;
        let seeds = seeding::validate_seeds(seeds)?;
        self.trace_points(&seeds, field, config)
    }
}

/// Traces the field line through each of the given seed points in parallel,
/// using steppers from the given factory.
///
/// The configuration is assumed to be validated.
///
/// # Errors
///
/// `InvalidSeedValue` if any seed has non-finite coordinates, and
/// `InvalidConfig` if a dedicated thread pool could not be created.
pub fn trace_field_lines<S, Sf>(
    seeds: &[Point3<ftr>],
    field: &S,
    stepper_factory: &Sf,
    config: &TracerConfig,
) -> Result<FieldLineSet, TracingError>
where
    S: FieldSolution,
    Sf: StepperFactory3 + Sync,
{
    seeding::validate_seed_points(seeds)?;

    let verbosity = &config.verbosity;
    let max_steps = config.max_steps;

    if verbosity.print_messages() {
        println!("Tracing {} field lines", seeds.len());
    }

    let progress_bar = verbosity.create_progress_bar(seeds.len());
    let trace_all = move || -> Vec<Result<FieldLine, TracingError>> {
        seeds
            .par_iter()
            .map(|seed| field_line::trace_field_line(field, stepper_factory, seed, max_steps))
            .progress_with(progress_bar)
            .collect()
    };

    let field_lines = match config.n_threads {
        Some(n_threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build()
            .map_err(|err| TracingError::InvalidConfig {
                reason: format!("could not create thread pool: {}", err),
            })?
            .install(trace_all),
        None => trace_all(),
    };

    let field_line_set = FieldLineSet::new(field_lines, field.epoch());

    if verbosity.print_messages() {
        println!(
            "Found {} open and {} closed field lines",
            field_line_set.n_open(),
            field_line_set.n_closed()
        );
        let n_non_converged = field_line_set.n_non_converged();
        if n_non_converged > 0 {
            println!("{} field lines did not reach a boundary", n_non_converged);
        }
        let n_failed = field_line_set.n_failed();
        if n_failed > 0 {
            println!("Tracing failed for {} seeds", n_failed);
        }
    }

    Ok(field_line_set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(TracerConfig::default().validate(), Ok(()));
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let configs = [
            TracerConfig {
                tolerance_absolute: 0.0,
                ..TracerConfig::default()
            },
            TracerConfig {
                tolerance_relative: -1e-3,
                ..TracerConfig::default()
            },
            TracerConfig {
                tolerance_absolute: ftr::NAN,
                ..TracerConfig::default()
            },
            TracerConfig {
                max_steps: 0,
                ..TracerConfig::default()
            },
            TracerConfig {
                n_threads: Some(0),
                ..TracerConfig::default()
            },
        ];
        for config in configs {
            assert!(matches!(
                config.validate(),
                Err(TracingError::InvalidConfig { .. })
            ));
        }
    }
}
