//! Tracing with adaptive step size control.

use super::{
    field_line::FieldLineSet,
    ftr,
    stepping::rkf::{
        rkf23::RKF23StepperFactory3, rkf45::RKF45StepperFactory3, RKFStepperConfig,
        RKFStepperType,
    },
    trace_field_lines, Tracer, TracerConfig,
};
use crate::{error::TracingError, field::FieldSolution, geometry::Point3};

/// Tracer using an embedded Runge–Kutta–Fehlberg scheme with PI step size control.
///
/// The error tolerances of the stepper are taken from the `TracerConfig`
/// passed when tracing, while the remaining stepper parameters are fixed at
/// construction.
#[derive(Clone, Debug)]
pub struct AdaptiveTracer {
    stepper_type: RKFStepperType,
    stepper_config: RKFStepperConfig,
}

impl AdaptiveTracer {
    /// Creates a new adaptive tracer using the given stepper.
    pub fn new(stepper_type: RKFStepperType, stepper_config: RKFStepperConfig) -> Self {
        stepper_config.validate();
        AdaptiveTracer {
            stepper_type,
            stepper_config,
        }
    }

    /// Returns the type of stepper used by the tracer.
    pub fn stepper_type(&self) -> RKFStepperType {
        self.stepper_type
    }

    /// Returns the stepper configuration parameters.
    pub fn stepper_config(&self) -> &RKFStepperConfig {
        &self.stepper_config
    }

    fn stepper_config_with_tolerances(&self, config: &TracerConfig) -> RKFStepperConfig {
        RKFStepperConfig {
            absolute_tolerance: config.tolerance_absolute,
            relative_tolerance: config.tolerance_relative,
            ..self.stepper_config.clone()
        }
    }
}

impl Default for AdaptiveTracer {
    fn default() -> Self {
        Self::new(RKFStepperType::RKF45, RKFStepperConfig::default())
    }
}

impl Tracer for AdaptiveTracer {
    fn trace_points<S: FieldSolution>(
        &self,
        seeds: &[Point3<ftr>],
        field: &S,
        config: &TracerConfig,
    ) -> Result<FieldLineSet, TracingError> {
        config.validate()?;
        let stepper_config = self.stepper_config_with_tolerances(config);

        if config.verbosity.print_messages() {
            println!(
                "Using {:?} stepper with tolerances {:e} (absolute) and {:e} (relative)",
                self.stepper_type, config.tolerance_absolute, config.tolerance_relative
            );
        }

        match self.stepper_type {
            RKFStepperType::RKF23 => trace_field_lines(
                seeds,
                field,
                &RKF23StepperFactory3::new(stepper_config),
                config,
            ),
            RKFStepperType::RKF45 => trace_field_lines(
                seeds,
                field,
                &RKF45StepperFactory3::new(stepper_config),
                config,
            ),
        }
    }
}
