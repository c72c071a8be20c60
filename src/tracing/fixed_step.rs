//! Tracing with a fixed step length.

use super::{
    field_line::FieldLineSet,
    ftr,
    stepping::rk4::{RK4StepperConfig, RK4StepperFactory3},
    trace_field_lines, Tracer, TracerConfig,
};
use crate::{error::TracingError, field::FieldSolution, geometry::Point3};

/// Tracer taking classical fourth-order Runge–Kutta steps of fixed length.
///
/// Each field line ends exactly on the boundary it crosses. The error
/// tolerances of the `TracerConfig` are validated but do not affect the steps.
#[derive(Clone, Debug)]
pub struct FixedStepTracer {
    stepper_config: RK4StepperConfig,
}

impl FixedStepTracer {
    /// Creates a new fixed step tracer with the given stepper configuration.
    pub fn new(stepper_config: RK4StepperConfig) -> Self {
        stepper_config.validate();
        FixedStepTracer { stepper_config }
    }

    /// Creates a new fixed step tracer taking steps of the given length.
    pub fn with_step_length(step_length: ftr) -> Self {
        Self::new(RK4StepperConfig { step_length })
    }

    /// Returns the length of each step.
    pub fn step_length(&self) -> ftr {
        self.stepper_config.step_length
    }
}

impl Default for FixedStepTracer {
    fn default() -> Self {
        Self::new(RK4StepperConfig::default())
    }
}

impl Tracer for FixedStepTracer {
    fn trace_points<S: FieldSolution>(
        &self,
        seeds: &[Point3<ftr>],
        field: &S,
        config: &TracerConfig,
    ) -> Result<FieldLineSet, TracingError> {
        config.validate()?;

        if config.verbosity.print_messages() {
            println!(
                "Using RK4 stepper with step length {}",
                self.stepper_config.step_length
            );
        }

        trace_field_lines(
            seeds,
            field,
            &RK4StepperFactory3::new(self.stepper_config.clone()),
            config,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        field::{analytic::DipoleSourceSurfaceField, Shell},
        tracing::{field_line::Polarity, streamline::Termination},
    };
    use approx::assert_abs_diff_eq;
    use chrono::Utc;

    #[test]
    fn equatorial_dipole_line_is_closed() {
        let field = DipoleSourceSurfaceField::new(1.0, 2.5, Utc::now());
        let tracer = FixedStepTracer::with_step_length(5e-3);
        let field_lines = tracer
            .trace_points(&[Point3::new(1.3, 0.0, 0.0)], &field, &TracerConfig::default())
            .unwrap();
        let field_line = field_lines.get(0).unwrap().as_ref().unwrap();
        assert_eq!(field_line.polarity(), Some(Polarity::Closed));
        assert_eq!(field_line.start().termination, Termination::ReachedInner);
        assert_eq!(field_line.end().termination, Termination::ReachedInner);
        let inner_radius = Shell::with_source_surface(2.5).inner_radius();
        assert_abs_diff_eq!(field_line.start().position.radius(), inner_radius, epsilon = 1e-9);
        assert_abs_diff_eq!(field_line.end().position.radius(), inner_radius, epsilon = 1e-9);
    }

    #[test]
    #[should_panic]
    fn zero_step_length_is_rejected() {
        FixedStepTracer::with_step_length(0.0);
    }
}
