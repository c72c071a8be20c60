//! Stepping along field lines of a vector field.

pub mod rk4;
pub mod rkf;

use super::ftr;
use crate::{
    field::FieldSolution,
    geometry::{Point3, Vec3},
};

/// Stepping along the field line in the same direction as the field or opposite.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SteppingSense {
    Same,
    Opposite,
}

impl SteppingSense {
    /// Returns +1 for stepping along the field and -1 for stepping against it.
    pub fn sign(self) -> ftr {
        match self {
            Self::Same => 1.0,
            Self::Opposite => -1.0,
        }
    }
}

/// A stepper result which is either OK (with an arbitrary value) or stopped (with a cause).
#[derive(Clone, Debug)]
pub enum StepperResult<T> {
    Ok(T),
    Stopped(StoppingCause),
}

/// Reason for terminating stepping.
#[derive(Clone, PartialEq, Debug)]
pub enum StoppingCause {
    /// The field vanishes at the given position.
    Null(Point3<ftr>),
    /// The field is not finite at the given position.
    InvalidField(Point3<ftr>),
    /// The step length had to be reduced too many times in a row.
    TooManyAttempts,
}

/// Defines the properties of a stepping scheme.
pub trait Stepper3 {
    /// Places the stepper at the given position inside the field.
    ///
    /// # Returns
    ///
    /// A `StepperResult<()>` which is either:
    ///
    /// - `Ok`: Stepper placement succeeded.
    /// - `Stopped`: Contains a `StoppingCause` indicating why stepper placement failed.
    fn place<S: FieldSolution>(
        &mut self,
        field: &S,
        sense: SteppingSense,
        position: &Point3<ftr>,
    ) -> StepperResult<()>;

    /// Performs a step from the current position.
    ///
    /// # Returns
    ///
    /// A `StepperResult<()>` which is either:
    ///
    /// - `Ok`: The step succeeded.
    /// - `Stopped`: Contains a `StoppingCause` indicating why the step failed.
    fn step<S: FieldSolution>(&mut self, field: &S, sense: SteppingSense) -> StepperResult<()>;

    /// Returns a reference to the current stepper position.
    fn position(&self) -> &Point3<ftr>;

    /// Returns the unit stepping direction at the current position.
    fn direction(&self) -> &Vec3<ftr>;

    /// Returns the field vector sampled at the current position.
    fn field_vector(&self) -> &Vec3<ftr>;

    /// Returns the current distance of the stepper along the field line.
    fn distance(&self) -> ftr;

    /// Returns a reference to the position before the last step.
    fn previous_position(&self) -> &Point3<ftr>;

    /// Returns the unit stepping direction at the position before the last step.
    fn previous_direction(&self) -> &Vec3<ftr>;

    /// Returns the length of the last step.
    fn previous_step_length(&self) -> ftr;
}

/// Defines the properties of a 3D stepper factory structure.
pub trait StepperFactory3 {
    type Output: Stepper3;
    fn produce(&self) -> Self::Output;
}

/// Samples the field at the given position and computes the unit stepping direction.
///
/// Positions outside the shell are moved radially onto the closest boundary
/// before sampling.
///
/// # Returns
///
/// A `StepperResult` which is either:
///
/// - `Ok`: Contains the field vector and the stepping direction.
/// - `Stopped`: The field is zero or not finite at the position.
pub fn compute_direction<S: FieldSolution>(
    field: &S,
    sense: SteppingSense,
    position: &Point3<ftr>,
) -> StepperResult<(Vec3<ftr>, Vec3<ftr>)> {
    let position = field.shell().clamp_into(position);
    let field_vector = field.evaluate(&position);
    if !field_vector.is_finite() {
        return StepperResult::Stopped(StoppingCause::InvalidField(position));
    }
    if field_vector.is_zero() {
        return StepperResult::Stopped(StoppingCause::Null(position));
    }
    let mut direction = field_vector.clone();
    direction.normalize();
    if sense == SteppingSense::Opposite {
        direction.reverse();
    }
    StepperResult::Ok((field_vector, direction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{analytic::RadialMonopoleField, Shell};
    use approx::assert_abs_diff_eq;
    use chrono::Utc;

    #[test]
    fn opposite_sense_reverses_direction() {
        let field = RadialMonopoleField::new(1.0, Shell::with_source_surface(2.0), Utc::now());
        let position = Point3::new(1.5, 0.0, 0.0);
        match compute_direction(&field, SteppingSense::Opposite, &position) {
            StepperResult::Ok((field_vector, direction)) => {
                assert!(field_vector.radial_component_at(&position) > 0.0);
                assert_abs_diff_eq!(direction.radial_component_at(&position), -1.0);
            }
            StepperResult::Stopped(cause) => panic!("Unexpected stop: {:?}", cause),
        }
    }

    #[test]
    fn direction_is_sampled_on_boundary_for_points_outside() {
        let field = RadialMonopoleField::new(1.0, Shell::with_source_surface(2.0), Utc::now());
        match compute_direction(&field, SteppingSense::Same, &Point3::new(0.0, 0.0, 4.0)) {
            StepperResult::Ok((field_vector, _)) => {
                assert_abs_diff_eq!(field_vector.length(), 0.25, epsilon = 1e-14);
            }
            StepperResult::Stopped(cause) => panic!("Unexpected stop: {:?}", cause),
        }
    }
}
