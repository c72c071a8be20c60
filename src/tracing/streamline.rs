//! Integration of a single streamline from a seed point to a stopping condition.

use super::{
    ftr,
    stepping::{Stepper3, StepperResult, SteppingSense, StoppingCause},
};
use crate::{
    error::TracingError,
    field::{FieldSolution, Shell, ShellLocation},
    geometry::{Point3, Vec3},
};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Why the integration of a streamline ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum Termination {
    /// The streamline ended on the inner boundary of the shell.
    ReachedInner,
    /// The streamline ended on the outer boundary of the shell.
    ReachedOuter,
    /// The maximum number of steps was taken without reaching a boundary.
    MaxStepsExceeded,
    /// The step length collapsed without any step being accepted.
    TooManyAttempts,
}

impl Termination {
    /// Whether the streamline ended on one of the shell boundaries.
    pub fn is_converged(self) -> bool {
        matches!(self, Self::ReachedInner | Self::ReachedOuter)
    }
}

/// A directed path through the field from a seed point to a stopping point.
#[derive(Clone, Debug)]
pub struct Streamline {
    positions: Vec<Point3<ftr>>,
    termination: Termination,
    end_field: Vec3<ftr>,
}

impl Streamline {
    /// Returns the positions along the streamline, starting with the seed.
    pub fn positions(&self) -> &[Point3<ftr>] {
        &self.positions
    }

    /// Returns why the integration ended.
    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// Returns the field vector at the final position.
    pub fn end_field(&self) -> &Vec3<ftr> {
        &self.end_field
    }

    /// Returns the final position.
    pub fn end_position(&self) -> &Point3<ftr> {
        self.positions
            .last()
            .expect("Streamline always contains the seed")
    }

    /// Consumes the streamline and returns its parts.
    pub fn into_parts(self) -> (Vec<Point3<ftr>>, Termination, Vec3<ftr>) {
        (self.positions, self.termination, self.end_field)
    }
}

/// Integrates a streamline through the given field, following the unit
/// field direction (or its opposite) from the seed until a boundary of the
/// shell is reached or `max_steps` steps have been accepted.
///
/// Seeds within the boundary tolerance of the shell are moved radially onto
/// the boundary. When a step crosses a boundary, the crossing is located on the
/// cubic Hermite interpolant of the step and the final position is placed
/// exactly on the boundary.
///
/// # Errors
///
/// - `SeedOutsideShell` if the seed lies outside the shell.
/// - `NullField` if the field vanishes at a point on the path.
/// - `InvalidFieldValue` if the field is not finite at a point on the path.
pub fn integrate_streamline<S, St>(
    field: &S,
    mut stepper: St,
    seed: &Point3<ftr>,
    sense: SteppingSense,
    max_steps: usize,
) -> Result<Streamline, TracingError>
where
    S: FieldSolution,
    St: Stepper3,
{
    let shell = field.shell();
    let seed_location = shell.locate(seed);
    let start_position = match seed_location {
        ShellLocation::BelowInner | ShellLocation::AboveOuter => {
            return Err(TracingError::SeedOutsideShell {
                seed: seed.clone(),
                radius: seed.radius(),
            })
        }
        ShellLocation::OnInner => seed.with_radius(shell.inner_radius()),
        ShellLocation::OnOuter => seed.with_radius(shell.outer_radius()),
        ShellLocation::Inside => seed.clone(),
    };

    if let StepperResult::Stopped(cause) = stepper.place(field, sense, &start_position) {
        return Err(stopping_cause_to_error(cause));
    }

    // A seed on a boundary with the direction pointing out of the shell is already at its end
    let radial_direction = stepper.direction().radial_component_at(&start_position);
    match seed_location {
        ShellLocation::OnInner if radial_direction < 0.0 => {
            return Ok(Streamline {
                positions: vec![start_position],
                termination: Termination::ReachedInner,
                end_field: stepper.field_vector().clone(),
            })
        }
        ShellLocation::OnOuter if radial_direction > 0.0 => {
            return Ok(Streamline {
                positions: vec![start_position],
                termination: Termination::ReachedOuter,
                end_field: stepper.field_vector().clone(),
            })
        }
        _ => {}
    }

    let mut positions = vec![start_position];

    for _ in 0..max_steps {
        match stepper.step(field, sense) {
            StepperResult::Ok(_) => {}
            StepperResult::Stopped(StoppingCause::TooManyAttempts) => {
                return Ok(Streamline {
                    positions,
                    termination: Termination::TooManyAttempts,
                    end_field: stepper.field_vector().clone(),
                })
            }
            StepperResult::Stopped(cause) => return Err(stopping_cause_to_error(cause)),
        }

        let boundary = match shell.locate(stepper.position()) {
            ShellLocation::BelowInner | ShellLocation::OnInner => {
                Some((shell.inner_radius(), Termination::ReachedInner))
            }
            ShellLocation::OnOuter | ShellLocation::AboveOuter => {
                Some((shell.outer_radius(), Termination::ReachedOuter))
            }
            ShellLocation::Inside => None,
        };

        if let Some((boundary_radius, termination)) = boundary {
            let end_position = locate_boundary_crossing(&stepper, boundary_radius, shell);
            let end_field = field.evaluate(&end_position);
            positions.push(end_position);
            return Ok(Streamline {
                positions,
                termination,
                end_field,
            });
        }

        positions.push(stepper.position().clone());
    }

    Ok(Streamline {
        positions,
        termination: Termination::MaxStepsExceeded,
        end_field: stepper.field_vector().clone(),
    })
}

fn stopping_cause_to_error(cause: StoppingCause) -> TracingError {
    match cause {
        StoppingCause::Null(position) => TracingError::NullField { position },
        StoppingCause::InvalidField(position) => TracingError::InvalidFieldValue { position },
        StoppingCause::TooManyAttempts => {
            unreachable!("Running out of step attempts is reported as a termination")
        }
    }
}

/// Finds the point where the last step of the stepper crosses the sphere with
/// the given radius, and returns it moved exactly onto the sphere.
fn locate_boundary_crossing<St: Stepper3>(
    stepper: &St,
    boundary_radius: ftr,
    shell: &Shell,
) -> Point3<ftr> {
    const MAX_BISECTIONS: u32 = 60;

    let start = stepper.previous_position();
    let end = stepper.position();
    let step_length = stepper.previous_step_length();
    let interpolate = |fraction: ftr| {
        hermite_interpolate(
            start,
            stepper.previous_direction(),
            end,
            stepper.direction(),
            step_length,
            fraction,
        )
    };

    let start_beyond = beyond_boundary(shell, boundary_radius, start);
    let mut inside_fraction: ftr = 0.0;
    let mut beyond_fraction: ftr = 1.0;

    // The step may start on the boundary it crosses, in which case the whole step lies beyond it
    if !start_beyond {
        for _ in 0..MAX_BISECTIONS {
            let fraction = 0.5 * (inside_fraction + beyond_fraction);
            if beyond_boundary(shell, boundary_radius, &interpolate(fraction)) {
                beyond_fraction = fraction;
            } else {
                inside_fraction = fraction;
            }
        }
    }

    let crossing = interpolate(beyond_fraction);
    if crossing.radius() > 0.0 {
        crossing.with_radius(boundary_radius)
    } else {
        end.with_radius(boundary_radius)
    }
}

fn beyond_boundary(shell: &Shell, boundary_radius: ftr, point: &Point3<ftr>) -> bool {
    let radius = point.radius();
    if boundary_radius <= shell.inner_radius() {
        radius <= boundary_radius
    } else {
        radius >= boundary_radius
    }
}

/// Evaluates the cubic Hermite interpolant of a step of the given length
/// between two positions with the given unit tangents.
fn hermite_interpolate(
    start: &Point3<ftr>,
    start_tangent: &Vec3<ftr>,
    end: &Point3<ftr>,
    end_tangent: &Vec3<ftr>,
    step_length: ftr,
    fraction: ftr,
) -> Point3<ftr> {
    let t = fraction;
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    (start.to_vec3() * h00
        + start_tangent * (h10 * step_length)
        + end.to_vec3() * h01
        + end_tangent * (h11 * step_length))
        .to_point3()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        field::analytic::{DipoleSourceSurfaceField, RadialMonopoleField, ZeroField},
        tracing::{
            field_line,
            stepping::{
                rkf::{rkf45::RKF45StepperFactory3, RKFStepperConfig},
                StepperFactory3,
            },
        },
    };
    use approx::assert_abs_diff_eq;
    use chrono::{DateTime, Utc};

    fn stepper() -> impl Stepper3 {
        RKF45StepperFactory3::new(RKFStepperConfig::default()).produce()
    }

    /// Field that cannot be evaluated anywhere.
    struct NanField {
        shell: Shell,
        epoch: DateTime<Utc>,
    }

    impl FieldSolution for NanField {
        fn evaluate(&self, _point: &Point3<ftr>) -> Vec3<ftr> {
            Vec3::new(ftr::NAN, 0.0, 0.0)
        }

        fn shell(&self) -> &Shell {
            &self.shell
        }

        fn epoch(&self) -> DateTime<Utc> {
            self.epoch
        }
    }

    #[test]
    fn outward_streamline_ends_exactly_on_outer_boundary() {
        let field = RadialMonopoleField::new(1.0, Shell::with_source_surface(2.5), Utc::now());
        let seed = Point3::from_spherical(1.0, 0.8, 2.0);
        let streamline =
            integrate_streamline(&field, stepper(), &seed, SteppingSense::Same, 1000).unwrap();
        assert_eq!(streamline.termination(), Termination::ReachedOuter);
        assert_abs_diff_eq!(streamline.end_position().radius(), 2.5, epsilon = 1e-12);
        let (_, theta, phi) = streamline.end_position().to_spherical();
        assert_abs_diff_eq!(theta, 0.8, epsilon = 1e-9);
        assert_abs_diff_eq!(phi, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn inward_streamline_from_inner_boundary_stops_immediately() {
        let field = RadialMonopoleField::new(1.0, Shell::with_source_surface(2.5), Utc::now());
        let seed = Point3::new(0.0, 0.0, 1.0);
        let streamline =
            integrate_streamline(&field, stepper(), &seed, SteppingSense::Opposite, 1000).unwrap();
        assert_eq!(streamline.termination(), Termination::ReachedInner);
        assert_eq!(streamline.positions(), &[seed]);
    }

    #[test]
    fn seeds_outside_shell_are_rejected() {
        let field = RadialMonopoleField::new(1.0, Shell::with_source_surface(2.5), Utc::now());
        let seed = Point3::new(0.0, 3.0, 0.0);
        assert_eq!(
            integrate_streamline(&field, stepper(), &seed, SteppingSense::Same, 1000).unwrap_err(),
            TracingError::SeedOutsideShell { seed, radius: 3.0 }
        );
    }

    #[test]
    fn null_field_is_an_error() {
        let field = ZeroField::new(Shell::with_source_surface(2.5), Utc::now());
        let seed = Point3::new(1.2, 0.0, 0.0);
        assert!(matches!(
            integrate_streamline(&field, stepper(), &seed, SteppingSense::Same, 1000),
            Err(TracingError::NullField { .. })
        ));
    }

    #[test]
    fn step_limit_gives_non_converged_streamline() {
        let field = RadialMonopoleField::new(1.0, Shell::with_source_surface(2.5), Utc::now());
        let seed = Point3::new(1.5, 0.0, 0.0);
        let streamline =
            integrate_streamline(&field, stepper(), &seed, SteppingSense::Same, 3).unwrap();
        assert_eq!(streamline.termination(), Termination::MaxStepsExceeded);
        assert!(!streamline.termination().is_converged());
        assert_eq!(streamline.positions().len(), 4);
    }

    #[test]
    fn hermite_interpolant_hits_end_points() {
        let start = Point3::new(1.0, 0.0, 0.0);
        let end = Point3::new(1.0, 1.0, 0.0);
        let tangent = Vec3::new(0.0, 1.0, 0.0);
        let mid = hermite_interpolate(&start, &tangent, &end, &tangent, 1.0, 0.5);
        assert_abs_diff_eq!(mid.distance_to(&Point3::new(1.0, 0.5, 0.0)), 0.0, epsilon = 1e-15);
        let last = hermite_interpolate(&start, &tangent, &end, &tangent, 1.0, 1.0);
        assert_abs_diff_eq!(last.distance_to(&end), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn collapsing_step_length_gives_non_converged_streamline() {
        let field = DipoleSourceSurfaceField::new(1.0, 2.5, Utc::now());
        let factory = RKF45StepperFactory3::new(RKFStepperConfig {
            max_step_attempts: 1,
            absolute_tolerance: 1e-15,
            relative_tolerance: 0.0,
            initial_step_length: 0.5,
            max_step_length: 0.5,
            ..RKFStepperConfig::default()
        });
        let seed = Point3::new(1.3, 0.0, 0.0);

        let streamline =
            integrate_streamline(&field, factory.produce(), &seed, SteppingSense::Same, 1000)
                .unwrap();
        assert_eq!(streamline.termination(), Termination::TooManyAttempts);
        assert!(!streamline.termination().is_converged());
        assert_eq!(streamline.positions(), &[seed.clone()]);

        let field_line = field_line::trace_field_line(&field, &factory, &seed, 1000).unwrap();
        assert_eq!(field_line.polarity(), None);
        assert!(!field_line.is_closed());
        assert_eq!(field_line.start().termination, Termination::TooManyAttempts);
        assert_eq!(field_line.end().termination, Termination::TooManyAttempts);
    }

    #[test]
    fn non_finite_field_is_an_error() {
        let field = NanField {
            shell: Shell::with_source_surface(2.5),
            epoch: Utc::now(),
        };
        let seed = Point3::new(1.5, 0.0, 0.0);
        assert_eq!(
            integrate_streamline(&field, stepper(), &seed, SteppingSense::Same, 1000).unwrap_err(),
            TracingError::InvalidFieldValue { position: seed }
        );
    }
}
