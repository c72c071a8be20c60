//! Stepping using the the Bogacki–Shampine scheme,
//! a third-order Runge-Kutta method with error
//! estimation through an embedded second-order step.

use super::{
    super::{compute_direction, StepperFactory3, StepperResult, SteppingSense},
    impl_stepper_for_rkf_stepper, PIControlParams, RKFStepper3, RKFStepperConfig,
    RKFStepperState3, StepAttempt3,
};
use crate::{field::FieldSolution, geometry::Vec3, tracing::ftr};

/// A stepper using the third order Runge–Kutta–Fehlberg method.
#[derive(Clone, Debug)]
pub struct RKF23Stepper3(RKFStepperState3);

/// Factory for `RKF23Stepper3` objects.
#[derive(Clone, Debug)]
pub struct RKF23StepperFactory3 {
    config: RKFStepperConfig,
}

impl RKF23Stepper3 {
    const ORDER: u8 = 3;

    const A21: ftr = 1.0 / 2.0;
    const A32: ftr = 3.0 / 4.0;
    const A41: ftr = 2.0 / 9.0;
    const A42: ftr = 1.0 / 3.0;
    const A43: ftr = 4.0 / 9.0;

    const E1: ftr = -5.0 / 72.0;
    const E2: ftr = 1.0 / 12.0;
    const E3: ftr = 1.0 / 9.0;
    const E4: ftr = -1.0 / 8.0;

    /// Creates a new RKF23 stepper with the given configuration.
    pub fn new(config: RKFStepperConfig) -> Self {
        config.validate();
        let pi_control = PIControlParams::for_config(&config, Self::ORDER);
        RKF23Stepper3(RKFStepperState3::new(config, pi_control))
    }
}

impl RKFStepper3 for RKF23Stepper3 {
    fn state(&self) -> &RKFStepperState3 {
        &self.0
    }
    fn state_mut(&mut self) -> &mut RKFStepperState3 {
        &mut self.0
    }

    fn attempt_step<S: FieldSolution>(
        &self,
        field: &S,
        sense: SteppingSense,
    ) -> StepperResult<StepAttempt3> {
        let state = self.state();
        let h = state.step_length;

        let intermediate_direction_1 =
            match self.compute_stage_direction(field, sense, &state.direction * (Self::A21 * h)) {
                StepperResult::Ok(direction) => direction,
                StepperResult::Stopped(cause) => return StepperResult::Stopped(cause),
            };

        let intermediate_direction_2 = match self.compute_stage_direction(
            field,
            sense,
            &intermediate_direction_1 * (Self::A32 * h),
        ) {
            StepperResult::Ok(direction) => direction,
            StepperResult::Stopped(cause) => return StepperResult::Stopped(cause),
        };

        let step_displacement = (&state.direction * Self::A41
            + &intermediate_direction_1 * Self::A42
            + &intermediate_direction_2 * Self::A43)
            * h;

        let next_position = &state.position + &step_displacement;

        let (next_field_vector, next_direction) =
            match compute_direction(field, sense, &next_position) {
                StepperResult::Ok(sampled) => sampled,
                StepperResult::Stopped(cause) => return StepperResult::Stopped(cause),
            };

        StepperResult::Ok(StepAttempt3 {
            next_position,
            next_field_vector,
            next_direction,
            intermediate_directions: vec![intermediate_direction_1, intermediate_direction_2],
        })
    }

    fn compute_error_deltas(&self, attempt: &StepAttempt3) -> Vec3<ftr> {
        let state = self.state();
        (&state.direction * Self::E1
            + &attempt.intermediate_directions[0] * Self::E2
            + &attempt.intermediate_directions[1] * Self::E3
            + &attempt.next_direction * Self::E4)
            * state.step_length
    }
}

impl_stepper_for_rkf_stepper!(RKF23Stepper3);

impl RKF23StepperFactory3 {
    /// Creates a new factory for producing steppers with the given configuration parameters.
    pub fn new(config: RKFStepperConfig) -> Self {
        config.validate();
        RKF23StepperFactory3 { config }
    }
}

impl StepperFactory3 for RKF23StepperFactory3 {
    type Output = RKF23Stepper3;
    fn produce(&self) -> Self::Output {
        RKF23Stepper3::new(self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        field::{analytic::ZeroField, Shell},
        geometry::Point3,
        tracing::stepping::{Stepper3, StoppingCause},
    };
    use chrono::Utc;

    #[test]
    fn placing_in_null_field_stops() {
        let field = ZeroField::new(Shell::with_source_surface(2.0), Utc::now());
        let mut stepper = RKF23StepperFactory3::new(RKFStepperConfig::default()).produce();
        let position = Point3::new(0.0, 1.5, 0.0);
        match stepper.place(&field, SteppingSense::Same, &position) {
            StepperResult::Stopped(StoppingCause::Null(null_position)) => {
                assert_eq!(null_position, position)
            }
            other => panic!("Expected null stop, got {:?}", other),
        }
    }
}
