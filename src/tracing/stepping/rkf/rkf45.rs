//! Stepping using the the Dormand-Prince scheme,
//! a fifth-order Runge-Kutta method with error
//! estimation through an embedded fourth-order step.

use super::{
    super::{compute_direction, StepperFactory3, StepperResult, SteppingSense},
    impl_stepper_for_rkf_stepper, PIControlParams, RKFStepper3, RKFStepperConfig,
    RKFStepperState3, StepAttempt3,
};
use crate::{field::FieldSolution, geometry::Vec3, tracing::ftr};

/// A stepper using the fifth order Runge–Kutta–Fehlberg method.
#[derive(Clone, Debug)]
pub struct RKF45Stepper3(RKFStepperState3);

/// Factory for `RKF45Stepper3` objects.
#[derive(Clone, Debug)]
pub struct RKF45StepperFactory3 {
    config: RKFStepperConfig,
}

impl RKF45Stepper3 {
    const ORDER: u8 = 5;

    const A21: ftr = 1.0 / 5.0;
    const A31: ftr = 3.0 / 40.0;
    const A32: ftr = 9.0 / 40.0;
    const A41: ftr = 44.0 / 45.0;
    const A42: ftr = -56.0 / 15.0;
    const A43: ftr = 32.0 / 9.0;
    const A51: ftr = 19_372.0 / 6561.0;
    const A52: ftr = -25_360.0 / 2187.0;
    const A53: ftr = 64_448.0 / 6561.0;
    const A54: ftr = -212.0 / 729.0;
    const A61: ftr = 9017.0 / 3168.0;
    const A62: ftr = -355.0 / 33.0;
    const A63: ftr = 46_732.0 / 5247.0;
    const A64: ftr = 49.0 / 176.0;
    const A65: ftr = -5103.0 / 18_656.0;
    const A71: ftr = 35.0 / 384.0;
    //  const A72: ftr =       0.0         ;
    const A73: ftr = 500.0 / 1113.0;
    const A74: ftr = 125.0 / 192.0;
    const A75: ftr = -2187.0 / 6784.0;
    const A76: ftr = 11.0 / 84.0;

    const E1: ftr = 71.0 / 57_600.0;
    //  const E2: ftr =       0.0          ;
    const E3: ftr = -71.0 / 16_695.0;
    const E4: ftr = 71.0 / 1920.0;
    const E5: ftr = -17_253.0 / 339_200.0;
    const E6: ftr = 22.0 / 525.0;
    const E7: ftr = -1.0 / 40.0;

    /// Creates a new RKF45 stepper with the given configuration.
    pub fn new(config: RKFStepperConfig) -> Self {
        config.validate();
        let pi_control = PIControlParams::for_config(&config, Self::ORDER);
        RKF45Stepper3(RKFStepperState3::new(config, pi_control))
    }
}

impl RKFStepper3 for RKF45Stepper3 {
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
        macro_rules! stage_direction {
            ($displacement:expr) => {
                match self.compute_stage_direction(field, sense, $displacement) {
                    StepperResult::Ok(direction) => direction,
                    StepperResult::Stopped(cause) => return StepperResult::Stopped(cause),
                }
            };
        }

        let state = self.state();
        let h = state.step_length;

        let intermediate_direction_1 = stage_direction!(&state.direction * (Self::A21 * h));

        let intermediate_direction_2 = stage_direction!(
            (&state.direction * Self::A31 + &intermediate_direction_1 * Self::A32) * h
        );

        let intermediate_direction_3 = stage_direction!(
            (&state.direction * Self::A41
                + &intermediate_direction_1 * Self::A42
                + &intermediate_direction_2 * Self::A43)
                * h
        );

        let intermediate_direction_4 = stage_direction!(
            (&state.direction * Self::A51
                + &intermediate_direction_1 * Self::A52
                + &intermediate_direction_2 * Self::A53
                + &intermediate_direction_3 * Self::A54)
                * h
        );

        let intermediate_direction_5 = stage_direction!(
            (&state.direction * Self::A61
                + &intermediate_direction_1 * Self::A62
                + &intermediate_direction_2 * Self::A63
                + &intermediate_direction_3 * Self::A64
                + &intermediate_direction_4 * Self::A65)
                * h
        );

        let step_displacement = (&state.direction * Self::A71
            + &intermediate_direction_2 * Self::A73
            + &intermediate_direction_3 * Self::A74
            + &intermediate_direction_4 * Self::A75
            + &intermediate_direction_5 * Self::A76)
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
            intermediate_directions: vec![
                intermediate_direction_1,
                intermediate_direction_2,
                intermediate_direction_3,
                intermediate_direction_4,
                intermediate_direction_5,
            ],
        })
    }

    fn compute_error_deltas(&self, attempt: &StepAttempt3) -> Vec3<ftr> {
        let state = self.state();
        (&state.direction * Self::E1
            + &attempt.intermediate_directions[1] * Self::E3
            + &attempt.intermediate_directions[2] * Self::E4
            + &attempt.intermediate_directions[3] * Self::E5
            + &attempt.intermediate_directions[4] * Self::E6
            + &attempt.next_direction * Self::E7)
            * state.step_length
    }
}

impl_stepper_for_rkf_stepper!(RKF45Stepper3);

impl RKF45StepperFactory3 {
    /// Creates a new factory for producing steppers with the given configuration parameters.
    pub fn new(config: RKFStepperConfig) -> Self {
        config.validate();
        RKF45StepperFactory3 { config }
    }
}

impl StepperFactory3 for RKF45StepperFactory3 {
    type Output = RKF45Stepper3;
    fn produce(&self) -> Self::Output {
        RKF45Stepper3::new(self.config.clone())
    }
}
