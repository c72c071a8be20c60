//! Stepping using Runge–Kutta–Fehlberg methods,
//! a set of RK methods with step size adaptation driven by
//! error estimation through an embedded lower-order step.

pub mod rkf23;
pub mod rkf45;

use super::{compute_direction, StepperResult, SteppingSense, StoppingCause};
use crate::{
    field::FieldSolution,
    geometry::{
        Dim3::{X, Y, Z},
        Point3, Vec3,
    },
    tracing::ftr,
};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Type of RKF stepper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum RKFStepperType {
    RKF23,
    RKF45,
}

#[derive(Clone, Debug)]
struct RKFStepperState3 {
    /// Configuration parameters for the stepper.
    config: RKFStepperConfig,
    /// PI control parameters for the stepper.
    pi_control: PIControlParams,
    /// Current position of the stepper.
    position: Point3<ftr>,
    /// Field vector at the current position of the stepper.
    field_vector: Vec3<ftr>,
    /// Stepping direction at the current position of the stepper.
    direction: Vec3<ftr>,
    /// Current distance of the stepper along the field line.
    distance: ftr,
    /// Step length to use in the next step.
    step_length: ftr,
    /// The estimated error of the step from the previous to the current position.
    error: ftr,
    /// The step size used to get from the previous to the current position.
    previous_step_length: ftr,
    /// Position of the stepper directly before the previous step was taken.
    previous_position: Point3<ftr>,
    /// Stepping direction at the previous position of the stepper.
    previous_direction: Vec3<ftr>,
}

/// Configuration parameters for RKF steppers.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct RKFStepperConfig {
    /// Maximum number of consecutive step attempts before terminating.
    pub max_step_attempts: u32,
    /// Absolute error tolerance.
    pub absolute_tolerance: ftr,
    /// Relative error tolerance.
    pub relative_tolerance: ftr,
    /// Scaling factor for the error to reduce oscillations.
    pub safety_factor: ftr,
    /// Smallest allowed scaling of the step size in one step.
    pub min_step_scale: ftr,
    /// Largest allowed scaling of the step size in one step.
    pub max_step_scale: ftr,
    /// Start value for error.
    pub initial_error: ftr,
    /// Initial step size.
    pub initial_step_length: ftr,
    /// Largest allowed step size.
    pub max_step_length: ftr,
    /// Whether to use Proportional Integral (PI) control for stabilizing the stepping.
    pub use_pi_control: bool,
}

#[derive(Clone, Debug)]
struct PIControlParams {
    k_i: ftr,
    k_p: ftr,
}

#[derive(Clone, Debug)]
enum StepError {
    Acceptable(ftr),
    TooLarge(ftr),
}

#[derive(Clone, Debug)]
struct StepAttempt3 {
    next_position: Point3<ftr>,
    next_field_vector: Vec3<ftr>,
    next_direction: Vec3<ftr>,
    intermediate_directions: Vec<Vec3<ftr>>,
}

trait RKFStepper3 {
    fn state(&self) -> &RKFStepperState3;
    fn state_mut(&mut self) -> &mut RKFStepperState3;

    fn attempt_step<S: FieldSolution>(
        &self,
        field: &S,
        sense: SteppingSense,
    ) -> StepperResult<StepAttempt3>;

    fn compute_error_deltas(&self, attempt: &StepAttempt3) -> Vec3<ftr>;

    fn reset_state(&mut self, position: &Point3<ftr>, field_vector: Vec3<ftr>, direction: Vec3<ftr>) {
        let state = self.state_mut();
        state.position = position.clone();
        state.previous_position = position.clone();
        state.previous_direction = direction.clone();
        state.field_vector = field_vector;
        state.direction = direction;
        state.distance = 0.0;
        state.step_length = state.config.initial_step_length;
        state.error = state.config.initial_error;
        state.previous_step_length = 0.0;
    }

    fn perform_place<S: FieldSolution>(
        &mut self,
        field: &S,
        sense: SteppingSense,
        position: &Point3<ftr>,
    ) -> StepperResult<()> {
        match compute_direction(field, sense, position) {
            StepperResult::Ok((field_vector, direction)) => {
                self.reset_state(position, field_vector, direction);
                StepperResult::Ok(())
            }
            StepperResult::Stopped(cause) => StepperResult::Stopped(cause),
        }
    }

    fn perform_step<S: FieldSolution>(&mut self, field: &S, sense: SteppingSense) -> StepperResult<()> {
        let mut attempts = 0;

        while attempts < self.state().config.max_step_attempts {
            let step_attempt = match self.attempt_step(field, sense) {
                StepperResult::Ok(step_attempt) => step_attempt,
                StepperResult::Stopped(cause) => return StepperResult::Stopped(cause),
            };

            attempts += 1;

            match self.compute_error(&step_attempt) {
                StepError::Acceptable(new_error) => {
                    let mut new_step_length = self.compute_step_length_accepted(new_error);

                    // Don't increase step size if the previous attempt was rejected
                    if attempts > 1 && new_step_length > self.state().step_length {
                        new_step_length = self.state().step_length;
                    }

                    self.apply_step_attempt(step_attempt);
                    self.update_step_length(new_step_length, new_error);
                    return StepperResult::Ok(());
                }
                StepError::TooLarge(new_error) => {
                    let new_step_length = self.compute_step_length_rejected(new_error);
                    self.update_step_length(new_step_length, new_error);
                }
            };
        }
        StepperResult::Stopped(StoppingCause::TooManyAttempts)
    }

    /// Computes the stage direction at the given offset from the current position.
    fn compute_stage_direction<S: FieldSolution>(
        &self,
        field: &S,
        sense: SteppingSense,
        displacement: Vec3<ftr>,
    ) -> StepperResult<Vec3<ftr>> {
        match compute_direction(field, sense, &(&self.state().position + &displacement)) {
            StepperResult::Ok((_, direction)) => StepperResult::Ok(direction),
            StepperResult::Stopped(cause) => StepperResult::Stopped(cause),
        }
    }

    fn compute_error(&self, attempt: &StepAttempt3) -> StepError {
        let state = self.state();
        let error_deltas = self.compute_error_deltas(attempt);

        let scales = state
            .position
            .to_vec3()
            .abs()
            .max_with(&attempt.next_position.to_vec3().abs());
        let errors = Vec3::new(
            error_deltas[X]
                / (state.config.absolute_tolerance + state.config.relative_tolerance * scales[X]),
            error_deltas[Y]
                / (state.config.absolute_tolerance + state.config.relative_tolerance * scales[Y]),
            error_deltas[Z]
                / (state.config.absolute_tolerance + state.config.relative_tolerance * scales[Z]),
        );

        let error = ftr::sqrt(errors.squared_length() / 3.0);

        if error <= 1.0 {
            StepError::Acceptable(error)
        } else {
            StepError::TooLarge(error)
        }
    }

    fn compute_step_length_accepted(&self, new_error: ftr) -> ftr {
        let state = self.state();
        let step_scale = if new_error < 1e-9 {
            // Use max step scale directly for very small error to avoid division by zero
            state.config.max_step_scale
        } else {
            let step_scale = state.config.safety_factor * (state.error.powf(state.pi_control.k_i))
                / (new_error.powf(state.pi_control.k_p));
            step_scale
                .max(state.config.min_step_scale)
                .min(state.config.max_step_scale)
        };
        state.step_length * step_scale
    }

    fn compute_step_length_rejected(&self, new_error: ftr) -> ftr {
        let state = self.state();
        ftr::max(
            state.config.safety_factor / (new_error.powf(state.pi_control.k_p)),
            state.config.min_step_scale,
        ) * state.step_length
    }

    fn apply_step_attempt(&mut self, attempt: StepAttempt3) {
        let state = self.state_mut();
        state.previous_position = std::mem::replace(&mut state.position, attempt.next_position);
        state.previous_direction = std::mem::replace(&mut state.direction, attempt.next_direction);
        state.field_vector = attempt.next_field_vector;
        // Advance distance with step size *prior to* calling `update_step_length`
        state.distance += state.step_length;
    }

    fn update_step_length(&mut self, new_step_length: ftr, new_error: ftr) {
        let state = self.state_mut();
        state.previous_step_length = state.step_length;
        state.step_length = new_step_length.min(state.config.max_step_length);
        state.error = new_error;
    }
}

impl RKFStepperState3 {
    fn new(config: RKFStepperConfig, pi_control: PIControlParams) -> Self {
        let step_length = config.initial_step_length;
        let error = config.initial_error;
        Self {
            config,
            pi_control,
            position: Point3::origin(),
            field_vector: Vec3::zero(),
            direction: Vec3::zero(),
            distance: 0.0,
            step_length,
            error,
            previous_step_length: 0.0,
            previous_position: Point3::origin(),
            previous_direction: Vec3::zero(),
        }
    }
}

impl RKFStepperConfig {
    pub const DEFAULT_MAX_STEP_ATTEMPTS: u32 = 16;
    pub const DEFAULT_ABSOLUTE_TOLERANCE: ftr = 1e-6;
    pub const DEFAULT_RELATIVE_TOLERANCE: ftr = 1e-6;
    pub const DEFAULT_SAFETY_FACTOR: ftr = 0.9;
    pub const DEFAULT_MIN_STEP_SCALE: ftr = 0.2;
    pub const DEFAULT_MAX_STEP_SCALE: ftr = 10.0;
    pub const DEFAULT_INITIAL_ERROR: ftr = 1e-4;
    pub const DEFAULT_INITIAL_STEP_LENGTH: ftr = 1e-4;
    pub const DEFAULT_MAX_STEP_LENGTH: ftr = 0.25;
    pub const DEFAULT_USE_PI_CONTROL: bool = true;

    /// Panics if any of the parameters are invalid.
    pub fn validate(&self) {
        assert!(
            self.max_step_attempts > 0,
            "Maximum number of step attempts must be larger than zero."
        );
        assert!(
            self.absolute_tolerance > 0.0,
            "Absolute error tolerance must be larger than zero."
        );
        assert!(
            self.relative_tolerance >= 0.0,
            "Relative error tolerance must be larger than or equal to zero."
        );
        assert!(
            self.safety_factor > 0.0 && self.safety_factor <= 1.0,
            "Safety factor must be in the range (0, 1]."
        );
        assert!(
            self.min_step_scale > 0.0,
            "Minimum step scale must be larger than zero."
        );
        assert!(
            self.max_step_scale >= self.min_step_scale,
            "Maximum step scale must be larger than or equal to the minimum step scale."
        );
        assert!(
            self.initial_step_length > 0.0,
            "Initial step size must be larger than zero."
        );
        assert!(
            self.max_step_length >= self.initial_step_length,
            "Maximum step size must be larger than or equal to the initial step size."
        );
        assert!(
            self.initial_error > 0.0 && self.initial_error <= 1.0,
            "Initial error must be in the range (0, 1]."
        );
    }
}

impl Default for RKFStepperConfig {
    fn default() -> Self {
        RKFStepperConfig {
            max_step_attempts: Self::DEFAULT_MAX_STEP_ATTEMPTS,
            absolute_tolerance: Self::DEFAULT_ABSOLUTE_TOLERANCE,
            relative_tolerance: Self::DEFAULT_RELATIVE_TOLERANCE,
            safety_factor: Self::DEFAULT_SAFETY_FACTOR,
            min_step_scale: Self::DEFAULT_MIN_STEP_SCALE,
            max_step_scale: Self::DEFAULT_MAX_STEP_SCALE,
            initial_step_length: Self::DEFAULT_INITIAL_STEP_LENGTH,
            max_step_length: Self::DEFAULT_MAX_STEP_LENGTH,
            initial_error: Self::DEFAULT_INITIAL_ERROR,
            use_pi_control: Self::DEFAULT_USE_PI_CONTROL,
        }
    }
}

impl PIControlParams {
    fn for_config(config: &RKFStepperConfig, scheme_order: u8) -> Self {
        if config.use_pi_control {
            Self::activated(scheme_order)
        } else {
            Self::deactivated(scheme_order)
        }
    }

    fn activated(scheme_order: u8) -> Self {
        #[allow(clippy::cast_lossless)]
        let order = scheme_order as ftr;
        let k_i = 0.4 / order;
        let k_p = 1.0 / order - 0.75 * k_i;
        PIControlParams { k_i, k_p }
    }

    fn deactivated(scheme_order: u8) -> Self {
        #[allow(clippy::cast_lossless)]
        let order = scheme_order as ftr;
        let k_i = 0.0;
        let k_p = 1.0 / order;
        PIControlParams { k_i, k_p }
    }
}

/// Implements `Stepper3` for an RKF stepper wrapping a `RKFStepperState3`.
macro_rules! impl_stepper_for_rkf_stepper {
    ($stepper:ty) => {
        impl $crate::tracing::stepping::Stepper3 for $stepper {
            fn place<S: $crate::field::FieldSolution>(
                &mut self,
                field: &S,
                sense: $crate::tracing::stepping::SteppingSense,
                position: &$crate::geometry::Point3<$crate::tracing::ftr>,
            ) -> $crate::tracing::stepping::StepperResult<()> {
                self.perform_place(field, sense, position)
            }

            fn step<S: $crate::field::FieldSolution>(
                &mut self,
                field: &S,
                sense: $crate::tracing::stepping::SteppingSense,
            ) -> $crate::tracing::stepping::StepperResult<()> {
                self.perform_step(field, sense)
            }

            fn position(&self) -> &$crate::geometry::Point3<$crate::tracing::ftr> {
                &self.state().position
            }

            fn direction(&self) -> &$crate::geometry::Vec3<$crate::tracing::ftr> {
                &self.state().direction
            }

            fn field_vector(&self) -> &$crate::geometry::Vec3<$crate::tracing::ftr> {
                &self.state().field_vector
            }

            fn distance(&self) -> $crate::tracing::ftr {
                self.state().distance
            }

            fn previous_position(&self) -> &$crate::geometry::Point3<$crate::tracing::ftr> {
                &self.state().previous_position
            }

            fn previous_direction(&self) -> &$crate::geometry::Vec3<$crate::tracing::ftr> {
                &self.state().previous_direction
            }

            fn previous_step_length(&self) -> $crate::tracing::ftr {
                self.state().previous_step_length
            }
        }
    };
}
use impl_stepper_for_rkf_stepper;
