//! Stepping using the classical fourth-order Runge-Kutta method with a fixed step length.

use super::{compute_direction, Stepper3, StepperFactory3, StepperResult, SteppingSense};
use crate::{
    field::FieldSolution,
    geometry::{Point3, Vec3},
    tracing::ftr,
};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Configuration parameters for fixed step RK4 steppers.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct RK4StepperConfig {
    /// Length of each step.
    pub step_length: ftr,
}

/// A stepper using the classical fourth order Runge–Kutta method.
#[derive(Clone, Debug)]
pub struct RK4Stepper3 {
    step_length: ftr,
    position: Point3<ftr>,
    field_vector: Vec3<ftr>,
    direction: Vec3<ftr>,
    distance: ftr,
    previous_position: Point3<ftr>,
    previous_direction: Vec3<ftr>,
    previous_step_length: ftr,
}

/// Factory for `RK4Stepper3` objects.
#[derive(Clone, Debug)]
pub struct RK4StepperFactory3 {
    config: RK4StepperConfig,
}

impl RK4StepperConfig {
    pub const DEFAULT_STEP_LENGTH: ftr = 1e-2;

    /// Panics if any of the parameters are invalid.
    pub fn validate(&self) {
        assert!(
            self.step_length > 0.0 && self.step_length.is_finite(),
            "Step length must be finite and larger than zero."
        );
    }
}

impl Default for RK4StepperConfig {
    fn default() -> Self {
        RK4StepperConfig {
            step_length: Self::DEFAULT_STEP_LENGTH,
        }
    }
}

impl RK4Stepper3 {
    /// Creates a new RK4 stepper with the given configuration.
    pub fn new(config: RK4StepperConfig) -> Self {
        config.validate();
        RK4Stepper3 {
            step_length: config.step_length,
            position: Point3::origin(),
            field_vector: Vec3::zero(),
            direction: Vec3::zero(),
            distance: 0.0,
            previous_position: Point3::origin(),
            previous_direction: Vec3::zero(),
            previous_step_length: 0.0,
        }
    }

    fn stage_direction<S: FieldSolution>(
        &self,
        field: &S,
        sense: SteppingSense,
        displacement: Vec3<ftr>,
    ) -> StepperResult<Vec3<ftr>> {
        match compute_direction(field, sense, &(&self.position + &displacement)) {
            StepperResult::Ok((_, direction)) => StepperResult::Ok(direction),
            StepperResult::Stopped(cause) => StepperResult::Stopped(cause),
        }
    }
}

impl Stepper3 for RK4Stepper3 {
    fn place<S: FieldSolution>(
        &mut self,
        field: &S,
        sense: SteppingSense,
        position: &Point3<ftr>,
    ) -> StepperResult<()> {
        match compute_direction(field, sense, position) {
            StepperResult::Ok((field_vector, direction)) => {
                self.position = position.clone();
                self.previous_position = position.clone();
                self.previous_direction = direction.clone();
                self.field_vector = field_vector;
                self.direction = direction;
                self.distance = 0.0;
                self.previous_step_length = 0.0;
                StepperResult::Ok(())
            }
            StepperResult::Stopped(cause) => StepperResult::Stopped(cause),
        }
    }

    fn step<S: FieldSolution>(&mut self, field: &S, sense: SteppingSense) -> StepperResult<()> {
        let h = self.step_length;
        let half_h = 0.5 * h;

        let k2 = match self.stage_direction(field, sense, &self.direction * half_h) {
            StepperResult::Ok(direction) => direction,
            StepperResult::Stopped(cause) => return StepperResult::Stopped(cause),
        };
        let k3 = match self.stage_direction(field, sense, &k2 * half_h) {
            StepperResult::Ok(direction) => direction,
            StepperResult::Stopped(cause) => return StepperResult::Stopped(cause),
        };
        let k4 = match self.stage_direction(field, sense, &k3 * h) {
            StepperResult::Ok(direction) => direction,
            StepperResult::Stopped(cause) => return StepperResult::Stopped(cause),
        };

        let step_displacement = (&self.direction + (k2 + k3) * 2.0 + k4) * (h / 6.0);
        let next_position = &self.position + &step_displacement;

        let (next_field_vector, next_direction) =
            match compute_direction(field, sense, &next_position) {
                StepperResult::Ok(sampled) => sampled,
                StepperResult::Stopped(cause) => return StepperResult::Stopped(cause),
            };

        self.previous_position = std::mem::replace(&mut self.position, next_position);
        self.previous_direction = std::mem::replace(&mut self.direction, next_direction);
        self.field_vector = next_field_vector;
        self.distance += h;
        self.previous_step_length = h;
        StepperResult::Ok(())
    }

    fn position(&self) -> &Point3<ftr> {
        &self.position
    }

    fn direction(&self) -> &Vec3<ftr> {
        &self.direction
    }

    fn field_vector(&self) -> &Vec3<ftr> {
        &self.field_vector
    }

    fn distance(&self) -> ftr {
        self.distance
    }

    fn previous_position(&self) -> &Point3<ftr> {
        &self.previous_position
    }

    fn previous_direction(&self) -> &Vec3<ftr> {
        &self.previous_direction
    }

    fn previous_step_length(&self) -> ftr {
        self.previous_step_length
    }
}

impl RK4StepperFactory3 {
    /// Creates a new factory for producing steppers with the given configuration parameters.
    pub fn new(config: RK4StepperConfig) -> Self {
        config.validate();
        RK4StepperFactory3 { config }
    }
}

impl StepperFactory3 for RK4StepperFactory3 {
    type Output = RK4Stepper3;
    fn produce(&self) -> Self::Output {
        RK4Stepper3::new(self.config.clone())
    }
}
