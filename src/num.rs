//! Utilities related to numbers.

use num;
use std::fmt;

/// Floating point marker trait for easier control over trait bounds.
pub trait BFloat: Sync + Send + num::Float + num::cast::FromPrimitive + fmt::Debug {}

impl BFloat for f32 {}
impl BFloat for f64 {}

/// Returns -1, 0 or 1 depending on the sign of the given value.
///
/// Unlike `num::Float::signum`, zero (of either sign) maps to 0.
pub fn sign<F: BFloat>(value: F) -> i8 {
    if value > F::zero() {
        1
    } else if value < F::zero() {
        -1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_maps_both_zeros_to_zero() {
        assert_eq!(sign(0.0_f64), 0);
        assert_eq!(sign(-0.0_f64), 0);
        assert_eq!(sign(1e-300_f64), 1);
        assert_eq!(sign(-2.5_f32), -1);
    }
}
