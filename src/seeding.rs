//! Validation and generation of seed points for field line tracing.

pub mod surface;

use crate::{
    error::TracingError,
    geometry::{
        Dim3::{X, Y, Z},
        Point3,
    },
    tracing::ftr,
};
use ndarray::{ArrayViewD, Axis, Ix2};
use rayon::prelude::*;

/// Defines the properties of a 3D seed point generator.
pub trait Seeder3:
    IntoIterator<Item = Point3<ftr>> + IntoParallelIterator<Item = Point3<ftr>>
{
    /// Returns the number of seed points that will be produced by the seeder.
    fn number_of_points(&self) -> usize;

    /// Filters the seed points using the given predicate.
    fn retain_points<P>(&mut self, predicate: P)
    where
        P: FnMut(&Point3<ftr>) -> bool;
}

// Let a vector of points work as a seeder.
impl Seeder3 for Vec<Point3<ftr>> {
    fn number_of_points(&self) -> usize {
        self.len()
    }

    fn retain_points<P>(&mut self, predicate: P)
    where
        P: FnMut(&Point3<ftr>) -> bool,
    {
        self.retain(predicate);
    }
}

/// Checks that the given array holds a batch of seed points and converts it
/// into a list of points.
///
/// The array must have shape `(n, 3)`, with each row holding the Cartesian
/// coordinates of one seed. A single seed may also be given as an array of
/// shape `(3,)`.
///
/// # Errors
///
/// - `InvalidShape` if the array does not have the required shape.
/// - `InvalidSeedValue` if any coordinate is NaN or infinite.
pub fn validate_seeds(seeds: ArrayViewD<'_, ftr>) -> Result<Vec<Point3<ftr>>, TracingError> {
    let invalid_shape = || TracingError::InvalidShape {
        shape: seeds.shape().to_vec(),
    };
    let seeds = if seeds.ndim() == 1 && seeds.len() == 3 {
        seeds.clone().insert_axis(Axis(0))
    } else {
        seeds.clone()
    };
    let seeds = seeds
        .into_dimensionality::<Ix2>()
        .map_err(|_| invalid_shape())?;
    if seeds.ncols() != 3 {
        return Err(invalid_shape());
    }

    seeds
        .outer_iter()
        .enumerate()
        .map(|(seed_index, row)| {
            let coords = [row[0], row[1], row[2]];
            if coords.iter().all(|coord| coord.is_finite()) {
                Ok(Point3::new(coords[0], coords[1], coords[2]))
            } else {
                Err(TracingError::InvalidSeedValue { seed_index, coords })
            }
        })
        .collect()
}

/// Checks that all the given seed points have finite coordinates.
///
/// # Errors
///
/// `InvalidSeedValue` for the first seed with a NaN or infinite coordinate.
pub fn validate_seed_points(seeds: &[Point3<ftr>]) -> Result<(), TracingError> {
    match seeds.iter().position(|seed| !seed.is_finite()) {
        Some(seed_index) => {
            let seed = &seeds[seed_index];
            Err(TracingError::InvalidSeedValue {
                seed_index,
                coords: [seed[X], seed[Y], seed[Z]],
            })
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, Array3};

    #[test]
    fn valid_seed_array_is_converted_in_order() {
        let seeds = arr2(&[[1.0, 0.0, 0.0], [0.0, 1.5, 0.2]]);
        let points = validate_seeds(seeds.view().into_dyn()).unwrap();
        assert_eq!(
            points,
            vec![Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.5, 0.2)]
        );
    }

    #[test]
    fn single_seed_is_promoted_to_batch() {
        let seed = arr1(&[0.0, 0.0, 1.2]);
        let points = validate_seeds(seed.view().into_dyn()).unwrap();
        assert_eq!(points, vec![Point3::new(0.0, 0.0, 1.2)]);
    }

    #[test]
    fn wrong_shapes_are_rejected() {
        let two_columns = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
        assert_eq!(
            validate_seeds(two_columns.view().into_dyn()),
            Err(TracingError::InvalidShape { shape: vec![2, 2] })
        );
        let rank_three = Array3::<ftr>::zeros((2, 3, 1));
        assert_eq!(
            validate_seeds(rank_three.view().into_dyn()),
            Err(TracingError::InvalidShape {
                shape: vec![2, 3, 1]
            })
        );
        let too_long = arr1(&[1.0, 2.0, 3.0, 4.0]);
        assert!(matches!(
            validate_seeds(too_long.view().into_dyn()),
            Err(TracingError::InvalidShape { .. })
        ));
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        let seeds = arr2(&[[1.0, 0.0, 0.0], [0.0, ftr::NAN, 0.2]]);
        assert!(matches!(
            validate_seeds(seeds.view().into_dyn()),
            Err(TracingError::InvalidSeedValue { seed_index: 1, .. })
        ));
        let points = vec![Point3::new(1.0, 0.0, 0.0), Point3::new(ftr::INFINITY, 0.0, 0.0)];
        assert!(matches!(
            validate_seed_points(&points),
            Err(TracingError::InvalidSeedValue { seed_index: 1, .. })
        ));
    }
}
