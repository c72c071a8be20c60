//! Generation of seed points on a sphere.

use super::Seeder3;
use crate::{geometry::Point3, tracing::ftr};
use rayon::prelude::*;
use std::{
    f64::consts::{FRAC_PI_2, TAU},
    vec,
};

/// Generator for seed points on a sphere centered on the origin.
///
/// The points lie at the centers of the cells of a regular grid in longitude
/// and sine of latitude, so that every cell covers the same area.
#[derive(Clone, Debug)]
pub struct SurfaceSeeder3 {
    seed_points: Vec<Point3<ftr>>,
    shape: Option<(usize, usize)>,
}

impl SurfaceSeeder3 {
    /// Creates a new seeder producing points on the sphere with the given radius.
    ///
    /// Points are ordered with latitude increasing from south to north
    /// between rows, and longitude increasing from zero within each row.
    ///
    /// # Panics
    ///
    /// If the radius is not positive and finite, or if either count is zero.
    pub fn regular(radius: ftr, n_latitudes: usize, n_longitudes: usize) -> Self {
        assert!(
            radius > 0.0 && radius.is_finite(),
            "Seeding radius must be positive and finite."
        );
        assert!(
            n_latitudes > 0 && n_longitudes > 0,
            "Number of latitudes and longitudes must be larger than zero."
        );

        #[allow(clippy::cast_precision_loss)]
        let sin_latitude_spacing = 2.0 / n_latitudes as ftr;
        #[allow(clippy::cast_precision_loss)]
        let longitude_spacing = TAU / n_longitudes as ftr;

        let seed_points = (0..n_latitudes)
            .flat_map(|lat_idx| {
                #[allow(clippy::cast_precision_loss)]
                let sin_latitude = -1.0 + (lat_idx as ftr + 0.5) * sin_latitude_spacing;
                let theta = FRAC_PI_2 - sin_latitude.asin();
                (0..n_longitudes).map(move |lon_idx| {
                    #[allow(clippy::cast_precision_loss)]
                    let phi = (lon_idx as ftr + 0.5) * longitude_spacing;
                    Point3::from_spherical(radius, theta, phi)
                })
            })
            .collect();

        SurfaceSeeder3 {
            seed_points,
            shape: Some((n_latitudes, n_longitudes)),
        }
    }

    /// Returns the `(n_latitudes, n_longitudes)` shape of the seed grid, or
    /// `None` if points have been removed from it.
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.shape
    }

    /// Returns a reference to the seed points.
    pub fn points(&self) -> &[Point3<ftr>] {
        &self.seed_points
    }
}

impl IntoIterator for SurfaceSeeder3 {
    type Item = Point3<ftr>;
    type IntoIter = vec::IntoIter<Self::Item>;
    fn into_iter(self) -> Self::IntoIter {
        self.seed_points.into_iter()
    }
}

impl IntoParallelIterator for SurfaceSeeder3 {
    type Item = Point3<ftr>;
    type Iter = rayon::vec::IntoIter<Self::Item>;
    fn into_par_iter(self) -> Self::Iter {
        self.seed_points.into_par_iter()
    }
}

impl Seeder3 for SurfaceSeeder3 {
    fn number_of_points(&self) -> usize {
        self.seed_points.len()
    }

    fn retain_points<P>(&mut self, predicate: P)
    where
        P: FnMut(&Point3<ftr>) -> bool,
    {
        let n_points = self.seed_points.len();
        self.seed_points.retain(predicate);
        if self.seed_points.len() != n_points {
            self.shape = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn points_cover_sphere_in_row_major_order() {
        let seeder = SurfaceSeeder3::regular(1.0, 4, 8);
        assert_eq!(seeder.number_of_points(), 32);
        assert_eq!(seeder.shape(), Some((4, 8)));
        for point in seeder.points() {
            assert_abs_diff_eq!(point.radius(), 1.0, epsilon = 1e-14);
        }
        let (_, first_theta, first_phi) = seeder.points()[0].to_spherical();
        let (_, last_theta, _) = seeder.points()[31].to_spherical();
        assert!(first_theta > FRAC_PI_2 && last_theta < FRAC_PI_2);
        assert_abs_diff_eq!(first_phi, TAU / 16.0, epsilon = 1e-12);
        // Southernmost row at sin(latitude) = -0.75
        assert_abs_diff_eq!(first_theta.cos(), -0.75, epsilon = 1e-12);
    }

    #[test]
    fn removing_points_invalidates_shape() {
        let mut seeder = SurfaceSeeder3::regular(1.5, 2, 3);
        seeder.retain_points(|point| point[crate::geometry::Dim3::Z] > 0.0);
        assert_eq!(seeder.number_of_points(), 3);
        assert_eq!(seeder.shape(), None);
    }
}
