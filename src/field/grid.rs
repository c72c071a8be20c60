//! Field solutions sampled on a regular spherical grid.

use super::{FieldSolution, Shell};
use crate::{
    geometry::{Point3, Vec3},
    num::BFloat,
    tracing::ftr,
};
use chrono::{DateTime, Utc};
use ndarray::{Array3, Zip};
use std::f64::consts::TAU;

/// A vector field stored as spherical components on a grid that is regular in
/// azimuth `phi`, in `s = cos(theta)` and in the logarithm of the radius.
///
/// Array axes are ordered `(phi, s, ln(r))`. The `phi` axis is periodic with
/// `n_phi` cells starting at zero, while the `s` and `ln(r)` axes include both
/// end points (`s` from -1 to 1, `ln(r)` from the inner to the outer boundary).
/// Values are found by trilinear interpolation in these coordinates.
#[derive(Clone, Debug)]
pub struct SphericalGridField<F> {
    shell: Shell,
    epoch: DateTime<Utc>,
    r_components: Array3<F>,
    theta_components: Array3<F>,
    phi_components: Array3<F>,
    spacing: GridSpacing,
}

/// Coordinate spacings of the grid along each axis.
#[derive(Clone, Copy, Debug)]
struct GridSpacing {
    ln_inner_radius: ftr,
    phi: ftr,
    s: ftr,
    ln_r: ftr,
}

/// Interpolation weights along one grid axis.
#[derive(Clone, Copy, Debug)]
struct AxisWeights {
    lower_idx: usize,
    upper_idx: usize,
    upper_weight: ftr,
}

impl<F: BFloat> SphericalGridField<F> {
    /// Creates a new gridded field from the given arrays of radial, polar and
    /// azimuthal components.
    ///
    /// # Panics
    ///
    /// If the arrays differ in shape, or if there are fewer than one `phi`
    /// cell or two `s` or `ln(r)` points.
    pub fn new(
        r_components: Array3<F>,
        theta_components: Array3<F>,
        phi_components: Array3<F>,
        shell: Shell,
        epoch: DateTime<Utc>,
    ) -> Self {
        assert_eq!(
            r_components.shape(),
            theta_components.shape(),
            "Component arrays must have the same shape."
        );
        assert_eq!(
            r_components.shape(),
            phi_components.shape(),
            "Component arrays must have the same shape."
        );
        let (n_phi, n_s, n_ln_r) = r_components.dim();
        assert!(n_phi >= 1, "Grid must have at least one phi cell.");
        assert!(
            n_s >= 2 && n_ln_r >= 2,
            "Grid must have at least two points along s and ln(r)."
        );

        let spacing = GridSpacing::new((n_phi, n_s, n_ln_r), &shell);
        Self {
            shell,
            epoch,
            r_components,
            theta_components,
            phi_components,
            spacing,
        }
    }

    /// Creates a new gridded field by sampling the given function of `(r, theta, phi)`,
    /// returning the radial, polar and azimuthal components, at every grid point.
    ///
    /// Sampling is performed in parallel.
    pub fn from_spherical_fn<C>(
        shape: (usize, usize, usize),
        shell: Shell,
        epoch: DateTime<Utc>,
        compute_components: C,
    ) -> Self
    where
        C: Fn(ftr, ftr, ftr) -> (ftr, ftr, ftr) + Sync,
    {
        let (n_phi, n_s, n_ln_r) = shape;
        assert!(
            n_phi >= 1 && n_s >= 2 && n_ln_r >= 2,
            "Invalid grid shape {:?}",
            shape
        );
        let mut r_components = Array3::from_elem(shape, F::zero());
        let mut theta_components = Array3::from_elem(shape, F::zero());
        let mut phi_components = Array3::from_elem(shape, F::zero());

        let GridSpacing {
            ln_inner_radius,
            phi: phi_spacing,
            s: s_spacing,
            ln_r: ln_r_spacing,
        } = GridSpacing::new(shape, &shell);

        Zip::indexed(&mut r_components)
            .and(&mut theta_components)
            .and(&mut phi_components)
            .par_for_each(|(i, j, k), r_comp, theta_comp, phi_comp| {
                #[allow(clippy::cast_precision_loss)]
                let phi = i as ftr * phi_spacing;
                #[allow(clippy::cast_precision_loss)]
                let s = (-1.0 + j as ftr * s_spacing).max(-1.0).min(1.0);
                #[allow(clippy::cast_precision_loss)]
                let r = (ln_inner_radius + k as ftr * ln_r_spacing).exp();
                let (br, btheta, bphi) = compute_components(r, s.acos(), phi);
                *r_comp = F::from_f64(br).expect("Conversion failed");
                *theta_comp = F::from_f64(btheta).expect("Conversion failed");
                *phi_comp = F::from_f64(bphi).expect("Conversion failed");
            });

        Self::new(r_components, theta_components, phi_components, shell, epoch)
    }

    /// Returns the shape of the grid as `(n_phi, n_s, n_ln_r)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        self.r_components.dim()
    }

    fn phi_weights(&self, phi: ftr) -> AxisWeights {
        let n_phi = self.r_components.dim().0;
        let coord = (phi / self.spacing.phi).rem_euclid(n_phi as ftr);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let lower_idx = (coord.floor() as usize).min(n_phi - 1);
        #[allow(clippy::cast_precision_loss)]
        let upper_weight = coord - lower_idx as ftr;
        AxisWeights {
            lower_idx,
            upper_idx: (lower_idx + 1) % n_phi,
            upper_weight,
        }
    }

    fn bounded_weights(coord: ftr, n_points: usize) -> AxisWeights {
        #[allow(clippy::cast_precision_loss)]
        let coord = coord.max(0.0).min((n_points - 1) as ftr);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let lower_idx = (coord.floor() as usize).min(n_points - 2);
        #[allow(clippy::cast_precision_loss)]
        let upper_weight = coord - lower_idx as ftr;
        AxisWeights {
            lower_idx,
            upper_idx: lower_idx + 1,
            upper_weight,
        }
    }

    fn interpolate(values: &Array3<F>, weights: &[AxisWeights; 3]) -> ftr {
        let mut value = 0.0;
        for (phi_idx, phi_weight) in [
            (weights[0].lower_idx, 1.0 - weights[0].upper_weight),
            (weights[0].upper_idx, weights[0].upper_weight),
        ] {
            for (s_idx, s_weight) in [
                (weights[1].lower_idx, 1.0 - weights[1].upper_weight),
                (weights[1].upper_idx, weights[1].upper_weight),
            ] {
                for (ln_r_idx, ln_r_weight) in [
                    (weights[2].lower_idx, 1.0 - weights[2].upper_weight),
                    (weights[2].upper_idx, weights[2].upper_weight),
                ] {
                    let weight = phi_weight * s_weight * ln_r_weight;
                    if weight != 0.0 {
                        value += weight
                            * values[[phi_idx, s_idx, ln_r_idx]]
                                .to_f64()
                                .expect("Conversion failed");
                    }
                }
            }
        }
        value
    }
}

impl GridSpacing {
    #[allow(clippy::cast_precision_loss)]
    fn new(shape: (usize, usize, usize), shell: &Shell) -> Self {
        let (n_phi, n_s, n_ln_r) = shape;
        let ln_inner_radius = shell.inner_radius().ln();
        Self {
            ln_inner_radius,
            phi: TAU / n_phi as ftr,
            s: 2.0 / (n_s - 1) as ftr,
            ln_r: (shell.outer_radius().ln() - ln_inner_radius) / (n_ln_r - 1) as ftr,
        }
    }
}

impl<F: BFloat> FieldSolution for SphericalGridField<F> {
    fn evaluate(&self, point: &Point3<ftr>) -> Vec3<ftr> {
        let (r, theta, phi) = point.to_spherical();
        let (_, n_s, n_ln_r) = self.shape();
        let weights = [
            self.phi_weights(phi),
            Self::bounded_weights((theta.cos() + 1.0) / self.spacing.s, n_s),
            Self::bounded_weights(
                (r.ln() - self.spacing.ln_inner_radius) / self.spacing.ln_r,
                n_ln_r,
            ),
        ];
        Vec3::from_spherical_components(
            Self::interpolate(&self.r_components, &weights),
            Self::interpolate(&self.theta_components, &weights),
            Self::interpolate(&self.phi_components, &weights),
            theta,
            phi,
        )
    }

    fn shell(&self) -> &Shell {
        &self.shell
    }

    fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::analytic::DipoleSourceSurfaceField;
    use crate::geometry::Dim3;
    use approx::assert_abs_diff_eq;

    #[test]
    fn linear_field_is_interpolated_exactly() {
        // Br linear in ln(r), constant in angle, so trilinear interpolation is exact
        let shell = Shell::with_source_surface(2.0);
        let field = SphericalGridField::<f64>::from_spherical_fn(
            (8, 5, 6),
            shell,
            Utc::now(),
            |r, _, _| (1.0 + r.ln(), 0.0, 0.0),
        );
        let point = Point3::from_spherical(1.37, 0.9, 4.0);
        let vector = field.evaluate(&point);
        assert_abs_diff_eq!(
            vector.radial_component_at(&point),
            1.0 + 1.37_f64.ln(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn azimuth_wraps_around_periodic_boundary() {
        let shell = Shell::with_source_surface(2.0);
        let field = SphericalGridField::<f32>::from_spherical_fn(
            (4, 3, 3),
            shell,
            Utc::now(),
            |_, _, phi| (1.0, 0.0, phi.cos()),
        );
        // Halfway between the last phi cell (3*pi/2) and the first (0)
        let point = Point3::from_spherical(1.5, std::f64::consts::FRAC_PI_2, 1.75 * std::f64::consts::PI);
        let vector = field.evaluate(&point);
        let (_, _, phi) = point.to_spherical();
        let phi_hat = Vec3::new(-phi.sin(), phi.cos(), 0.0);
        assert_abs_diff_eq!(vector.dot(&phi_hat), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn gridded_dipole_approximates_analytic_dipole() {
        let analytic = DipoleSourceSurfaceField::new(1.0, 2.5, Utc::now());
        let gridded = SphericalGridField::<f64>::from_spherical_fn(
            (16, 181, 121),
            analytic.shell().clone(),
            analytic.epoch(),
            |r, theta, _| {
                let (br, btheta) = analytic.spherical_components(r, theta);
                (br, btheta, 0.0)
            },
        );
        let point = Point3::from_spherical(1.4, 0.7, 2.0);
        let exact = analytic.evaluate(&point);
        let approximate = gridded.evaluate(&point);
        for dim in Dim3::slice() {
            assert_abs_diff_eq!(approximate[dim], exact[dim], epsilon = 2e-3);
        }
    }

    #[test]
    fn grid_built_from_arrays_matches_sampled_grid() {
        let shell = Shell::with_source_surface(2.5);
        let epoch = Utc::now();
        let sampled = SphericalGridField::<f64>::from_spherical_fn(
            (6, 7, 9),
            shell.clone(),
            epoch,
            |r, theta, phi| (r * theta.cos(), phi.sin(), r.ln()),
        );
        let rebuilt = SphericalGridField::new(
            sampled.r_components.clone(),
            sampled.theta_components.clone(),
            sampled.phi_components.clone(),
            shell,
            epoch,
        );
        let point = Point3::from_spherical(1.9, 2.1, 5.0);
        let expected = sampled.evaluate(&point);
        let actual = rebuilt.evaluate(&point);
        for dim in Dim3::slice() {
            assert_eq!(actual[dim], expected[dim]);
        }
        // At a grid point the sampled value is returned
        let on_grid_radius = (2.5_f64.ln() * 3.0 / 8.0).exp();
        let on_grid = Point3::from_spherical(on_grid_radius, (1.0_f64 / 3.0).acos(), 0.0);
        assert_abs_diff_eq!(
            rebuilt.evaluate(&on_grid).radial_component_at(&on_grid),
            on_grid_radius / 3.0,
            epsilon = 1e-12
        );
    }
}
