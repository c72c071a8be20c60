//! Field solutions given by closed-form expressions.

use super::{FieldSolution, Shell};
use crate::{
    geometry::{Point3, Vec3},
    tracing::ftr,
};
use chrono::{DateTime, Utc};

/// The potential field of an axisymmetric dipole aligned with the z-axis,
/// forced to be purely radial at a source surface.
///
/// With `b = B0/(2 + rss^-3)` the field components are
///
/// - `Br = b*cos(theta)*(2*r^-3 + rss^-3)`
/// - `Btheta = b*sin(theta)*(r^-3 - rss^-3)`
///
/// so that `Br(r = 1, theta = 0) = B0` and `Btheta` vanishes on the source surface.
#[derive(Clone, Debug)]
pub struct DipoleSourceSurfaceField {
    shell: Shell,
    epoch: DateTime<Utc>,
    coefficient: ftr,
    inverse_source_surface_radius_cubed: ftr,
}

impl DipoleSourceSurfaceField {
    /// Creates a new dipole field with the given polar field strength at the
    /// stellar surface and source surface radius.
    pub fn new(polar_strength: ftr, source_surface_radius: ftr, epoch: DateTime<Utc>) -> Self {
        let shell = Shell::with_source_surface(source_surface_radius);
        let inverse_source_surface_radius_cubed = source_surface_radius.powi(-3);
        let coefficient = polar_strength / (2.0 + inverse_source_surface_radius_cubed);
        Self {
            shell,
            epoch,
            coefficient,
            inverse_source_surface_radius_cubed,
        }
    }

    /// Computes the spherical components `(Br, Btheta)` at the given radius
    /// and polar angle.
    pub fn spherical_components(&self, r: ftr, theta: ftr) -> (ftr, ftr) {
        let (sin_theta, cos_theta) = theta.sin_cos();
        let inverse_r_cubed = r.powi(-3);
        (
            self.coefficient * cos_theta * (2.0 * inverse_r_cubed + self.inverse_source_surface_radius_cubed),
            self.coefficient * sin_theta * (inverse_r_cubed - self.inverse_source_surface_radius_cubed),
        )
    }
}

impl FieldSolution for DipoleSourceSurfaceField {
    fn evaluate(&self, point: &Point3<ftr>) -> Vec3<ftr> {
        let (r, theta, phi) = point.to_spherical();
        let (r_comp, theta_comp) = self.spherical_components(r, theta);
        Vec3::from_spherical_components(r_comp, theta_comp, 0.0, theta, phi)
    }

    fn shell(&self) -> &Shell {
        &self.shell
    }

    fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }
}

/// A purely radial field falling off with the square of the radius,
/// `B = B0*r_hat/r^2`.
///
/// A negative strength gives an inward pointing field.
#[derive(Clone, Debug)]
pub struct RadialMonopoleField {
    shell: Shell,
    epoch: DateTime<Utc>,
    strength: ftr,
}

impl RadialMonopoleField {
    /// Creates a new monopole field with the given strength at unit radius.
    pub fn new(strength: ftr, shell: Shell, epoch: DateTime<Utc>) -> Self {
        Self {
            shell,
            epoch,
            strength,
        }
    }
}

impl FieldSolution for RadialMonopoleField {
    fn evaluate(&self, point: &Point3<ftr>) -> Vec3<ftr> {
        let radius = point.radius();
        point.to_vec3() * (self.strength / (radius * radius * radius))
    }

    fn shell(&self) -> &Shell {
        &self.shell
    }

    fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }
}

/// A field that vanishes everywhere.
#[derive(Clone, Debug)]
pub struct ZeroField {
    shell: Shell,
    epoch: DateTime<Utc>,
}

impl ZeroField {
    pub fn new(shell: Shell, epoch: DateTime<Utc>) -> Self {
        Self { shell, epoch }
    }
}

impl FieldSolution for ZeroField {
    fn evaluate(&self, _point: &Point3<ftr>) -> Vec3<ftr> {
        Vec3::zero()
    }

    fn shell(&self) -> &Shell {
        &self.shell
    }

    fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }
}
