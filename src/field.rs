//! Vector field solutions defined on a spherical shell.

pub mod analytic;
pub mod grid;

use crate::{
    geometry::{Point3, Vec3},
    tracing::ftr,
};
use chrono::{DateTime, Utc};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// The region between two concentric spheres centered on the origin.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Shell {
    inner_radius: ftr,
    outer_radius: ftr,
}

/// Where a point lies relative to the boundaries of a shell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShellLocation {
    BelowInner,
    OnInner,
    Inside,
    OnOuter,
    AboveOuter,
}

impl Shell {
    /// Relative distance from a boundary within which a point is considered to lie on it.
    pub const BOUNDARY_TOLERANCE: ftr = 1e-9;

    /// Creates a new shell with the given boundary radii.
    ///
    /// # Panics
    ///
    /// If the radii are not finite, positive and increasing.
    pub fn new(inner_radius: ftr, outer_radius: ftr) -> Self {
        assert!(
            inner_radius.is_finite() && outer_radius.is_finite(),
            "Shell radii must be finite."
        );
        assert!(inner_radius > 0.0, "Inner shell radius must be positive.");
        assert!(
            outer_radius > inner_radius,
            "Outer shell radius must be larger than the inner radius."
        );
        Self {
            inner_radius,
            outer_radius,
        }
    }

    /// Creates the shell between the stellar surface (radius 1) and a source
    /// surface at the given radius.
    pub fn with_source_surface(source_surface_radius: ftr) -> Self {
        Self::new(1.0, source_surface_radius)
    }

    /// Returns the radius of the inner boundary.
    pub fn inner_radius(&self) -> ftr {
        self.inner_radius
    }

    /// Returns the radius of the outer boundary.
    pub fn outer_radius(&self) -> ftr {
        self.outer_radius
    }

    /// Determines where a point at the given radius lies relative to the shell.
    pub fn locate_radius(&self, radius: ftr) -> ShellLocation {
        let inner_tolerance = Self::BOUNDARY_TOLERANCE * self.inner_radius;
        let outer_tolerance = Self::BOUNDARY_TOLERANCE * self.outer_radius;
        if radius < self.inner_radius - inner_tolerance {
            ShellLocation::BelowInner
        } else if radius <= self.inner_radius + inner_tolerance {
            ShellLocation::OnInner
        } else if radius < self.outer_radius - outer_tolerance {
            ShellLocation::Inside
        } else if radius <= self.outer_radius + outer_tolerance {
            ShellLocation::OnOuter
        } else {
            ShellLocation::AboveOuter
        }
    }

    /// Determines where the given point lies relative to the shell.
    pub fn locate(&self, point: &Point3<ftr>) -> ShellLocation {
        self.locate_radius(point.radius())
    }

    /// Whether the given radius lies inside the shell or on one of its boundaries.
    pub fn contains_radius(&self, radius: ftr) -> bool {
        !matches!(
            self.locate_radius(radius),
            ShellLocation::BelowInner | ShellLocation::AboveOuter
        )
    }

    /// Returns the given point moved radially onto the closest boundary if it
    /// lies outside the shell, or a copy of the point otherwise.
    ///
    /// The origin is returned unchanged.
    pub fn clamp_into(&self, point: &Point3<ftr>) -> Point3<ftr> {
        let radius = point.radius();
        if radius == 0.0 {
            point.clone()
        } else if radius < self.inner_radius {
            point.with_radius(self.inner_radius)
        } else if radius > self.outer_radius {
            point.with_radius(self.outer_radius)
        } else {
            point.clone()
        }
    }
}

/// Defines the properties of a magnetic field solution that can be traced.
///
/// Implementors are shared by reference between all tracing threads and
/// must not change while a tracing session is in progress.
pub trait FieldSolution: Sync {
    /// Evaluates the field vector at the given point.
    ///
    /// Only called for points inside the shell or on its boundaries.
    fn evaluate(&self, point: &Point3<ftr>) -> Vec3<ftr>;

    /// Returns the shell on which the field is defined.
    fn shell(&self) -> &Shell;

    /// Returns the reference time of the solution, attached to traced field lines.
    fn epoch(&self) -> DateTime<Utc>;

    /// Returns the radius of the inner boundary.
    fn inner_radius(&self) -> ftr {
        self.shell().inner_radius()
    }

    /// Returns the radius of the outer boundary.
    fn outer_radius(&self) -> ftr {
        self.shell().outer_radius()
    }
}

impl<S: FieldSolution + ?Sized> FieldSolution for &S {
    fn evaluate(&self, point: &Point3<ftr>) -> Vec3<ftr> {
        (**self).evaluate(point)
    }
    fn shell(&self) -> &Shell {
        (**self).shell()
    }
    fn epoch(&self) -> DateTime<Utc> {
        (**self).epoch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locating_radii_respects_boundary_tolerance() {
        let shell = Shell::with_source_surface(2.5);
        assert_eq!(shell.locate_radius(0.5), ShellLocation::BelowInner);
        assert_eq!(shell.locate_radius(1.0 - 1e-12), ShellLocation::OnInner);
        assert_eq!(shell.locate_radius(1.0), ShellLocation::OnInner);
        assert_eq!(shell.locate_radius(1.7), ShellLocation::Inside);
        assert_eq!(shell.locate_radius(2.5 + 1e-12), ShellLocation::OnOuter);
        assert_eq!(shell.locate_radius(2.6), ShellLocation::AboveOuter);
        assert!(shell.contains_radius(2.5));
        assert!(!shell.contains_radius(0.9));
    }

    #[test]
    fn clamping_moves_points_onto_boundaries() {
        let shell = Shell::with_source_surface(2.0);
        let below = shell.clamp_into(&Point3::new(0.0, 0.5, 0.0));
        assert_eq!(below, Point3::new(0.0, 1.0, 0.0));
        let above = shell.clamp_into(&Point3::new(0.0, 0.0, -4.0));
        assert_eq!(above, Point3::new(0.0, 0.0, -2.0));
        let inside = Point3::new(1.2, 0.0, 0.3);
        assert_eq!(shell.clamp_into(&inside), inside);
    }

    #[test]
    #[should_panic]
    fn inverted_shell_is_rejected() {
        let _ = Shell::new(2.0, 1.0);
    }
}
