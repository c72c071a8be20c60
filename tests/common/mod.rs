#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use pfss_trace::{
    field::{FieldSolution, Shell},
    geometry::{Dim3, Point3, Vec3},
    tracing::ftr,
};

#[cfg(feature = "cli")]
use lazy_static::lazy_static;
#[cfg(feature = "cli")]
use pfss_trace::cli;
#[cfg(feature = "cli")]
use std::ffi::OsString;

#[cfg(feature = "cli")]
lazy_static! {
    static ref COMMAND: clap::Command<'static> = cli::build::build();
}

#[cfg(feature = "cli")]
pub fn run<I, T>(args: I)
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    cli::run::run_with_args(COMMAND.clone().get_matches_from(args));
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2010, 8, 1, 0, 0, 0).unwrap()
}

pub fn source_surface_shell() -> Shell {
    Shell::with_source_surface(2.5)
}

/// Outward radial field everywhere except in a ring around the equator,
/// where the field circles the polar axis.
pub struct RingTrapField {
    shell: Shell,
    epoch: DateTime<Utc>,
}

impl RingTrapField {
    pub const RING_INNER_RADIUS: ftr = 1.4;
    pub const RING_OUTER_RADIUS: ftr = 1.6;
    pub const RING_HALF_HEIGHT: ftr = 0.3;

    pub fn new() -> Self {
        Self {
            shell: source_surface_shell(),
            epoch: epoch(),
        }
    }

    fn in_ring(point: &Point3<ftr>) -> bool {
        let radius = point.radius();
        radius > Self::RING_INNER_RADIUS
            && radius < Self::RING_OUTER_RADIUS
            && point[Dim3::Z].abs() < Self::RING_HALF_HEIGHT
    }
}

impl FieldSolution for RingTrapField {
    fn evaluate(&self, point: &Point3<ftr>) -> Vec3<ftr> {
        let (r, theta, phi) = point.to_spherical();
        if Self::in_ring(point) {
            Vec3::from_spherical_components(0.0, 0.0, 1.0, theta, phi)
        } else {
            Vec3::from_spherical_components(1.0 / (r * r), 0.0, 0.0, theta, phi)
        }
    }

    fn shell(&self) -> &Shell {
        &self.shell
    }

    fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }
}
