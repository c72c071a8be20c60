//! Field lines traced in both directions from a seed point, and their classification.

use super::{
    ftr,
    stepping::{StepperFactory3, SteppingSense},
    streamline::{self, Termination},
};
use crate::{
    error::TracingError,
    field::FieldSolution,
    geometry::{Point3, Vec3},
    num,
};
use chrono::{DateTime, Utc};
use std::slice;

#[cfg(feature = "serialization")]
use serde::Serialize;
#[cfg(feature = "json")]
use std::{io, path};

/// Magnetic connectivity of a field line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub enum Polarity {
    /// Open, with the field pointing inward at the outer boundary.
    Negative = -1,
    /// Closed, with both ends on the inner boundary.
    Closed = 0,
    /// Open, with the field pointing outward at the outer boundary.
    Positive = 1,
}

impl Polarity {
    /// Returns the polarity as -1, 0 or 1.
    pub fn value(self) -> i8 {
        self as i8
    }

    /// Whether the polarity corresponds to an open field line.
    pub fn is_open(self) -> bool {
        self != Self::Closed
    }
}

/// One end of a field line.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct FieldLineEnd {
    /// Why tracing ended here.
    pub termination: Termination,
    /// Position of the end point.
    pub position: Point3<ftr>,
    /// Field vector at the end point.
    pub field: Vec3<ftr>,
}

/// A field line through a seed point, running from the end reached by tracing
/// against the field to the end reached by tracing along it.
///
/// Only the field at the two end points is kept, so the line does not
/// depend on the lifetime of the field solution it was traced in.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct FieldLine {
    positions: Vec<Point3<ftr>>,
    start: FieldLineEnd,
    end: FieldLineEnd,
    polarity: Option<Polarity>,
    epoch: DateTime<Utc>,
}

/// The field lines traced from a batch of seed points.
///
/// Element `i` holds the outcome for seed `i`.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct FieldLineSet {
    field_lines: Vec<Result<FieldLine, TracingError>>,
    epoch: DateTime<Utc>,
}

/// Determines the polarity of a field line from its two ends.
///
/// # Returns
///
/// - `Ok(None)` if either end did not reach a boundary.
/// - `Ok(Some(Polarity::Closed))` if both ends are on the inner boundary.
/// - `Ok(Some(Polarity::Positive | Polarity::Negative))` from the sign of the
///   radial field at the outer end if the line connects the two boundaries.
///
/// # Errors
///
/// `Classification` if both ends are on the outer boundary, or if the radial
/// field vanishes at the outer end.
pub fn classify(start: &FieldLineEnd, end: &FieldLineEnd) -> Result<Option<Polarity>, TracingError> {
    use Termination::{ReachedInner, ReachedOuter};
    let outer_end = match (start.termination, end.termination) {
        (ReachedInner, ReachedInner) => return Ok(Some(Polarity::Closed)),
        (ReachedOuter, ReachedOuter) => {
            return Err(TracingError::Classification {
                reason: format!(
                    "both ends ({} and {}) lie on the outer boundary",
                    start.position, end.position
                ),
            })
        }
        (ReachedInner, ReachedOuter) => end,
        (ReachedOuter, ReachedInner) => start,
        _ => return Ok(None),
    };
    match num::sign(outer_end.field.radial_component_at(&outer_end.position)) {
        1 => Ok(Some(Polarity::Positive)),
        -1 => Ok(Some(Polarity::Negative)),
        _ => Err(TracingError::Classification {
            reason: format!(
                "radial field vanishes at outer end point {}",
                outer_end.position
            ),
        }),
    }
}

/// Traces the field line through the given seed point.
///
/// Streamlines are integrated against and along the field, and joined at the
/// seed so that it occurs only once.
pub fn trace_field_line<S, Sf>(
    field: &S,
    stepper_factory: &Sf,
    seed: &Point3<ftr>,
    max_steps: usize,
) -> Result<FieldLine, TracingError>
where
    S: FieldSolution,
    Sf: StepperFactory3,
{
    let backward = streamline::integrate_streamline(
        field,
        stepper_factory.produce(),
        seed,
        SteppingSense::Opposite,
        max_steps,
    )?;
    let forward = streamline::integrate_streamline(
        field,
        stepper_factory.produce(),
        seed,
        SteppingSense::Same,
        max_steps,
    )?;

    let (mut positions, start_termination, start_field) = backward.into_parts();
    let (forward_positions, end_termination, end_field) = forward.into_parts();

    positions.reverse();
    // Remove start position
    positions.pop();

    let start = FieldLineEnd {
        termination: start_termination,
        position: positions
            .first()
            .unwrap_or(&forward_positions[0])
            .clone(),
        field: start_field,
    };
    positions.extend(forward_positions);
    let end = FieldLineEnd {
        termination: end_termination,
        position: positions
            .last()
            .expect("Forward streamline always contains the seed")
            .clone(),
        field: end_field,
    };

    let polarity = classify(&start, &end)?;

    Ok(FieldLine {
        positions,
        start,
        end,
        polarity,
        epoch: field.epoch(),
    })
}

impl FieldLine {
    /// Returns the positions along the field line.
    pub fn positions(&self) -> &[Point3<ftr>] {
        &self.positions
    }

    /// Returns the number of points making up the field line.
    pub fn number_of_points(&self) -> usize {
        self.positions.len()
    }

    /// Returns the end reached by tracing against the field.
    pub fn start(&self) -> &FieldLineEnd {
        &self.start
    }

    /// Returns the end reached by tracing along the field.
    pub fn end(&self) -> &FieldLineEnd {
        &self.end
    }

    /// Returns the reference time of the field solution the line was traced in.
    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    /// Returns the polarity, or `None` if the line did not reach a boundary at both ends.
    pub fn polarity(&self) -> Option<Polarity> {
        self.polarity
    }

    /// Whether both ends of the line reached a boundary.
    pub fn is_converged(&self) -> bool {
        self.polarity.is_some()
    }

    /// Whether the line connects the inner and outer boundary.
    pub fn is_open(&self) -> bool {
        self.polarity.map_or(false, Polarity::is_open)
    }

    /// Whether both ends of the line are on the inner boundary.
    pub fn is_closed(&self) -> bool {
        self.polarity == Some(Polarity::Closed)
    }

    /// Computes the length of the line by summing the distances between consecutive points.
    pub fn length(&self) -> ftr {
        self.positions
            .windows(2)
            .map(|pair| pair[0].distance_to(&pair[1]))
            .sum()
    }

    /// Returns the end on the inner boundary, or for closed lines the start.
    pub fn solar_footpoint(&self) -> Option<&Point3<ftr>> {
        self.open_ends()
            .map(|(inner_end, _)| &inner_end.position)
            .or_else(|| self.is_closed().then(|| &self.start.position))
    }

    /// Returns the end on the outer boundary, if the line is open.
    pub fn source_surface_footpoint(&self) -> Option<&Point3<ftr>> {
        self.open_ends().map(|(_, outer_end)| &outer_end.position)
    }

    /// Computes the expansion factor `(r_inner/r_outer)^2*|B_inner|/|B_outer|`
    /// of an open field line.
    ///
    /// # Errors
    ///
    /// `NotApplicable` if the line is closed or did not converge.
    pub fn expansion_factor(&self) -> Result<ftr, TracingError> {
        match (self.polarity, self.open_ends()) {
            (_, Some((inner_end, outer_end))) => {
                let radius_ratio = inner_end.position.radius() / outer_end.position.radius();
                Ok(radius_ratio * radius_ratio * inner_end.field.length()
                    / outer_end.field.length())
            }
            (Some(_), None) => Err(TracingError::NotApplicable {
                quantity: "expansion factor",
                reason: "field line is closed",
            }),
            (None, None) => Err(TracingError::NotApplicable {
                quantity: "expansion factor",
                reason: "field line did not reach a boundary at both ends",
            }),
        }
    }

    /// Evaluates the given field at every point of the line.
    pub fn field_along_line<S: FieldSolution>(&self, field: &S) -> Vec<Vec3<ftr>> {
        self.positions
            .iter()
            .map(|position| field.evaluate(position))
            .collect()
    }

    /// Returns the (inner, outer) ends of an open line.
    fn open_ends(&self) -> Option<(&FieldLineEnd, &FieldLineEnd)> {
        match (self.start.termination, self.end.termination) {
            (Termination::ReachedInner, Termination::ReachedOuter) => Some((&self.start, &self.end)),
            (Termination::ReachedOuter, Termination::ReachedInner) => Some((&self.end, &self.start)),
            _ => None,
        }
    }
}

impl FieldLineSet {
    /// Creates a new set from per-seed tracing results.
    pub fn new(field_lines: Vec<Result<FieldLine, TracingError>>, epoch: DateTime<Utc>) -> Self {
        Self { field_lines, epoch }
    }

    /// Returns the number of seeds the set was traced from.
    pub fn len(&self) -> usize {
        self.field_lines.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.field_lines.is_empty()
    }

    /// Returns the reference time of the field solution.
    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    /// Returns the tracing result for the seed with the given index.
    pub fn get(&self, idx: usize) -> Option<&Result<FieldLine, TracingError>> {
        self.field_lines.get(idx)
    }

    /// Returns an iterator over the tracing results in seed order.
    pub fn iter(&self) -> slice::Iter<'_, Result<FieldLine, TracingError>> {
        self.field_lines.iter()
    }

    /// Returns the polarity value of each field line, with `None` for lines that
    /// failed or did not converge.
    pub fn polarities(&self) -> Vec<Option<i8>> {
        self.iter()
            .map(|result| {
                result
                    .as_ref()
                    .ok()
                    .and_then(FieldLine::polarity)
                    .map(Polarity::value)
            })
            .collect()
    }

    /// Returns the expansion factor of each field line, with `None` for lines
    /// it is not defined for.
    pub fn expansion_factors(&self) -> Vec<Option<ftr>> {
        self.iter()
            .map(|result| {
                result
                    .as_ref()
                    .ok()
                    .and_then(|field_line| field_line.expansion_factor().ok())
            })
            .collect()
    }

    /// Returns an iterator over the open field lines.
    pub fn open_field_lines(&self) -> impl Iterator<Item = &FieldLine> {
        self.successful().filter(|field_line| field_line.is_open())
    }

    /// Returns an iterator over the closed field lines.
    pub fn closed_field_lines(&self) -> impl Iterator<Item = &FieldLine> {
        self.successful().filter(|field_line| field_line.is_closed())
    }

    /// Returns the number of open field lines.
    pub fn n_open(&self) -> usize {
        self.open_field_lines().count()
    }

    /// Returns the number of closed field lines.
    pub fn n_closed(&self) -> usize {
        self.closed_field_lines().count()
    }

    /// Returns the number of field lines that did not reach a boundary at both ends.
    pub fn n_non_converged(&self) -> usize {
        self.successful()
            .filter(|field_line| !field_line.is_converged())
            .count()
    }

    /// Returns the number of seeds for which tracing failed with an error.
    pub fn n_failed(&self) -> usize {
        self.iter().filter(|result| result.is_err()).count()
    }

    /// Serializes the field line set into JSON format and saves it at the given path.
    #[cfg(feature = "json")]
    pub fn save_as_json(&self, file_path: &path::Path) -> io::Result<()> {
        crate::io::utils::save_data_as_json(file_path, self)
    }

    fn successful(&self) -> impl Iterator<Item = &FieldLine> {
        self.iter().filter_map(|result| result.as_ref().ok())
    }
}

impl<'a> IntoIterator for &'a FieldLineSet {
    type Item = &'a Result<FieldLine, TracingError>;
    type IntoIter = slice::Iter<'a, Result<FieldLine, TracingError>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        field::{
            analytic::{DipoleSourceSurfaceField, RadialMonopoleField},
            Shell,
        },
        tracing::stepping::rkf::{rkf45::RKF45StepperFactory3, RKFStepperConfig},
    };
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    fn end(termination: Termination, position: Point3<ftr>, field: Vec3<ftr>) -> FieldLineEnd {
        FieldLineEnd {
            termination,
            position,
            field,
        }
    }

    fn factory() -> RKF45StepperFactory3 {
        RKF45StepperFactory3::new(RKFStepperConfig {
            absolute_tolerance: 1e-8,
            relative_tolerance: 1e-8,
            ..RKFStepperConfig::default()
        })
    }

    #[test]
    fn classification_uses_radial_field_at_outer_end() {
        let inner = end(
            Termination::ReachedInner,
            Point3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
        );
        let outward = end(
            Termination::ReachedOuter,
            Point3::new(0.0, 0.0, 2.0),
            Vec3::new(0.1, 0.0, 0.5),
        );
        let inward = end(
            Termination::ReachedOuter,
            Point3::new(0.0, 0.0, 2.0),
            Vec3::new(0.0, 0.3, -0.5),
        );
        assert_eq!(classify(&inner, &outward), Ok(Some(Polarity::Positive)));
        assert_eq!(classify(&inward, &inner), Ok(Some(Polarity::Negative)));
        assert_eq!(classify(&inner, &inner), Ok(Some(Polarity::Closed)));
    }

    #[test]
    fn non_converged_ends_are_indeterminate() {
        let inner = end(
            Termination::ReachedInner,
            Point3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
        );
        let stuck = end(
            Termination::MaxStepsExceeded,
            Point3::new(1.5, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        );
        assert_eq!(classify(&inner, &stuck), Ok(None));
        assert_eq!(classify(&stuck, &stuck), Ok(None));
    }

    #[test]
    fn both_ends_on_outer_boundary_is_an_error() {
        let outer = end(
            Termination::ReachedOuter,
            Point3::new(0.0, 2.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        );
        assert!(matches!(
            classify(&outer, &outer),
            Err(TracingError::Classification { .. })
        ));
    }

    #[test]
    fn tangential_field_at_outer_end_is_an_error() {
        let inner = end(
            Termination::ReachedInner,
            Point3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
        );
        let tangential = end(
            Termination::ReachedOuter,
            Point3::new(0.0, 2.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
        );
        assert!(matches!(
            classify(&inner, &tangential),
            Err(TracingError::Classification { .. })
        ));
    }

    #[test]
    fn seed_occurs_once_in_stitched_line() {
        let field = RadialMonopoleField::new(1.0, Shell::with_source_surface(2.5), Utc::now());
        let seed = Point3::new(0.0, 1.7, 0.0);
        let field_line = trace_field_line(&field, &factory(), &seed, 1000).unwrap();
        assert_eq!(
            field_line
                .positions()
                .iter()
                .filter(|&position| position == &seed)
                .count(),
            1
        );
        assert_abs_diff_eq!(field_line.start().position.radius(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(field_line.end().position.radius(), 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(field_line.length(), 1.5, epsilon = 1e-9);
        assert_eq!(field_line.polarity(), Some(Polarity::Positive));
        assert_abs_diff_eq!(field_line.expansion_factor().unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn equatorial_dipole_line_is_closed() {
        let field = DipoleSourceSurfaceField::new(1.0, 2.5, Utc::now());
        let seed = Point3::from_spherical(1.2, FRAC_PI_2, 0.5);
        let field_line = trace_field_line(&field, &factory(), &seed, 1000).unwrap();
        assert!(field_line.is_closed());
        assert_abs_diff_eq!(field_line.start().position.radius(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(field_line.end().position.radius(), 1.0, epsilon = 1e-12);
        assert_eq!(field_line.source_surface_footpoint(), None);
        assert!(matches!(
            field_line.expansion_factor(),
            Err(TracingError::NotApplicable { .. })
        ));
    }

    #[test]
    fn polar_dipole_line_is_open() {
        let field = DipoleSourceSurfaceField::new(1.0, 2.5, Utc::now());
        let seed = Point3::from_spherical(1.0, 0.1, 0.0);
        let field_line = trace_field_line(&field, &factory(), &seed, 1000).unwrap();
        assert_eq!(field_line.polarity(), Some(Polarity::Positive));
        assert_eq!(field_line.solar_footpoint().map(|p| p.radius() < 1.0 + 1e-9), Some(true));
        // A single starting point, since the field points out of the shell when traced backwards
        assert_eq!(field_line.positions()[0], field_line.start().position);
        assert!(field_line.expansion_factor().unwrap() > 1.0);
    }

    #[test]
    fn set_queries_count_outcomes() {
        let epoch = Utc::now();
        let field = RadialMonopoleField::new(-1.0, Shell::with_source_surface(2.0), epoch);
        let open = trace_field_line(&field, &factory(), &Point3::new(1.5, 0.0, 0.0), 1000);
        let stuck = trace_field_line(&field, &factory(), &Point3::new(1.5, 0.0, 0.0), 2);
        let failed = Err(TracingError::NullField {
            position: Point3::new(1.5, 0.0, 0.0),
        });
        let set = FieldLineSet::new(vec![open, stuck, failed], epoch);
        assert_eq!(set.len(), 3);
        assert_eq!(set.polarities(), vec![Some(-1), None, None]);
        assert_eq!(set.n_open(), 1);
        assert_eq!(set.n_closed(), 0);
        assert_eq!(set.n_non_converged(), 1);
        assert_eq!(set.n_failed(), 1);
        assert_eq!(set.expansion_factors()[1], None);
    }

    #[test]
    fn field_along_line_follows_monopole_falloff() {
        let field = RadialMonopoleField::new(1.0, Shell::with_source_surface(2.5), Utc::now());
        let seed = Point3::from_spherical(1.6, 1.1, 4.0);
        let field_line = trace_field_line(&field, &factory(), &seed, 1000).unwrap();
        let field_vectors = field_line.field_along_line(&field);
        assert_eq!(field_vectors.len(), field_line.number_of_points());
        assert!(field_vectors.len() > 2);
        for (position, field_vector) in field_line.positions().iter().zip(&field_vectors) {
            let radius = position.radius();
            assert_abs_diff_eq!(field_vector.length(), 1.0 / (radius * radius), epsilon = 1e-12);
            assert_abs_diff_eq!(
                field_vector.radial_component_at(position),
                field_vector.length(),
                epsilon = 1e-12
            );
        }
        assert_abs_diff_eq!(field_vectors[0].length(), 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(
            field_vectors[field_vectors.len() - 1].length(),
            0.16,
            epsilon = 1e-10
        );
    }

    #[cfg(feature = "json")]
    #[test]
    fn set_with_failed_slot_is_saved_as_json() {
        let epoch = Utc::now();
        let field = RadialMonopoleField::new(1.0, Shell::with_source_surface(2.0), epoch);
        let open = trace_field_line(&field, &factory(), &Point3::new(0.0, 1.5, 0.0), 1000);
        let failed = Err(TracingError::NullField {
            position: Point3::new(1.5, 0.0, 0.0),
        });
        let set = FieldLineSet::new(vec![open, failed], epoch);

        let file_path = std::env::temp_dir().join("pfss_trace_field_line_set_test.json");
        set.save_as_json(&file_path).unwrap();
        let contents = std::fs::read_to_string(&file_path).unwrap();
        std::fs::remove_file(&file_path).unwrap();

        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        let field_lines = value["field_lines"].as_array().unwrap();
        assert_eq!(field_lines.len(), 2);
        assert_eq!(field_lines[0]["Ok"]["polarity"], "Positive");
        assert_eq!(field_lines[0]["Ok"]["end"]["termination"], "ReachedOuter");
        assert_eq!(
            field_lines[0]["Ok"]["positions"].as_array().unwrap().len(),
            set.get(0).unwrap().as_ref().unwrap().number_of_points()
        );
        assert_eq!(
            field_lines[1]["Err"]["NullField"]["position"],
            serde_json::json!([1.5, 0.0, 0.0])
        );
        assert!(value["epoch"].is_string());
    }
}
