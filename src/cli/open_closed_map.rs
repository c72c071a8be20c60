//! Command line interface for computing open/closed field line maps.

use super::utils as cli_utils;
use crate::{
    exit_on_error, exit_on_false,
    field::{analytic::DipoleSourceSurfaceField, FieldSolution},
    geometry::Point3,
    seeding::{surface::SurfaceSeeder3, Seeder3},
    tracing::{
        adaptive::AdaptiveTracer,
        field_line::FieldLineSet,
        fixed_step::FixedStepTracer,
        ftr,
        stepping::{
            rk4::RK4StepperConfig,
            rkf::{RKFStepperConfig, RKFStepperType},
        },
        Tracer, TracerConfig,
    },
};
use chrono::{DateTime, Utc};
use clap::{Arg, ArgMatches, Command};
use ndarray::Array2;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug)]
enum TracerType {
    Adaptive,
    FixedStep,
}

/// Builds a representation of the `open-closed-map` command line subcommand.
pub fn create_open_closed_map_subcommand() -> Command<'static> {
    Command::new("open-closed-map")
        .about("Map open and closed field lines of a dipole source-surface field")
        .long_about(
            "Map open and closed field lines of a dipole source-surface field.\n\
             Field lines are traced from a regular grid of seeds on the solar surface,\n\
             and the polarity of each line is printed with north at the top:\n\
             \n    +: open with outward field\
             \n    -: open with inward field\
             \n    0: closed\
             \n    ?: did not reach a boundary, or failed",
        )
        .arg(
            Arg::new("source-surface-radius")
                .long("source-surface-radius")
                .require_equals(true)
                .value_name("VALUE")
                .help("Radius of the source surface, in solar radii")
                .takes_value(true)
                .default_value("2.5"),
        )
        .arg(
            Arg::new("dipole-strength")
                .long("dipole-strength")
                .require_equals(true)
                .allow_hyphen_values(true)
                .value_name("VALUE")
                .help("Radial field strength at the north pole of the solar surface")
                .takes_value(true)
                .default_value("1.0"),
        )
        .arg(
            Arg::new("epoch")
                .long("epoch")
                .require_equals(true)
                .value_name("TIME")
                .help("Observation time of the field, in RFC 3339 format")
                .takes_value(true)
                .default_value("2000-01-01T12:00:00Z"),
        )
        .arg(
            Arg::new("n-lat")
                .long("n-lat")
                .require_equals(true)
                .value_name("NUMBER")
                .help("Number of seed latitudes (evenly spaced in sine of latitude)")
                .takes_value(true)
                .default_value("30"),
        )
        .arg(
            Arg::new("n-lon")
                .long("n-lon")
                .require_equals(true)
                .value_name("NUMBER")
                .help("Number of seed longitudes")
                .takes_value(true)
                .default_value("60"),
        )
        .arg(
            Arg::new("tracer")
                .long("tracer")
                .require_equals(true)
                .value_name("TYPE")
                .help("Type of field line tracer to use")
                .takes_value(true)
                .possible_values(&["adaptive", "fixed-step"])
                .default_value("adaptive"),
        )
        .arg(
            Arg::new("stepper")
                .long("stepper")
                .require_equals(true)
                .value_name("TYPE")
                .help("Runge-Kutta-Fehlberg scheme for the adaptive tracer")
                .takes_value(true)
                .possible_values(&["rkf23", "rkf45"])
                .default_value("rkf45"),
        )
        .arg(
            Arg::new("step-length")
                .long("step-length")
                .require_equals(true)
                .value_name("VALUE")
                .help("Step length for the fixed step tracer, in solar radii")
                .takes_value(true)
                .default_value("0.01"),
        )
        .arg(
            Arg::new("max-step-length")
                .long("max-step-length")
                .require_equals(true)
                .value_name("VALUE")
                .help("Largest step length for the adaptive tracer, in solar radii")
                .takes_value(true)
                .default_value("0.25"),
        )
        .arg(
            Arg::new("absolute-tolerance")
                .long("absolute-tolerance")
                .require_equals(true)
                .value_name("VALUE")
                .help("Absolute error tolerance for stepping")
                .takes_value(true)
                .default_value("1e-4"),
        )
        .arg(
            Arg::new("relative-tolerance")
                .long("relative-tolerance")
                .require_equals(true)
                .value_name("VALUE")
                .help("Relative error tolerance for stepping")
                .takes_value(true)
                .default_value("1e-4"),
        )
        .arg(
            Arg::new("max-steps")
                .long("max-steps")
                .require_equals(true)
                .value_name("NUMBER")
                .help("Maximum number of steps in each direction from a seed")
                .takes_value(true)
                .default_value("1000"),
        )
        .arg(
            Arg::new("config-file")
                .long("config-file")
                .require_equals(true)
                .value_name("CONFIG_FILE")
                .help(
                    "Path of a JSON file with the tracer configuration, used instead of\n\
                     the tolerance, step and thread options (requires the json feature)",
                )
                .takes_value(true)
                .conflicts_with_all(&[
                    "absolute-tolerance",
                    "relative-tolerance",
                    "max-steps",
                    "threads",
                ]),
        )
        .arg(
            Arg::new("threads")
                .short('n')
                .long("threads")
                .require_equals(true)
                .value_name("NUMBER")
                .help("Number of threads to use [default: one per core]")
                .takes_value(true),
        )
        .arg(
            Arg::new("output-file")
                .short('o')
                .long("output-file")
                .require_equals(true)
                .value_name("OUTPUT_FILE")
                .help(
                    "Path of a JSON file where the field lines should be saved\n\
                     instead of printing the map (requires the json feature)",
                )
                .takes_value(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print status messages while tracing field lines"),
        )
        .arg(
            Arg::new("progress")
                .short('p')
                .long("progress")
                .help("Show progress bar for tracing (also implies `verbose`)"),
        )
}

/// Runs the actions for the `open-closed-map` subcommand using the given arguments.
pub fn run_open_closed_map_subcommand(arguments: &ArgMatches) {
    let source_surface_radius: ftr =
        cli_utils::get_positive_float_value_from_required_parseable_argument(
            arguments,
            "source-surface-radius",
        );
    exit_on_false!(
        source_surface_radius > 1.0,
        "Error: source-surface-radius must be larger than one (the solar radius)"
    );

    let dipole_strength: ftr =
        cli_utils::get_value_from_required_parseable_argument(arguments, "dipole-strength");
    let epoch: DateTime<Utc> =
        cli_utils::get_value_from_required_parseable_argument(arguments, "epoch");

    let n_latitudes =
        cli_utils::get_positive_integer_value_from_required_parseable_argument(arguments, "n-lat");
    let n_longitudes =
        cli_utils::get_positive_integer_value_from_required_parseable_argument(arguments, "n-lon");

    let config = construct_tracer_config_from_arguments(arguments);

    let field = DipoleSourceSurfaceField::new(dipole_strength, source_surface_radius, epoch);
    let seeder = SurfaceSeeder3::regular(field.shell().inner_radius(), n_latitudes, n_longitudes);

    if config.verbosity.print_messages() {
        println!(
            "Seeding {} field lines on a {}x{} latitude-longitude grid",
            seeder.number_of_points(),
            n_latitudes,
            n_longitudes
        );
    }

    let tracer_type = cli_utils::get_value_from_required_constrained_argument(
        arguments,
        "tracer",
        &["adaptive", "fixed-step"],
        &[TracerType::Adaptive, TracerType::FixedStep],
    );

    let field_lines = match tracer_type {
        TracerType::Adaptive => {
            let stepper_type = cli_utils::get_value_from_required_constrained_argument(
                arguments,
                "stepper",
                &["rkf23", "rkf45"],
                &[RKFStepperType::RKF23, RKFStepperType::RKF45],
            );
            let max_step_length = cli_utils::get_positive_float_value_from_required_parseable_argument(
                arguments,
                "max-step-length",
            );
            let stepper_config = RKFStepperConfig {
                max_step_length,
                initial_step_length: RKFStepperConfig::DEFAULT_INITIAL_STEP_LENGTH
                    .min(max_step_length),
                ..RKFStepperConfig::default()
            };
            trace_seeds(
                &AdaptiveTracer::new(stepper_type, stepper_config),
                seeder.points(),
                &field,
                &config,
            )
        }
        TracerType::FixedStep => {
            let step_length = cli_utils::get_positive_float_value_from_required_parseable_argument(
                arguments,
                "step-length",
            );
            trace_seeds(
                &FixedStepTracer::new(RK4StepperConfig { step_length }),
                seeder.points(),
                &field,
                &config,
            )
        }
    };

    if let Some(output_file_path) = arguments.value_of("output-file") {
        save_field_lines(&field_lines, PathBuf::from(output_file_path));
    } else {
        print_polarity_map(&field_lines, n_latitudes, n_longitudes);
    }
}

fn construct_tracer_config_from_arguments(arguments: &ArgMatches) -> TracerConfig {
    if let Some(config_file_path) = arguments.value_of("config-file") {
        let config_file_path = PathBuf::from(config_file_path);
        let config = TracerConfig {
            verbosity: cli_utils::parse_verbosity(arguments, true),
            ..read_tracer_config(&config_file_path)
        };
        exit_on_error!(
            config.validate(),
            "Error: Invalid tracer configuration in {}: {}",
            config_file_path.display()
        );
        return config;
    }

    let tolerance_absolute =
        cli_utils::get_positive_float_value_from_required_parseable_argument(
            arguments,
            "absolute-tolerance",
        );
    let tolerance_relative =
        cli_utils::get_positive_float_value_from_required_parseable_argument(
            arguments,
            "relative-tolerance",
        );
    let max_steps =
        cli_utils::get_positive_integer_value_from_required_parseable_argument(arguments, "max-steps");
    let n_threads: Option<usize> =
        cli_utils::get_value_from_parseable_argument(arguments, "threads");

    TracerConfig {
        tolerance_absolute,
        tolerance_relative,
        max_steps,
        n_threads,
        verbosity: cli_utils::parse_verbosity(arguments, true),
    }
}

fn trace_seeds<T: Tracer, S: FieldSolution>(
    tracer: &T,
    seeds: &[Point3<ftr>],
    field: &S,
    config: &TracerConfig,
) -> FieldLineSet {
    exit_on_error!(
        tracer.trace_points(seeds, field, config),
        "Error: Could not trace field lines: {}"
    )
}

fn polarity_map(field_lines: &FieldLineSet, n_latitudes: usize, n_longitudes: usize) -> Array2<char> {
    let symbols = field_lines
        .polarities()
        .into_iter()
        .map(|polarity| match polarity {
            Some(1) => '+',
            Some(-1) => '-',
            Some(_) => '0',
            None => '?',
        })
        .collect();
    exit_on_error!(
        Array2::from_shape_vec((n_latitudes, n_longitudes), symbols),
        "Error: Could not arrange polarities into map: {}"
    )
}

fn print_polarity_map(field_lines: &FieldLineSet, n_latitudes: usize, n_longitudes: usize) {
    let map = polarity_map(field_lines, n_latitudes, n_longitudes);
    // Seed rows run from south to north
    for row in map.outer_iter().rev() {
        println!("{}", row.iter().collect::<String>());
    }
}

#[cfg(feature = "json")]
fn read_tracer_config(config_file_path: &Path) -> TracerConfig {
    exit_on_error!(
        crate::io::utils::read_json_file(config_file_path),
        "Error: Could not read tracer configuration from {}: {}",
        config_file_path.display()
    )
}

#[cfg(not(feature = "json"))]
fn read_tracer_config(config_file_path: &Path) -> TracerConfig {
    crate::exit_with_error!(
        "Error: Could not read tracer configuration from {}: the json feature is required",
        config_file_path.display()
    );
}

#[cfg(feature = "json")]
fn save_field_lines(field_lines: &FieldLineSet, output_file_path: PathBuf) {
    exit_on_error!(
        field_lines.save_as_json(&output_file_path),
        "Error: Could not save field lines to {}: {}",
        output_file_path.display()
    );
}

#[cfg(not(feature = "json"))]
fn save_field_lines(_field_lines: &FieldLineSet, output_file_path: PathBuf) {
    crate::exit_with_error!(
        "Error: Could not save field lines to {}: the json feature is required",
        output_file_path.display()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::build::build;

    fn parse(args: &[&str]) -> ArgMatches {
        let mut full_args = vec!["pfss-trace", "open-closed-map"];
        full_args.extend_from_slice(args);
        build()
            .get_matches_from(full_args)
            .subcommand_matches("open-closed-map")
            .expect("Subcommand was given")
            .clone()
    }

    #[test]
    fn tracer_config_is_constructed_from_arguments() {
        let arguments = parse(&[
            "--absolute-tolerance=1e-6",
            "--max-steps=500",
            "--threads=2",
            "--verbose",
        ]);
        let config = construct_tracer_config_from_arguments(&arguments);
        assert_eq!(config.tolerance_absolute, 1e-6);
        assert_eq!(config.tolerance_relative, 1e-4);
        assert_eq!(config.max_steps, 500);
        assert_eq!(config.n_threads, Some(2));
        assert!(config.verbosity.print_messages());
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn dipole_map_has_open_poles_and_closed_equator() {
        let field = DipoleSourceSurfaceField::new(1.0, 2.5, Utc::now());
        let seeder = SurfaceSeeder3::regular(1.0, 6, 4);
        let field_lines = trace_seeds(
            &AdaptiveTracer::default(),
            seeder.points(),
            &field,
            &TracerConfig::default(),
        );
        let map = polarity_map(&field_lines, 6, 4);
        for lon_idx in 0..4 {
            assert_eq!(map[[0, lon_idx]], '-');
            assert_eq!(map[[2, lon_idx]], '0');
            assert_eq!(map[[3, lon_idx]], '0');
            assert_eq!(map[[5, lon_idx]], '+');
        }
    }

    #[cfg(feature = "json")]
    #[test]
    fn tracer_config_is_read_from_config_file() {
        let config_file_path = std::env::temp_dir().join("pfss_trace_open_closed_map_config.json");
        let file_config = TracerConfig {
            tolerance_absolute: 1e-7,
            max_steps: 250,
            n_threads: Some(3),
            ..TracerConfig::default()
        };
        crate::io::utils::save_data_as_json(&config_file_path, &file_config).unwrap();

        let config_file_arg = format!("--config-file={}", config_file_path.display());
        let arguments = parse(&[config_file_arg.as_str(), "--verbose"]);
        let config = construct_tracer_config_from_arguments(&arguments);
        std::fs::remove_file(&config_file_path).unwrap();

        assert_eq!(config.tolerance_absolute, 1e-7);
        assert_eq!(config.tolerance_relative, TracerConfig::DEFAULT_TOLERANCE_RELATIVE);
        assert_eq!(config.max_steps, 250);
        assert_eq!(config.n_threads, Some(3));
        assert!(config.verbosity.print_messages());
    }
}
