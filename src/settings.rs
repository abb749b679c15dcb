use anyhow::Result;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::fmt;

use crate::ior::{DRUDE_TEMP_MAX_K, DRUDE_TEMP_MIN_K};

/// Default display density for the px conversion boundary.
pub const DEFAULT_PIXELS_PER_MM: f64 = 3.78;

/// Runtime configuration for the application.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub angle_deg: f64,
    pub temperature_k: f64,
    pub stress_pa: f64,
    /// Path to a JSON stage list; the built-in demo pipeline when absent.
    pub pipeline_file: Option<String>,
    pub scattering_radius_mm: f64,
    #[serde(default = "default_pixels_per_mm")]
    pub pixels_per_mm: f64,
    #[serde(default = "default_gradient_stops")]
    pub gradient_stops: usize,
    pub outfile: String,
}

fn default_pixels_per_mm() -> f64 {
    DEFAULT_PIXELS_PER_MM
}

fn default_gradient_stops() -> usize {
    16
}

pub fn load_default_config() -> Result<Settings> {
    let lustre_dir = retrieve_project_root();
    let default_config_file = lustre_dir.join("config/default.toml");

    let settings: Config = Config::builder()
        .add_source(File::from(default_config_file).required(true))
        .build()
        .unwrap_or_else(|err| {
            eprintln!("Error loading configuration: {}", err);
            std::process::exit(1);
        });

    let config: Settings = settings.try_deserialize().unwrap_or_else(|err| {
        eprintln!("Error deserializing configuration: {}", err);
        std::process::exit(1);
    });

    validate_config(&config);

    Ok(config)
}

pub fn load_config() -> Result<Settings> {
    // Try to find the project directory in different ways
    let lustre_dir = retrieve_project_root();

    let default_config_file = lustre_dir.join("config/default.toml");
    let local_config = lustre_dir.join("config/local.toml");

    // Check if local config exists, if not use default
    let config_file = if local_config.exists() {
        println!("Using local configuration: {:?}", local_config);
        local_config
    } else {
        println!("Using default configuration: {:?}", default_config_file);
        default_config_file
    };

    let settings: Config = Config::builder()
        .add_source(File::from(config_file).required(true))
        .add_source(Environment::with_prefix("lustre"))
        .build()
        .unwrap_or_else(|err| {
            eprintln!("Error loading configuration: {}", err);
            std::process::exit(1);
        });

    let mut config: Settings = settings.try_deserialize().unwrap_or_else(|err| {
        eprintln!("Error deserializing configuration: {}", err);
        std::process::exit(1);
    });

    // Parse command-line arguments and override values
    let args = CliArgs::parse();

    if let Some(angle) = args.angle {
        config.angle_deg = angle;
    }
    if let Some(temp) = args.temp {
        config.temperature_k = temp;
    }
    if let Some(stress) = args.stress {
        config.stress_pa = stress;
    }
    if let Some(pipeline) = args.pipeline {
        config.pipeline_file = Some(pipeline);
    }
    if let Some(radius) = args.radius {
        config.scattering_radius_mm = radius;
    }
    if let Some(density) = args.density {
        config.pixels_per_mm = density;
    }
    if let Some(stops) = args.stops {
        config.gradient_stops = stops;
    }
    if let Some(outfile) = args.outfile {
        config.outfile = outfile;
    }

    validate_config(&config);

    println!("{:#?}", config);

    Ok(config)
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the LUSTRE_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
/// If none of these methods work, the function will panic.
fn retrieve_project_root() -> std::path::PathBuf {
    let lustre_dir = if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        // When running through cargo (e.g. cargo run, cargo test)
        std::path::PathBuf::from(manifest_dir)
    } else if let Ok(path) = env::var("LUSTRE_ROOT_DIR") {
        // Allow explicit configuration via environment variable
        std::path::PathBuf::from(path)
    } else {
        // Fallback: try to find the nearest directory containing a "config" subdirectory
        // Start from the executable directory and walk upward
        let exe_path = env::current_exe().expect("Failed to get current executable path");
        let mut current_dir = exe_path
            .parent()
            .expect("Failed to get executable directory")
            .to_path_buf();
        let mut found = false;

        while !found && current_dir.parent().is_some() {
            if current_dir.join("config").is_dir() {
                found = true;
            } else {
                current_dir = current_dir.parent().unwrap().to_path_buf();
            }
        }

        if found {
            current_dir
        } else {
            panic!("Could not find project root directory");
        }
    };
    lustre_dir
}

fn validate_config(config: &Settings) {
    assert!(
        (0.0..=90.0).contains(&config.angle_deg),
        "Incidence angle must be between 0 and 90 degrees"
    );
    assert!(
        (DRUDE_TEMP_MIN_K..=DRUDE_TEMP_MAX_K).contains(&config.temperature_k),
        "Temperature must be between {} and {} K",
        DRUDE_TEMP_MIN_K,
        DRUDE_TEMP_MAX_K
    );
    assert!(
        config.scattering_radius_mm >= 0.0,
        "Scattering radius must be non-negative"
    );
    assert!(
        config.gradient_stops >= 2,
        "Gradient needs at least two stops"
    );
}

#[derive(Parser, Debug)]
#[command(version, about = "LUSTRE - Spectral Thin-Film and Scattering Renderer")]
pub struct CliArgs {
    /// Incidence angle in degrees from the surface normal.
    #[arg(short, long)]
    angle: Option<f64>,

    /// Material temperature in kelvin. Affects Drude damping in conductors.
    #[arg(short, long)]
    temp: Option<f64>,

    /// Mechanical stress in pascals, applied as photoelastic film strain.
    #[arg(long)]
    stress: Option<f64>,

    /// File path to a JSON pipeline description. The built-in demo pipeline
    /// is used when omitted.
    #[arg(short, long)]
    pipeline: Option<String>,

    /// Physical scattering radius in millimetres for the backdrop blur.
    #[arg(short, long)]
    radius: Option<f64>,

    /// Display density in pixels per millimetre for the px boundary.
    #[arg(long)]
    density: Option<f64>,

    /// Number of colour stops in emitted gradients.
    #[arg(long)]
    stops: Option<usize>,

    /// Output file path for the JSON writeup.
    #[arg(short, long)]
    outfile: Option<String>,
}


impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings:
  - Incidence Angle: {:.2} deg
  - Temperature: {:.2} K
  - Stress: {:.3e} Pa
  - Pipeline: {:?}
  - Scattering Radius: {:.3} mm
  - Display Density: {:.2} px/mm
  ",
            self.angle_deg,
            self.temperature_k,
            self.stress_pa,
            self.pipeline_file,
            self.scattering_radius_mm,
            self.pixels_per_mm,
        )
    }
}
