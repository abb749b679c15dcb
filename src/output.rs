use std::{fs::File, io::BufWriter};

use anyhow::{anyhow, Result};
use chrono::Utc;
use ndarray::Array1;
use ndarray_stats::QuantileExt;
use serde::Serialize;

use crate::colour;
use crate::css;
use crate::pipeline::{ConservationReport, EvaluationContext};
use crate::siren;
use crate::spectrum::{wavelength_nm, SpectralSignal};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarise_peak() {
        // a signal peaking at sample 20 (580 nm) dominates the summary
        let signal = SpectralSignal::from_fn(|lambda| {
            let d = (lambda - 580.0) / 40.0;
            (-d * d).exp()
        });
        let summary = summarise(&signal).unwrap();
        assert_eq!(summary.dominant_wavelength_nm, 580.0);
        assert!(summary.total > 0.0);
        assert_eq!(summary.hex.len(), 7);
    }

    #[test]
    fn test_summarise_dark_signal() {
        let summary = summarise(&SpectralSignal::zeros()).unwrap();
        assert_eq!(summary.total, 0.0);
        assert_eq!(summary.linear_rgb, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_report_serialises() {
        let report = RunReport::new(
            &EvaluationContext::new(),
            &SpectralSignal::equal_energy(),
            ConservationReport::default(),
            &[(45.0, SpectralSignal::equal_energy())],
            1.0,
            crate::settings::DEFAULT_PIXELS_PER_MM,
            16,
        )
        .unwrap();
        assert_eq!(report.angle_sweep.len(), 1);
        assert_eq!(report.angle_sweep[0].angle_deg, 45.0);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("dominant_wavelength_nm"));
        assert!(json.contains("backdrop_filter"));
        assert!(json.contains("angle_sweep"));
    }
}

/// Colourimetric digest of one output spectrum.
#[derive(Debug, Clone, Serialize)]
pub struct SpectrumSummary {
    pub total: f64,
    pub dominant_wavelength_nm: f64,
    pub xyz: [f64; 3],
    pub linear_rgb: [f64; 3],
    pub corrected_rgb: [f64; 3],
    pub hex: String,
    pub relative_luminance: f64,
}

/// Reduces a spectrum to the colourimetric quantities the styling layer
/// consumes. The perceptual correction is applied at normal incidence and
/// room temperature; `RunReport` re-derives it under the run's context.
pub fn summarise(signal: &SpectralSignal) -> Result<SpectrumSummary> {
    let samples = Array1::from(signal.intensities().to_vec());
    let peak_index = samples
        .argmax()
        .map_err(|e| anyhow!("spectrum has no valid samples: {e}"))?;

    let xyz = signal.to_xyz();
    let linear_rgb = colour::xyz_to_linear_srgb(xyz);
    let corrected_rgb = siren::correct_rgb(linear_rgb, 0.0, 293.15);
    let srgb = colour::encode_srgb(corrected_rgb);

    Ok(SpectrumSummary {
        total: signal.total(),
        dominant_wavelength_nm: wavelength_nm(peak_index),
        xyz,
        linear_rgb,
        corrected_rgb,
        hex: colour::to_hex(srgb),
        relative_luminance: colour::relative_luminance(srgb),
    })
}

/// Colour of the pipeline at one swept incidence angle.
#[derive(Debug, Clone, Serialize)]
pub struct SweepPoint {
    pub angle_deg: f64,
    pub hex: String,
    pub relative_luminance: f64,
}

/// Full writeup of one pipeline evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: String,
    pub context: EvaluationContext,
    pub spectrum: Vec<f64>,
    pub summary: SpectrumSummary,
    pub energy_conserved: bool,
    pub conservation: ConservationReport,
    pub angle_sweep: Vec<SweepPoint>,
    pub backdrop_filter: String,
    pub box_shadow: String,
    pub gradient: String,
}

impl RunReport {
    pub fn new(
        ctx: &EvaluationContext,
        signal: &SpectralSignal,
        conservation: ConservationReport,
        sweep: &[(f64, SpectralSignal)],
        scattering_radius_mm: f64,
        pixels_per_mm: f64,
        gradient_stops: usize,
    ) -> Result<Self> {
        let mut summary = summarise(signal)?;
        summary.corrected_rgb =
            siren::correct_rgb(summary.linear_rgb, ctx.angle_deg, ctx.temperature_k);
        let srgb = colour::encode_srgb(summary.corrected_rgb);
        summary.hex = colour::to_hex(srgb);
        summary.relative_luminance = colour::relative_luminance(srgb);

        let angle_sweep = sweep
            .iter()
            .map(|(angle, swept)| {
                let rgb = colour::xyz_to_linear_srgb(swept.to_xyz());
                let corrected = siren::correct_rgb(rgb, *angle, ctx.temperature_k);
                let srgb = colour::encode_srgb(corrected);
                SweepPoint {
                    angle_deg: *angle,
                    hex: colour::to_hex(srgb),
                    relative_luminance: colour::relative_luminance(srgb),
                }
            })
            .collect();

        let blur = css::blur_px(scattering_radius_mm, pixels_per_mm);
        Ok(RunReport {
            timestamp: Utc::now().to_rfc3339(),
            context: *ctx,
            spectrum: signal.intensities().to_vec(),
            backdrop_filter: css::backdrop_filter(scattering_radius_mm, pixels_per_mm, 1.2),
            box_shadow: css::box_shadow_glow(summary.corrected_rgb, blur * 3.0, blur, 0.35),
            gradient: css::linear_gradient_from_spectrum(signal, gradient_stops, 90.0)?,
            energy_conserved: conservation.is_conserved(),
            conservation,
            angle_sweep,
            summary,
        })
    }
}

/// Write the run report as pretty JSON.
pub fn writeup(report: &RunReport, path: &str) -> Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}
