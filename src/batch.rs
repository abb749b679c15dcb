//! Data-parallel batch entry points.
//!
//! Every batch function fans the scalar path out over rayon's thread pool.
//! Elements are independent, so per-element results are identical to the
//! scalar functions no matter how the work is split. The progress-reporting
//! variant is for the CLI path; library callers use the silent functions.

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::brdf::{BsdfResult, PbrMaterial};
use crate::colour::{delta_e2000, relative_luminance};
use crate::pipeline::{EvaluationContext, SpectralPipeline};
use crate::spectrum::SpectralSignal;

/// Evaluates many material/angle pairs in parallel.
pub fn evaluate_material_batch(jobs: &[(PbrMaterial, f64)]) -> Vec<BsdfResult> {
    jobs.par_iter()
        .map(|(material, cos_theta)| material.evaluate(*cos_theta))
        .collect()
}

/// Evaluates the pipeline against equal-energy white at many incidence
/// angles, with a progress bar for the CLI sweep.
pub fn evaluate_pipeline_sweep_with_progress(
    pipeline: &SpectralPipeline,
    base: &EvaluationContext,
    angles_deg: &[f64],
) -> Vec<SpectralSignal> {
    let pb = ProgressBar::new(angles_deg.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>5}/{len:5} {msg} ETA: {eta_precise}",
        )
        .unwrap()
        .progress_chars("█▇▆▅▄▃▂▁"),
    );
    pb.set_message("sweep".to_string());

    let results = angles_deg
        .par_iter()
        .map(|&angle| {
            let signal = pipeline.evaluate_white(&base.with_angle_deg(angle));
            pb.inc(1);
            signal
        })
        .collect();
    pb.finish();
    results
}

/// WCAG relative luminance of many encoded sRGB triples.
pub fn relative_luminance_batch(colours: &[[f64; 3]]) -> Vec<f64> {
    colours.par_iter().map(|c| relative_luminance(*c)).collect()
}

/// CIEDE2000 over many CIELAB pairs.
pub fn delta_e2000_batch(pairs: &[([f64; 3], [f64; 3])]) -> Vec<f64> {
    pairs.par_iter().map(|(a, b)| delta_e2000(*a, *b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::demo_pipeline;

    #[test]
    fn pipeline_sweep_matches_scalar_path() {
        let pipeline = demo_pipeline();
        let base = EvaluationContext::new().with_temperature_k(350.0);
        let angles: Vec<f64> = (0..10).map(|i| i as f64 * 9.0).collect();
        let sweep = evaluate_pipeline_sweep_with_progress(&pipeline, &base, &angles);
        assert_eq!(sweep.len(), angles.len());
        for (&angle, signal) in angles.iter().zip(&sweep) {
            assert_eq!(
                *signal,
                pipeline.evaluate_white(&base.with_angle_deg(angle))
            );
        }
    }

    #[test]
    fn material_batch_matches_scalar_path() {
        let gold_tinted = PbrMaterial {
            base_color: [1.0, 0.8, 0.3],
            metallic: 0.9,
            roughness: 0.2,
            ior: 1.5,
        };
        let jobs: Vec<_> = (1..=10)
            .map(|i| (gold_tinted, i as f64 / 10.0))
            .collect();
        let batch = evaluate_material_batch(&jobs);
        for ((material, cos_theta), result) in jobs.iter().zip(&batch) {
            assert_eq!(*result, material.evaluate(*cos_theta));
        }
    }

    #[test]
    fn luminance_batch_matches_scalar_path() {
        let colours = vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [0.2, 0.5, 0.9]];
        let batch = relative_luminance_batch(&colours);
        for (c, l) in colours.iter().zip(&batch) {
            assert_eq!(*l, relative_luminance(*c));
        }
    }

    #[test]
    fn delta_e_batch_matches_scalar_path() {
        let pairs = vec![
            ([50.0, 2.6772, -79.7751], [50.0, 0.0, -82.7485]),
            ([60.0, 10.0, 10.0], [60.0, 10.0, 10.0]),
        ];
        let batch = delta_e2000_batch(&pairs);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], delta_e2000(pairs[0].0, pairs[0].1));
        assert_eq!(batch[1], 0.0);
    }
}
