use lustre::batch;
use lustre::output::{self, RunReport};
use lustre::pipeline::{self, EvaluationContext, SpectralPipeline};
use lustre::settings::{self};
use lustre::spectrum::SpectralSignal;

fn main() {
    let settings = settings::load_config().unwrap();

    let pipeline = match &settings.pipeline_file {
        Some(path) => {
            let json = std::fs::read_to_string(path).unwrap();
            SpectralPipeline::from_json(&json).unwrap()
        }
        None => pipeline::demo_pipeline(),
    };

    let ctx = EvaluationContext::new()
        .with_angle_deg(settings.angle_deg)
        .with_temperature_k(settings.temperature_k)
        .with_stress_pa(settings.stress_pa);

    let signal = pipeline.evaluate(&SpectralSignal::equal_energy(), &ctx);
    let conservation = pipeline.verify_energy_conservation(&ctx);
    if !conservation.is_conserved() {
        eprintln!("{conservation}");
    }

    let sweep_angles: Vec<f64> = (0..=18).map(|i| i as f64 * 5.0).collect();
    let swept = batch::evaluate_pipeline_sweep_with_progress(&pipeline, &ctx, &sweep_angles);
    let sweep: Vec<(f64, SpectralSignal)> = sweep_angles.into_iter().zip(swept).collect();

    let report = RunReport::new(
        &ctx,
        &signal,
        conservation,
        &sweep,
        settings.scattering_radius_mm,
        settings.pixels_per_mm,
        settings.gradient_stops,
    )
    .unwrap();
    output::writeup(&report, &settings.outfile).unwrap();
    println!("Wrote {}", settings.outfile);
}
