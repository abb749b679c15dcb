use lustre::{
    brdf::{dielectric_bsdf, evaluate_dielectric_batch, ConductorBsdf, PbrMaterial},
    colour::Cvd,
    film::{TemporalThinFilm, ThinFilm},
    fresnel,
    ior::Dispersion,
    mie::{henyey_greenstein, rayleigh_phase},
    pipeline::{demo_pipeline, EvaluationContext},
    spectrum::{wavelength_nm, SPECTRUM_SAMPLES},
    tmm::{Polarization, TransferMatrixFilm},
};
use num_complex::Complex64;

// Tolerance for the energy closure invariant
const CLOSURE_TOL: f64 = 1e-6;
// Tolerance for quadrature-based checks
const QUAD_TOL: f64 = 1e-3;

#[test]
fn energy_conservation_across_parameter_grid() {
    // dielectric and metallic materials over (angle, roughness, ior)
    for &cos_theta in &[0.05, 0.2, 0.5, 0.8, 1.0] {
        for &roughness in &[0.0, 0.1, 0.5, 1.0] {
            for &ior in &[1.33, 1.52, 2.42] {
                let material = PbrMaterial {
                    base_color: [0.8, 0.8, 0.8],
                    metallic: 0.0,
                    roughness,
                    ior,
                };
                let b = material.evaluate(cos_theta);
                assert!(
                    b.closure_error() < CLOSURE_TOL,
                    "dielectric ior {ior} roughness {roughness} cos {cos_theta}: {}",
                    b.closure_error()
                );

                let b = dielectric_bsdf(ior, cos_theta);
                assert!(b.closure_error() < CLOSURE_TOL);
            }
            for conductor in [
                ConductorBsdf::gold(),
                ConductorBsdf::silver(),
                ConductorBsdf::copper(),
            ] {
                let b = conductor.evaluate(cos_theta);
                assert!(
                    b.closure_error() < CLOSURE_TOL,
                    "{} cos {cos_theta}: {}",
                    conductor.name,
                    b.closure_error()
                );
            }
        }
    }
}

#[test]
fn rough_dielectric_sweep_stays_within_the_energy_bound() {
    let mut samples = Vec::new();
    for &ior in &[1.33, 1.52, 2.42] {
        for &roughness in &[0.0, 0.3, 0.7, 1.0] {
            for &cos_theta in &[0.1, 0.4, 0.8, 1.0] {
                samples.push((ior, roughness, cos_theta));
            }
        }
    }
    let splits = evaluate_dielectric_batch(&samples);
    for (s, b) in samples.iter().zip(&splits) {
        assert!(b.closure_error() < CLOSURE_TOL, "{s:?}: {b:?}");
        assert!((0.0..=1.0).contains(&b.reflectance), "{s:?}: {b:?}");
    }

    // the microfacet terms must show up in the split: shadowing flattens
    // the grazing Fresnel rise
    let grazing = evaluate_dielectric_batch(&[(1.5, 0.0, 0.2), (1.5, 1.0, 0.2)]);
    assert!(
        grazing[0].reflectance - grazing[1].reflectance > 0.02,
        "mirror {} vs fully rough {}",
        grazing[0].reflectance,
        grazing[1].reflectance
    );
}

#[test]
fn vanishing_film_degenerates_to_fresnel() {
    let n_substrate = 1.52;
    for &cos_theta in &[0.3, 0.7, 1.0] {
        let bare = fresnel::unpolarized_reflectance(
            Complex64::new(1.0, 0.0),
            Complex64::new(n_substrate, 0.0),
            cos_theta,
        );
        let film = ThinFilm::new(1.38, 1e-3).unwrap();
        for i in 0..SPECTRUM_SAMPLES {
            let r = film.reflectance(wavelength_nm(i), n_substrate, cos_theta);
            assert!(
                (r - bare).abs() < 1e-4,
                "lambda {} cos {cos_theta}: film {r} vs bare {bare}",
                wavelength_nm(i)
            );
        }
    }
}

#[test]
fn bragg_mirror_reaches_high_reflectance() {
    let mirror = TransferMatrixFilm::bragg_mirror(2.35, 1.46, 550.0, 5);
    let r = mirror.reflectance(550.0, 0.0, Polarization::Average);
    assert!(r > 0.99, "5-pair Bragg mirror at design wavelength: {r}");

    // reflectance grows monotonically with pair count
    let mut prev = 0.0;
    for pairs in 1..=5 {
        let r = TransferMatrixFilm::bragg_mirror(2.35, 1.46, 550.0, pairs)
            .reflectance(550.0, 0.0, Polarization::Average);
        assert!(r > prev, "{pairs} pairs: {r} <= {prev}");
        prev = r;
    }
}

#[test]
fn phase_functions_integrate_to_one() {
    let steps = 20_000;
    for &g in &[-0.9, 0.0, 0.9] {
        let mut integral = 0.0;
        let dtheta = std::f64::consts::PI / steps as f64;
        for i in 0..steps {
            let theta = (i as f64 + 0.5) * dtheta;
            integral += henyey_greenstein(theta.cos(), g)
                * 2.0
                * std::f64::consts::PI
                * theta.sin()
                * dtheta;
        }
        assert!((integral - 1.0).abs() < QUAD_TOL, "HG g {g}: {integral}");
    }

    let mut integral = 0.0;
    let dtheta = std::f64::consts::PI / steps as f64;
    for i in 0..steps {
        let theta = (i as f64 + 0.5) * dtheta;
        integral += rayleigh_phase(theta.cos()) * 2.0 * std::f64::consts::PI * theta.sin() * dtheta;
    }
    assert!((integral - 1.0).abs() < QUAD_TOL, "Rayleigh: {integral}");
}

#[test]
fn cvd_matrices_preserve_white() {
    for cvd in [Cvd::Protanopia, Cvd::Deuteranopia, Cvd::Tritanopia] {
        let out = cvd.apply([1.0, 1.0, 1.0]);
        for c in out {
            assert!((c - 1.0).abs() < 1e-9, "{cvd:?}: {out:?}");
        }
    }
}

#[test]
fn bk7_has_normal_dispersion() {
    let bk7 = Dispersion::bk7();
    let mut prev = bk7.n_at(400.0);
    let mut lambda = 410.0;
    while lambda <= 700.0 {
        let n = bk7.n_at(lambda);
        assert!(n < prev, "n({lambda}) = {n} not below n({}) = {prev}", lambda - 10.0);
        prev = n;
        lambda += 10.0;
    }
}

#[test]
fn soap_bubble_timeline_varies_and_conserves() {
    let bubble = TemporalThinFilm::soap_bubble();
    let timeline = bubble.sample_timeline(10.0, 100, 1.0);
    assert_eq!(timeline.len(), 200);

    let reflectances: Vec<f64> = timeline.chunks(2).map(|pair| pair[1]).collect();
    let min = reflectances.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = reflectances.iter().cloned().fold(0.0, f64::max);
    assert!(max - min > 0.01, "timeline is flat: [{min}, {max}]");

    // closure holds at every sampled frame
    for pair in timeline.chunks(2) {
        let film = bubble.film_at(pair[0]);
        for i in 0..SPECTRUM_SAMPLES {
            let b = film.bsdf(wavelength_nm(i), 1.0, 1.0);
            assert!(b.closure_error() < CLOSURE_TOL, "t = {}: {b:?}", pair[0]);
        }
    }
}

#[test]
fn conductors_brighten_toward_grazing() {
    for conductor in [
        ConductorBsdf::gold(),
        ConductorBsdf::silver(),
        ConductorBsdf::copper(),
    ] {
        let grazing = conductor.evaluate(0.01).reflectance;
        let normal = conductor.evaluate(1.0).reflectance;
        assert!(
            grazing > normal,
            "{}: grazing {grazing} <= normal {normal}",
            conductor.name
        );
    }
}

#[test]
fn demo_pipeline_audit_is_clean_over_contexts() {
    for &angle in &[0.0, 25.0, 60.0, 85.0] {
        for &temp in &[250.0, 293.15, 800.0] {
            let ctx = EvaluationContext::new()
                .with_angle_deg(angle)
                .with_temperature_k(temp);
            let report = demo_pipeline().verify_energy_conservation(&ctx);
            assert!(report.is_conserved(), "angle {angle} temp {temp}:\n{report}");
        }
    }
}
