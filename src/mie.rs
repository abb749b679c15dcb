//! Particle scattering: Rayleigh, Mie and geometric regimes.
//!
//! This module characterizes how spherical particles scatter light as a
//! function of the size parameter x = 2 pi r / lambda. Small particles
//! scatter in the Rayleigh regime with the familiar x^4 law, wavelength-scale
//! particles in the Mie regime proper, and large particles approach the
//! geometric-optics extinction limit of 2.
//!
//! The scattering system provides:
//! - Validated particle parameter sets with relative-index handling
//! - Regime classification from the size parameter
//! - Extinction and scattering efficiencies per regime
//! - Henyey-Greenstein, double Henyey-Greenstein and Rayleigh phase
//!   functions, each normalized over the sphere
//! - Keyframed particle evolution for animated fog and smoke
//! - A lazily built, read-only efficiency lookup table shared across threads
//!
//! # Key Parameters
//!
//! - **Size parameter**: x = 2 pi r / lambda, the single regime selector
//! - **Extinction efficiency**: removed power over geometric cross section
//! - **Asymmetry parameter**: average cosine of the scattering angle

use std::f64::consts::PI;
use std::sync::OnceLock;

use anyhow::{bail, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::spectrum::SpectralSignal;

/// Size parameter below which scattering is treated as Rayleigh.
pub const RAYLEIGH_X_LIMIT: f64 = 0.3;
/// Size parameter above which scattering is treated as geometric.
pub const GEOMETRIC_X_LIMIT: f64 = 10.0;

/// Scattering regime selected by the size parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScatteringRegime {
    Rayleigh,
    Mie,
    Geometric,
}

/// Spherical scattering particle in a host medium.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MieParams {
    pub radius_um: f64,
    pub n_particle: f64,
    pub n_medium: f64,
}

impl MieParams {
    pub fn new(radius_um: f64, n_particle: f64, n_medium: f64) -> Result<Self> {
        if !radius_um.is_finite() || radius_um <= 0.0 {
            bail!("particle radius must be finite and positive, got {radius_um} um");
        }
        if !n_particle.is_finite() || n_particle <= 0.0 {
            bail!("particle index must be finite and positive, got {n_particle}");
        }
        if !n_medium.is_finite() || n_medium < 1.0 {
            bail!("medium index must be finite and at least 1, got {n_medium}");
        }
        Ok(Self {
            radius_um,
            n_particle,
            n_medium,
        })
    }

    /// Water droplet in air.
    pub fn fog_droplet(radius_um: f64) -> Result<Self> {
        Self::new(radius_um, 1.33, 1.0)
    }

    /// Soot-like smoke particle in air.
    pub fn smoke_particle(radius_um: f64) -> Result<Self> {
        Self::new(radius_um, 1.57, 1.0)
    }

    /// Size parameter x = 2 pi r / lambda, always finite and non-negative.
    pub fn size_parameter(&self, lambda_nm: f64) -> f64 {
        let lambda = lambda_nm.max(1.0);
        2.0 * PI * self.radius_um * 1000.0 / lambda
    }

    /// Particle index relative to the host medium.
    pub fn relative_index(&self) -> f64 {
        self.n_particle / self.n_medium
    }

    pub fn regime(&self, lambda_nm: f64) -> ScatteringRegime {
        let x = self.size_parameter(lambda_nm);
        if x < RAYLEIGH_X_LIMIT {
            ScatteringRegime::Rayleigh
        } else if x < GEOMETRIC_X_LIMIT {
            ScatteringRegime::Mie
        } else {
            ScatteringRegime::Geometric
        }
    }

    /// Rayleigh scattering efficiency, proportional to x^4.
    pub fn rayleigh_efficiency(&self, lambda_nm: f64) -> f64 {
        let x = self.size_parameter(lambda_nm);
        let m2 = self.relative_index().powi(2);
        let lorenz = (m2 - 1.0) / (m2 + 2.0);
        8.0 / 3.0 * x.powi(4) * lorenz * lorenz
    }

    /// Extinction efficiency across all regimes.
    ///
    /// **Context**: Attenuation through a particle cloud is governed by the
    /// extinction cross section Q_ext * pi r^2. Exact Mie series evaluation
    /// is unnecessary for tinting; the standard regime approximations agree
    /// with the full series to within the engine's needs.
    ///
    /// **How it Works**: Rayleigh below x = 0.3, van de Hulst anomalous
    /// diffraction through the Mie regime, and the geometric limit of 2
    /// (extinction paradox) for large particles. Water droplets inside the
    /// tabulated size range are answered from the shared lookup table
    /// instead of re-deriving the formula per call.
    pub fn extinction_efficiency(&self, lambda_nm: f64) -> f64 {
        let x = self.size_parameter(lambda_nm);
        // water droplets are the common case; the shared table serves them
        if (self.relative_index() - MIE_LUT_RELATIVE_INDEX).abs() < 1e-12 && MieLut::covers(x) {
            return mie_lut().q_ext_at(x);
        }
        match self.regime(lambda_nm) {
            ScatteringRegime::Rayleigh => self.rayleigh_efficiency(lambda_nm),
            ScatteringRegime::Mie => {
                // anomalous diffraction phase lag
                let rho = 2.0 * x * (self.relative_index() - 1.0).abs().max(1e-9);
                2.0 - 4.0 / rho * rho.sin() + 4.0 / (rho * rho) * (1.0 - rho.cos())
            }
            ScatteringRegime::Geometric => 2.0,
        }
    }

    /// Scattering efficiency; equal to extinction for lossless particles.
    pub fn scattering_efficiency(&self, lambda_nm: f64) -> f64 {
        self.extinction_efficiency(lambda_nm)
    }

    /// Extinction efficiency at every grid wavelength.
    pub fn extinction_spectrum(&self) -> SpectralSignal {
        SpectralSignal::from_fn(|lambda| self.extinction_efficiency(lambda))
    }

    /// Henyey-Greenstein asymmetry parameter g at the given wavelength.
    ///
    /// Rayleigh scatterers are symmetric (g near 0); large particles scatter
    /// strongly forward (g toward 0.93, the water-droplet limit).
    pub fn asymmetry_factor(&self, lambda_nm: f64) -> f64 {
        let x = self.size_parameter(lambda_nm);
        0.93 * (1.0 - 1.0 / (1.0 + x))
    }
}

/// Henyey-Greenstein phase function, normalized over the sphere.
///
/// Integrates to 1 over all solid angles for any g in (-1, 1).
pub fn henyey_greenstein(cos_theta: f64, g: f64) -> f64 {
    let g = g.clamp(-0.999, 0.999);
    let denom = (1.0 + g * g - 2.0 * g * cos_theta).max(1e-12);
    (1.0 - g * g) / (4.0 * PI * denom.powf(1.5))
}

/// Two-lobed Henyey-Greenstein: a weighted forward and backward lobe.
///
/// `forward_weight` blends the two lobes; each lobe is normalized, so the
/// blend integrates to 1 as well.
pub fn double_henyey_greenstein(
    cos_theta: f64,
    g_forward: f64,
    g_back: f64,
    forward_weight: f64,
) -> f64 {
    let w = forward_weight.clamp(0.0, 1.0);
    w * henyey_greenstein(cos_theta, g_forward) + (1.0 - w) * henyey_greenstein(cos_theta, g_back)
}

/// Rayleigh phase function 3/(16 pi) (1 + cos^2), normalized over the sphere.
pub fn rayleigh_phase(cos_theta: f64) -> f64 {
    3.0 / (16.0 * PI) * (1.0 + cos_theta * cos_theta)
}

/// Particle parameters keyframed over explicit time.
///
/// **Context**: Condensing fog and dispersing smoke are particle populations
/// whose radius and index drift over seconds. Animation needs those drifts
/// without consulting a clock, so time is an explicit argument.
///
/// **How it Works**: Holds (time, params) keyframes in ascending time order
/// and interpolates each field linearly between neighbours; queries outside
/// the keyframe range clamp to the end values, so the trajectory is
/// continuous and monotonic between keyframes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicMieParams {
    keyframes: Vec<(f64, MieParams)>,
}

impl DynamicMieParams {
    pub fn new(keyframes: Vec<(f64, MieParams)>) -> Result<Self> {
        if keyframes.is_empty() {
            bail!("at least one keyframe is required");
        }
        for pair in keyframes.windows(2) {
            if pair[1].0 <= pair[0].0 {
                bail!(
                    "keyframe times must be strictly increasing, got {} then {}",
                    pair[0].0,
                    pair[1].0
                );
            }
        }
        Ok(Self { keyframes })
    }

    /// Fog droplets condensing from haze to full droplets over 10 seconds.
    pub fn fog_condensing() -> Self {
        Self {
            keyframes: vec![
                (0.0, MieParams { radius_um: 0.05, n_particle: 1.33, n_medium: 1.0 }),
                (5.0, MieParams { radius_um: 1.0, n_particle: 1.33, n_medium: 1.0 }),
                (10.0, MieParams { radius_um: 5.0, n_particle: 1.33, n_medium: 1.0 }),
            ],
        }
    }

    /// Smoke thinning out as large particles settle.
    pub fn smoke_dispersing() -> Self {
        Self {
            keyframes: vec![
                (0.0, MieParams { radius_um: 0.8, n_particle: 1.57, n_medium: 1.0 }),
                (6.0, MieParams { radius_um: 0.2, n_particle: 1.57, n_medium: 1.0 }),
                (12.0, MieParams { radius_um: 0.05, n_particle: 1.57, n_medium: 1.0 }),
            ],
        }
    }

    /// Interpolated particle parameters at time `t`, clamped to the ends.
    pub fn params_at_time(&self, t: f64) -> MieParams {
        let first = &self.keyframes[0];
        let last = &self.keyframes[self.keyframes.len() - 1];
        if t <= first.0 {
            return first.1;
        }
        if t >= last.0 {
            return last.1;
        }
        for pair in self.keyframes.windows(2) {
            let (t0, a) = pair[0];
            let (t1, b) = pair[1];
            if t >= t0 && t <= t1 {
                let u = (t - t0) / (t1 - t0);
                return MieParams {
                    radius_um: a.radius_um + u * (b.radius_um - a.radius_um),
                    n_particle: a.n_particle + u * (b.n_particle - a.n_particle),
                    n_medium: a.n_medium + u * (b.n_medium - a.n_medium),
                };
            }
        }
        last.1
    }
}

/// Precomputed extinction efficiencies over a size-parameter grid.
///
/// Built once for a water-droplet relative index and shared read-only; the
/// table is never mutated after construction, so cross-thread sharing needs
/// no locking beyond the one-time initialization.
#[derive(Debug)]
pub struct MieLut {
    pub x: Array1<f64>,
    pub q_ext: Array1<f64>,
}

/// Grid resolution of the shared lookup table.
pub const MIE_LUT_SAMPLES: usize = 512;
/// Relative index the shared table is built for.
pub const MIE_LUT_RELATIVE_INDEX: f64 = 1.33;
/// Smallest size parameter the table covers.
pub const MIE_LUT_X_MIN: f64 = 0.01;
/// Largest size parameter the table covers.
pub const MIE_LUT_X_MAX: f64 = 50.0;

impl MieLut {
    /// Whether a size parameter falls inside the tabulated range.
    pub fn covers(x: f64) -> bool {
        (MIE_LUT_X_MIN..=MIE_LUT_X_MAX).contains(&x)
    }

    /// Linearly interpolated extinction efficiency at size parameter `x`,
    /// clamped to the table ends.
    pub fn q_ext_at(&self, x: f64) -> f64 {
        let cells = (MIE_LUT_SAMPLES - 1) as f64;
        let t = ((x - MIE_LUT_X_MIN) / (MIE_LUT_X_MAX - MIE_LUT_X_MIN) * cells).clamp(0.0, cells);
        let i = (t.floor() as usize).min(MIE_LUT_SAMPLES - 2);
        let u = t - i as f64;
        self.q_ext[i] * (1.0 - u) + self.q_ext[i + 1] * u
    }
}

static MIE_LUT: OnceLock<MieLut> = OnceLock::new();

fn build_mie_lut() -> MieLut {
    let x = Array1::linspace(MIE_LUT_X_MIN, MIE_LUT_X_MAX, MIE_LUT_SAMPLES);
    let q_ext = x.mapv(|xi| {
        // same regime dispatch as MieParams, expressed in x directly
        let m = MIE_LUT_RELATIVE_INDEX;
        if xi < RAYLEIGH_X_LIMIT {
            let m2 = m * m;
            let lorenz = (m2 - 1.0) / (m2 + 2.0);
            8.0 / 3.0 * xi.powi(4) * lorenz * lorenz
        } else if xi < GEOMETRIC_X_LIMIT {
            let rho = 2.0 * xi * (m - 1.0);
            2.0 - 4.0 / rho * rho.sin() + 4.0 / (rho * rho) * (1.0 - rho.cos())
        } else {
            2.0
        }
    });
    MieLut { x, q_ext }
}

/// The shared extinction table, built on first use.
pub fn mie_lut() -> &'static MieLut {
    MIE_LUT.get_or_init(build_mie_lut)
}

/// Resident size of the shared lookup table in bytes.
pub fn mie_lut_memory() -> usize {
    let lut = mie_lut();
    (lut.x.len() + lut.q_ext.len()) * std::mem::size_of::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Numerical quadrature of a phase function over the sphere.
    fn integrate_phase<F: Fn(f64) -> f64>(phase: F) -> f64 {
        let steps = 20_000;
        let mut total = 0.0;
        for i in 0..steps {
            let theta = PI * (i as f64 + 0.5) / steps as f64;
            total += phase(theta.cos()) * 2.0 * PI * theta.sin() * (PI / steps as f64);
        }
        total
    }

    #[test]
    fn size_parameter_definition() {
        let p = MieParams::fog_droplet(0.5).unwrap();
        // x = 2 pi * 500 nm / 550 nm
        let x = p.size_parameter(550.0);
        assert!((x - 2.0 * PI * 500.0 / 550.0).abs() < 1e-12);
        assert!(x.is_finite() && x >= 0.0);
    }

    #[test]
    fn regimes_follow_size_parameter() {
        let tiny = MieParams::fog_droplet(0.01).unwrap();
        let medium = MieParams::fog_droplet(0.3).unwrap();
        let large = MieParams::fog_droplet(10.0).unwrap();
        assert_eq!(tiny.regime(550.0), ScatteringRegime::Rayleigh);
        assert_eq!(medium.regime(550.0), ScatteringRegime::Mie);
        assert_eq!(large.regime(550.0), ScatteringRegime::Geometric);
    }

    #[test]
    fn rayleigh_prefers_blue() {
        // the x^4 law: short wavelengths scatter far more strongly
        let p = MieParams::fog_droplet(0.01).unwrap();
        let blue = p.rayleigh_efficiency(400.0);
        let red = p.rayleigh_efficiency(700.0);
        assert!(blue / red > 8.0, "ratio: {}", blue / red);
    }

    #[test]
    fn geometric_limit_is_two() {
        let p = MieParams::fog_droplet(20.0).unwrap();
        assert_eq!(p.extinction_efficiency(550.0), 2.0);
    }

    #[test]
    fn phase_functions_normalize() {
        for g in [-0.9, 0.0, 0.9] {
            let integral = integrate_phase(|c| henyey_greenstein(c, g));
            assert!((integral - 1.0).abs() < 1e-3, "HG g={g}: {integral}");
        }
        let integral = integrate_phase(rayleigh_phase);
        assert!((integral - 1.0).abs() < 1e-3, "Rayleigh: {integral}");
        let integral = integrate_phase(|c| double_henyey_greenstein(c, 0.8, -0.3, 0.7));
        assert!((integral - 1.0).abs() < 1e-3, "double HG: {integral}");
    }

    #[test]
    fn asymmetry_grows_with_particle_size() {
        let small = MieParams::fog_droplet(0.01).unwrap();
        let big = MieParams::fog_droplet(5.0).unwrap();
        let g_small = small.asymmetry_factor(550.0);
        let g_big = big.asymmetry_factor(550.0);
        assert!(g_small < 0.15);
        assert!(g_big > 0.85 && g_big < 0.93);
    }

    #[test]
    fn dynamic_params_interpolate_monotonically() {
        let fog = DynamicMieParams::fog_condensing();
        let mut prev = fog.params_at_time(-1.0).radius_um;
        let mut t = 0.0;
        while t <= 12.0 {
            let r = fog.params_at_time(t).radius_um;
            assert!(r >= prev, "radius shrank at t = {t}");
            prev = r;
            t += 0.25;
        }
        // clamped beyond the last keyframe
        assert_eq!(fog.params_at_time(100.0).radius_um, 5.0);
    }

    #[test]
    fn dynamic_params_reject_unsorted_keyframes() {
        let p = MieParams::fog_droplet(1.0).unwrap();
        assert!(DynamicMieParams::new(vec![(1.0, p), (0.5, p)]).is_err());
        assert!(DynamicMieParams::new(vec![]).is_err());
    }

    #[test]
    fn lut_is_shared_and_sized() {
        let lut = mie_lut();
        assert_eq!(lut.x.len(), MIE_LUT_SAMPLES);
        assert_eq!(mie_lut_memory(), 2 * MIE_LUT_SAMPLES * 8);
        // same allocation on every access
        assert!(std::ptr::eq(lut, mie_lut()));
    }

    #[test]
    fn water_droplet_extinction_served_from_lut() {
        let p = MieParams::fog_droplet(0.5).unwrap();
        let lut = mie_lut();
        for lambda in [400.0, 550.0, 700.0] {
            let x = p.size_parameter(lambda);
            assert!(MieLut::covers(x));
            assert_eq!(p.extinction_efficiency(lambda), lut.q_ext_at(x));
        }
    }

    #[test]
    fn lut_interpolation_tracks_the_direct_formula() {
        // interpolation error stays well under the tinting tolerance
        let lut = mie_lut();
        let m = MIE_LUT_RELATIVE_INDEX;
        // stay inside the anomalous-diffraction band, clear of the
        // geometric cutover
        let mut x = 1.0;
        while x <= 9.0 {
            let rho = 2.0 * x * (m - 1.0);
            let direct = 2.0 - 4.0 / rho * rho.sin() + 4.0 / (rho * rho) * (1.0 - rho.cos());
            assert!(
                (lut.q_ext_at(x) - direct).abs() < 1e-2,
                "x {x}: lut {} vs direct {direct}",
                lut.q_ext_at(x)
            );
            x += 0.37;
        }
    }

    #[test]
    fn off_table_indices_use_the_direct_dispatch() {
        let smoke = MieParams::smoke_particle(0.5).unwrap();
        let x = smoke.size_parameter(550.0);
        let rho = 2.0 * x * (smoke.relative_index() - 1.0);
        let direct = 2.0 - 4.0 / rho * rho.sin() + 4.0 / (rho * rho) * (1.0 - rho.cos());
        assert!((smoke.extinction_efficiency(550.0) - direct).abs() < 1e-12);
    }
}
