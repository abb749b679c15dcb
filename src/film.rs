//! Single-layer thin-film interference via the Airy summation.
//!
//! This module implements dielectric thin-film interference: the structural
//! colour of soap bubbles, oil slicks and anti-reflective coatings. A single
//! layer bounded by two Fresnel interfaces produces an infinite series of
//! internally reflected partial waves; the Airy closed form sums the series
//! exactly.
//!
//! The film system provides:
//! - Validated, immutable film layer descriptions
//! - Per-wavelength reflectance from the Airy geometric-series closed form
//! - Full-grid reflectance spectra and RGB integration
//! - Energy-conserving reflectance/transmittance/absorption splits
//! - Named presets forming part of the stable public surface
//! - Time-parameterized films for draining-bubble style animation
//!
//! # Physical Foundation
//!
//! The optical path difference between successive partial waves is
//! OPD = 2 n d cos(theta_t), giving a phase of 2 pi OPD / lambda. The total
//! reflected amplitude is r = (r1 + r2 e^{i phi}) / (1 + r1 r2 e^{i phi}),
//! which keeps reflectance within [0, 1] for every physical configuration.

use anyhow::{bail, Result};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::brdf::BsdfResult;
use crate::colour;
use crate::fresnel::{self, COS_EPSILON};
use crate::snell;
use crate::spectrum::SpectralSignal;

/// One layer in a film stack: real index, optional extinction, thickness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilmLayer {
    pub n: f64,
    pub k: Option<f64>,
    pub thickness_nm: f64,
}

impl FilmLayer {
    /// Creates a layer, rejecting non-physical parameters at construction.
    pub fn new(n: f64, k: Option<f64>, thickness_nm: f64) -> Result<Self> {
        if !n.is_finite() || n <= 0.0 {
            bail!("layer index must be finite and positive, got {n}");
        }
        if let Some(k) = k {
            if !k.is_finite() || k < 0.0 {
                bail!("layer extinction must be finite and non-negative, got {k}");
            }
        }
        if !thickness_nm.is_finite() || thickness_nm <= 0.0 {
            bail!("layer thickness must be finite and positive, got {thickness_nm} nm");
        }
        Ok(Self {
            n,
            k,
            thickness_nm,
        })
    }

    /// Lossless dielectric layer.
    pub fn dielectric(n: f64, thickness_nm: f64) -> Result<Self> {
        Self::new(n, None, thickness_nm)
    }

    pub fn ior(&self) -> Complex64 {
        Complex64::new(self.n, self.k.unwrap_or(0.0))
    }
}

/// Single dielectric film in air, evaluated with the Airy formula.
///
/// **Context**: A thin transparent layer over a substrate reflects from both
/// of its interfaces; the two reflections interfere with a phase set by the
/// optical path through the layer, producing wavelength-selective colour.
///
/// **How it Works**: Computes the refracted angle inside the film, the two
/// interface amplitude coefficients, and the accumulated phase, then sums
/// the infinite partial-wave series with the closed-form Airy expression
/// per polarization and averages the s and p powers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThinFilm {
    pub n_film: f64,
    pub thickness_nm: f64,
}

impl ThinFilm {
    pub fn new(n_film: f64, thickness_nm: f64) -> Result<Self> {
        if !n_film.is_finite() || n_film < 1.0 {
            bail!("film index must be finite and at least 1, got {n_film}");
        }
        if !thickness_nm.is_finite() || thickness_nm <= 0.0 {
            bail!("film thickness must be finite and positive, got {thickness_nm} nm");
        }
        Ok(Self {
            n_film,
            thickness_nm,
        })
    }

    /// The film as a one-layer stack description.
    pub fn layers(&self) -> Vec<FilmLayer> {
        vec![FilmLayer {
            n: self.n_film,
            k: None,
            thickness_nm: self.thickness_nm,
        }]
    }

    /// Reflectance at a single wavelength for a film in air over a substrate.
    ///
    /// `cos_theta` is the incidence cosine in air; grazing values clamp to a
    /// small epsilon rather than dividing by zero.
    pub fn reflectance(&self, lambda_nm: f64, n_substrate: f64, cos_theta: f64) -> f64 {
        let cos_i = cos_theta.clamp(COS_EPSILON, 1.0);
        let n_air = Complex64::new(1.0, 0.0);
        let n_film = Complex64::new(self.n_film, 0.0);
        let n_sub = Complex64::new(n_substrate, 0.0);

        let cos_film = snell::real_cos_t(cos_i, 1.0, self.n_film).max(COS_EPSILON);

        let (r1_s, r1_p) = fresnel::amplitudes(n_air, n_film, cos_i);
        let (r2_s, r2_p) = fresnel::amplitudes(n_film, n_sub, cos_film);

        // OPD = 2 n d cos(theta_t); phase advance over one round trip
        let opd = 2.0 * self.n_film * self.thickness_nm * cos_film;
        let phi = 2.0 * std::f64::consts::PI * opd / lambda_nm;
        let rot = Complex64::new(0.0, phi).exp();

        let airy = |r1: Complex64, r2: Complex64| -> f64 {
            let r = (r1 + r2 * rot) / (Complex64::new(1.0, 0.0) + r1 * r2 * rot);
            r.norm_sqr().min(1.0)
        };

        0.5 * (airy(r1_s, r2_s) + airy(r1_p, r2_p))
    }

    /// Reflectance at every grid wavelength.
    pub fn reflectance_spectrum(&self, n_substrate: f64, cos_theta: f64) -> SpectralSignal {
        SpectralSignal::from_fn(|lambda| self.reflectance(lambda, n_substrate, cos_theta))
    }

    /// Reflected colour as linear sRGB in [0, 1], integrated against the
    /// CIE colour-matching weights.
    pub fn reflectance_rgb(&self, n_substrate: f64, cos_theta: f64) -> [f64; 3] {
        colour::xyz_to_linear_srgb(self.reflectance_spectrum(n_substrate, cos_theta).to_xyz())
    }

    /// Energy split for a lossless film: transmittance is the complement of
    /// reflectance and nothing is absorbed.
    pub fn bsdf(&self, lambda_nm: f64, n_substrate: f64, cos_theta: f64) -> BsdfResult {
        let r = self.reflectance(lambda_nm, n_substrate, cos_theta);
        BsdfResult::new(r, 1.0 - r, 0.0)
    }

    // --- named presets; numeric parameters are part of the stable surface ---

    /// Thin soap film (n = 1.33, 150 nm): pale first-order colours.
    pub fn soap_bubble_thin() -> Self {
        Self {
            n_film: 1.33,
            thickness_nm: 150.0,
        }
    }

    /// Medium soap film (n = 1.33, 350 nm): saturated mid-order colours.
    pub fn soap_bubble_medium() -> Self {
        Self {
            n_film: 1.33,
            thickness_nm: 350.0,
        }
    }

    /// Thick soap film (n = 1.33, 550 nm): washed-out high-order colours.
    pub fn soap_bubble_thick() -> Self {
        Self {
            n_film: 1.33,
            thickness_nm: 550.0,
        }
    }

    /// Oil film on water (n = 1.47, 300 nm).
    pub fn oil_slick() -> Self {
        Self {
            n_film: 1.47,
            thickness_nm: 300.0,
        }
    }

    /// Titania oxide coating (n = 2.40, 120 nm), as on coated glass.
    pub fn oxide_coating() -> Self {
        Self {
            n_film: 2.40,
            thickness_nm: 120.0,
        }
    }
}

/// Thin film whose thickness evolves with explicit time.
///
/// **Context**: A draining soap bubble changes colour as its film thins;
/// animated materials need that evolution without any hidden clock. Time is
/// always an explicit argument, keeping evaluation deterministic.
///
/// **How it Works**: Thickness follows a drain term plus a bounded
/// oscillation, floored at a minimum thickness, and the film at a given
/// instant is an ordinary [`ThinFilm`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalThinFilm {
    pub n_film: f64,
    pub base_thickness_nm: f64,
    pub drain_nm_per_s: f64,
    pub oscillation_nm: f64,
    pub period_s: f64,
    pub min_thickness_nm: f64,
}

impl TemporalThinFilm {
    /// Draining, wobbling soap bubble.
    pub fn soap_bubble() -> Self {
        Self {
            n_film: 1.33,
            base_thickness_nm: 500.0,
            drain_nm_per_s: 20.0,
            oscillation_nm: 80.0,
            period_s: 1.3,
            min_thickness_nm: 30.0,
        }
    }

    /// Film thickness at time `t` seconds.
    pub fn thickness_at(&self, t: f64) -> f64 {
        let phase = 2.0 * std::f64::consts::PI * t / self.period_s;
        let d = self.base_thickness_nm - self.drain_nm_per_s * t
            + self.oscillation_nm * phase.sin();
        d.max(self.min_thickness_nm)
    }

    /// The film frozen at time `t`.
    pub fn film_at(&self, t: f64) -> ThinFilm {
        ThinFilm {
            n_film: self.n_film,
            thickness_nm: self.thickness_at(t),
        }
    }

    /// Samples luminance-weighted reflectance over `[0, duration_s]`.
    ///
    /// Returns the interleaved flat layout `[t0, R0, t1, R1, ...]` consumed
    /// by the styling layer; `frames` samples, endpoints included.
    pub fn sample_timeline(&self, duration_s: f64, frames: usize, cos_theta: f64) -> Vec<f64> {
        let mut out = Vec::with_capacity(frames * 2);
        let n = frames.max(2);
        for i in 0..n {
            let t = duration_s * i as f64 / (n - 1) as f64;
            let film = self.film_at(t);
            // luminance-weighted reflectance: Y of the reflectance spectrum
            let r = film.reflectance_spectrum(1.0, cos_theta).to_xyz()[1];
            out.push(t);
            out.push(r);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fresnel::unpolarized_reflectance;
    use crate::spectrum::wavelengths;

    #[test]
    fn construction_rejects_non_physical() {
        assert!(ThinFilm::new(1.33, -10.0).is_err());
        assert!(ThinFilm::new(0.5, 100.0).is_err());
        assert!(FilmLayer::new(1.5, Some(-0.1), 100.0).is_err());
        assert!(FilmLayer::dielectric(1.5, 100.0).is_ok());
    }

    #[test]
    fn reflectance_bounded() {
        let film = ThinFilm::soap_bubble_medium();
        for lambda in wavelengths() {
            for &ct in &[0.0, 0.01, 0.3, 0.7, 1.0] {
                let r = film.reflectance(lambda, 1.0, ct);
                assert!((0.0..=1.0).contains(&r), "R({lambda}, {ct}) = {r}");
            }
        }
    }

    #[test]
    fn vanishing_film_degenerates_to_fresnel() {
        // thickness -> 0: the film disappears and the air-substrate
        // interface remains
        let film = ThinFilm::new(1.33, 1e-4).unwrap();
        let n1 = Complex64::new(1.0, 0.0);
        let n_sub = Complex64::new(1.5, 0.0);
        for &ct in &[1.0, 0.8, 0.5] {
            let r_film = film.reflectance(550.0, 1.5, ct);
            let r_bare = unpolarized_reflectance(n1, n_sub, ct);
            assert!(
                (r_film - r_bare).abs() < 1e-4,
                "ct {ct}: film {r_film} vs bare {r_bare}"
            );
        }
    }

    #[test]
    fn quarter_wave_coating_reduces_reflectance() {
        // MgF2-like quarter-wave layer on glass at 550 nm
        let n_film = 1.38;
        let film = ThinFilm::new(n_film, 550.0 / (4.0 * n_film)).unwrap();
        let coated = film.reflectance(550.0, 1.52, 1.0);
        let bare = unpolarized_reflectance(
            Complex64::new(1.0, 0.0),
            Complex64::new(1.52, 0.0),
            1.0,
        );
        assert!(coated < bare, "coated {coated} vs bare {bare}");
        assert!(coated < 0.02);
    }

    #[test]
    fn film_bsdf_conserves_energy() {
        let film = ThinFilm::oil_slick();
        for lambda in wavelengths() {
            let b = film.bsdf(lambda, 1.33, 0.9);
            assert!(b.closure_error() < 1e-6);
        }
    }

    #[test]
    fn soap_bubble_timeline_varies_and_stays_physical() {
        let bubble = TemporalThinFilm::soap_bubble();
        let timeline = bubble.sample_timeline(10.0, 100, 1.0);
        assert_eq!(timeline.len(), 200);
        let values: Vec<f64> = timeline.chunks(2).map(|c| c[1]).collect();
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(0.0, f64::max);
        assert!(max - min > 0.005, "timeline nearly constant: {min}..{max}");
        for v in values {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn temporal_thickness_floors_at_minimum() {
        let bubble = TemporalThinFilm::soap_bubble();
        // long after draining the film sits at its minimum thickness
        assert_eq!(bubble.thickness_at(1e4), bubble.min_thickness_nm);
    }
}
