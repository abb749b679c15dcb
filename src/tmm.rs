//! Transfer-matrix method for arbitrary multilayer stacks.
//!
//! This module generalizes single-film interference to stacks of N layers.
//! Each layer contributes a dynamical matrix encoding its boundary Fresnel
//! behaviour and a propagation matrix accumulating phase through the layer;
//! the ordered product gives the full stack response at any wavelength and
//! incidence angle.
//!
//! The transfer-matrix system provides:
//! - 2x2 complex matrix composition per layer, in deposition order
//! - S, P and averaged polarization evaluation
//! - Reflectance, transmittance and absorption with energy bookkeeping
//! - Full-grid spectra and RGB output
//! - Bragg mirror, morpho butterfly and nacre structural-colour presets
//!
//! # Mathematical Foundation
//!
//! M = D0^-1 * prod(D_i P_i D_i^-1) * D_s with propagation phase
//! delta = 2 pi n d cos(theta) / lambda. Reflection and transmission
//! amplitudes fall out as r = M21 / M11 and t = 1 / M11. Nothing is cached:
//! every call recomputes the product from the current layer list.

use anyhow::{bail, Result};
use nalgebra::Matrix2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::brdf::BsdfResult;
use crate::colour;
use crate::film::FilmLayer;
use crate::fresnel::COS_EPSILON;
use crate::spectrum::SpectralSignal;

/// Polarization selector for stack evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarization {
    S,
    P,
    /// Unpolarized light: the mean of the s and p powers.
    Average,
}

/// Multilayer optical stack between an incident medium and a substrate.
///
/// **Context**: Dielectric mirrors, butterfly wing scales and nacre all owe
/// their colour to constructive interference across many layers; a single
/// Airy film cannot capture them. The transfer-matrix method composes the
/// exact response of any ordered layer sequence.
///
/// **How it Works**: Holds the layer list in physical deposition order
/// (first entry is struck first by incident light). Evaluation builds the
/// per-layer matrix product fresh on every call, so mutating the layer list
/// can never leave stale optical state behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferMatrixFilm {
    pub n_incident: f64,
    pub n_substrate: f64,
    pub layers: Vec<FilmLayer>,
}

/// Closed-form inverse of a 2x2 complex matrix.
fn inv2(m: &Matrix2<Complex64>) -> Matrix2<Complex64> {
    let det = m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)];
    Matrix2::new(m[(1, 1)], -m[(0, 1)], -m[(1, 0)], m[(0, 0)]) / det
}

/// Dynamical (boundary) matrix of a medium for one polarization.
fn dynamical(n: Complex64, cos_t: Complex64, pol: Polarization) -> Matrix2<Complex64> {
    let one = Complex64::new(1.0, 0.0);
    match pol {
        Polarization::S => Matrix2::new(one, one, n * cos_t, -n * cos_t),
        Polarization::P => Matrix2::new(cos_t, cos_t, n, -n),
        Polarization::Average => unreachable!("average splits into S and P before dispatch"),
    }
}

/// Propagation matrix accumulating phase delta through a layer.
fn propagation(delta: Complex64) -> Matrix2<Complex64> {
    let zero = Complex64::new(0.0, 0.0);
    Matrix2::new(
        (Complex64::i() * delta).exp(),
        zero,
        zero,
        (-Complex64::i() * delta).exp(),
    )
}

impl TransferMatrixFilm {
    /// Creates a stack, validating the bounding media. Layers are validated
    /// by [`FilmLayer::new`] before they reach the stack.
    pub fn new(n_incident: f64, n_substrate: f64, layers: Vec<FilmLayer>) -> Result<Self> {
        if !n_incident.is_finite() || n_incident < 1.0 {
            bail!("incident index must be finite and at least 1, got {n_incident}");
        }
        if !n_substrate.is_finite() || n_substrate <= 0.0 {
            bail!("substrate index must be finite and positive, got {n_substrate}");
        }
        Ok(Self {
            n_incident,
            n_substrate,
            layers,
        })
    }

    /// Whether any layer absorbs (carries a non-zero extinction).
    pub fn is_absorbing(&self) -> bool {
        self.layers.iter().any(|l| l.k.unwrap_or(0.0) > 0.0)
    }

    /// Complex (r, t) amplitudes for a single linear polarization.
    fn amplitudes(
        &self,
        lambda_nm: f64,
        cos_theta0: f64,
        pol: Polarization,
    ) -> (Complex64, Complex64) {
        let cos0 = cos_theta0.clamp(COS_EPSILON, 1.0);
        let n0 = Complex64::new(self.n_incident, 0.0);
        let ns = Complex64::new(self.n_substrate, 0.0);
        // transverse wavevector component conserved across all layers
        let sin0 = (1.0 - cos0 * cos0).max(0.0).sqrt();
        let kt = n0 * sin0;

        let cos_in = |n: Complex64| -> Complex64 {
            let s = kt / n;
            (Complex64::new(1.0, 0.0) - s * s).sqrt()
        };

        let d0 = dynamical(n0, Complex64::new(cos0, 0.0), pol);
        let mut m = inv2(&d0);

        for layer in &self.layers {
            let n = layer.ior();
            let ct = cos_in(n);
            let delta = Complex64::new(2.0 * std::f64::consts::PI, 0.0) * n
                * layer.thickness_nm
                * ct
                / lambda_nm;
            let d = dynamical(n, ct, pol);
            m *= d * propagation(delta) * inv2(&d);
        }

        let ds = dynamical(ns, cos_in(ns), pol);
        m *= ds;

        let r = m[(1, 0)] / m[(0, 0)];
        let t = Complex64::new(1.0, 0.0) / m[(0, 0)];
        (r, t)
    }

    /// (R, T) powers for a single linear polarization.
    fn powers(&self, lambda_nm: f64, cos_theta0: f64, pol: Polarization) -> (f64, f64) {
        let cos0 = cos_theta0.clamp(COS_EPSILON, 1.0);
        let (r, t) = self.amplitudes(lambda_nm, cos0, pol);
        let n0 = self.n_incident;
        let ns = Complex64::new(self.n_substrate, 0.0);
        let sin0 = (1.0 - cos0 * cos0).max(0.0).sqrt();
        let kt = Complex64::new(n0, 0.0) * sin0;
        let s = kt / ns;
        let cos_s = (Complex64::new(1.0, 0.0) - s * s).sqrt();
        // power flux ratio; evanescent substrate waves carry none
        let flux = (ns * cos_s).re / (n0 * cos0);
        (r.norm_sqr().min(1.0), (t.norm_sqr() * flux).clamp(0.0, 1.0))
    }

    /// Reflectance at `lambda_nm` for light incident at `angle_deg`.
    pub fn reflectance(&self, lambda_nm: f64, angle_deg: f64, pol: Polarization) -> f64 {
        let cos0 = (angle_deg.to_radians()).cos();
        match pol {
            Polarization::Average => {
                let (rs, _) = self.powers(lambda_nm, cos0, Polarization::S);
                let (rp, _) = self.powers(lambda_nm, cos0, Polarization::P);
                0.5 * (rs + rp)
            }
            p => self.powers(lambda_nm, cos0, p).0,
        }
    }

    /// Transmittance into the substrate at `lambda_nm` and `angle_deg`.
    pub fn transmittance(&self, lambda_nm: f64, angle_deg: f64, pol: Polarization) -> f64 {
        let cos0 = (angle_deg.to_radians()).cos();
        match pol {
            Polarization::Average => {
                let (_, ts) = self.powers(lambda_nm, cos0, Polarization::S);
                let (_, tp) = self.powers(lambda_nm, cos0, Polarization::P);
                0.5 * (ts + tp)
            }
            p => self.powers(lambda_nm, cos0, p).1,
        }
    }

    /// Full energy split; absorption is the interference-aware remainder.
    pub fn bsdf(&self, lambda_nm: f64, angle_deg: f64, pol: Polarization) -> BsdfResult {
        let r = self.reflectance(lambda_nm, angle_deg, pol);
        let t = self.transmittance(lambda_nm, angle_deg, pol);
        BsdfResult::new(r, t, 1.0 - r - t)
    }

    /// Reflectance at every grid wavelength.
    pub fn reflectance_spectrum(&self, angle_deg: f64, pol: Polarization) -> SpectralSignal {
        SpectralSignal::from_fn(|lambda| self.reflectance(lambda, angle_deg, pol))
    }

    /// Reflected colour as linear sRGB in [0, 1].
    pub fn reflectance_rgb(&self, angle_deg: f64, pol: Polarization) -> [f64; 3] {
        colour::xyz_to_linear_srgb(self.reflectance_spectrum(angle_deg, pol).to_xyz())
    }

    // --- structural-colour presets (stable public surface) ---

    /// Quarter-wave Bragg mirror tuned to `center_nm`.
    ///
    /// Alternating high/low index pairs on a glass substrate, closed by a
    /// final high-index layer so every interface reflects in phase.
    /// Reflectance at the design wavelength converges to 1 as `pairs` grows.
    pub fn bragg_mirror(n_high: f64, n_low: f64, center_nm: f64, pairs: usize) -> Self {
        let high = FilmLayer {
            n: n_high,
            k: None,
            thickness_nm: center_nm / (4.0 * n_high),
        };
        let mut layers = Vec::with_capacity(pairs * 2 + 1);
        for _ in 0..pairs {
            layers.push(high);
            layers.push(FilmLayer {
                n: n_low,
                k: None,
                thickness_nm: center_nm / (4.0 * n_low),
            });
        }
        layers.push(high);
        Self {
            n_incident: 1.0,
            n_substrate: 1.52,
            layers,
        }
    }

    /// Morpho butterfly wing scale: chitin/air lamellae tuned to the blue.
    pub fn morpho_butterfly() -> Self {
        let mut layers = Vec::with_capacity(12);
        for _ in 0..6 {
            layers.push(FilmLayer {
                n: 1.56,
                k: None,
                thickness_nm: 77.0,
            });
            layers.push(FilmLayer {
                n: 1.0,
                k: None,
                thickness_nm: 120.0,
            });
        }
        Self {
            n_incident: 1.0,
            n_substrate: 1.56,
            layers,
        }
    }

    /// Nacre (mother-of-pearl): aragonite platelets with conchiolin sheets.
    pub fn nacre() -> Self {
        let mut layers = Vec::with_capacity(10);
        for _ in 0..5 {
            layers.push(FilmLayer {
                n: 1.68,
                k: None,
                thickness_nm: 440.0,
            });
            layers.push(FilmLayer {
                n: 1.53,
                k: None,
                thickness_nm: 30.0,
            });
        }
        Self {
            n_incident: 1.0,
            n_substrate: 1.53,
            layers,
        }
    }
}
