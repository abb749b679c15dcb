//! Complex refractive indices and dispersion models.
//!
//! This module provides the wavelength-dependent refractive index machinery
//! that every interface computation in the engine builds on. Dielectrics use
//! the Cauchy or Sellmeier empirical forms; conducting metals use a Drude
//! free-electron model with an optional temperature-scaled damping term.
//!
//! The index system provides:
//! - Scalar complex indices with conductor classification
//! - Spectral index curves on the shared sampling grid
//! - Cauchy, Sellmeier and Drude dispersion with a common evaluation contract
//! - Abbe number and group index derived from the dispersion curve
//! - Named material presets that form part of the stable public surface
//!
//! # Evaluation Range
//!
//! Dispersion formulas are fitted over a limited range. Wavelengths outside
//! [200, 2500] nm clamp to the nearest bound rather than extrapolating into
//! non-physical territory.

use anyhow::{bail, Result};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::spectrum::{SPECTRUM_SAMPLES, wavelength_nm};

/// Shortest wavelength accepted by dispersion evaluation, in nm.
pub const DISPERSION_MIN_NM: f64 = 200.0;
/// Longest wavelength accepted by dispersion evaluation, in nm.
pub const DISPERSION_MAX_NM: f64 = 2500.0;
/// Extinction coefficient above which a material counts as a conductor.
pub const CONDUCTOR_K_THRESHOLD: f64 = 0.1;
/// Lowest temperature the Drude damping correction accepts, in K.
pub const DRUDE_TEMP_MIN_K: f64 = 200.0;
/// Highest temperature the Drude damping correction accepts, in K.
pub const DRUDE_TEMP_MAX_K: f64 = 2000.0;
/// Photon energy in eV of a 1 nm wavelength (hc/e in eV*nm).
const EV_NM: f64 = 1239.8419843320026;

/// Complex refractive index n + ik at a single wavelength.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexIor {
    pub n: f64,
    pub k: f64,
}

impl ComplexIor {
    /// Creates an index value, rejecting non-physical parameters.
    pub fn new(n: f64, k: f64) -> Result<Self> {
        if !n.is_finite() || n <= 0.0 {
            bail!("refractive index n must be finite and positive, got {n}");
        }
        if !k.is_finite() || k < 0.0 {
            bail!("extinction coefficient k must be finite and non-negative, got {k}");
        }
        Ok(Self { n, k })
    }

    /// A lossless dielectric index.
    pub fn dielectric(n: f64) -> Result<Self> {
        Self::new(n, 0.0)
    }

    /// Whether this index describes a conducting material (k > 0.1).
    pub fn is_conductor(&self) -> bool {
        self.k > CONDUCTOR_K_THRESHOLD
    }

    pub fn to_complex(&self) -> Complex64 {
        Complex64::new(self.n, self.k)
    }
}

/// Complex index curves sampled on the spectral grid.
///
/// **Context**: Conductor tinting and multilayer evaluation need the index
/// at every grid wavelength, not just one. Sampling the dispersion model
/// once onto the shared grid keeps the per-stage evaluation loops free of
/// model dispatch.
///
/// **How it Works**: Stores parallel n and k arrays, one entry per grid
/// sample, validated finite at construction. Curves are immutable after
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralComplexIor {
    n: [f64; SPECTRUM_SAMPLES],
    k: [f64; SPECTRUM_SAMPLES],
}

// serde's derived array support stops at 32 elements; the curves go
// through length-checked sequences and revalidate on the way in.
impl Serialize for SpectralComplexIor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("SpectralComplexIor", 2)?;
        state.serialize_field("n", &self.n[..])?;
        state.serialize_field("k", &self.k[..])?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for SpectralComplexIor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Curves {
            n: Vec<f64>,
            k: Vec<f64>,
        }
        let curves = Curves::deserialize(deserializer)?;
        let expected = &"one index value per grid sample";
        let n: [f64; SPECTRUM_SAMPLES] = curves
            .n
            .try_into()
            .map_err(|v: Vec<f64>| serde::de::Error::invalid_length(v.len(), expected))?;
        let k: [f64; SPECTRUM_SAMPLES] = curves
            .k
            .try_into()
            .map_err(|v: Vec<f64>| serde::de::Error::invalid_length(v.len(), expected))?;
        Self::new(n, k).map_err(serde::de::Error::custom)
    }
}

impl SpectralComplexIor {
    pub fn new(n: [f64; SPECTRUM_SAMPLES], k: [f64; SPECTRUM_SAMPLES]) -> Result<Self> {
        for i in 0..SPECTRUM_SAMPLES {
            if !n[i].is_finite() || !k[i].is_finite() {
                bail!("index curve contains a non-finite value at sample {i}");
            }
            if n[i] <= 0.0 || k[i] < 0.0 {
                bail!(
                    "non-physical index at sample {i}: n = {}, k = {}",
                    n[i],
                    k[i]
                );
            }
        }
        Ok(Self { n, k })
    }

    /// Samples a dispersion model onto the grid.
    pub fn from_dispersion(model: &Dispersion) -> Self {
        let mut n = [1.0; SPECTRUM_SAMPLES];
        let mut k = [0.0; SPECTRUM_SAMPLES];
        for i in 0..SPECTRUM_SAMPLES {
            let ior = model.ior_at(wavelength_nm(i));
            n[i] = ior.n;
            k[i] = ior.k;
        }
        Self { n, k }
    }

    pub fn at(&self, index: usize) -> ComplexIor {
        ComplexIor {
            n: self.n[index],
            k: self.k[index],
        }
    }
}

/// Wavelength-dependent refractive index model.
///
/// **Context**: Real materials refract each wavelength differently; a single
/// scalar index cannot reproduce chromatic effects such as dispersion fringes
/// or the spectral reflectance of metals. Each variant carries the fitted
/// coefficients of a standard empirical or physical model.
///
/// **How it Works**: `Cauchy` and `Sellmeier` are lossless dielectric fits
/// evaluated directly from their closed forms. `Drude` computes a complex
/// dielectric function from the free-electron plasma energy and damping,
/// then takes the principal square root for n + ik. All variants share the
/// same evaluation contract and wavelength clamping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Dispersion {
    /// n = A + B/lambda^2 + C/lambda^4, lambda in nm.
    Cauchy { a: f64, b: f64, c: f64 },
    /// n^2 - 1 = sum B_i * l^2 / (l^2 - C_i), l in um, C in um^2.
    Sellmeier { b: [f64; 3], c: [f64; 3] },
    /// Free-electron conductor: plasma energy and damping in eV.
    Drude {
        plasma_ev: f64,
        damping_ev: f64,
        /// Linear damping scaling per kelvin away from 300 K.
        temp_coeff: f64,
    },
}

fn clamp_wavelength(lambda_nm: f64) -> f64 {
    lambda_nm.clamp(DISPERSION_MIN_NM, DISPERSION_MAX_NM)
}

impl Dispersion {
    /// Real refractive index at `lambda_nm`.
    pub fn n_at(&self, lambda_nm: f64) -> f64 {
        self.ior_at(lambda_nm).n
    }

    /// Complex refractive index at `lambda_nm`, clamped to the fit range.
    pub fn ior_at(&self, lambda_nm: f64) -> ComplexIor {
        self.ior_at_temperature(lambda_nm, 300.0)
    }

    /// Complex refractive index with temperature-scaled damping.
    ///
    /// Dielectric models ignore temperature. For Drude conductors the
    /// damping rate scales linearly with T, which keeps the result
    /// continuous and monotonic over [200 K, 2000 K].
    pub fn ior_at_temperature(&self, lambda_nm: f64, kelvin: f64) -> ComplexIor {
        let lambda = clamp_wavelength(lambda_nm);
        match *self {
            Dispersion::Cauchy { a, b, c } => {
                let l2 = lambda * lambda;
                let n = a + b / l2 + c / (l2 * l2);
                ComplexIor { n: n.max(1.0), k: 0.0 }
            }
            Dispersion::Sellmeier { b, c } => {
                let l_um = lambda * 1e-3;
                let l2 = l_um * l_um;
                let mut n2 = 1.0;
                for i in 0..3 {
                    n2 += b[i] * l2 / (l2 - c[i]);
                }
                ComplexIor {
                    n: n2.max(1.0).sqrt(),
                    k: 0.0,
                }
            }
            Dispersion::Drude {
                plasma_ev,
                damping_ev,
                temp_coeff,
            } => {
                let t = kelvin.clamp(DRUDE_TEMP_MIN_K, DRUDE_TEMP_MAX_K);
                let gamma = damping_ev * (1.0 + temp_coeff * (t - 300.0));
                let e = EV_NM / lambda;
                // epsilon = 1 - Ep^2 / (E^2 + i*gamma*E)
                let denom = Complex64::new(e * e, gamma * e);
                let eps = Complex64::new(1.0, 0.0) - plasma_ev * plasma_ev / denom;
                let ior = eps.sqrt();
                ComplexIor {
                    n: ior.re.max(1e-4),
                    k: ior.im.abs(),
                }
            }
        }
    }

    /// Abbe number from the Fraunhofer d, F and C lines.
    pub fn abbe_number(&self) -> f64 {
        let nd = self.n_at(587.6);
        let nf = self.n_at(486.1);
        let nc = self.n_at(656.3);
        (nd - 1.0) / (nf - nc)
    }

    /// Group index n_g = n - lambda * dn/dlambda, central difference with
    /// a 1 nm step.
    pub fn group_index(&self, lambda_nm: f64) -> f64 {
        let lambda = clamp_wavelength(lambda_nm);
        let dn = (self.n_at(lambda + 1.0) - self.n_at(lambda - 1.0)) / 2.0;
        self.n_at(lambda) - lambda * dn
    }

    // --- named presets; coefficients are part of the stable surface ---

    /// Schott N-BK7 crown glass (Sellmeier).
    pub fn bk7() -> Self {
        Dispersion::Sellmeier {
            b: [1.03961212, 0.231792344, 1.01046945],
            c: [0.00600069867, 0.0200179144, 103.560653],
        }
    }

    /// Fused silica (Sellmeier, Malitson).
    pub fn fused_silica() -> Self {
        Dispersion::Sellmeier {
            b: [0.6961663, 0.4079426, 0.8974794],
            c: [0.0046791, 0.0135121, 97.9340025],
        }
    }

    /// Sapphire, ordinary ray (Sellmeier).
    pub fn sapphire() -> Self {
        Dispersion::Sellmeier {
            b: [1.4313493, 0.65054713, 5.3414021],
            c: [0.00527993, 0.01423827, 325.01783],
        }
    }

    /// Water at room temperature (Cauchy fit, visible range).
    pub fn water() -> Self {
        Dispersion::Cauchy {
            a: 1.3244,
            b: 3066.0,
            c: 0.0,
        }
    }

    /// Polycarbonate (Cauchy fit).
    pub fn polycarbonate() -> Self {
        Dispersion::Cauchy {
            a: 1.5672,
            b: 12503.0,
            c: 0.0,
        }
    }

    /// Gold (Drude free-electron fit).
    pub fn gold() -> Self {
        Dispersion::Drude {
            plasma_ev: 9.03,
            damping_ev: 0.053,
            temp_coeff: 0.0013,
        }
    }

    /// Silver (Drude free-electron fit).
    pub fn silver() -> Self {
        Dispersion::Drude {
            plasma_ev: 9.01,
            damping_ev: 0.048,
            temp_coeff: 0.0013,
        }
    }

    /// Aluminium (Drude free-electron fit).
    pub fn aluminium() -> Self {
        Dispersion::Drude {
            plasma_ev: 14.98,
            damping_ev: 0.047,
            temp_coeff: 0.0013,
        }
    }
}
