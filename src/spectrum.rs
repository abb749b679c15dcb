//! Spectral power distributions on the fixed visible-light grid.
//!
//! This module defines the sampling grid shared by every spectral quantity
//! in the engine and the immutable [`SpectralSignal`] value type that moves
//! through film, scattering and pipeline evaluations. All spectral arrays
//! in the crate have exactly [`SPECTRUM_SAMPLES`] entries on this grid.
//!
//! The spectral system provides:
//! - A fixed 380-700 nm grid with 10 nm spacing (33 samples)
//! - Immutable signal values with non-negative intensities
//! - Pointwise multiplication and scaling that return new signals
//! - CIE 1931 colour-matching and D65 illuminant tables on the same grid
//! - Integration of a signal to CIE XYZ tristimulus values
//!
//! # Grid Convention
//!
//! Sample `i` sits at `380 + 10 * i` nanometres. Quantities defined off-grid
//! are evaluated at the nearest sample; nothing in the engine interpolates
//! between grid points.

use serde::{Deserialize, Serialize};

/// Number of samples in every spectral array.
pub const SPECTRUM_SAMPLES: usize = 33;
/// Shortest wavelength on the grid, in nanometres.
pub const WAVELENGTH_MIN_NM: f64 = 380.0;
/// Longest wavelength on the grid, in nanometres.
pub const WAVELENGTH_MAX_NM: f64 = 700.0;
/// Grid spacing in nanometres.
pub const WAVELENGTH_STEP_NM: f64 = 10.0;

/// Returns the wavelength in nanometres of grid sample `index`.
pub fn wavelength_nm(index: usize) -> f64 {
    debug_assert!(index < SPECTRUM_SAMPLES);
    WAVELENGTH_MIN_NM + WAVELENGTH_STEP_NM * index as f64
}

/// Iterates over all grid wavelengths in ascending order.
pub fn wavelengths() -> impl Iterator<Item = f64> {
    (0..SPECTRUM_SAMPLES).map(wavelength_nm)
}

/// Index of the grid sample nearest to `lambda_nm`, clamped to the grid.
pub fn nearest_sample(lambda_nm: f64) -> usize {
    let t = (lambda_nm - WAVELENGTH_MIN_NM) / WAVELENGTH_STEP_NM;
    (t.round().max(0.0) as usize).min(SPECTRUM_SAMPLES - 1)
}

/// Immutable spectral power distribution on the fixed grid.
///
/// **Context**: Film reflectance, scattering attenuation and conductor
/// tinting all transform light described per-wavelength. A shared value type
/// with a fixed layout lets stages compose without shape checks and keeps
/// the flat numeric boundary layout (33 `f64` values) bit-exact.
///
/// **How it Works**: Wraps a fixed-size array of intensities. Construction
/// and every transform clamp negatives to zero, so a signal can never carry
/// non-physical negative power. All operations return new signals; nothing
/// mutates in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralSignal {
    intensities: [f64; SPECTRUM_SAMPLES],
}

// serde's derived array support stops at 32 elements, one short of the
// grid, so the signal serialises through a length-checked sequence.
impl Serialize for SpectralSignal {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.intensities.iter())
    }
}

impl<'de> Deserialize<'de> for SpectralSignal {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<f64>::deserialize(deserializer)?;
        let intensities: [f64; SPECTRUM_SAMPLES] = values.try_into().map_err(|v: Vec<f64>| {
            serde::de::Error::invalid_length(v.len(), &"one intensity per grid sample")
        })?;
        Ok(Self::new(intensities))
    }
}

impl SpectralSignal {
    /// Creates a signal from raw intensities, clamping negatives to zero.
    pub fn new(intensities: [f64; SPECTRUM_SAMPLES]) -> Self {
        let mut clamped = intensities;
        for v in clamped.iter_mut() {
            if !v.is_finite() || *v < 0.0 {
                *v = v.max(0.0);
                if !v.is_finite() {
                    *v = 0.0;
                }
            }
        }
        Self {
            intensities: clamped,
        }
    }

    /// A flat signal with the given intensity at every sample.
    pub fn uniform(intensity: f64) -> Self {
        Self::new([intensity; SPECTRUM_SAMPLES])
    }

    /// Equal-energy white: unit intensity everywhere.
    pub fn equal_energy() -> Self {
        Self::uniform(1.0)
    }

    /// Zero signal.
    pub fn zeros() -> Self {
        Self::uniform(0.0)
    }

    /// Builds a signal by evaluating `f` at every grid wavelength.
    pub fn from_fn<F: FnMut(f64) -> f64>(mut f: F) -> Self {
        let mut intensities = [0.0; SPECTRUM_SAMPLES];
        for (i, v) in intensities.iter_mut().enumerate() {
            *v = f(wavelength_nm(i));
        }
        Self::new(intensities)
    }

    /// Intensity at grid sample `index`.
    pub fn at(&self, index: usize) -> f64 {
        self.intensities[index]
    }

    /// Intensity at the grid sample nearest to `lambda_nm`.
    pub fn at_wavelength(&self, lambda_nm: f64) -> f64 {
        self.intensities[nearest_sample(lambda_nm)]
    }

    /// Borrow of the raw sample array, in grid order.
    pub fn intensities(&self) -> &[f64; SPECTRUM_SAMPLES] {
        &self.intensities
    }

    /// Pointwise product with another signal, as a new signal.
    pub fn multiply(&self, other: &SpectralSignal) -> SpectralSignal {
        let mut out = [0.0; SPECTRUM_SAMPLES];
        for i in 0..SPECTRUM_SAMPLES {
            out[i] = self.intensities[i] * other.intensities[i];
        }
        Self::new(out)
    }

    /// Uniformly scaled copy. Negative factors clamp to a zero signal.
    pub fn scale(&self, factor: f64) -> SpectralSignal {
        let mut out = self.intensities;
        for v in out.iter_mut() {
            *v *= factor;
        }
        Self::new(out)
    }

    /// Applies `f(lambda_nm, intensity)` at every sample, as a new signal.
    pub fn map<F: FnMut(f64, f64) -> f64>(&self, mut f: F) -> SpectralSignal {
        let mut out = [0.0; SPECTRUM_SAMPLES];
        for i in 0..SPECTRUM_SAMPLES {
            out[i] = f(wavelength_nm(i), self.intensities[i]);
        }
        Self::new(out)
    }

    /// Sum of all sample intensities.
    pub fn total(&self) -> f64 {
        self.intensities.iter().sum()
    }

    /// Largest sample intensity.
    pub fn peak(&self) -> f64 {
        self.intensities.iter().cloned().fold(0.0, f64::max)
    }

    /// Integrates the signal against the D65-weighted CIE colour-matching
    /// functions to produce XYZ tristimulus values.
    ///
    /// **Context**: Spectral output must eventually land in RGB for the
    /// styling layer. The standard route is integration against the CIE
    /// 1931 observer under a reference illuminant.
    ///
    /// **How it Works**: Treats the signal as a spectral reflectance lit by
    /// D65 and normalizes by the illuminant luminance integral, so a unit
    /// (perfect-reflector) signal maps to Y = 1.
    pub fn to_xyz(&self) -> [f64; 3] {
        let mut xyz = [0.0; 3];
        let mut norm = 0.0;
        for i in 0..SPECTRUM_SAMPLES {
            let w = D65[i] * self.intensities[i];
            xyz[0] += CIE_X[i] * w;
            xyz[1] += CIE_Y[i] * w;
            xyz[2] += CIE_Z[i] * w;
            norm += CIE_Y[i] * D65[i];
        }
        [xyz[0] / norm, xyz[1] / norm, xyz[2] / norm]
    }
}

/// CIE 1931 2-degree colour-matching function x-bar, 380-700 nm at 10 nm.
pub const CIE_X: [f64; SPECTRUM_SAMPLES] = [
    0.001368, 0.004243, 0.014310, 0.043510, 0.134380, 0.283900, 0.348280, 0.336200, 0.290800,
    0.195360, 0.095640, 0.032010, 0.004900, 0.009300, 0.063270, 0.165500, 0.290400, 0.433450,
    0.594500, 0.762100, 0.916300, 1.026300, 1.062200, 1.002600, 0.854450, 0.642400, 0.447900,
    0.283500, 0.164900, 0.087400, 0.046770, 0.022700, 0.011359,
];

/// CIE 1931 2-degree colour-matching function y-bar, 380-700 nm at 10 nm.
pub const CIE_Y: [f64; SPECTRUM_SAMPLES] = [
    0.000039, 0.000120, 0.000396, 0.001210, 0.004000, 0.011600, 0.023000, 0.038000, 0.060000,
    0.090980, 0.139020, 0.208020, 0.323000, 0.503000, 0.710000, 0.862000, 0.954000, 0.994950,
    0.995000, 0.952000, 0.870000, 0.757000, 0.631000, 0.503000, 0.381000, 0.265000, 0.175000,
    0.107000, 0.061000, 0.032000, 0.017000, 0.008210, 0.004102,
];

/// CIE 1931 2-degree colour-matching function z-bar, 380-700 nm at 10 nm.
pub const CIE_Z: [f64; SPECTRUM_SAMPLES] = [
    0.006450, 0.020050, 0.067850, 0.207400, 0.645600, 1.385600, 1.747060, 1.772110, 1.669200,
    1.287640, 0.812950, 0.465180, 0.272000, 0.158200, 0.078250, 0.042160, 0.020300, 0.008750,
    0.003900, 0.002100, 0.001650, 0.001100, 0.000800, 0.000340, 0.000190, 0.000050, 0.000020,
    0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000,
];

/// CIE standard illuminant D65 relative spectral power, 380-700 nm at 10 nm.
pub const D65: [f64; SPECTRUM_SAMPLES] = [
    49.98, 54.65, 82.75, 91.49, 93.43, 86.68, 104.86, 117.01, 117.81, 114.86, 115.92, 108.81,
    109.35, 107.80, 104.79, 107.69, 104.41, 104.05, 100.00, 96.33, 95.79, 88.69, 90.01, 89.60,
    87.70, 83.29, 83.70, 80.03, 80.21, 82.28, 78.28, 69.72, 71.61,
];
