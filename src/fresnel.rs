//! Fresnel equations for electromagnetic boundary conditions.
//!
//! This module implements the Fresnel equations that govern electromagnetic
//! wave reflection and transmission at material interfaces. Every film,
//! multilayer and conductor evaluation in the engine reduces to these
//! interface coefficients.
//!
//! The Fresnel calculations provide:
//! - Reflection coefficients for s and p polarizations
//! - Transmission coefficients with impedance matching
//! - Complex refractive index support for absorbing materials
//! - Matrix representation for direct amplitude computation
//! - Power reflectance helpers with grazing-angle clamping
//!
//! # Physical Foundation
//!
//! Based on Maxwell's equations at material boundaries:
//! - Continuity of tangential electric field
//! - Continuity of tangential magnetic field
//! - Proper impedance relationships
//! - Conservation of electromagnetic energy

use nalgebra::{Matrix2, Vector2};
use num_complex::Complex64;

/// Smallest incidence cosine used in interface formulas. Grazing rays clamp
/// here instead of dividing by zero.
pub const COS_EPSILON: f64 = 1e-4;

/// Computes Fresnel reflection coefficients for s and p polarization.
///
/// **Context**: When electromagnetic waves encounter interfaces between
/// materials with different refractive indices, the reflected field
/// amplitudes depend on polarization, incident angle, and material
/// properties. The Fresnel equations provide the exact electromagnetic
/// boundary conditions for these interactions.
///
/// **How it Works**: Calculates reflection coefficients separately for
/// s-polarized (perpendicular) and p-polarized (parallel) field components
/// using the classic Fresnel formulas. Returns a diagonal matrix with these
/// coefficients for direct multiplication with field amplitude matrices.
pub fn refl(
    n1: Complex64,
    n2: Complex64,
    cos_i: Complex64,
    cos_t: Complex64,
) -> Matrix2<Complex64> {
    let f11 = (n2 * cos_i - n1 * cos_t) / (n1 * cos_t + n2 * cos_i);
    let f22 = (n1 * cos_i - n2 * cos_t) / (n1 * cos_i + n2 * cos_t);
    Matrix2::from_diagonal(&Vector2::new(f11, f22))
}

/// Computes Fresnel transmission coefficients for s and p polarization.
///
/// **Context**: Transmitted (refracted) electromagnetic fields at material
/// interfaces require different amplitude scaling than reflected fields.
/// The transmission coefficients account for impedance matching between
/// media and ensure power conservation at the interface.
///
/// **How it Works**: Applies Fresnel transmission formulas for both
/// s-polarized and p-polarized components as a diagonal amplitude matrix.
pub fn refr(
    n1: Complex64,
    n2: Complex64,
    cos_i: Complex64,
    cos_t: Complex64,
) -> Matrix2<Complex64> {
    let f11 = (2.0 * n1 * cos_i) / (n1 * cos_t + n2 * cos_i);
    let f22 = (2.0 * n1 * cos_i) / (n1 * cos_i + n2 * cos_t);
    Matrix2::from_diagonal(&Vector2::new(f11, f22))
}

/// Complex transmitted cosine from Snell's law, valid for absorbing media.
///
/// Uses the principal square root of 1 - (n1/n2 sin_i)^2; total internal
/// reflection and conductor interfaces fall out of the complex arithmetic
/// without special cases.
pub fn complex_cos_t(n1: Complex64, n2: Complex64, cos_i: f64) -> Complex64 {
    let cos_i = cos_i.clamp(COS_EPSILON, 1.0);
    let sin_i2 = 1.0 - cos_i * cos_i;
    let ratio = n1 / n2;
    (Complex64::new(1.0, 0.0) - ratio * ratio * sin_i2).sqrt()
}

/// Amplitude reflection coefficients (r_s, r_p) at a single interface.
pub fn amplitudes(n1: Complex64, n2: Complex64, cos_i: f64) -> (Complex64, Complex64) {
    let cos_i = cos_i.clamp(COS_EPSILON, 1.0);
    let cos_t = complex_cos_t(n1, n2, cos_i);
    let ci = Complex64::new(cos_i, 0.0);
    let r_s = (n1 * ci - n2 * cos_t) / (n1 * ci + n2 * cos_t);
    let r_p = (n2 * ci - n1 * cos_t) / (n2 * ci + n1 * cos_t);
    (r_s, r_p)
}

/// Power reflectance (R_s, R_p) at a single interface.
pub fn power_reflectance(n1: Complex64, n2: Complex64, cos_i: f64) -> (f64, f64) {
    let (r_s, r_p) = amplitudes(n1, n2, cos_i);
    (r_s.norm_sqr(), r_p.norm_sqr())
}

/// Unpolarized power reflectance: the s/p average.
pub fn unpolarized_reflectance(n1: Complex64, n2: Complex64, cos_i: f64) -> f64 {
    let (rs, rp) = power_reflectance(n1, n2, cos_i);
    0.5 * (rs + rp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_incidence_glass() {
        // R = ((n-1)/(n+1))^2 = 0.04 for n = 1.5
        let n1 = Complex64::new(1.0, 0.0);
        let n2 = Complex64::new(1.5, 0.0);
        let r = unpolarized_reflectance(n1, n2, 1.0);
        assert!((r - 0.04).abs() < 1e-4, "R: {r}");
    }

    #[test]
    fn brewster_angle_kills_p_polarization() {
        let n1 = Complex64::new(1.0, 0.0);
        let n2 = Complex64::new(1.5, 0.0);
        let brewster = (1.5f64).atan();
        let (_, rp) = power_reflectance(n1, n2, brewster.cos());
        assert!(rp < 1e-6, "Rp at Brewster: {rp}");
    }

    #[test]
    fn grazing_reflectance_approaches_unity() {
        let n1 = Complex64::new(1.0, 0.0);
        let n2 = Complex64::new(1.5, 0.0);
        let r = unpolarized_reflectance(n1, n2, 0.001);
        assert!(r > 0.95, "R at grazing: {r}");
    }

    #[test]
    fn cos_epsilon_prevents_division_blowup() {
        let n1 = Complex64::new(1.0, 0.0);
        let n2 = Complex64::new(1.33, 0.0);
        let r = unpolarized_reflectance(n1, n2, 0.0);
        assert!(r.is_finite());
        assert!((0.0..=1.0).contains(&r));
    }

    #[test]
    fn total_internal_reflection() {
        // dense-to-rare past the critical angle: |r| = 1
        let n1 = Complex64::new(1.5, 0.0);
        let n2 = Complex64::new(1.0, 0.0);
        let critical = (1.0f64 / 1.5).asin();
        let cos_i = (critical + 0.2).cos();
        let (r_s, r_p) = amplitudes(n1, n2, cos_i);
        assert!((r_s.norm() - 1.0).abs() < 1e-9);
        assert!((r_p.norm() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn conductor_reflectance_is_high() {
        // gold-like index in the red
        let n1 = Complex64::new(1.0, 0.0);
        let n2 = Complex64::new(0.18, 3.0);
        let r = unpolarized_reflectance(n1, n2, 1.0);
        assert!(r > 0.9, "conductor R: {r}");
    }

    #[test]
    fn matrix_form_matches_scalar_amplitudes() {
        let n1 = Complex64::new(1.0, 0.0);
        let n2 = Complex64::new(1.5, 0.0);
        let cos_i = 0.8;
        let cos_t = complex_cos_t(n1, n2, cos_i);
        let m = refl(n1, n2, Complex64::new(cos_i, 0.0), cos_t);
        let (r_s, r_p) = amplitudes(n1, n2, cos_i);
        assert!((m[(0, 0)].norm() - r_p.norm()).abs() < 1e-9);
        assert!((m[(1, 1)].norm() - r_s.norm()).abs() < 1e-9);
    }
}
