//! Refraction geometry at a dielectric interface.
//!
//! The Airy film model needs the propagation cosine inside a lossless layer.
//! Absorbing layers never come through here: the transfer-matrix path
//! carries the conserved transverse wavevector into each layer directly, so
//! this module only covers the real-index form of Snell's law with its
//! total-internal-reflection clamp.


/// Transmitted cosine for real (lossless) indices, clamped at total internal
/// reflection.
pub fn real_cos_t(cos_i: f64, n1: f64, n2: f64) -> f64 {
    let sin_i2 = (1.0 - cos_i * cos_i).max(0.0);
    let sin_t2 = (n1 / n2) * (n1 / n2) * sin_i2;
    (1.0 - sin_t2).max(0.0).sqrt()
}
