//! Frozen sinusoidal network for perceptual colour correction.
//!
//! A tiny SIREN (sinusoidal representation network) applies a small, bounded
//! residual on top of the physically derived RGB output. The network is not
//! trainable: its 483 parameters are materialised once from a fixed seed and
//! shared read-only for the lifetime of the process, so identical inputs
//! produce bit-identical outputs on every platform and every run.
//!
//! Architecture is 6 inputs, one hidden layer of 48 sine units, 3 outputs:
//! 6*48 + 48 + 48*3 + 3 = 483 weights and biases.

use std::sync::OnceLock;

use rand::{rngs::StdRng, Rng, SeedableRng};

/// Seed the frozen weights are derived from. Changing this changes every
/// corrected colour the engine has ever produced, so it never changes.
pub const SIREN_SEED: u64 = 421337;
/// First-layer angular frequency, the standard SIREN omega_0.
pub const SIREN_OMEGA: f64 = 30.0;
/// Largest per-channel residual the network may apply.
pub const RESIDUAL_SCALE: f64 = 0.05;

const INPUT_DIM: usize = 6;
const HIDDEN_DIM: usize = 48;
const OUTPUT_DIM: usize = 3;

static NETWORK: OnceLock<SirenNetwork> = OnceLock::new();

/// The weight table of the correction network.
#[derive(Debug, Clone)]
pub struct SirenNetwork {
    w1: [[f64; INPUT_DIM]; HIDDEN_DIM],
    b1: [f64; HIDDEN_DIM],
    w2: [[f64; HIDDEN_DIM]; OUTPUT_DIM],
    b2: [f64; OUTPUT_DIM],
}

impl SirenNetwork {
    /// Materialises the frozen weights with the standard SIREN
    /// initialisation: first layer uniform in +-1/fan_in, hidden layer
    /// uniform in +-sqrt(6/fan_in)/omega_0.
    fn materialise() -> Self {
        let mut rng = StdRng::seed_from_u64(SIREN_SEED);

        let first_bound = 1.0 / INPUT_DIM as f64;
        let mut w1 = [[0.0; INPUT_DIM]; HIDDEN_DIM];
        for row in w1.iter_mut() {
            for w in row.iter_mut() {
                *w = rng.random_range(-first_bound..first_bound);
            }
        }
        let mut b1 = [0.0; HIDDEN_DIM];
        for b in b1.iter_mut() {
            *b = rng.random_range(-first_bound..first_bound);
        }

        let hidden_bound = (6.0 / HIDDEN_DIM as f64).sqrt() / SIREN_OMEGA;
        let mut w2 = [[0.0; HIDDEN_DIM]; OUTPUT_DIM];
        for row in w2.iter_mut() {
            for w in row.iter_mut() {
                *w = rng.random_range(-hidden_bound..hidden_bound);
            }
        }
        let mut b2 = [0.0; OUTPUT_DIM];
        for b in b2.iter_mut() {
            *b = rng.random_range(-hidden_bound..hidden_bound);
        }

        Self { w1, b1, w2, b2 }
    }

    /// Total parameter count of the architecture.
    pub const fn parameter_count() -> usize {
        INPUT_DIM * HIDDEN_DIM + HIDDEN_DIM + HIDDEN_DIM * OUTPUT_DIM + OUTPUT_DIM
    }

    /// Raw forward pass, outputs in roughly unit range before bounding.
    fn forward(&self, input: &[f64; INPUT_DIM]) -> [f64; OUTPUT_DIM] {
        let mut hidden = [0.0; HIDDEN_DIM];
        for (h, (row, b)) in hidden
            .iter_mut()
            .zip(self.w1.iter().zip(self.b1.iter()))
        {
            let mut acc = *b;
            for (w, x) in row.iter().zip(input.iter()) {
                acc += w * x;
            }
            *h = (SIREN_OMEGA * acc).sin();
        }

        let mut out = [0.0; OUTPUT_DIM];
        for (o, (row, b)) in out.iter_mut().zip(self.w2.iter().zip(self.b2.iter())) {
            let mut acc = *b;
            for (w, h) in row.iter().zip(hidden.iter()) {
                acc += w * h;
            }
            *o = acc;
        }
        out
    }
}

/// Shared read-only access to the frozen network.
pub fn network() -> &'static SirenNetwork {
    NETWORK.get_or_init(SirenNetwork::materialise)
}

/// Applies the bounded perceptual residual to a linear-RGB triple.
///
/// The network sees the colour plus the viewing conditions it was produced
/// under; the residual is squashed through tanh and scaled so no channel
/// moves by more than `RESIDUAL_SCALE`. Output channels are clamped back to
/// [0, 1].
pub fn correct_rgb(rgb: [f64; 3], angle_deg: f64, temperature_k: f64) -> [f64; 3] {
    let input = [
        rgb[0],
        rgb[1],
        rgb[2],
        (angle_deg / 90.0).clamp(0.0, 1.0),
        ((temperature_k - 200.0) / 1800.0).clamp(0.0, 1.0),
        // luminance proxy keeps the correction stable across exposure
        (0.2126 * rgb[0] + 0.7152 * rgb[1] + 0.0722 * rgb[2]).clamp(0.0, 1.0),
    ];
    let raw = network().forward(&input);
    [
        (rgb[0] + RESIDUAL_SCALE * raw[0].tanh()).clamp(0.0, 1.0),
        (rgb[1] + RESIDUAL_SCALE * raw[1].tanh()).clamp(0.0, 1.0),
        (rgb[2] + RESIDUAL_SCALE * raw[2].tanh()).clamp(0.0, 1.0),
    ]
}
