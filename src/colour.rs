//! Colour conversion: XYZ, sRGB, hex, luminance, CIEDE2000 and CVD.
//!
//! This module carries spectral results over the boundary into the RGB and
//! CSS world. The spectral side produces CIE XYZ tristimulus values; this
//! side maps them to linear and encoded sRGB, hex strings, WCAG relative
//! luminance, perceptual colour difference, and colour-vision-deficiency
//! simulation.
//!
//! The conversion layer provides:
//! - XYZ to linear sRGB (D65) and the sRGB transfer functions
//! - Hex emission and parsing for the token-layer boundary
//! - WCAG relative luminance
//! - Full CIEDE2000 colour difference via CIELAB
//! - The three Vienot/Brettel dichromacy matrices, row-stochastic in
//!   linear RGB so the D65 white point is preserved exactly

use anyhow::{bail, Result};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// D65 reference white for CIELAB conversion.
const LAB_WHITE: [f64; 3] = [0.95047, 1.0, 1.08883];

/// Converts CIE XYZ (D65) to linear sRGB, clamped to [0, 1].
///
/// Spectral colours can land outside the sRGB gamut; out-of-gamut channels
/// clamp to the gamut boundary rather than leaving the valid range.
pub fn xyz_to_linear_srgb(xyz: [f64; 3]) -> [f64; 3] {
    let r = 3.2404542 * xyz[0] - 1.5371385 * xyz[1] - 0.4985314 * xyz[2];
    let g = -0.9692660 * xyz[0] + 1.8760108 * xyz[1] + 0.0415560 * xyz[2];
    let b = 0.0556434 * xyz[0] - 0.2040259 * xyz[1] + 1.0572252 * xyz[2];
    [r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0)]
}

/// Converts linear sRGB to CIE XYZ (D65).
pub fn linear_srgb_to_xyz(rgb: [f64; 3]) -> [f64; 3] {
    let x = 0.4124564 * rgb[0] + 0.3575761 * rgb[1] + 0.1804375 * rgb[2];
    let y = 0.2126729 * rgb[0] + 0.7151522 * rgb[1] + 0.0721750 * rgb[2];
    let z = 0.0193339 * rgb[0] + 0.1191920 * rgb[1] + 0.9503041 * rgb[2];
    [x, y, z]
}

/// sRGB encoding transfer function for one linear channel.
pub fn linear_to_srgb(c: f64) -> f64 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.0031308 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// sRGB decoding transfer function for one encoded channel.
pub fn srgb_to_linear(c: f64) -> f64 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Encodes a linear sRGB triple.
pub fn encode_srgb(rgb: [f64; 3]) -> [f64; 3] {
    [
        linear_to_srgb(rgb[0]),
        linear_to_srgb(rgb[1]),
        linear_to_srgb(rgb[2]),
    ]
}

/// Encoded sRGB in [0, 1] to 8-bit channels.
pub fn to_rgb8(srgb: [f64; 3]) -> [u8; 3] {
    [
        (srgb[0].clamp(0.0, 1.0) * 255.0).round() as u8,
        (srgb[1].clamp(0.0, 1.0) * 255.0).round() as u8,
        (srgb[2].clamp(0.0, 1.0) * 255.0).round() as u8,
    ]
}

/// Encoded sRGB to a lowercase hex string.
pub fn to_hex(srgb: [f64; 3]) -> String {
    let [r, g, b] = to_rgb8(srgb);
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Parses `#rrggbb` (or `rrggbb`) into encoded sRGB in [0, 1].
pub fn parse_hex(hex: &str) -> Result<[f64; 3]> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("malformed hex colour: {hex:?}");
    }
    let r = u8::from_str_radix(&digits[0..2], 16)?;
    let g = u8::from_str_radix(&digits[2..4], 16)?;
    let b = u8::from_str_radix(&digits[4..6], 16)?;
    Ok([r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0])
}

/// Linear sRGB to Oklab (Ottosson's LMS matrices).
pub fn linear_srgb_to_oklab(rgb: [f64; 3]) -> [f64; 3] {
    let l = 0.4122214708 * rgb[0] + 0.5363325363 * rgb[1] + 0.0514459929 * rgb[2];
    let m = 0.2119034982 * rgb[0] + 0.6806995451 * rgb[1] + 0.1073969566 * rgb[2];
    let s = 0.0883024619 * rgb[0] + 0.2817188376 * rgb[1] + 0.6299787005 * rgb[2];
    let (l, m, s) = (l.cbrt(), m.cbrt(), s.cbrt());
    [
        0.2104542553 * l + 0.7936177850 * m - 0.0040720468 * s,
        1.9779984951 * l - 2.4285922050 * m + 0.4505937099 * s,
        0.0259040371 * l + 0.7827717662 * m - 0.8086757660 * s,
    ]
}

/// Oklab back to linear sRGB, clamped to the gamut.
pub fn oklab_to_linear_srgb(lab: [f64; 3]) -> [f64; 3] {
    let l = lab[0] + 0.3963377774 * lab[1] + 0.2158037573 * lab[2];
    let m = lab[0] - 0.1055613458 * lab[1] - 0.0638541728 * lab[2];
    let s = lab[0] - 0.0894841775 * lab[1] - 1.2914855480 * lab[2];
    let (l, m, s) = (l * l * l, m * m * m, s * s * s);
    let r = 4.0767416621 * l - 3.3077115913 * m + 0.2309699292 * s;
    let g = -1.2684380046 * l + 2.6097574011 * m - 0.3413193965 * s;
    let b = -0.0041960863 * l - 0.7034186147 * m + 1.7076147010 * s;
    [r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0)]
}

/// Linear sRGB to OKLCH `[L, C, H]`, hue in degrees in [0, 360).
pub fn linear_srgb_to_oklch(rgb: [f64; 3]) -> [f64; 3] {
    let [l, a, b] = linear_srgb_to_oklab(rgb);
    let c = (a * a + b * b).sqrt();
    let mut h = b.atan2(a).to_degrees();
    if h < 0.0 {
        h += 360.0;
    }
    [l, c, h]
}

/// OKLCH `[L, C, H]` to linear sRGB, clamped to the gamut.
pub fn oklch_to_linear_srgb(lch: [f64; 3]) -> [f64; 3] {
    let h = lch[2].to_radians();
    oklab_to_linear_srgb([lch[0], lch[1] * h.cos(), lch[1] * h.sin()])
}

/// WCAG relative luminance of an encoded sRGB triple.
pub fn relative_luminance(srgb: [f64; 3]) -> f64 {
    let r = srgb_to_linear(srgb[0]);
    let g = srgb_to_linear(srgb[1]);
    let b = srgb_to_linear(srgb[2]);
    0.2126 * r + 0.7152 * g + 0.0722 * b
}

/// CIELAB coordinates from encoded sRGB, D65 white.
pub fn srgb_to_lab(srgb: [f64; 3]) -> [f64; 3] {
    let linear = [
        srgb_to_linear(srgb[0]),
        srgb_to_linear(srgb[1]),
        srgb_to_linear(srgb[2]),
    ];
    let xyz = linear_srgb_to_xyz(linear);
    let f = |t: f64| -> f64 {
        const DELTA: f64 = 6.0 / 29.0;
        if t > DELTA * DELTA * DELTA {
            t.cbrt()
        } else {
            t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
        }
    };
    let fx = f(xyz[0] / LAB_WHITE[0]);
    let fy = f(xyz[1] / LAB_WHITE[1]);
    let fz = f(xyz[2] / LAB_WHITE[2]);
    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// CIEDE2000 colour difference between two CIELAB colours.
///
/// **Context**: Euclidean Lab distance over-weights chroma differences in
/// saturated regions; CIEDE2000 is the CIE-recommended correction and the
/// difference metric the recommendation layer scores against.
///
/// **How it Works**: Implements the full Sharma formulation: chroma-weighted
/// a' rescaling, hue-difference handling across the 0/360 seam, the T hue
/// weighting polynomial, and the rotation term coupling chroma and hue.
pub fn delta_e2000(lab1: [f64; 3], lab2: [f64; 3]) -> f64 {
    let (l1, a1, b1) = (lab1[0], lab1[1], lab1[2]);
    let (l2, a2, b2) = (lab2[0], lab2[1], lab2[2]);

    let c1 = (a1 * a1 + b1 * b1).sqrt();
    let c2 = (a2 * a2 + b2 * b2).sqrt();
    let c_bar = 0.5 * (c1 + c2);
    let c_bar7 = c_bar.powi(7);
    let g = 0.5 * (1.0 - (c_bar7 / (c_bar7 + 25.0_f64.powi(7))).sqrt());

    let a1p = (1.0 + g) * a1;
    let a2p = (1.0 + g) * a2;
    let c1p = (a1p * a1p + b1 * b1).sqrt();
    let c2p = (a2p * a2p + b2 * b2).sqrt();

    let hue = |a: f64, b: f64, c: f64| -> f64 {
        if c == 0.0 {
            0.0
        } else {
            let h = b.atan2(a).to_degrees();
            if h < 0.0 {
                h + 360.0
            } else {
                h
            }
        }
    };
    let h1p = hue(a1p, b1, c1p);
    let h2p = hue(a2p, b2, c2p);

    let dl = l2 - l1;
    let dc = c2p - c1p;
    let dh_angle = if c1p * c2p == 0.0 {
        0.0
    } else {
        let mut d = h2p - h1p;
        if d > 180.0 {
            d -= 360.0;
        } else if d < -180.0 {
            d += 360.0;
        }
        d
    };
    let dh = 2.0 * (c1p * c2p).sqrt() * (dh_angle.to_radians() / 2.0).sin();

    let l_bar = 0.5 * (l1 + l2);
    let cp_bar = 0.5 * (c1p + c2p);
    let h_bar = if c1p * c2p == 0.0 {
        h1p + h2p
    } else {
        let sum = h1p + h2p;
        if (h1p - h2p).abs() > 180.0 {
            if sum < 360.0 {
                0.5 * (sum + 360.0)
            } else {
                0.5 * (sum - 360.0)
            }
        } else {
            0.5 * sum
        }
    };

    let t = 1.0 - 0.17 * (h_bar - 30.0).to_radians().cos()
        + 0.24 * (2.0 * h_bar).to_radians().cos()
        + 0.32 * (3.0 * h_bar + 6.0).to_radians().cos()
        - 0.20 * (4.0 * h_bar - 63.0).to_radians().cos();

    let d_theta = 30.0 * (-((h_bar - 275.0) / 25.0).powi(2)).exp();
    let cp_bar7 = cp_bar.powi(7);
    let rc = 2.0 * (cp_bar7 / (cp_bar7 + 25.0_f64.powi(7))).sqrt();
    let lb2 = (l_bar - 50.0) * (l_bar - 50.0);
    let sl = 1.0 + 0.015 * lb2 / (20.0 + lb2).sqrt();
    let sc = 1.0 + 0.045 * cp_bar;
    let sh = 1.0 + 0.015 * cp_bar * t;
    let rt = -(2.0 * d_theta).to_radians().sin() * rc;

    let dl_term = dl / sl;
    let dc_term = dc / sc;
    let dh_term = dh / sh;
    (dl_term * dl_term + dc_term * dc_term + dh_term * dh_term + rt * dc_term * dh_term).sqrt()
}

/// CIEDE2000 between two encoded sRGB triples.
pub fn delta_e2000_srgb(a: [f64; 3], b: [f64; 3]) -> f64 {
    delta_e2000(srgb_to_lab(a), srgb_to_lab(b))
}

/// Dichromatic colour vision deficiency classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cvd {
    Protanopia,
    Deuteranopia,
    Tritanopia,
}

impl Cvd {
    /// Vienot (protan/deutan) and Brettel-derived (tritan) projection in
    /// linear RGB. Every row sums to 1, so neutral greys (and D65 white)
    /// pass through unchanged.
    pub fn matrix(&self) -> Matrix3<f64> {
        match self {
            Cvd::Protanopia => Matrix3::new(
                0.11238, 0.88762, 0.00000, //
                0.11238, 0.88762, 0.00000, //
                0.00401, -0.00401, 1.00000,
            ),
            Cvd::Deuteranopia => Matrix3::new(
                0.29275, 0.70725, 0.00000, //
                0.29275, 0.70725, 0.00000, //
                -0.02234, 0.02234, 1.00000,
            ),
            Cvd::Tritanopia => Matrix3::new(
                1.00000, 0.14461, -0.14461, //
                0.00000, 0.85924, 0.14076, //
                0.00000, 0.85924, 0.14076,
            ),
        }
    }

    /// Simulates this deficiency on a linear sRGB triple.
    pub fn apply(&self, linear_rgb: [f64; 3]) -> [f64; 3] {
        let v = self.matrix() * Vector3::new(linear_rgb[0], linear_rgb[1], linear_rgb[2]);
        [v[0].clamp(0.0, 1.0), v[1].clamp(0.0, 1.0), v[2].clamp(0.0, 1.0)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let rgb = parse_hex("#3fa7c2").unwrap();
        assert_eq!(to_hex(rgb), "#3fa7c2");
        assert!(parse_hex("#12345").is_err());
        assert!(parse_hex("zzzzzz").is_err());
    }

    #[test]
    fn luminance_extremes() {
        assert!((relative_luminance([1.0, 1.0, 1.0]) - 1.0).abs() < 1e-9);
        assert_eq!(relative_luminance([0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn delta_e_zero_for_identical_colours() {
        let lab = srgb_to_lab([0.4, 0.6, 0.2]);
        assert_eq!(delta_e2000(lab, lab), 0.0);
    }

    #[test]
    fn delta_e_sharma_reference_pair() {
        // pair 1 of the Sharma et al. CIEDE2000 test data
        let lab1 = [50.0, 2.6772, -79.7751];
        let lab2 = [50.0, 0.0, -82.7485];
        let de = delta_e2000(lab1, lab2);
        assert!((de - 2.0425).abs() < 1e-4, "dE00: {de}");
    }

    #[test]
    fn cvd_rows_are_stochastic() {
        for cvd in [Cvd::Protanopia, Cvd::Deuteranopia, Cvd::Tritanopia] {
            let m = cvd.matrix();
            for row in 0..3 {
                let sum: f64 = (0..3).map(|col| m[(row, col)]).sum();
                assert!((sum - 1.0).abs() < 1e-9, "{cvd:?} row {row}: {sum}");
            }
        }
    }

    #[test]
    fn cvd_preserves_white() {
        for cvd in [Cvd::Protanopia, Cvd::Deuteranopia, Cvd::Tritanopia] {
            let out = cvd.apply([1.0, 1.0, 1.0]);
            for c in out {
                assert!((c - 1.0).abs() < 1e-9, "{cvd:?}: {out:?}");
            }
        }
    }

    #[test]
    fn oklch_round_trip_and_white() {
        let rgb = [0.3, 0.6, 0.1];
        let back = oklch_to_linear_srgb(linear_srgb_to_oklch(rgb));
        for i in 0..3 {
            assert!((rgb[i] - back[i]).abs() < 1e-6);
        }
        let white = linear_srgb_to_oklch([1.0, 1.0, 1.0]);
        assert!((white[0] - 1.0).abs() < 1e-4);
        assert!(white[1] < 1e-4); // achromatic
    }

    #[test]
    fn xyz_srgb_round_trip() {
        let rgb = [0.25, 0.5, 0.75];
        let back = xyz_to_linear_srgb(linear_srgb_to_xyz(rgb));
        for i in 0..3 {
            assert!((rgb[i] - back[i]).abs() < 1e-6);
        }
    }
}
