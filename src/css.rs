//! CSS fragment emission and render-backend unit conversion.
//!
//! The physics side works in canonical physical units (nanometres,
//! millimetres, degrees). This module is the only place those units are
//! converted to pixels and serialised into CSS strings, so a change of
//! display density never leaks back into the optical models.
//!
//! The emission layer provides:
//! - `blur_px`, the single mm-to-px conversion point for scattering radii
//! - `backdrop-filter` and `box-shadow` fragment builders
//! - `linear-gradient` strings sampled from spectra and film timelines
//! - Refraction maps: a row-major grid of per-cell
//!   `[offset_x, offset_y, hue_shift, brightness]` tuples for the
//!   displacement-mapping backend

use anyhow::{bail, Result};
use itertools::Itertools;
use ndarray::Array3;

use crate::colour::{encode_srgb, to_hex, to_rgb8};
use crate::film::TemporalThinFilm;
use crate::spectrum::{SpectralSignal, SPECTRUM_SAMPLES};

/// Channels per refraction-map cell.
pub const MAP_CHANNELS: usize = 4;

/// Converts a physical scattering radius to a blur radius in pixels.
///
/// Physical units are canonical everywhere else; this is the render-backend
/// boundary. Negative inputs clamp to zero.
pub fn blur_px(scattering_radius_mm: f64, pixels_per_mm: f64) -> f64 {
    (scattering_radius_mm.max(0.0) * pixels_per_mm.max(0.0) * 100.0).round() / 100.0
}

/// A `backdrop-filter` fragment for frosted-glass scattering.
pub fn backdrop_filter(scattering_radius_mm: f64, pixels_per_mm: f64, saturation: f64) -> String {
    let blur = blur_px(scattering_radius_mm, pixels_per_mm);
    let sat = (saturation.clamp(0.0, 4.0) * 100.0).round();
    format!("blur({blur}px) saturate({sat}%)")
}

/// A `box-shadow` glow from a linear-RGB colour.
pub fn box_shadow_glow(linear_rgb: [f64; 3], blur_px: f64, spread_px: f64, alpha: f64) -> String {
    let [r, g, b] = to_rgb8(encode_srgb(linear_rgb));
    format!(
        "0 0 {:.1}px {:.1}px rgba({r}, {g}, {b}, {:.2})",
        blur_px.max(0.0),
        spread_px.max(0.0),
        alpha.clamp(0.0, 1.0)
    )
}

/// Colour of a narrow spectral band around sample `i`, weighted by the
/// signal's intensity there. Brightness is normalised against the band
/// response so an equal-energy signal renders the pure spectral locus.
fn band_colour(signal: &SpectralSignal, i: usize) -> [f64; 3] {
    let band = SpectralSignal::from_fn(|lambda| {
        let j = crate::spectrum::nearest_sample(lambda);
        if j == i {
            1.0
        } else {
            0.0
        }
    });
    let xyz = band.to_xyz();
    let peak = xyz[0].max(xyz[1]).max(xyz[2]).max(1e-12);
    let w = signal.at(i).clamp(0.0, 1.0);
    crate::colour::xyz_to_linear_srgb([
        xyz[0] / peak * w,
        xyz[1] / peak * w,
        xyz[2] / peak * w,
    ])
}

/// A `linear-gradient` rendering the signal across its wavelength axis,
/// violet at 0% through red at 100%.
pub fn linear_gradient_from_spectrum(
    signal: &SpectralSignal,
    stops: usize,
    angle_deg: f64,
) -> Result<String> {
    if stops < 2 {
        bail!("gradient needs at least 2 stops, got {stops}");
    }
    let body = (0..stops)
        .map(|i| {
            let frac = i as f64 / (stops - 1) as f64;
            let j = ((SPECTRUM_SAMPLES - 1) as f64 * frac).round() as usize;
            let hex = to_hex(encode_srgb(band_colour(signal, j)));
            format!("{hex} {:.1}%", 100.0 * frac)
        })
        .join(", ");
    Ok(format!("linear-gradient({angle_deg:.0}deg, {body})"))
}

/// A `linear-gradient` rendering the colour of a draining film over time,
/// time 0 at 0% and `duration_s` at 100%.
pub fn linear_gradient_from_timeline(
    film: &TemporalThinFilm,
    duration_s: f64,
    stops: usize,
    cos_theta: f64,
    angle_deg: f64,
) -> Result<String> {
    if stops < 2 {
        bail!("gradient needs at least 2 stops, got {stops}");
    }
    let body = (0..stops)
        .map(|i| {
            let frac = i as f64 / (stops - 1) as f64;
            let rgb = film.film_at(frac * duration_s).reflectance_rgb(1.0, cos_theta);
            let hex = to_hex(encode_srgb(rgb));
            format!("{hex} {:.1}%", 100.0 * frac)
        })
        .join(", ");
    Ok(format!("linear-gradient({angle_deg:.0}deg, {body})"))
}

/// Per-cell displacement and tint grid for the refraction backend.
///
/// Cells are laid out row-major; `to_flat` yields the boundary layout:
/// `[offset_x, offset_y, hue_shift, brightness]` per cell, rows outermost.
#[derive(Debug, Clone, PartialEq)]
pub struct RefractionMap {
    pub cols: usize,
    pub rows: usize,
    data: Array3<f64>,
}

impl RefractionMap {
    /// One cell's `[offset_x, offset_y, hue_shift, brightness]`.
    pub fn cell(&self, row: usize, col: usize) -> [f64; MAP_CHANNELS] {
        [
            self.data[(row, col, 0)],
            self.data[(row, col, 1)],
            self.data[(row, col, 2)],
            self.data[(row, col, 3)],
        ]
    }

    /// Flat row-major boundary layout, `rows * cols * 4` values.
    pub fn to_flat(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }
}

/// Builds a lens-like refraction map for a dielectric of index `ior`.
///
/// Deflection grows quadratically from the centre like a thin spherical
/// lens; hue shift models the dispersion fringe at high deflection and
/// brightness carries the edge vignette.
pub fn refraction_map(cols: usize, rows: usize, ior: f64, strength: f64) -> Result<RefractionMap> {
    if cols < 1 || rows < 1 {
        bail!("refraction map needs at least one cell, got {cols}x{rows}");
    }
    if !(1.0..=4.0).contains(&ior) {
        bail!("refractive index {ior} outside the physical range [1, 4]");
    }
    let power = (ior - 1.0) * strength.max(0.0);
    let data = Array3::from_shape_fn((rows, cols, MAP_CHANNELS), |(row, col, ch)| {
        // normalised cell centre in [-1, 1]
        let u = if cols == 1 {
            0.0
        } else {
            2.0 * col as f64 / (cols - 1) as f64 - 1.0
        };
        let v = if rows == 1 {
            0.0
        } else {
            2.0 * row as f64 / (rows - 1) as f64 - 1.0
        };
        let r2 = u * u + v * v;
        let deflection = power * r2;
        match ch {
            0 => -u * deflection,
            1 => -v * deflection,
            2 => 15.0 * deflection,
            _ => (1.0 - 0.2 * deflection).clamp(0.0, 1.0),
        }
    });
    Ok(RefractionMap { cols, rows, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blur_conversion_is_the_only_px_boundary() {
        assert_eq!(blur_px(2.0, 3.5), 7.0);
        assert_eq!(blur_px(-1.0, 3.5), 0.0);
    }

    #[test]
    fn backdrop_filter_formats() {
        let css = backdrop_filter(1.0, 4.0, 1.2);
        assert_eq!(css, "blur(4px) saturate(120%)");
    }

    #[test]
    fn box_shadow_contains_rgba() {
        let css = box_shadow_glow([1.0, 0.0, 0.0], 12.0, 2.0, 0.5);
        assert!(css.starts_with("0 0 12.0px 2.0px rgba(255, 0, 0"), "{css}");
    }

    #[test]
    fn spectrum_gradient_has_all_stops() {
        let signal = SpectralSignal::equal_energy();
        let css = linear_gradient_from_spectrum(&signal, SPECTRUM_SAMPLES, 90.0).unwrap();
        assert!(css.starts_with("linear-gradient(90deg, #"));
        assert_eq!(css.matches('#').count(), SPECTRUM_SAMPLES);
        assert!(css.contains("100.0%"));
        assert!(linear_gradient_from_spectrum(&signal, 1, 90.0).is_err());
    }

    #[test]
    fn timeline_gradient_spans_duration() {
        let bubble = TemporalThinFilm::soap_bubble();
        let css = linear_gradient_from_timeline(&bubble, 10.0, 8, 1.0, 180.0).unwrap();
        assert_eq!(css.matches('#').count(), 8);
        assert!(linear_gradient_from_timeline(&bubble, 10.0, 1, 1.0, 0.0).is_err());
    }

    #[test]
    fn refraction_map_layout_and_symmetry() {
        let map = refraction_map(3, 3, 1.5, 1.0).unwrap();
        assert_eq!(map.to_flat().len(), 3 * 3 * MAP_CHANNELS);
        // centre cell is undeflected at full brightness
        assert_eq!(map.cell(1, 1), [0.0, 0.0, 0.0, 1.0]);
        // corners deflect inward
        let corner = map.cell(0, 0);
        assert!(corner[0] > 0.0 && corner[1] > 0.0);
        let opposite = map.cell(2, 2);
        assert!((corner[0] + opposite[0]).abs() < 1e-12);
    }

    #[test]
    fn refraction_map_rejects_bad_inputs() {
        assert!(refraction_map(0, 3, 1.5, 1.0).is_err());
        assert!(refraction_map(3, 3, 0.5, 1.0).is_err());
    }
}
