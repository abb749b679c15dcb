//! LUSTRE - physically based spectral colour for the styling layer.
//!
//! The crate evaluates thin-film interference, multilayer stacks, material
//! dispersion and particle scattering on a fixed 33-sample visible-light
//! grid, then folds the resulting spectra down to sRGB colours and CSS
//! fragments. Everything is deterministic and pure; the only lookup tables
//! are built once and shared read-only.
//!
//! Leaf-to-root module order: [`spectrum`] and [`ior`] are the primitives,
//! [`fresnel`]/[`snell`] sit on top of them, [`film`], [`tmm`] and [`mie`]
//! are the physical models, [`pipeline`] composes them, [`brdf`] covers
//! directional shading, and [`colour`], [`css`], [`siren`] and [`output`]
//! carry results over the rendering boundary.

pub mod batch;
pub mod brdf;
pub mod colour;
pub mod css;
pub mod film;
pub mod fresnel;
pub mod ior;
pub mod mie;
pub mod output;
pub mod pipeline;
pub mod settings;
pub mod siren;
pub mod snell;
pub mod spectrum;
pub mod tmm;
