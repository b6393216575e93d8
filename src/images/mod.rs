//! Panel image generation module
//!
//! Provides the panel image pipeline: image model, then persistence.

mod gen;

pub use gen::{generate_panel_image, ImageError};
