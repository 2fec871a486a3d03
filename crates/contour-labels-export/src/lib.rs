//! contour-labels-export: Pure format serializers for labeled isolines (sans-IO)
//!
//! Renders isolines and their labels into output formats. Currently
//! supports SVG.

pub mod svg;

pub use svg::{SvgBackend, SvgMetadata, SvgOptions, build_path_data, to_svg};
