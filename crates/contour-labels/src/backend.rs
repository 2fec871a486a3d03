//! Rendering backend capability interface.
//!
//! A [`LabelBackend`] draws the isolines and labels and masks the lines
//! under the labels. The mapper drives it in a fixed order each frame:
//!
//! 1. [`apply_stencil`](LabelBackend::apply_stencil) with the label quads
//! 2. [`draw_isolines`](LabelBackend::draw_isolines)
//! 3. [`remove_stencil`](LabelBackend::remove_stencil)
//! 4. [`draw_label`](LabelBackend::draw_label) for every placed label
//!
//! Backends without stencil support report it through
//! [`stencil_capable`](LabelBackend::stencil_capable); the lines are then
//! drawn unmasked and show through the labels.

use glam::DMat4;

use crate::instantiate::{PlacedLabel, StencilQuads, label_transform};
use crate::metrics::TextStyle;
use crate::scanner::LabelCandidate;
use crate::types::IsolineSet;

/// Drawing and masking operations a renderer provides to the mapper.
pub trait LabelBackend {
    /// Whether [`apply_stencil`](Self::apply_stencil) actually masks.
    fn stencil_capable(&self) -> bool {
        true
    }

    /// Mask out the label quads for subsequent line drawing.
    fn apply_stencil(&mut self, quads: &StencilQuads);

    /// Stop masking.
    fn remove_stencil(&mut self);

    /// Transform placing display-pixel sized text onto the candidate's
    /// quad in actor space.
    fn build_label_transform(&self, candidate: &LabelCandidate) -> DMat4 {
        label_transform(candidate)
    }

    /// Draw the isoline geometry.
    fn draw_isolines(&mut self, set: &IsolineSet);

    /// Draw one label.
    fn draw_label(&mut self, label: &PlacedLabel, style: &TextStyle);
}
