//! Stateful labeled-isoline component.
//!
//! [`LabeledContourMapper`] keeps label state between frames. Labels are
//! rebuilt only when the geometry, styles, configuration, or view change
//! (tracked by a fingerprint of all of them) or when a setter marks the
//! mapper dirty. Drawing goes through a [`LabelBackend`].
//!
//! The isolines are drawn on every call to
//! [`render`](LabeledContourMapper::render), including when labeling
//! fails.

use std::fmt;
use std::hash::{Hash, Hasher};

use log::{debug, error, warn};
use siphasher::sip::SipHasher13;

use crate::backend::LabelBackend;
use crate::instantiate::{LabelPool, PlacedLabel, StencilQuads, build_stencil_quads};
use crate::metrics::{StyleCollection, TextMetrics};
use crate::types::{IsolineSet, LabelConfig, LabelError};
use crate::view::{Projection, ViewState};
use crate::{check_inputs, label_isolines_with};

/// Isoline renderer component that places and draws value labels.
pub struct LabeledContourMapper {
    config: LabelConfig,
    styles: StyleCollection,
    mapping: Option<Vec<f64>>,
    text_metrics: Option<Box<dyn TextMetrics>>,
    pool: LabelPool,
    stencil: StencilQuads,
    fingerprint: Option<u64>,
    dirty: bool,
    warned_no_stencil: bool,
}

impl fmt::Debug for LabeledContourMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabeledContourMapper")
            .field("config", &self.config)
            .field("styles", &self.styles.len())
            .field("mapping", &self.mapping)
            .field("text_metrics", &self.text_metrics.is_some())
            .field("labels", &self.pool.len())
            .field("fingerprint", &self.fingerprint)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

impl Default for LabeledContourMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl LabeledContourMapper {
    /// A mapper with the default configuration and a single default
    /// style, and no text metrics backend.
    #[must_use]
    pub fn new() -> Self {
        let mut styles = StyleCollection::default();
        styles.center_all();
        Self {
            config: LabelConfig::default(),
            styles,
            mapping: None,
            text_metrics: None,
            pool: LabelPool::new(),
            stencil: StencilQuads::default(),
            fingerprint: None,
            dirty: true,
            warned_no_stencil: false,
        }
    }

    /// Attach a text metrics backend.
    #[must_use]
    pub fn with_text_metrics(mut self, text_metrics: Box<dyn TextMetrics>) -> Self {
        self.set_text_metrics(text_metrics);
        self
    }

    /// Replace the text metrics backend.
    pub fn set_text_metrics(&mut self, text_metrics: Box<dyn TextMetrics>) {
        self.text_metrics = Some(text_metrics);
        self.dirty = true;
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &LabelConfig {
        &self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: LabelConfig) {
        self.config = config;
        self.dirty = true;
    }

    /// Current styles.
    #[must_use]
    pub const fn styles(&self) -> &StyleCollection {
        &self.styles
    }

    /// Replace the styles. Every style is forced to centered
    /// justification.
    pub fn set_styles(&mut self, mut styles: StyleCollection) {
        styles.center_all();
        self.styles = styles;
        self.dirty = true;
    }

    /// Explicit scalar values paired, in order, with a cyclic walk over
    /// the styles.
    pub fn set_mapping(&mut self, mapping: Option<Vec<f64>>) {
        self.mapping = mapping;
        self.dirty = true;
    }

    /// Whether labels are drawn.
    #[must_use]
    pub const fn label_visibility(&self) -> bool {
        self.config.label_visibility
    }

    /// Show or hide labels. Isolines are drawn either way.
    pub fn set_label_visibility(&mut self, visible: bool) {
        self.config.label_visibility = visible;
        self.dirty = true;
    }

    /// Minimum display gap between labels on the same line.
    #[must_use]
    pub const fn skip_distance(&self) -> f64 {
        self.config.skip_distance
    }

    /// Set the minimum display gap between labels on the same line.
    pub fn set_skip_distance(&mut self, pixels: f64) {
        self.config.skip_distance = pixels;
        self.dirty = true;
    }

    /// Force a rebuild on the next render.
    pub const fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Labels drawn by the last render. Empty while labels are hidden or
    /// after a failed rebuild.
    #[must_use]
    pub fn labels(&self) -> &[PlacedLabel] {
        self.pool.labels()
    }

    /// Stencil mesh for the current labels.
    #[must_use]
    pub const fn stencil(&self) -> &StencilQuads {
        &self.stencil
    }

    /// The label storage.
    #[must_use]
    pub const fn pool(&self) -> &LabelPool {
        &self.pool
    }

    /// Draw the isolines and their labels.
    ///
    /// Rebuilds labels first if anything they depend on changed. Returns
    /// the number of labels drawn.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError`] if the rebuild fails. The isolines have
    /// still been drawn and the mapper holds no labels.
    pub fn render(
        &mut self,
        set: &IsolineSet,
        view: &ViewState,
        backend: &mut dyn LabelBackend,
    ) -> Result<usize, LabelError> {
        match self.prepare(set, view, &*backend) {
            Ok(true) => {}
            Ok(false) => {
                backend.draw_isolines(set);
                return Ok(0);
            }
            Err(err) => {
                error!("labeling failed, drawing isolines only: {err}");
                self.discard_labels();
                backend.draw_isolines(set);
                return Err(err);
            }
        }

        let stenciled = backend.stencil_capable();
        if stenciled {
            backend.apply_stencil(&self.stencil);
        } else if !self.warned_no_stencil {
            warn!("backend cannot stencil; isolines will show through labels");
            self.warned_no_stencil = true;
        }
        backend.draw_isolines(set);
        if stenciled {
            backend.remove_stencil();
        }

        for label in self.pool.labels() {
            backend.draw_label(label, self.styles.get(label.style)?);
        }
        Ok(self.pool.len())
    }

    fn discard_labels(&mut self) {
        self.pool.clear();
        self.stencil = StencilQuads::default();
        self.fingerprint = None;
    }

    /// Check inputs and rebuild if needed. Returns whether labels should
    /// be drawn.
    fn prepare(
        &mut self,
        set: &IsolineSet,
        view: &ViewState,
        backend: &dyn LabelBackend,
    ) -> Result<bool, LabelError> {
        let text_metrics = self
            .text_metrics
            .as_deref()
            .ok_or(LabelError::MissingTextMetrics)?;
        check_inputs(set, &self.styles, &self.config)?;
        if !self.config.label_visibility {
            self.discard_labels();
            return Ok(false);
        }

        let fingerprint = fingerprint(
            set,
            &self.styles,
            self.mapping.as_deref(),
            &self.config,
            view,
        );
        if !self.dirty && self.fingerprint == Some(fingerprint) {
            return Ok(true);
        }

        let layout = label_isolines_with(
            set,
            &self.styles,
            self.mapping.as_deref(),
            &self.config,
            view,
            text_metrics,
            |candidate| backend.build_label_transform(candidate),
        )?;
        let reallocated = self.pool.fill(layout.labels.into_iter());
        self.stencil = build_stencil_quads(self.pool.labels());
        self.fingerprint = Some(fingerprint);
        self.dirty = false;
        debug!(
            "rebuilt {} labels (pool reallocated: {reallocated})",
            self.pool.len()
        );
        Ok(true)
    }
}

fn hash_f64s(hasher: &mut impl Hasher, values: impl IntoIterator<Item = f64>) {
    let mut count = 0usize;
    for value in values {
        hasher.write_u64(value.to_bits());
        count += 1;
    }
    hasher.write_usize(count);
}

fn hash_view(hasher: &mut impl Hasher, view: &ViewState) {
    match &view.camera {
        None => hasher.write_u8(0),
        Some(camera) => {
            hasher.write_u8(1);
            hash_f64s(hasher, camera.view.to_cols_array());
            match camera.projection {
                Projection::Perspective {
                    view_angle,
                    near,
                    far,
                } => {
                    hasher.write_u8(0);
                    hash_f64s(hasher, [view_angle, near, far]);
                }
                Projection::Parallel {
                    parallel_scale,
                    near,
                    far,
                } => {
                    hasher.write_u8(1);
                    hash_f64s(hasher, [parallel_scale, near, far]);
                }
            }
        }
    }
    hash_f64s(hasher, view.actor_matrix.to_cols_array());
    hash_f64s(hasher, view.viewport);
    match &view.window {
        None => hasher.write_u8(0),
        Some(window) => {
            hasher.write_u8(1);
            window.size.hash(hasher);
            hash_f64s(hasher, window.tile_viewport);
        }
    }
    hasher.write_u64(view.pixel_aspect.to_bits());
}

/// Fingerprint of everything a rebuild reads.
fn fingerprint(
    set: &IsolineSet,
    styles: &StyleCollection,
    mapping: Option<&[f64]>,
    config: &LabelConfig,
    view: &ViewState,
) -> u64 {
    let mut hasher = SipHasher13::new();

    hash_f64s(&mut hasher, set.points.iter().flat_map(|p| p.to_array()));
    hash_f64s(&mut hasher, set.scalars.iter().copied());
    set.lines.hash(&mut hasher);

    styles.hash(&mut hasher);
    match mapping {
        None => hasher.write_u8(0),
        Some(values) => {
            hasher.write_u8(1);
            hash_f64s(&mut hasher, values.iter().copied());
        }
    }

    config.label_visibility.hash(&mut hasher);
    hasher.write_u64(config.skip_distance.to_bits());
    hash_f64s(&mut hasher, config.smoothness_tolerances.iter().copied());
    config.rendered_dpi.hash(&mut hasher);
    config.orientation.hash(&mut hasher);

    hash_view(&mut hasher, view);
    hasher.finish()
}
