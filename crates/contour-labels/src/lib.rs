//! contour-labels: Value labels for rendered isolines (sans-IO).
//!
//! Places legible, non-overlapping text labels along isolines through:
//! view setup -> label metrics -> feasibility -> smoothness scanning ->
//! overlap resolution -> instantiation.
//!
//! This crate has **no I/O dependencies** and no rendering code. Text
//! measurement and drawing are injected through the [`TextMetrics`] and
//! [`LabelBackend`] traits; the stateful [`LabeledContourMapper`] ties
//! them together for frame-by-frame use.

pub mod backend;
pub mod diagnostics;
pub mod feasibility;
pub mod instantiate;
pub mod mapper;
pub mod metrics;
pub mod overlap;
pub mod placer;
pub mod scanner;
pub mod types;
pub mod view;

use glam::DMat4;
use log::debug;

pub use backend::LabelBackend;
pub use instantiate::{LabelOrientation, PlacedLabel, StencilQuads};
pub use mapper::LabeledContourMapper;
pub use metrics::{
    LabelMetric, MonospaceMetrics, StyleCollection, StyleId, TextMetrics, TextStyle,
};
pub use placer::LabelGroup;
pub use scanner::LabelCandidate;
pub use types::{
    ErrorClass, IsolineSet, LabelConfig, LabelError, OrientationMode, Polyline,
};
pub use view::{Camera, Projection, RenderWindow, ViewInfo, ViewState};

/// Result of one labeling pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelLayout {
    /// One metric per line.
    pub metrics: Vec<LabelMetric>,
    /// One group per line holding the candidates that survived overlap
    /// resolution.
    pub groups: Vec<LabelGroup>,
    /// Renderable labels, in line order.
    pub labels: Vec<PlacedLabel>,
}

/// Check everything a labeling pass needs before doing any work.
///
/// # Errors
///
/// Returns the first [`LabelError`] found in the geometry, the style
/// collection, or the configuration.
pub fn check_inputs(
    set: &IsolineSet,
    styles: &StyleCollection,
    config: &LabelConfig,
) -> Result<(), LabelError> {
    set.validate()?;
    if styles.is_empty() {
        return Err(LabelError::EmptyStyleCollection);
    }
    config.validate()
}

/// Run the full labeling pass.
///
/// # Pipeline steps
///
/// 1. Check inputs and derive the projection state
/// 2. Build text, style, and pixel size for every line
/// 3. Scan feasible lines for label runs across the tolerance ladder
/// 4. Drop overlapping candidates
/// 5. Emit renderable labels
///
/// # Errors
///
/// Returns [`LabelError`] if the inputs are unusable, a collaborator is
/// missing, or the metrics backend fails on any label. Lines that simply
/// have no room for a label are not errors.
pub fn label_isolines(
    set: &IsolineSet,
    styles: &StyleCollection,
    mapping: Option<&[f64]>,
    config: &LabelConfig,
    view: &ViewState,
    text_metrics: &dyn TextMetrics,
) -> Result<LabelLayout, LabelError> {
    label_isolines_with(
        set,
        styles,
        mapping,
        config,
        view,
        text_metrics,
        instantiate::label_transform,
    )
}

/// [`label_isolines`] with a caller-supplied label transform builder.
pub(crate) fn label_isolines_with(
    set: &IsolineSet,
    styles: &StyleCollection,
    mapping: Option<&[f64]>,
    config: &LabelConfig,
    view: &ViewState,
    text_metrics: &dyn TextMetrics,
    transform: impl Fn(&LabelCandidate) -> DMat4,
) -> Result<LabelLayout, LabelError> {
    // 1. Inputs and projection.
    check_inputs(set, styles, config)?;
    let view = ViewInfo::new(view)?;

    // 2. Metrics.
    let metrics =
        metrics::build_label_metrics(set, styles, mapping, text_metrics, config.rendered_dpi)?;

    // 3. Placement.
    let mut groups = placer::place_labels(set, &metrics, &view, config);
    let feasible = groups.iter().filter(|g| g.feasible).count();
    let placed: usize = groups.iter().map(LabelGroup::len).sum();

    // 4. Overlap resolution.
    let removed = overlap::resolve_overlaps(&mut groups);

    // 5. Instantiation.
    let labels =
        instantiate::instantiate_labels(&groups, &metrics, &view, config.orientation, transform);

    debug!(
        "{} lines, {feasible} feasible, {placed} candidates, {removed} removed, {} labels",
        set.lines.len(),
        labels.len()
    );

    Ok(LabelLayout {
        metrics,
        groups,
        labels,
    })
}
