//! Bench input scenes: an isoline set plus the view and styling it is
//! labeled with.

use std::f64::consts::TAU;

use contour_labels::{IsolineSet, Polyline, StyleCollection, ViewState};
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Everything one labeling run consumes apart from the [`LabelConfig`].
///
/// [`LabelConfig`]: contour_labels::LabelConfig
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Isoline geometry and per-point scalars.
    pub set: IsolineSet,
    /// Camera, actor, and window.
    pub view: ViewState,
    /// Label styles.
    #[serde(default)]
    pub styles: StyleCollection,
    /// Explicit scalar values paired with the styles in order.
    #[serde(default)]
    pub mapping: Option<Vec<f64>>,
}

impl Scene {
    /// Concentric closed circles centered on the origin in a square
    /// window where one actor unit is one pixel.
    ///
    /// Ring `k` (from the inside) has scalar value `10 * (k + 1)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rings(count: usize, points_per_ring: usize, window: u32) -> Self {
        let half = f64::from(window.saturating_sub(1)) / 2.0;
        let spacing = half / (count as f64 + 1.0);

        let mut points = Vec::with_capacity(count * points_per_ring);
        let mut scalars = Vec::with_capacity(count * points_per_ring);
        let mut lines = Vec::with_capacity(count);
        for k in 0..count {
            let radius = spacing * (k as f64 + 1.0);
            let value = 10.0 * (k as f64 + 1.0);
            let first = points.len();
            for i in 0..points_per_ring {
                let theta = TAU * i as f64 / points_per_ring as f64;
                points.push(DVec3::new(radius * theta.cos(), radius * theta.sin(), 0.0));
                scalars.push(value);
            }
            let mut ids: Vec<usize> = (first..points.len()).collect();
            ids.push(first);
            lines.push(Polyline::new(ids));
        }

        Self {
            set: IsolineSet {
                points,
                scalars,
                lines,
            },
            view: ViewState::top_down(window, window, half),
            styles: StyleCollection::default(),
            mapping: None,
        }
    }
}
