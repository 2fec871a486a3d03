//! Turn surviving candidates into renderable label records.

use glam::{DMat4, DVec3, DVec4, IVec2};

use crate::metrics::{LabelMetric, StyleId};
use crate::placer::LabelGroup;
use crate::scanner::LabelCandidate;
use crate::types::OrientationMode;
use crate::view::ViewInfo;

/// How a placed label is oriented.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LabelOrientation {
    /// Actor-space right/up basis for renderers compositing text into
    /// the 3D scene.
    Basis {
        /// Reading direction in actor space.
        right: DVec3,
        /// Text up direction in actor space.
        up: DVec3,
    },
    /// Counter-clockwise screen rotation in degrees for renderers drawing
    /// text directly in display space.
    ScreenAngle {
        /// Rotation in degrees.
        degrees: f64,
    },
}

/// A label ready to be drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLabel {
    /// Index of the labeled line.
    pub line: usize,
    /// Text to draw.
    pub text: String,
    /// Style to draw it with.
    pub style: StyleId,
    /// Anchor (center) in actor space.
    pub position: DVec3,
    /// Orientation in the representation requested by the config.
    pub orientation: LabelOrientation,
    /// Screen rotation in degrees, available for either orientation mode.
    pub angle_degrees: f64,
    /// Maps display-pixel sized text centered at `position` onto the
    /// label quad in actor space.
    pub transform: DMat4,
    /// Label quad in actor space (TL, TR, BR, BL).
    pub quad: [DVec3; 4],
    /// Label quad in display pixels (TL, TR, BR, BL).
    pub screen_quad: [IVec2; 4],
}

/// Scale-rotate-translate transform for a candidate:
/// `T(position) * R * S(scale) * T(-position)`, where `R` has the
/// actor-space right, up, and `up x right` vectors as columns.
#[must_use]
pub fn label_transform(candidate: &LabelCandidate) -> DMat4 {
    let right = candidate.right_actor;
    let up = candidate.up_actor;
    let forward = up.cross(right);
    let rotation = DMat4::from_cols(
        right.extend(0.0),
        up.extend(0.0),
        forward.extend(0.0),
        DVec4::W,
    );
    DMat4::from_translation(candidate.position)
        * rotation
        * DMat4::from_scale(DVec3::splat(candidate.scale))
        * DMat4::from_translation(-candidate.position)
}

/// Screen rotation of a candidate's reading direction, in degrees.
#[must_use]
pub fn screen_angle(candidate: &LabelCandidate, view: &ViewInfo) -> f64 {
    let from = view.actor_to_display(candidate.position);
    let to = view.actor_to_display(candidate.position + candidate.right_actor);
    let d = to - from;
    d.y.atan2(d.x).to_degrees()
}

/// Build the label record for one candidate.
#[must_use]
pub fn instantiate(
    line: usize,
    candidate: &LabelCandidate,
    metric: &LabelMetric,
    view: &ViewInfo,
    mode: OrientationMode,
    transform: DMat4,
) -> PlacedLabel {
    let angle_degrees = screen_angle(candidate, view);
    let orientation = match mode {
        OrientationMode::Basis => LabelOrientation::Basis {
            right: candidate.right_actor,
            up: candidate.up_actor,
        },
        OrientationMode::ScreenAngle => LabelOrientation::ScreenAngle {
            degrees: angle_degrees,
        },
    };
    PlacedLabel {
        line,
        text: metric.text.clone(),
        style: metric.style,
        position: candidate.position,
        orientation,
        angle_degrees,
        transform,
        quad: candidate.corners_actor,
        screen_quad: candidate.corners_display,
    }
}

/// Build label records for every candidate left in `groups`.
///
/// `transform` builds each label's matrix; pass [`label_transform`] for
/// the default.
#[must_use]
pub fn instantiate_labels(
    groups: &[LabelGroup],
    metrics: &[LabelMetric],
    view: &ViewInfo,
    mode: OrientationMode,
    transform: impl Fn(&LabelCandidate) -> DMat4,
) -> Vec<PlacedLabel> {
    let transform = &transform;
    groups
        .iter()
        .filter_map(|group| metrics.get(group.line).map(|metric| (group, metric)))
        .flat_map(|(group, metric)| {
            group.candidates.iter().map(move |candidate| {
                instantiate(
                    group.line,
                    candidate,
                    metric,
                    view,
                    mode,
                    transform(candidate),
                )
            })
        })
        .collect()
}

/// Label storage reused across rebuilds.
///
/// Storage is reallocated to `floor(1.2 * n)` slots when `n` labels no
/// longer fit or would use less than half of it; otherwise the existing
/// allocation is reused.
#[derive(Debug, Clone, Default)]
pub struct LabelPool {
    labels: Vec<PlacedLabel>,
    allocated: usize,
}

impl LabelPool {
    /// Create an empty pool.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            labels: Vec::new(),
            allocated: 0,
        }
    }

    /// Replace the pool contents with `labels`.
    ///
    /// Returns `true` if the storage was reallocated.
    pub fn fill(&mut self, labels: impl ExactSizeIterator<Item = PlacedLabel>) -> bool {
        let needed = labels.len();
        let used = self.labels.len();
        let reallocate =
            needed != used && (self.allocated < needed || self.allocated > 2 * needed);
        if reallocate {
            self.allocated = needed * 6 / 5;
            self.labels = Vec::with_capacity(self.allocated.max(needed));
        }
        self.labels.clear();
        self.labels.extend(labels);
        reallocate
    }

    /// Drop all labels, keeping the storage.
    pub fn clear(&mut self) {
        self.labels.clear();
    }

    /// The labels in use.
    #[must_use]
    pub fn labels(&self) -> &[PlacedLabel] {
        &self.labels
    }

    /// Number of labels in use.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` if no labels are in use.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of slots currently allocated.
    #[must_use]
    pub const fn allocated(&self) -> usize {
        self.allocated
    }
}

/// Triangle mesh covering every label quad, used to mask isolines under
/// the labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StencilQuads {
    /// Actor-space vertices, four per label (TL, TR, BR, BL).
    pub vertices: Vec<[f32; 3]>,
    /// Triangle indices, six per label.
    pub indices: Vec<u32>,
}

impl StencilQuads {
    /// Number of quads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len() / 4
    }

    /// Returns `true` if there are no quads.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// Build the stencil mesh for `labels`.
#[must_use]
pub fn build_stencil_quads(labels: &[PlacedLabel]) -> StencilQuads {
    let mut quads = StencilQuads {
        vertices: Vec::with_capacity(labels.len() * 4),
        indices: Vec::with_capacity(labels.len() * 6),
    };
    let mut base: u32 = 0;
    for label in labels {
        quads
            .vertices
            .extend(label.quad.iter().map(|c| c.as_vec3().to_array()));
        quads
            .indices
            .extend([0, 1, 2, 0, 2, 3].map(|i| base + i));
        base += 4;
    }
    quads
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use glam::DVec2;

    use super::*;
    use crate::view::ViewState;

    fn view() -> ViewInfo {
        ViewInfo::new(&ViewState::top_down(401, 401, 200.0)).unwrap()
    }

    fn candidate(position: DVec3, right: DVec3, up: DVec3, scale: f64) -> LabelCandidate {
        LabelCandidate {
            position,
            right_world: right,
            up_world: up,
            right_actor: right,
            up_actor: up,
            scale,
            corners_actor: [
                position + up - right,
                position + up + right,
                position - up + right,
                position - up - right,
            ],
            corners_display: [IVec2::ZERO; 4],
            run_start: DVec2::ZERO,
            run_end: DVec2::ZERO,
            straight_distance: 100.0,
        }
    }

    fn metric() -> LabelMetric {
        LabelMetric {
            valid: true,
            text: "2.5".to_string(),
            style: StyleId(1),
            dims: [40, 12],
            ..LabelMetric::default()
        }
    }

    fn label(position: DVec3) -> PlacedLabel {
        let c = candidate(position, DVec3::X, DVec3::Y, 1.0);
        instantiate(0, &c, &metric(), &view(), OrientationMode::Basis, label_transform(&c))
    }

    #[test]
    fn transform_keeps_anchor_fixed() {
        let c = candidate(DVec3::new(3.0, 4.0, 0.0), DVec3::Y, -DVec3::X, 0.5);
        let m = label_transform(&c);
        assert!((m.transform_point3(c.position) - c.position).length() < 1e-12);
    }

    #[test]
    fn transform_rotates_and_scales() {
        let position = DVec3::new(3.0, 4.0, 0.0);
        let c = candidate(position, DVec3::Y, -DVec3::X, 0.5);
        let m = label_transform(&c);
        // Local +x maps onto half a unit of the right vector.
        let p = m.transform_point3(position + DVec3::X);
        assert!((p - (position + DVec3::Y * 0.5)).length() < 1e-12);
        let q = m.transform_point3(position + DVec3::Y);
        assert!((q - (position - DVec3::X * 0.5)).length() < 1e-12);
    }

    #[test]
    fn screen_angle_follows_reading_direction() {
        let view = view();
        let flat = candidate(DVec3::ZERO, DVec3::X, DVec3::Y, 1.0);
        assert!(screen_angle(&flat, &view).abs() < 1e-9);
        let steep = candidate(DVec3::ZERO, DVec3::Y, -DVec3::X, 1.0);
        assert!((screen_angle(&steep, &view) - 90.0).abs() < 1e-9);
        let diagonal = candidate(
            DVec3::ZERO,
            DVec3::new(1.0, 1.0, 0.0).normalize(),
            DVec3::new(-1.0, 1.0, 0.0).normalize(),
            1.0,
        );
        assert!((screen_angle(&diagonal, &view) - 45.0).abs() < 1e-9);
    }

    #[test]
    fn orientation_follows_mode() {
        let view = view();
        let c = candidate(DVec3::ZERO, DVec3::Y, -DVec3::X, 1.0);
        let basis = instantiate(3, &c, &metric(), &view, OrientationMode::Basis, DMat4::IDENTITY);
        assert_eq!(
            basis.orientation,
            LabelOrientation::Basis {
                right: DVec3::Y,
                up: -DVec3::X
            }
        );
        assert_eq!(basis.line, 3);
        assert_eq!(basis.text, "2.5");
        assert_eq!(basis.style, StyleId(1));

        let angle = instantiate(
            3,
            &c,
            &metric(),
            &view,
            OrientationMode::ScreenAngle,
            DMat4::IDENTITY,
        );
        match angle.orientation {
            LabelOrientation::ScreenAngle { degrees } => assert!((degrees - 90.0).abs() < 1e-9),
            LabelOrientation::Basis { .. } => unreachable!("expected screen angle"),
        }
    }

    #[test]
    fn instantiate_labels_uses_group_metric() {
        let groups = vec![
            LabelGroup::default(),
            LabelGroup {
                line: 1,
                feasible: true,
                tolerance: Some(0.01),
                candidates: vec![
                    candidate(DVec3::ZERO, DVec3::X, DVec3::Y, 1.0),
                    candidate(DVec3::new(50.0, 0.0, 0.0), DVec3::X, DVec3::Y, 1.0),
                ],
            },
        ];
        let metrics = vec![LabelMetric::default(), metric()];
        let labels = instantiate_labels(
            &groups,
            &metrics,
            &view(),
            OrientationMode::Basis,
            label_transform,
        );
        assert_eq!(labels.len(), 2);
        assert!(labels.iter().all(|l| l.line == 1 && l.text == "2.5"));
        assert_eq!(labels[1].transform, label_transform(&groups[1].candidates[1]));
    }

    #[test]
    fn instantiate_labels_applies_supplied_transform() {
        let groups = vec![LabelGroup {
            line: 0,
            feasible: true,
            tolerance: Some(0.01),
            candidates: vec![candidate(DVec3::new(5.0, 0.0, 0.0), DVec3::X, DVec3::Y, 1.0)],
        }];
        let metrics = vec![metric()];
        let labels = instantiate_labels(&groups, &metrics, &view(), OrientationMode::Basis, |c| {
            DMat4::from_translation(c.position * 2.0)
        });
        assert_eq!(labels.len(), 1);
        assert_eq!(
            labels[0].transform,
            DMat4::from_translation(DVec3::new(10.0, 0.0, 0.0))
        );
    }

    #[test]
    fn pool_grows_with_headroom() {
        let mut pool = LabelPool::new();
        assert!(pool.fill((0..10).map(|_| label(DVec3::ZERO))));
        assert_eq!(pool.len(), 10);
        assert_eq!(pool.allocated(), 12);

        // Fits, and not oversized: reused.
        assert!(!pool.fill((0..7).map(|_| label(DVec3::ZERO))));
        assert_eq!(pool.len(), 7);
        assert_eq!(pool.allocated(), 12);

        // More than twice what is needed: shrinks.
        assert!(pool.fill((0..5).map(|_| label(DVec3::ZERO))));
        assert_eq!(pool.allocated(), 6);

        // Same count again: never reallocates.
        assert!(!pool.fill((0..5).map(|_| label(DVec3::ZERO))));
    }

    #[test]
    fn stencil_has_two_triangles_per_label() {
        let labels = vec![label(DVec3::ZERO), label(DVec3::new(50.0, 0.0, 0.0))];
        let stencil = build_stencil_quads(&labels);
        assert_eq!(stencil.len(), 2);
        assert_eq!(stencil.vertices.len(), 8);
        assert_eq!(stencil.indices, vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]);
        assert_eq!(stencil.vertices[0], [-1.0, 1.0, 0.0]);
        assert_eq!(stencil.vertices[6], [51.0, -1.0, 0.0]);
    }

    #[test]
    fn empty_stencil() {
        assert!(build_stencil_quads(&[]).is_empty());
    }
}
