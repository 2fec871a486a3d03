//! Quick rejection of lines too small on screen to carry their label.

use glam::{DVec3, IVec2};

use crate::metrics::LabelMetric;
use crate::types::Polyline;
use crate::view::ViewInfo;

/// Integer display-space bounding box of the visible points of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayBounds {
    /// Lower-left corner.
    pub min: IVec2,
    /// Upper-right corner.
    pub max: IVec2,
}

impl DisplayBounds {
    /// Width and height in pixels.
    #[must_use]
    pub const fn extent(&self) -> IVec2 {
        IVec2::new(self.max.x - self.min.x, self.max.y - self.min.y)
    }
}

/// Bounding box of the points of `polyline` that project inside the
/// viewport, or `None` if no point does.
#[must_use]
pub fn visible_display_bounds(
    polyline: &Polyline,
    points: &[DVec3],
    view: &ViewInfo,
) -> Option<DisplayBounds> {
    polyline
        .ids()
        .iter()
        .filter_map(|&id| points.get(id))
        .map(|&p| view.actor_to_display_i(p))
        .filter(|&d| view.is_visible_i(d))
        .fold(None, |bounds: Option<DisplayBounds>, d| {
            Some(bounds.map_or(DisplayBounds { min: d, max: d }, |b| DisplayBounds {
                min: b.min.min(d),
                max: b.max.max(d),
            }))
        })
}

/// Whether a line's visible extent is large enough for its label.
///
/// The visible bounding box must be more than twice the label width on
/// at least one axis. Lines with an invalid metric or no visible point
/// are rejected.
#[must_use]
pub fn line_can_be_labeled(
    polyline: &Polyline,
    points: &[DVec3],
    metric: &LabelMetric,
    view: &ViewInfo,
) -> bool {
    if !metric.valid {
        return false;
    }
    visible_display_bounds(polyline, points, view).is_some_and(|bounds| {
        let extent = bounds.extent();
        let needed = 2 * metric.width();
        needed < extent.x || needed < extent.y
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::view::ViewState;

    fn view() -> ViewInfo {
        ViewInfo::new(&ViewState::top_down(401, 401, 200.0)).unwrap()
    }

    fn metric(width: i32) -> LabelMetric {
        LabelMetric {
            valid: true,
            dims: [width, 12],
            bbox: [0, width - 1, 0, 11],
            ..LabelMetric::default()
        }
    }

    fn horizontal(len: f64) -> (Polyline, Vec<DVec3>) {
        let points = vec![DVec3::new(-len / 2.0, 0.0, 0.0), DVec3::new(len / 2.0, 0.0, 0.0)];
        (Polyline::new(vec![0, 1]), points)
    }

    #[test]
    fn long_line_is_feasible() {
        let (line, points) = horizontal(200.0);
        assert!(line_can_be_labeled(&line, &points, &metric(40), &view()));
    }

    #[test]
    fn extent_must_exceed_twice_width() {
        // Exactly 80px wide: 2 * 40 is not strictly less than 80.
        let (line, points) = horizontal(80.0);
        assert!(!line_can_be_labeled(&line, &points, &metric(40), &view()));
        let (line, points) = horizontal(82.0);
        assert!(line_can_be_labeled(&line, &points, &metric(40), &view()));
    }

    #[test]
    fn vertical_extent_counts() {
        let points = vec![DVec3::new(0.0, -150.0, 0.0), DVec3::new(0.0, 150.0, 0.0)];
        let line = Polyline::new(vec![0, 1]);
        assert!(line_can_be_labeled(&line, &points, &metric(40), &view()));
    }

    #[test]
    fn offscreen_line_is_infeasible() {
        let points = vec![
            DVec3::new(1000.0, 1000.0, 0.0),
            DVec3::new(1500.0, 1000.0, 0.0),
        ];
        let line = Polyline::new(vec![0, 1]);
        assert!(visible_display_bounds(&line, &points, &view()).is_none());
        assert!(!line_can_be_labeled(&line, &points, &metric(40), &view()));
    }

    #[test]
    fn only_visible_points_count() {
        // One point far off-screen, the other two close together.
        let points = vec![
            DVec3::new(-5000.0, 0.0, 0.0),
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(30.0, 0.0, 0.0),
        ];
        let line = Polyline::new(vec![0, 1, 2]);
        let bounds = visible_display_bounds(&line, &points, &view()).unwrap();
        assert_eq!(bounds.extent(), IVec2::new(30, 0));
        assert!(!line_can_be_labeled(&line, &points, &metric(40), &view()));
    }

    #[test]
    fn invalid_metric_is_infeasible() {
        let (line, points) = horizontal(300.0);
        assert!(!line_can_be_labeled(
            &line,
            &points,
            &LabelMetric::default(),
            &view()
        ));
    }
}
