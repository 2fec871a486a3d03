//! Smoothness scanner: finds straight-enough runs of an isoline that can
//! carry a label.
//!
//! Each call to [`Scanner::next_label`] consumes a prefix of a point-id
//! window. The run grows from a visible start point while its smoothness
//! stays within tolerance; once the line bends too far the run ending
//! just before the bend is accepted if it is long enough for the label.
//! The accepted run's end point becomes the first point of the remaining
//! window, so consecutive labels on a line are spaced from where the
//! previous run ended.

use glam::{DVec2, DVec3, IVec2};

use crate::metrics::LabelMetric;
use crate::view::ViewInfo;

/// Minimum run length as a multiple of the label's pixel width.
pub const MIN_LENGTH_FACTOR: f64 = 1.2;

/// Path length (pixels) a run must cover before its smoothness is
/// trusted.
pub const MIN_SMOOTHNESS_PATH: f64 = 10.0;

/// Padding (pixels) added around the text on every side of a label quad.
pub const QUAD_MARGIN: f64 = 2.0;

/// Tolerance when comparing the run direction against the view axis.
const AXIS_EPSILON: f64 = 1e-9;

/// Smoothness of a run: `(path - straight) / straight`.
///
/// `0` means perfectly straight. A run whose ends coincide
/// (`straight == 0`) is defined as perfectly smooth.
#[must_use]
pub fn smoothness(path_length: f64, straight_distance: f64) -> f64 {
    if straight_distance == 0.0 {
        return 0.0;
    }
    (path_length - straight_distance) / straight_distance
}

/// A proposed label placement on one isoline.
///
/// Corner arrays are ordered top-left, top-right, bottom-right,
/// bottom-left in the label's own frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelCandidate {
    /// Anchor (center) of the label in actor space: the arc-length
    /// midpoint of the accepted run.
    pub position: DVec3,
    /// Reading direction in world space (unit length).
    pub right_world: DVec3,
    /// Text up direction in world space (unit length).
    pub up_world: DVec3,
    /// World unit right vector mapped into actor space.
    pub right_actor: DVec3,
    /// World unit up vector mapped into actor space.
    pub up_actor: DVec3,
    /// Display pixels to actor units, measured along the label.
    pub scale: f64,
    /// Label quad corners in actor space.
    pub corners_actor: [DVec3; 4],
    /// Label quad corners in integer display pixels.
    pub corners_display: [IVec2; 4],
    /// Display position where the accepted run starts.
    pub run_start: DVec2,
    /// Display position where the accepted run ends.
    pub run_end: DVec2,
    /// Straight display distance between the run's ends.
    pub straight_distance: f64,
}

/// Scans the lines of one rebuild for label runs.
#[derive(Debug, Clone, Copy)]
pub struct Scanner<'a> {
    points: &'a [DVec3],
    view: &'a ViewInfo,
    skip_distance: f64,
    min_points: usize,
}

impl<'a> Scanner<'a> {
    /// Create a scanner over a point set.
    ///
    /// `min_points` is the fewest window points worth scanning;
    /// `skip_distance` is the display gap enforced before each run.
    #[must_use]
    pub const fn new(
        points: &'a [DVec3],
        view: &'a ViewInfo,
        skip_distance: f64,
        min_points: usize,
    ) -> Self {
        Self {
            points,
            view,
            skip_distance,
            min_points,
        }
    }

    fn actor(&self, window: &[usize], index: usize) -> Option<DVec3> {
        window.get(index).and_then(|&id| self.points.get(id)).copied()
    }

    fn display(&self, window: &[usize], index: usize) -> Option<DVec2> {
        self.actor(window, index)
            .map(|p| self.view.actor_to_display(p))
    }

    /// Find the next label run in `ids` at `tolerance`.
    ///
    /// On success `ids` is advanced so it starts at the accepted run's
    /// last point. Returns `None` (leaving `ids` untouched) when the
    /// window is too short, entirely invisible, or has no run that is
    /// both smooth and long enough.
    pub fn next_label(
        &self,
        ids: &mut &[usize],
        metric: &LabelMetric,
        tolerance: f64,
    ) -> Option<LabelCandidate> {
        let window = *ids;
        let n = window.len();
        if n < self.min_points.max(2) {
            return None;
        }
        let min_length = MIN_LENGTH_FACTOR * f64::from(metric.width());

        // Keep clear of the previous run's end (or the line start).
        let first_display = self.display(window, 0)?;
        let mut start = 0;
        let mut start_display = first_display;
        while start_display.distance(first_display) < self.skip_distance {
            start += 1;
            start_display = self.display(window, start)?;
        }

        while start + 1 < n && !self.view.is_visible(start_display) {
            start += 1;
            start_display = self.display(window, start)?;
        }

        let mut segment_lengths: Vec<f64> = Vec::new();
        let mut path = 0.0;
        let mut straight = 0.0;
        let mut prev_display = start_display;
        let mut cursor = start + 1;
        let mut accepted = None;

        while cursor < n {
            let prev_straight = straight;
            let cur_display = self.display(window, cursor)?;
            let segment = cur_display.distance(prev_display);
            straight = cur_display.distance(start_display);
            segment_lengths.push(segment);
            path += segment;
            prev_display = cur_display;

            if path < MIN_SMOOTHNESS_PATH || smoothness(path, straight) <= tolerance {
                cursor += 1;
                continue;
            }

            if prev_straight >= min_length {
                accepted = Some((cursor - 1, prev_straight));
                break;
            }

            // Too short before the bend: restart at the next visible point.
            start += 1;
            while start < n {
                start_display = self.display(window, start)?;
                if self.view.is_visible(start_display) {
                    break;
                }
                start += 1;
            }
            segment_lengths.clear();
            path = 0.0;
            straight = 0.0;
            prev_display = start_display;
            cursor = start + 1;
        }

        // Ran off the end while still smooth: the run ends at the last point.
        let (end, straight_distance) = accepted.unwrap_or((n - 1, straight));
        if straight_distance < min_length || straight_distance <= 0.0 || end <= start {
            return None;
        }

        let start_actor = self.actor(window, start)?;
        let end_actor = self.actor(window, end)?;
        let (right_world, up_world) = self.orientation(start_actor, end_actor);
        let position =
            self.arc_midpoint(window, start, &segment_lengths, straight_distance / 2.0)?;

        let candidate = self.label_geometry(
            position,
            right_world,
            up_world,
            metric,
            start_display,
            self.display(window, end)?,
            straight_distance,
        );

        *ids = &window[end..];
        Some(candidate)
    }

    /// World-space reading and up directions for a run, oriented so text
    /// reads left to right and stays upright on screen.
    fn orientation(&self, start_actor: DVec3, end_actor: DVec3) -> (DVec3, DVec3) {
        let camera_right = self.view.camera_right();
        let camera_up = self.view.camera_up();
        let camera_forward = self.view.camera_forward();

        let start_world = self.view.actor_to_world(start_actor);
        let end_world = self.view.actor_to_world(end_actor);
        let mut right = (end_world - start_world)
            .try_normalize()
            .unwrap_or(camera_right);
        if right.dot(camera_right) < 0.0 {
            right = -right;
        }

        let mut up = if right.abs_diff_eq(camera_forward, AXIS_EPSILON) {
            camera_up
        } else {
            right.cross(camera_forward).try_normalize().unwrap_or(camera_up)
        };
        if up.dot(camera_up) < 0.0 {
            up = -up;
        }
        (right, up)
    }

    /// Actor-space point at arc length `target` along the run starting at
    /// `start`, measured in display pixels.
    fn arc_midpoint(
        &self,
        window: &[usize],
        start: usize,
        segment_lengths: &[f64],
        target: f64,
    ) -> Option<DVec3> {
        let mut walked = 0.0;
        let (index, length) = segment_lengths.iter().enumerate().find_map(|(i, &len)| {
            if walked + len > target {
                Some((i, len))
            } else {
                walked += len;
                None
            }
        })?;

        let from = self.actor(window, start + index)?;
        let to = self.actor(window, start + index + 1)?;
        if length <= 0.0 {
            return Some(from);
        }
        Some(from + (to - from) * ((target - walked) / length))
    }

    /// Fill in actor-space axes, scale, and quad corners for a label at
    /// `position`.
    #[allow(clippy::too_many_arguments)]
    fn label_geometry(
        &self,
        position: DVec3,
        right_world: DVec3,
        up_world: DVec3,
        metric: &LabelMetric,
        run_start: DVec2,
        run_end: DVec2,
        straight_distance: f64,
    ) -> LabelCandidate {
        let view = self.view;
        let position_world = view.actor_to_world(position);
        let right_actor = view.world_to_actor(position_world + right_world) - position;
        let up_actor = view.world_to_actor(position_world + up_world) - position;

        // Lay the label width along the up vector, which is never parallel
        // to the view axis, to measure actor units per display pixel.
        let width = f64::from(metric.width());
        let height = f64::from(metric.height());
        let delta = up_actor * (0.5 * width);
        let span = view
            .actor_to_display(position + delta)
            .distance(view.actor_to_display(position - delta));
        let scale = if span > 0.0 { width / span } else { 0.0 };

        let half_width = right_actor * ((0.5 * width + QUAD_MARGIN) * scale);
        let half_height = up_actor * ((0.5 * height + QUAD_MARGIN) * scale);
        let corners_actor = [
            position + half_height - half_width,
            position + half_height + half_width,
            position - half_height + half_width,
            position - half_height - half_width,
        ];
        let corners_display = corners_actor.map(|c| view.actor_to_display_i(c));

        LabelCandidate {
            position,
            right_world,
            up_world,
            right_actor,
            up_actor,
            scale,
            corners_actor,
            corners_display,
            run_start,
            run_end,
            straight_distance,
        }
    }
}
