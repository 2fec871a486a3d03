//! Coordinate transforms between actor, world, and display space.
//!
//! [`ViewState`] is the caller-supplied camera/actor/viewport state.
//! [`ViewInfo`] is derived from it once per rebuild and caches every
//! matrix and pixel bound the later stages need, so projecting a point is
//! a handful of multiply-adds.
//!
//! Display space has its origin at the bottom-left of the render window
//! with `y` pointing up, measured in pixels.

use glam::{DMat4, DVec2, DVec3, DVec4, IVec2};
use serde::{Deserialize, Serialize};

use crate::types::LabelError;

/// Camera projection model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// Perspective projection.
    Perspective {
        /// Vertical view angle in degrees.
        view_angle: f64,
        /// Near clipping distance.
        near: f64,
        /// Far clipping distance.
        far: f64,
    },
    /// Parallel (orthographic) projection.
    Parallel {
        /// Half the height of the viewport in world units.
        parallel_scale: f64,
        /// Near clipping distance.
        near: f64,
        /// Far clipping distance.
        far: f64,
    },
}

impl Projection {
    /// Projection matrix mapping camera space to clip space for the given
    /// aspect ratio (width / height). Depth maps to `[-1, 1]`.
    #[must_use]
    pub fn matrix(self, aspect: f64) -> DMat4 {
        match self {
            Self::Perspective {
                view_angle,
                near,
                far,
            } => DMat4::perspective_rh_gl(view_angle.to_radians(), aspect, near, far),
            Self::Parallel {
                parallel_scale,
                near,
                far,
            } => {
                let half_width = parallel_scale * aspect;
                DMat4::orthographic_rh_gl(
                    -half_width,
                    half_width,
                    -parallel_scale,
                    parallel_scale,
                    near,
                    far,
                )
            }
        }
    }
}

/// An active camera: view transform plus projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// World-to-camera transform. Its first three rows are the camera's
    /// right, up, and backward axes in world space.
    pub view: DMat4,
    /// Projection model.
    pub projection: Projection,
}

impl Camera {
    /// Build a camera at `eye` looking at `focal_point`.
    #[must_use]
    pub fn look_at(eye: DVec3, focal_point: DVec3, view_up: DVec3, projection: Projection) -> Self {
        Self {
            view: DMat4::look_at_rh(eye, focal_point, view_up),
            projection,
        }
    }

    /// Projection times view for the given aspect ratio.
    #[must_use]
    pub fn composite_projection(&self, aspect: f64) -> DMat4 {
        self.projection.matrix(aspect) * self.view
    }
}

/// The render target the viewport lives in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderWindow {
    /// Window size in pixels `[width, height]`.
    pub size: [u32; 2],
    /// Normalized region of the full display covered by this window's
    /// tile `[xmin, ymin, xmax, ymax]`. `[0, 0, 1, 1]` unless the display
    /// is tiled.
    pub tile_viewport: [f64; 4],
}

impl RenderWindow {
    /// An untiled window of the given pixel size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            size: [width, height],
            tile_viewport: [0.0, 0.0, 1.0, 1.0],
        }
    }
}

/// Camera, actor, and viewport state consumed by one rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewState {
    /// Active camera, if any.
    pub camera: Option<Camera>,
    /// Actor model matrix (actor space to world space).
    pub actor_matrix: DMat4,
    /// Normalized viewport within the window `[xmin, ymin, xmax, ymax]`.
    pub viewport: [f64; 4],
    /// Render window, if any.
    pub window: Option<RenderWindow>,
    /// Pixel aspect ratio correction applied by the host renderer on top
    /// of the viewport's pixel aspect.
    pub pixel_aspect: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            camera: None,
            actor_matrix: DMat4::IDENTITY,
            viewport: [0.0, 0.0, 1.0, 1.0],
            window: None,
            pixel_aspect: 1.0,
        }
    }
}

impl ViewState {
    /// A parallel camera looking down the `-z` axis at the origin, with
    /// `+y` up and the full window as viewport.
    ///
    /// For a square window of `2 * parallel_scale + 1` pixels, one actor
    /// unit maps to exactly one pixel.
    #[must_use]
    pub fn top_down(width: u32, height: u32, parallel_scale: f64) -> Self {
        Self {
            camera: Some(Camera::look_at(
                DVec3::new(0.0, 0.0, 10.0),
                DVec3::ZERO,
                DVec3::Y,
                Projection::Parallel {
                    parallel_scale,
                    near: 0.1,
                    far: 100.0,
                },
            )),
            window: Some(RenderWindow::new(width, height)),
            ..Self::default()
        }
    }
}

/// Cached projection state for one rebuild.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewInfo {
    amvp: DMat4,
    actor_matrix: DMat4,
    inverse_actor_matrix: DMat4,
    viewport: [f64; 4],
    normalized_viewport: [f64; 4],
    window_size: [u32; 2],
    viewport_size: [u32; 2],
    display_offset: DVec2,
    viewport_bounds: [f64; 4],
    camera_right: DVec3,
    camera_up: DVec3,
    camera_forward: DVec3,
}

impl ViewInfo {
    /// Derive projection state from the current view.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::MissingCamera`] or
    /// [`LabelError::MissingRenderWindow`] when a collaborator is absent,
    /// and [`LabelError::InvalidConfig`] for an empty viewport or a
    /// singular actor matrix.
    pub fn new(state: &ViewState) -> Result<Self, LabelError> {
        let camera = state.camera.as_ref().ok_or(LabelError::MissingCamera)?;
        let window = state.window.as_ref().ok_or(LabelError::MissingRenderWindow)?;

        let vp = state.viewport;
        if !(vp[2] > vp[0] && vp[3] > vp[1]) {
            return Err(LabelError::InvalidConfig(format!(
                "viewport {vp:?} has no area"
            )));
        }
        if state.actor_matrix.determinant().abs() < f64::EPSILON {
            return Err(LabelError::InvalidConfig(
                "actor matrix is singular".to_string(),
            ));
        }

        let [win_w, win_h] = window.size;
        let win_w_f = f64::from(win_w);
        let win_h_f = f64::from(win_h);
        let tile = window.tile_viewport;

        let normalized_viewport = [
            vp[0].max(tile[0]),
            vp[1].max(tile[1]),
            vp[2].min(tile[2]),
            vp[3].min(tile[3]),
        ];

        // Same aspect the host renderer uses: the part of the viewport
        // inside this tile, corrected for non-square pixels.
        let tiled_w = ((normalized_viewport[2] - normalized_viewport[0]) * win_w_f)
            .round()
            .max(0.0);
        let tiled_h = ((normalized_viewport[3] - normalized_viewport[1]) * win_h_f)
            .round()
            .max(0.0);
        let aspect = if tiled_h > 0.0 {
            state.pixel_aspect * tiled_w / tiled_h
        } else {
            state.pixel_aspect
        };

        let amvp = camera.composite_projection(aspect) * state.actor_matrix;

        let viewport_bounds = [vp[0] * win_w_f, vp[2] * win_w_f, vp[1] * win_h_f, vp[3] * win_h_f];

        Ok(Self {
            amvp,
            actor_matrix: state.actor_matrix,
            inverse_actor_matrix: state.actor_matrix.inverse(),
            viewport: vp,
            normalized_viewport,
            window_size: window.size,
            viewport_size: [
                pixel_extent(vp[0], vp[2], win_w_f),
                pixel_extent(vp[1], vp[3], win_h_f),
            ],
            display_offset: DVec2::new(viewport_bounds[0] + 0.5, viewport_bounds[2] + 0.5),
            viewport_bounds,
            camera_right: camera.view.row(0).truncate(),
            camera_up: camera.view.row(1).truncate(),
            camera_forward: camera.view.row(2).truncate(),
        })
    }

    /// Map an actor-space point into world space.
    #[must_use]
    pub fn actor_to_world(&self, actor: DVec3) -> DVec3 {
        self.actor_matrix.project_point3(actor)
    }

    /// Map a world-space point into actor space.
    #[must_use]
    pub fn world_to_actor(&self, world: DVec3) -> DVec3 {
        self.inverse_actor_matrix.project_point3(world)
    }

    /// Project an actor-space point to display pixels.
    #[must_use]
    pub fn actor_to_display(&self, actor: DVec3) -> DVec2 {
        let clip = self.amvp * DVec4::new(actor.x, actor.y, actor.z, 1.0);
        let view = DVec2::new(clip.x, clip.y) / clip.w;

        // View -> normalized viewport (clipped to the tile).
        let nvp = self.normalized_viewport;
        let mut v = DVec2::new(
            nvp[0] + ((view.x + 1.0) / 2.0) * (nvp[2] - nvp[0]),
            nvp[1] + ((view.y + 1.0) / 2.0) * (nvp[3] - nvp[1]),
        );
        let vp = self.viewport;
        v.x = (v.x - vp[0]) / (vp[2] - vp[0]);
        v.y = (v.y - vp[1]) / (vp[3] - vp[1]);

        // Normalized viewport -> viewport pixels -> display pixels.
        v.x *= f64::from(self.viewport_size[0]) - 1.0;
        v.y *= f64::from(self.viewport_size[1]) - 1.0;
        v + self.display_offset
    }

    /// Project an actor-space point to integer display pixels.
    ///
    /// Fractional coordinates are truncated toward zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn actor_to_display_i(&self, actor: DVec3) -> IVec2 {
        let v = self.actor_to_display(actor);
        IVec2::new(v.x as i32, v.y as i32)
    }

    /// Whether a display position lies inside the viewport bounds
    /// (inclusive).
    #[must_use]
    pub fn is_visible(&self, display: DVec2) -> bool {
        let b = self.viewport_bounds;
        display.x >= b[0] && display.x <= b[1] && display.y >= b[2] && display.y <= b[3]
    }

    /// Integer-pixel variant of [`is_visible`](Self::is_visible).
    #[must_use]
    pub fn is_visible_i(&self, display: IVec2) -> bool {
        self.is_visible(display.as_dvec2())
    }

    /// Camera right axis in world space.
    #[must_use]
    pub const fn camera_right(&self) -> DVec3 {
        self.camera_right
    }

    /// Camera up axis in world space.
    #[must_use]
    pub const fn camera_up(&self) -> DVec3 {
        self.camera_up
    }

    /// Camera backward axis (toward the viewer) in world space.
    #[must_use]
    pub const fn camera_forward(&self) -> DVec3 {
        self.camera_forward
    }

    /// Viewport pixel bounds `[xmin, xmax, ymin, ymax]`.
    #[must_use]
    pub const fn viewport_bounds(&self) -> [f64; 4] {
        self.viewport_bounds
    }

    /// Render window size in pixels.
    #[must_use]
    pub const fn window_size(&self) -> [u32; 2] {
        self.window_size
    }

    /// Viewport size in pixels.
    #[must_use]
    pub const fn viewport_size(&self) -> [u32; 2] {
        self.viewport_size
    }

    /// Actor-model-view-projection matrix.
    #[must_use]
    pub const fn amvp(&self) -> DMat4 {
        self.amvp
    }
}

/// Width in whole pixels of the normalized span `[lo, hi]` of `extent`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn pixel_extent(lo: f64, hi: f64, extent: f64) -> u32 {
    ((hi * extent).round() - (lo * extent).round()).max(0.0) as u32
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pixel_view() -> ViewInfo {
        ViewInfo::new(&ViewState::top_down(401, 401, 200.0)).unwrap()
    }

    #[test]
    fn missing_camera_is_error() {
        let state = ViewState {
            window: Some(RenderWindow::new(100, 100)),
            ..ViewState::default()
        };
        assert_eq!(ViewInfo::new(&state), Err(LabelError::MissingCamera));
    }

    #[test]
    fn missing_window_is_error() {
        let state = ViewState {
            window: None,
            ..ViewState::top_down(100, 100, 50.0)
        };
        assert_eq!(ViewInfo::new(&state), Err(LabelError::MissingRenderWindow));
    }

    #[test]
    fn empty_viewport_is_error() {
        let state = ViewState {
            viewport: [0.5, 0.0, 0.5, 1.0],
            ..ViewState::top_down(100, 100, 50.0)
        };
        assert!(matches!(
            ViewInfo::new(&state),
            Err(LabelError::InvalidConfig(_))
        ));
    }

    #[test]
    fn origin_projects_to_window_center() {
        let view = pixel_view();
        let d = view.actor_to_display(DVec3::ZERO);
        assert!((d.x - 200.5).abs() < 1e-9, "x = {}", d.x);
        assert!((d.y - 200.5).abs() < 1e-9, "y = {}", d.y);
    }

    #[test]
    fn one_actor_unit_is_one_pixel() {
        let view = pixel_view();
        let a = view.actor_to_display(DVec3::new(-100.0, 30.0, 0.0));
        let b = view.actor_to_display(DVec3::new(100.0, 30.0, 0.0));
        assert!((b.x - a.x - 200.0).abs() < 1e-9);
        assert!((b.y - a.y).abs() < 1e-9);
    }

    #[test]
    fn integer_projection_truncates() {
        let view = pixel_view();
        assert_eq!(view.actor_to_display_i(DVec3::ZERO), IVec2::new(200, 200));
    }

    #[test]
    fn visibility_uses_viewport_bounds() {
        let view = pixel_view();
        assert!(view.is_visible(DVec2::new(0.0, 0.0)));
        assert!(view.is_visible(DVec2::new(401.0, 401.0)));
        assert!(!view.is_visible(DVec2::new(401.5, 10.0)));
        assert!(!view.is_visible_i(IVec2::new(-1, 10)));
    }

    #[test]
    fn actor_world_round_trip() {
        let state = ViewState {
            actor_matrix: DMat4::from_scale_rotation_translation(
                DVec3::splat(2.0),
                glam::DQuat::from_rotation_z(0.3),
                DVec3::new(5.0, -3.0, 1.0),
            ),
            ..ViewState::top_down(200, 200, 100.0)
        };
        let view = ViewInfo::new(&state).unwrap();
        let p = DVec3::new(1.5, -2.0, 0.25);
        let back = view.world_to_actor(view.actor_to_world(p));
        assert!((back - p).length() < 1e-9);
        let world = view.actor_to_world(DVec3::ZERO);
        assert!((world - DVec3::new(5.0, -3.0, 1.0)).length() < 1e-9);
    }

    #[test]
    fn camera_axes_come_from_view_rows() {
        let view = pixel_view();
        assert!((view.camera_right() - DVec3::X).length() < 1e-12);
        assert!((view.camera_up() - DVec3::Y).length() < 1e-12);
        assert!((view.camera_forward() - DVec3::Z).length() < 1e-12);
    }

    #[test]
    fn sub_viewport_offsets_display() {
        let state = ViewState {
            viewport: [0.5, 0.0, 1.0, 1.0],
            ..ViewState::top_down(400, 200, 100.0)
        };
        let view = ViewInfo::new(&state).unwrap();
        assert_eq!(view.viewport_size(), [200, 200]);
        assert_eq!(view.viewport_bounds(), [200.0, 400.0, 0.0, 200.0]);
        let d = view.actor_to_display(DVec3::ZERO);
        assert!((d.x - (200.0 + 99.5 + 0.5)).abs() < 1e-9, "x = {}", d.x);
    }

    #[test]
    fn view_state_serde_round_trip() {
        let state = ViewState::top_down(640, 480, 12.5);
        let json = serde_json::to_string(&state).unwrap();
        let back: ViewState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }
}
