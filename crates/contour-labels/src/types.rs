//! Shared types for the contour labeling pipeline.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// One isoline: an ordered run of point ids into the shared point set of
/// an [`IsolineSet`].
///
/// The isoline's scalar value is the scalar of its first point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Polyline(Vec<usize>);

impl Polyline {
    /// Create a new polyline from point ids.
    #[must_use]
    pub const fn new(ids: Vec<usize>) -> Self {
        Self(ids)
    }

    /// Returns `true` if the polyline references no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of point ids in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// The point ids, in line-walk order.
    #[must_use]
    pub fn ids(&self) -> &[usize] {
        &self.0
    }

    /// The isoline's scalar value, read at its first point.
    ///
    /// Returns `None` for an empty polyline or when the first id has no
    /// scalar.
    #[must_use]
    pub fn value(&self, scalars: &[f64]) -> Option<f64> {
        self.0.first().and_then(|&id| scalars.get(id)).copied()
    }
}

/// Isoline geometry for one rebuild: a shared point set in actor space,
/// one scalar per point, and the polylines that reference them.
///
/// Produced upstream by a contour extraction step and treated as
/// immutable input by the labeling pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IsolineSet {
    /// Point coordinates in actor space.
    pub points: Vec<DVec3>,
    /// Scalar value per point.
    pub scalars: Vec<f64>,
    /// Polylines referencing `points` by index.
    pub lines: Vec<Polyline>,
}

impl IsolineSet {
    /// Check that the set can be labeled at all.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::NoPoints`], [`LabelError::NoScalars`],
    /// [`LabelError::NoPointData`], [`LabelError::NoLines`], or
    /// [`LabelError::PointIdOutOfRange`] when the set is unusable.
    pub fn validate(&self) -> Result<(), LabelError> {
        if self.points.is_empty() {
            return Err(LabelError::NoPoints);
        }
        if self.scalars.is_empty() {
            return Err(LabelError::NoScalars);
        }
        if self.scalars.len() < self.points.len() {
            return Err(LabelError::NoPointData {
                points: self.points.len(),
                scalars: self.scalars.len(),
            });
        }
        if self.lines.is_empty() {
            return Err(LabelError::NoLines);
        }
        for (line, polyline) in self.lines.iter().enumerate() {
            if let Some(&id) = polyline.ids().iter().find(|&&id| id >= self.points.len()) {
                return Err(LabelError::PointIdOutOfRange {
                    line,
                    id,
                    points: self.points.len(),
                });
            }
        }
        Ok(())
    }

    /// Total number of point references across all lines.
    #[must_use]
    pub fn total_line_points(&self) -> usize {
        self.lines.iter().map(Polyline::len).sum()
    }
}

/// How the label orientation is expressed on emitted label records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrientationMode {
    /// Explicit right/up basis plus a scale-rotate-translate transform,
    /// for renderers that composite labels into the 3D scene.
    #[default]
    Basis,
    /// A single screen rotation angle, for renderers that draw text
    /// directly in display space.
    ScreenAngle,
}

impl OrientationMode {
    /// Fewest remaining points the scanner needs to attempt a label.
    ///
    /// The basis renderer derives a direction from the window before the
    /// final point, so it needs one point more than the angle renderer.
    #[must_use]
    pub const fn min_scan_points(self) -> usize {
        match self {
            Self::Basis => 3,
            Self::ScreenAngle => 2,
        }
    }
}

/// Configuration for one labeling pass.
///
/// # Tolerance ladder
///
/// `smoothness_tolerances` must be non-empty and strictly ascending; a
/// line is scanned at each tolerance in turn until one yields at least
/// one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Whether labels are drawn at all. Isolines are always drawn.
    pub label_visibility: bool,

    /// Minimum display-space gap (pixels) between consecutive labels on
    /// the same line, measured from the end of the previous label's run.
    pub skip_distance: f64,

    /// Ascending smoothness tolerances tried per line.
    pub smoothness_tolerances: Vec<f64>,

    /// DPI forwarded to the text metrics backend.
    pub rendered_dpi: u32,

    /// How emitted labels carry their orientation.
    pub orientation: OrientationMode,
}

impl LabelConfig {
    /// Default for [`label_visibility`](Self::label_visibility).
    pub const DEFAULT_LABEL_VISIBILITY: bool = true;
    /// Default for [`skip_distance`](Self::skip_distance).
    pub const DEFAULT_SKIP_DISTANCE: f64 = 0.0;
    /// Default tolerance ladder.
    pub const DEFAULT_SMOOTHNESS_TOLERANCES: [f64; 6] = [0.010, 0.025, 0.050, 0.100, 0.200, 0.300];
    /// Default for [`rendered_dpi`](Self::rendered_dpi).
    pub const DEFAULT_RENDERED_DPI: u32 = 72;

    /// Check the configuration for values the pipeline cannot use.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::InvalidConfig`] describing the first
    /// offending field.
    pub fn validate(&self) -> Result<(), LabelError> {
        if !self.skip_distance.is_finite() || self.skip_distance < 0.0 {
            return Err(LabelError::InvalidConfig(format!(
                "skip_distance must be finite and non-negative, got {}",
                self.skip_distance
            )));
        }
        if self.smoothness_tolerances.is_empty() {
            return Err(LabelError::InvalidConfig(
                "smoothness_tolerances must not be empty".to_string(),
            ));
        }
        if self.smoothness_tolerances.iter().any(|t| !t.is_finite()) {
            return Err(LabelError::InvalidConfig(
                "smoothness_tolerances must be finite".to_string(),
            ));
        }
        if self.smoothness_tolerances.windows(2).any(|w| w[0] >= w[1]) {
            return Err(LabelError::InvalidConfig(
                "smoothness_tolerances must be strictly ascending".to_string(),
            ));
        }
        if self.rendered_dpi == 0 {
            return Err(LabelError::InvalidConfig(
                "rendered_dpi must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            label_visibility: Self::DEFAULT_LABEL_VISIBILITY,
            skip_distance: Self::DEFAULT_SKIP_DISTANCE,
            smoothness_tolerances: Self::DEFAULT_SMOOTHNESS_TOLERANCES.to_vec(),
            rendered_dpi: Self::DEFAULT_RENDERED_DPI,
            orientation: OrientationMode::default(),
        }
    }
}

/// Coarse classification of fatal labeling errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A collaborator (camera, render window, text metrics) is absent.
    MissingCollaborator,
    /// The input geometry, styles, or configuration cannot be labeled.
    BadInput,
}

/// Errors that abort a labeling rebuild.
///
/// Every variant is fatal for the whole pass: no labels are produced,
/// but the isolines themselves are still drawn by the mapper.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LabelError {
    /// The view has no active camera.
    #[error("no active camera on renderer")]
    MissingCamera,

    /// The view has no render window.
    #[error("no render window present")]
    MissingRenderWindow,

    /// No text metrics backend was provided.
    #[error("text metrics backend unavailable")]
    MissingTextMetrics,

    /// The isoline set has no points.
    #[error("no points in dataset")]
    NoPoints,

    /// The scalar array does not cover the point set.
    #[error("no point data in dataset: {points} points but {scalars} scalars")]
    NoPointData {
        /// Number of points.
        points: usize,
        /// Number of scalars.
        scalars: usize,
    },

    /// The isoline set has no lines.
    #[error("no lines in dataset")]
    NoLines,

    /// The isoline set has no scalars.
    #[error("no scalars in dataset")]
    NoScalars,

    /// A polyline references a point that does not exist.
    #[error("line {line} references point {id}, but only {points} points exist")]
    PointIdOutOfRange {
        /// Index of the offending line.
        line: usize,
        /// The out-of-range point id.
        id: usize,
        /// Number of points in the set.
        points: usize,
    },

    /// The style collection is empty.
    #[error("no text styles set")]
    EmptyStyleCollection,

    /// A style id does not refer to an entry of the style collection.
    #[error("style index {index} out of range for {len} styles")]
    StyleIndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of styles in the collection.
        len: usize,
    },

    /// The text metrics backend could not measure a label.
    #[error("error calculating bounding box for string '{text}': {reason}")]
    Measure {
        /// The label text that failed to measure.
        text: String,
        /// Backend-provided reason.
        reason: String,
    },

    /// Configuration is invalid.
    #[error("invalid label configuration: {0}")]
    InvalidConfig(String),
}

impl LabelError {
    /// Which fatal category this error belongs to.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::MissingCamera | Self::MissingRenderWindow | Self::MissingTextMetrics => {
                ErrorClass::MissingCollaborator
            }
            Self::NoPoints
            | Self::NoPointData { .. }
            | Self::NoLines
            | Self::NoScalars
            | Self::PointIdOutOfRange { .. }
            | Self::EmptyStyleCollection
            | Self::StyleIndexOutOfRange { .. }
            | Self::Measure { .. }
            | Self::InvalidConfig(_) => ErrorClass::BadInput,
        }
    }
}
