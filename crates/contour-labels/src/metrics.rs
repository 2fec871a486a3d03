//! Label metrics: text, style, and pixel size for every isoline.
//!
//! Text measurement is delegated to a [`TextMetrics`] backend injected by
//! the caller. [`MonospaceMetrics`] is a deterministic backend that needs
//! no font rasterizer.
//!
//! # Style assignment
//!
//! Scalar values are gathered into an ordered map. An optional explicit
//! mapping array pairs its i-th value with the i-th style of a cyclic
//! walk over the style collection. Every value left unmapped then takes
//! the next style of a fresh cyclic walk, in ascending value order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{IsolineSet, LabelError};

/// Scalars with magnitude at or below this are labeled `"0"`.
pub const NEAR_ZERO: f64 = 1e-6;

/// Significant digits used when formatting label values.
const VALUE_PRECISION: usize = 6;

/// Pixel bounding box `[xmin, xmax, ymin, ymax]`, inclusive.
pub type PixelBox = [i32; 4];

/// Horizontal text justification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Justification {
    /// Anchor at the left edge.
    #[default]
    Left,
    /// Anchor at the center.
    Centered,
    /// Anchor at the right edge.
    Right,
}

/// Vertical text justification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VerticalJustification {
    /// Anchor at the bottom edge.
    #[default]
    Bottom,
    /// Anchor at the center.
    Centered,
    /// Anchor at the top edge.
    Top,
}

/// Font, size, and color of a label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    /// Font family name.
    pub font_family: String,
    /// Font size in points.
    pub font_size: u32,
    /// RGBA color.
    pub color: [u8; 4],
    /// Bold face.
    pub bold: bool,
    /// Horizontal justification.
    pub justification: Justification,
    /// Vertical justification.
    pub vertical_justification: VerticalJustification,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: "Arial".to_string(),
            font_size: 12,
            color: [255, 255, 255, 255],
            bold: false,
            justification: Justification::Left,
            vertical_justification: VerticalJustification::Bottom,
        }
    }
}

/// Index of a style within a [`StyleCollection`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StyleId(pub usize);

/// Ordered set of label styles, traversed cyclically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleCollection(Vec<TextStyle>);

impl Default for StyleCollection {
    /// A collection holding a single default style.
    fn default() -> Self {
        Self(vec![TextStyle::default()])
    }
}

impl StyleCollection {
    /// Create a collection from styles. May be empty; emptiness is
    /// reported when the collection is first traversed.
    #[must_use]
    pub const fn new(styles: Vec<TextStyle>) -> Self {
        Self(styles)
    }

    /// Number of styles.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no styles.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All styles in order.
    #[must_use]
    pub fn styles(&self) -> &[TextStyle] {
        &self.0
    }

    /// Look up a style.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::StyleIndexOutOfRange`] for an unknown id.
    pub fn get(&self, id: StyleId) -> Result<&TextStyle, LabelError> {
        self.0.get(id.0).ok_or(LabelError::StyleIndexOutOfRange {
            index: id.0,
            len: self.0.len(),
        })
    }

    /// Force every style to centered justification on both axes. Labels
    /// are anchored at their center point.
    pub fn center_all(&mut self) {
        for style in &mut self.0 {
            style.justification = Justification::Centered;
            style.vertical_justification = VerticalJustification::Centered;
        }
    }

    /// Start a cyclic walk over the styles.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::EmptyStyleCollection`] if there is nothing
    /// to cycle over.
    pub const fn cycle(&self) -> Result<StyleCycle, LabelError> {
        if self.0.is_empty() {
            return Err(LabelError::EmptyStyleCollection);
        }
        Ok(StyleCycle {
            len: self.0.len(),
            next: 0,
        })
    }
}

/// Endless walk over a non-empty style collection, wrapping to the start.
#[derive(Debug, Clone)]
pub struct StyleCycle {
    len: usize,
    next: usize,
}

impl Iterator for StyleCycle {
    type Item = StyleId;

    fn next(&mut self) -> Option<StyleId> {
        let id = StyleId(self.next);
        self.next = (self.next + 1) % self.len;
        Some(id)
    }
}

/// Map key ordering scalars by IEEE total order, with `-0.0` folded
/// into `0.0`.
#[derive(Debug, Clone, Copy)]
struct ScalarKey(f64);

impl ScalarKey {
    fn new(value: f64) -> Self {
        Self(if value == 0.0 { 0.0 } else { value })
    }
}

impl PartialEq for ScalarKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScalarKey {}

impl PartialOrd for ScalarKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScalarKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Scalar value to style mapping for one rebuild.
#[derive(Debug, Clone, Default)]
pub struct StyleAssignment(BTreeMap<ScalarKey, StyleId>);

impl StyleAssignment {
    /// Assign a style to every value in `values`.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::EmptyStyleCollection`] if `styles` is empty.
    pub fn build(
        values: impl IntoIterator<Item = f64>,
        explicit: Option<&[f64]>,
        styles: &StyleCollection,
    ) -> Result<Self, LabelError> {
        let mut slots: BTreeMap<ScalarKey, Option<StyleId>> = BTreeMap::new();

        if let Some(mapping) = explicit {
            let mut cycle = styles.cycle()?;
            for &value in mapping {
                let style = cycle.next();
                slots.entry(ScalarKey::new(value)).or_insert(style);
            }
        }

        for value in values {
            slots.entry(ScalarKey::new(value)).or_insert(None);
        }

        let mut cycle = styles.cycle()?;
        let assigned = slots
            .into_iter()
            .map(|(key, slot)| {
                let style = slot.or_else(|| cycle.next()).unwrap_or_default();
                (key, style)
            })
            .collect();
        Ok(Self(assigned))
    }

    /// The style assigned to `value`, if it was part of the assignment.
    #[must_use]
    pub fn style_for(&self, value: f64) -> Option<StyleId> {
        self.0.get(&ScalarKey::new(value)).copied()
    }

    /// Number of distinct values assigned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no values were assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Error reported by a [`TextMetrics`] backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct MeasureError(pub String);

/// Text measurement collaborator.
///
/// Implementations report the pixel bounding box a string occupies when
/// rendered in a style at a DPI.
pub trait TextMetrics {
    /// Measure `text` rendered with `style` at `dpi`.
    ///
    /// # Errors
    ///
    /// Returns [`MeasureError`] when the text cannot be measured.
    fn bounding_box(&self, style: &TextStyle, text: &str, dpi: u32)
    -> Result<PixelBox, MeasureError>;
}

/// Deterministic fixed-advance text metrics.
///
/// Every character advances by `advance` em and a line is `line_height`
/// em tall, where one em is the style's font size scaled by `dpi / 72`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonospaceMetrics {
    /// Horizontal advance per character, in em.
    pub advance: f64,
    /// Line height, in em.
    pub line_height: f64,
}

impl Default for MonospaceMetrics {
    fn default() -> Self {
        Self {
            advance: 0.6,
            line_height: 1.2,
        }
    }
}

impl TextMetrics for MonospaceMetrics {
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn bounding_box(
        &self,
        style: &TextStyle,
        text: &str,
        dpi: u32,
    ) -> Result<PixelBox, MeasureError> {
        if text.is_empty() {
            return Err(MeasureError("empty string".to_string()));
        }
        if style.font_size == 0 {
            return Err(MeasureError("font size is zero".to_string()));
        }
        let em = f64::from(style.font_size) * f64::from(dpi) / 72.0;
        let chars = text.chars().count() as f64;
        let width = (chars * self.advance * em).ceil().max(1.0) as i32;
        let height = (self.line_height * em).ceil().max(1.0) as i32;
        Ok([0, width - 1, 0, height - 1])
    }
}

/// Text, style, and pixel size of one isoline's label.
///
/// Exactly one per polyline. Polylines with no points get an invalid
/// metric and are never labeled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelMetric {
    /// Whether the line can carry a label at all.
    pub valid: bool,
    /// The isoline's scalar value, with near-zero values folded to `0`.
    pub value: f64,
    /// Formatted label text.
    pub text: String,
    /// Assigned style.
    pub style: StyleId,
    /// Pixel bounding box of the rendered text.
    pub bbox: PixelBox,
    /// Pixel `[width, height]` of the rendered text.
    pub dims: [i32; 2],
}

impl LabelMetric {
    /// Rendered text width in pixels.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.dims[0]
    }

    /// Rendered text height in pixels.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.dims[1]
    }
}

/// Fold values with magnitude at or below [`NEAR_ZERO`] to exactly zero.
#[must_use]
pub fn suppress_near_zero(value: f64) -> f64 {
    if value.abs() > NEAR_ZERO { value } else { 0.0 }
}

/// Format a scalar as label text.
///
/// Near-zero values (including `-0.0`) become `"0"`. Other values use
/// general notation with six significant digits: fixed notation for
/// decimal exponents in `[-4, 6)`, scientific otherwise, trailing zeros
/// removed.
///
/// # Examples
///
/// ```
/// use contour_labels::metrics::format_value;
///
/// assert_eq!(format_value(0.5), "0.5");
/// assert_eq!(format_value(-3e-7), "0");
/// assert_eq!(format_value(1234567.0), "1.23457e+06");
/// ```
#[must_use]
pub fn format_value(value: f64) -> String {
    format_general(suppress_near_zero(value), VALUE_PRECISION)
}

/// `%g`-style formatting with `precision` significant digits.
fn format_general(value: f64, precision: usize) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return value.to_string();
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return value.to_string();
    };

    let precision_exp = i32::try_from(precision).unwrap_or(i32::MAX);
    if exponent < -4 || exponent >= precision_exp {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            trim_fraction(mantissa),
            exponent.unsigned_abs()
        )
    } else {
        let decimals = usize::try_from(precision_exp - 1 - exponent).unwrap_or(0);
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

/// Strip trailing zeros (and a dangling decimal point) from a fraction.
fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Build one [`LabelMetric`] per line of `set`.
///
/// # Errors
///
/// Returns [`LabelError::EmptyStyleCollection`] for an empty style
/// collection, [`LabelError::NoPointData`] when a line's first point has
/// no scalar, and [`LabelError::Measure`] when the backend fails on any
/// label (a single failure aborts the whole rebuild).
pub fn build_label_metrics(
    set: &IsolineSet,
    styles: &StyleCollection,
    explicit: Option<&[f64]>,
    text_metrics: &dyn TextMetrics,
    dpi: u32,
) -> Result<Vec<LabelMetric>, LabelError> {
    let mut metrics = Vec::with_capacity(set.lines.len());
    for polyline in &set.lines {
        if polyline.is_empty() {
            metrics.push(LabelMetric::default());
            continue;
        }
        let raw = polyline
            .value(&set.scalars)
            .ok_or(LabelError::NoPointData {
                points: set.points.len(),
                scalars: set.scalars.len(),
            })?;
        let value = suppress_near_zero(raw);
        metrics.push(LabelMetric {
            valid: true,
            value,
            text: format_general(value, VALUE_PRECISION),
            ..LabelMetric::default()
        });
    }

    let assignment = StyleAssignment::build(
        metrics.iter().filter(|m| m.valid).map(|m| m.value),
        explicit,
        styles,
    )?;

    for metric in metrics.iter_mut().filter(|m| m.valid) {
        metric.style = assignment
            .style_for(metric.value)
            .ok_or(LabelError::EmptyStyleCollection)?;
        let style = styles.get(metric.style)?;
        let bbox = text_metrics
            .bounding_box(style, &metric.text, dpi)
            .map_err(|e| LabelError::Measure {
                text: metric.text.clone(),
                reason: e.to_string(),
            })?;
        metric.bbox = bbox;
        metric.dims = [bbox[1] - bbox[0] + 1, bbox[3] - bbox[2] + 1];
    }

    Ok(metrics)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use glam::DVec3;

    use super::*;
    use crate::types::Polyline;

    /// Metrics double that fails for one specific string.
    struct FailOn(&'static str);

    impl TextMetrics for FailOn {
        fn bounding_box(
            &self,
            _style: &TextStyle,
            text: &str,
            _dpi: u32,
        ) -> Result<PixelBox, MeasureError> {
            if text == self.0 {
                Err(MeasureError("glyph missing".to_string()))
            } else {
                Ok([0, 9, 0, 4])
            }
        }
    }

    fn styles(n: u32) -> StyleCollection {
        StyleCollection::new(
            (0..n)
                .map(|i| TextStyle {
                    font_size: 10 + i,
                    ..TextStyle::default()
                })
                .collect(),
        )
    }

    fn set_with_values(values: &[f64]) -> IsolineSet {
        let mut set = IsolineSet::default();
        for (i, &v) in values.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let y = i as f64;
            set.points.push(DVec3::new(0.0, y, 0.0));
            set.points.push(DVec3::new(1.0, y, 0.0));
            set.scalars.extend([v, v]);
            set.lines.push(Polyline::new(vec![2 * i, 2 * i + 1]));
        }
        set
    }

    #[test]
    fn format_near_zero_is_zero() {
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(-0.0), "0");
        assert_eq!(format_value(5e-7), "0");
        assert_eq!(format_value(-9.9e-7), "0");
        assert_eq!(format_value(1e-6), "0");
        assert_eq!(format_value(-1e-6), "0");
        assert_ne!(format_value(1.5e-6), "0");
    }

    #[test]
    fn format_general_notation() {
        assert_eq!(format_value(0.5), "0.5");
        assert_eq!(format_value(100.0), "100");
        assert_eq!(format_value(-2.25), "-2.25");
        assert_eq!(format_value(123_456.0), "123456");
        assert_eq!(format_value(1_234_567.0), "1.23457e+06");
        assert_eq!(format_value(0.0001), "0.0001");
        assert_eq!(format_value(0.000_012_5), "1.25e-05");
        assert_eq!(format_value(1.0 / 3.0), "0.333333");
    }

    #[test]
    fn cycle_wraps() {
        let collection = styles(3);
        let ids: Vec<_> = collection.cycle().unwrap().take(7).collect();
        assert_eq!(
            ids,
            [0, 1, 2, 0, 1, 2, 0].map(StyleId).to_vec(),
            "cycle should wrap to the start"
        );
    }

    #[test]
    fn empty_collection_cannot_cycle() {
        let collection = StyleCollection::new(vec![]);
        assert!(matches!(
            collection.cycle(),
            Err(LabelError::EmptyStyleCollection)
        ));
    }

    #[test]
    fn center_all_forces_centered() {
        let mut collection = styles(2);
        collection.center_all();
        for style in collection.styles() {
            assert_eq!(style.justification, Justification::Centered);
            assert_eq!(
                style.vertical_justification,
                VerticalJustification::Centered
            );
        }
    }

    #[test]
    fn assignment_round_robin_in_ascending_order() {
        let assignment =
            StyleAssignment::build([3.0, 1.0, 2.0, 4.0, 1.0], None, &styles(3)).unwrap();
        assert_eq!(assignment.len(), 4);
        assert_eq!(assignment.style_for(1.0), Some(StyleId(0)));
        assert_eq!(assignment.style_for(2.0), Some(StyleId(1)));
        assert_eq!(assignment.style_for(3.0), Some(StyleId(2)));
        assert_eq!(assignment.style_for(4.0), Some(StyleId(0)));
        assert_eq!(assignment.style_for(5.0), None);
    }

    #[test]
    fn explicit_mapping_takes_priority() {
        // Mapping pairs 10.0 -> style 0 and 2.0 -> style 1; the remaining
        // values restart the cycle in ascending order.
        let assignment =
            StyleAssignment::build([1.0, 2.0, 3.0], Some(&[10.0, 2.0]), &styles(3)).unwrap();
        assert_eq!(assignment.style_for(10.0), Some(StyleId(0)));
        assert_eq!(assignment.style_for(2.0), Some(StyleId(1)));
        assert_eq!(assignment.style_for(1.0), Some(StyleId(0)));
        assert_eq!(assignment.style_for(3.0), Some(StyleId(1)));
    }

    #[test]
    fn explicit_mapping_first_entry_wins() {
        let assignment =
            StyleAssignment::build([5.0], Some(&[5.0, 5.0]), &styles(2)).unwrap();
        assert_eq!(assignment.style_for(5.0), Some(StyleId(0)));
    }

    #[test]
    fn negative_zero_shares_a_style_with_zero() {
        let assignment = StyleAssignment::build([0.0], Some(&[-0.0]), &styles(2)).unwrap();
        assert_eq!(assignment.len(), 1);
        assert_eq!(assignment.style_for(0.0), Some(StyleId(0)));
    }

    #[test]
    fn monospace_measures_by_char_count() {
        let style = TextStyle {
            font_size: 10,
            ..TextStyle::default()
        };
        let bbox = MonospaceMetrics::default()
            .bounding_box(&style, "12.5", 72)
            .unwrap();
        // 4 chars * 0.6 * 10px = 24px wide, 1.2 * 10px = 12px tall.
        assert_eq!(bbox, [0, 23, 0, 11]);
    }

    #[test]
    fn monospace_scales_with_dpi() {
        let style = TextStyle {
            font_size: 10,
            ..TextStyle::default()
        };
        let bbox = MonospaceMetrics::default()
            .bounding_box(&style, "1", 144)
            .unwrap();
        assert_eq!(bbox, [0, 11, 0, 23]);
    }

    #[test]
    fn metrics_one_per_line() {
        let set = set_with_values(&[1.5, 2e-7, 1.5]);
        let metrics = build_label_metrics(
            &set,
            &styles(2),
            None,
            &MonospaceMetrics::default(),
            72,
        )
        .unwrap();
        assert_eq!(metrics.len(), 3);
        assert_eq!(metrics[0].text, "1.5");
        assert_eq!(metrics[1].text, "0");
        assert!(metrics[1].value.abs() < f64::EPSILON);
        // 0 sorts before 1.5, so it takes the first style.
        assert_eq!(metrics[1].style, StyleId(0));
        assert_eq!(metrics[0].style, StyleId(1));
        assert_eq!(metrics[0].style, metrics[2].style);
        assert_eq!(metrics[0].dims, [metrics[0].width(), metrics[0].height()]);
        assert!(metrics[0].width() > 0);
    }

    #[test]
    fn empty_line_is_invalid_metric() {
        let mut set = set_with_values(&[4.0]);
        set.lines.push(Polyline::new(vec![]));
        let metrics = build_label_metrics(
            &set,
            &styles(1),
            None,
            &MonospaceMetrics::default(),
            72,
        )
        .unwrap();
        assert!(metrics[0].valid);
        assert!(!metrics[1].valid);
    }

    #[test]
    fn failed_measurement_aborts() {
        let set = set_with_values(&[1.0, 2.0]);
        let err = build_label_metrics(&set, &styles(1), None, &FailOn("2"), 72).unwrap_err();
        assert_eq!(
            err,
            LabelError::Measure {
                text: "2".to_string(),
                reason: "glyph missing".to_string()
            }
        );
    }

    #[test]
    fn dims_are_inclusive_extent() {
        let set = set_with_values(&[7.0]);
        let metrics =
            build_label_metrics(&set, &styles(1), None, &FailOn("never"), 72).unwrap();
        assert_eq!(metrics[0].bbox, [0, 9, 0, 4]);
        assert_eq!(metrics[0].dims, [10, 5]);
    }

    #[test]
    fn empty_styles_rejected() {
        let set = set_with_values(&[1.0]);
        let err = build_label_metrics(
            &set,
            &StyleCollection::new(vec![]),
            None,
            &MonospaceMetrics::default(),
            72,
        )
        .unwrap_err();
        assert_eq!(err, LabelError::EmptyStyleCollection);
    }
}
