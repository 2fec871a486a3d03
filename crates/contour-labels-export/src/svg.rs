//! SVG export serializer.
//!
//! Renders isolines and their placed labels into an SVG string using the
//! [`svg`] crate for document construction, XML escaping, and path data
//! formatting.
//!
//! Geometry is projected to display pixels through the same
//! [`ViewInfo`] the labels were placed with, then flipped so the SVG
//! origin is the top-left corner of the window. The label stencil
//! becomes an SVG `<mask>` over the isoline group, so lines stop short
//! of the text exactly as they do on a stencil-capable renderer.
//!
//! [`SvgBackend`] implements [`LabelBackend`] so a
//! [`LabeledContourMapper`](contour_labels::LabeledContourMapper) can
//! render straight into a document; [`to_svg`] is the one-shot form for
//! an already computed set of labels.
//!
//! This is pure code with no I/O -- output is returned as a `String`.

use glam::{DVec2, DVec3};
use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{
    Definitions, Description, Element, Group, Mask, Path, Polygon, Rectangle, Text, Title,
};
use svg::node::{self, Node, Value};

use contour_labels::instantiate::build_stencil_quads;
use contour_labels::metrics::{Justification, VerticalJustification};
use contour_labels::{
    IsolineSet, LabelBackend, LabelError, PlacedLabel, Polyline, StencilQuads, StyleCollection,
    TextStyle, ViewInfo,
};

/// Metadata to embed in the SVG document.
///
/// All fields are optional. Text values are XML-escaped automatically
/// by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized [`LabelConfig`](contour_labels::LabelConfig) JSON,
    /// emitted inside a namespaced `<metadata>` element so exported
    /// files carry the settings that produced them.
    pub config_json: Option<&'a str>,
}

/// Rendering switches for SVG output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvgOptions {
    /// Outline each label's quad in red.
    pub show_quads: bool,
    /// Isoline stroke width in pixels.
    pub stroke_width: f64,
    /// Resolution the label font sizes are scaled to.
    pub dpi: u32,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            show_quads: false,
            stroke_width: 1.0,
            dpi: 72,
        }
    }
}

/// Build an SVG path `d` attribute string for one isoline.
///
/// Returns an empty string for polylines with fewer than 2 points or
/// with point ids outside `points`.
#[must_use]
pub fn build_path_data(polyline: &Polyline, points: &[DVec3], view: &ViewInfo) -> String {
    if polyline.len() < 2 {
        return String::new();
    }
    let height = window_height(view);
    let Some(projected) = polyline
        .ids()
        .iter()
        .map(|&id| points.get(id).map(|&p| flip(view.actor_to_display(p), height)))
        .collect::<Option<Vec<_>>>()
    else {
        return String::new();
    };

    let mut data = Data::new().move_to((projected[0].x, projected[0].y));
    for p in &projected[1..] {
        data = data.line_to((p.x, p.y));
    }
    String::from(Value::from(data))
}

fn window_height(view: &ViewInfo) -> f64 {
    f64::from(view.window_size()[1])
}

/// Display pixels (origin bottom-left) to SVG user units (origin
/// top-left).
fn flip(display: DVec2, height: f64) -> DVec2 {
    DVec2::new(display.x, height - display.y)
}

fn polygon_points(corners: impl IntoIterator<Item = DVec2>) -> String {
    corners
        .into_iter()
        .map(|p| format!("{},{}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn css_color(color: [u8; 4]) -> (String, f64) {
    let [r, g, b, a] = color;
    (format!("rgb({r},{g},{b})"), f64::from(a) / 255.0)
}

const fn text_anchor(justification: Justification) -> &'static str {
    match justification {
        Justification::Left => "start",
        Justification::Centered => "middle",
        Justification::Right => "end",
    }
}

const fn baseline(justification: VerticalJustification) -> &'static str {
    match justification {
        VerticalJustification::Bottom => "text-after-edge",
        VerticalJustification::Centered => "central",
        VerticalJustification::Top => "text-before-edge",
    }
}

/// A [`LabelBackend`] that draws into an SVG document.
#[derive(Debug)]
pub struct SvgBackend {
    view: ViewInfo,
    options: SvgOptions,
    isolines: Group,
    labels: Group,
    quads: Group,
    defs: Definitions,
    masks: usize,
    active_mask: Option<String>,
}

impl SvgBackend {
    /// A backend drawing into a document the size of `view`'s window.
    #[must_use]
    pub fn new(view: ViewInfo, options: SvgOptions) -> Self {
        Self {
            view,
            options,
            isolines: Group::new()
                .set("id", "isolines")
                .set("fill", "none")
                .set("stroke", "black")
                .set("stroke-width", options.stroke_width),
            labels: Group::new().set("id", "labels"),
            quads: Group::new()
                .set("id", "label-quads")
                .set("fill", "none")
                .set("stroke", "red")
                .set("stroke-width", 0.5),
            defs: Definitions::new(),
            masks: 0,
            active_mask: None,
        }
    }

    /// Serialize everything drawn so far.
    #[must_use]
    pub fn finish(self, metadata: &SvgMetadata<'_>) -> String {
        let [width, height] = self.view.window_size();
        let mut doc = Document::new()
            .set("width", width)
            .set("height", height)
            .set("viewBox", (0, 0, width, height));

        if let Some(title) = metadata.title {
            doc = doc.add(Title::new(title));
        }
        if let Some(description) = metadata.description {
            doc = doc.add(Description::new().add(node::Text::new(description)));
        }
        if let Some(config_json) = metadata.config_json {
            let mut config_el = Element::new("contour-labels:config");
            config_el.assign(
                "xmlns:contour-labels",
                "https://github.com/altendky/contour-labels/ns/1",
            );
            config_el.append(node::Text::new(config_json));
            let mut metadata_el = Element::new("metadata");
            metadata_el.append(config_el);
            doc = doc.add(metadata_el);
        }

        if self.masks > 0 {
            doc = doc.add(self.defs);
        }
        doc = doc.add(self.isolines).add(self.labels);
        if self.options.show_quads {
            doc = doc.add(self.quads);
        }

        // The svg crate omits the XML declaration, so we prepend it.
        format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
    }
}

impl LabelBackend for SvgBackend {
    fn apply_stencil(&mut self, quads: &StencilQuads) {
        let [width, height] = self.view.window_size();
        let id = format!("label-mask-{}", self.masks);
        self.masks += 1;

        let mut mask = Mask::new()
            .set("id", id.as_str())
            .set("maskUnits", "userSpaceOnUse")
            .add(
                Rectangle::new()
                    .set("width", width)
                    .set("height", height)
                    .set("fill", "white"),
            );
        let h = f64::from(height);
        for quad in quads.vertices.chunks_exact(4) {
            let corners = quad
                .iter()
                .map(|v| flip(self.view.actor_to_display(DVec3::from(v.map(f64::from))), h));
            mask = mask.add(
                Polygon::new()
                    .set("points", polygon_points(corners))
                    .set("fill", "black"),
            );
        }
        self.defs.append(mask);
        self.active_mask = Some(id);
    }

    fn remove_stencil(&mut self) {
        self.active_mask = None;
    }

    fn draw_isolines(&mut self, set: &IsolineSet) {
        let mut group = Group::new();
        if let Some(id) = &self.active_mask {
            group = group.set("mask", format!("url(#{id})"));
        }
        for polyline in &set.lines {
            let d = build_path_data(polyline, &set.points, &self.view);
            if d.is_empty() {
                continue;
            }
            group = group.add(Path::new().set("d", d));
        }
        self.isolines.append(group);
    }

    fn draw_label(&mut self, label: &PlacedLabel, style: &TextStyle) {
        let height = window_height(&self.view);
        let anchor = flip(self.view.actor_to_display(label.position), height);
        let (fill, opacity) = css_color(style.color);
        let font_px = f64::from(style.font_size) * f64::from(self.options.dpi) / 72.0;

        // Display angles are counter-clockwise with y up; SVG rotates
        // clockwise with y down.
        let mut text = Text::new(label.text.as_str())
            .set("x", anchor.x)
            .set("y", anchor.y)
            .set("font-family", style.font_family.as_str())
            .set("font-size", font_px)
            .set("fill", fill)
            .set("text-anchor", text_anchor(style.justification))
            .set("dominant-baseline", baseline(style.vertical_justification))
            .set(
                "transform",
                format!("rotate({} {} {})", -label.angle_degrees, anchor.x, anchor.y),
            )
            .set("data-line", label.line);
        if opacity < 1.0 {
            text = text.set("fill-opacity", opacity);
        }
        if style.bold {
            text = text.set("font-weight", "bold");
        }
        self.labels.append(text);

        let corners = label
            .screen_quad
            .iter()
            .map(|c| flip(c.as_dvec2(), height));
        self.quads
            .append(Polygon::new().set("points", polygon_points(corners)));
    }
}

/// Serialize isolines and their labels into an SVG document string.
///
/// Lines are masked under every label quad, then each label is drawn
/// with its style from `styles`.
///
/// # Errors
///
/// Returns [`LabelError::StyleIndexOutOfRange`] if a label refers to a
/// style `styles` does not have.
pub fn to_svg(
    set: &IsolineSet,
    labels: &[PlacedLabel],
    styles: &StyleCollection,
    view: &ViewInfo,
    metadata: &SvgMetadata<'_>,
    options: SvgOptions,
) -> Result<String, LabelError> {
    let mut backend = SvgBackend::new(view.clone(), options);
    if !labels.is_empty() {
        backend.apply_stencil(&build_stencil_quads(labels));
    }
    backend.draw_isolines(set);
    backend.remove_stencil();
    for label in labels {
        backend.draw_label(label, styles.get(label.style)?);
    }
    Ok(backend.finish(metadata))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use contour_labels::{
        LabelConfig, LabeledContourMapper, MonospaceMetrics, ViewState, label_isolines,
    };

    use super::*;

    fn view_state() -> ViewState {
        ViewState::top_down(401, 401, 200.0)
    }

    fn view() -> ViewInfo {
        ViewInfo::new(&view_state()).unwrap()
    }

    fn set() -> IsolineSet {
        let points: Vec<DVec3> = (0..5)
            .map(|i| DVec3::new(-100.0 + 50.0 * f64::from(i), 0.0, 0.0))
            .collect();
        IsolineSet {
            scalars: vec![12.5; points.len()],
            points,
            lines: vec![Polyline::new((0..5).collect())],
        }
    }

    fn labels(set: &IsolineSet) -> Vec<PlacedLabel> {
        label_isolines(
            set,
            &StyleCollection::default(),
            None,
            &LabelConfig::default(),
            &view_state(),
            &MonospaceMetrics::default(),
        )
        .unwrap()
        .labels
    }

    /// Trimmed contents of every `<text>` element.
    fn text_contents(svg: &str) -> Vec<&str> {
        svg.split("<text")
            .skip(1)
            .filter_map(|rest| {
                let body = &rest[rest.find('>')? + 1..];
                Some(body[..body.find("</text>")?].trim())
            })
            .collect()
    }

    #[test]
    fn path_data_is_flipped_to_svg_space() {
        let polyline = Polyline::new(vec![0, 4]);
        let d = build_path_data(&polyline, &set().points, &view());
        assert_eq!(d, "M100.5,200.5 L300.5,200.5");
    }

    #[test]
    fn path_data_skips_short_or_broken_lines() {
        let points = set().points;
        assert_eq!(build_path_data(&Polyline::new(vec![0]), &points, &view()), "");
        assert_eq!(
            build_path_data(&Polyline::new(vec![0, 99]), &points, &view()),
            ""
        );
    }

    #[test]
    fn svg_contains_masked_lines_and_labels() {
        let set = set();
        let labels = labels(&set);
        let mut styles = StyleCollection::default();
        styles.center_all();
        let svg = to_svg(
            &set,
            &labels,
            &styles,
            &view(),
            &SvgMetadata::default(),
            SvgOptions::default(),
        )
        .unwrap();

        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains("<mask"));
        assert!(svg.contains("mask=\"url(#label-mask-0)\""));
        assert!(svg.contains("<path"));
        assert_eq!(text_contents(&svg), vec!["12.5"]);
        assert!(svg.contains("text-anchor=\"middle\""));
        assert!(!svg.contains("label-quads"));
    }

    #[test]
    fn unlabeled_svg_has_no_mask() {
        let svg = to_svg(
            &set(),
            &[],
            &StyleCollection::default(),
            &view(),
            &SvgMetadata::default(),
            SvgOptions::default(),
        )
        .unwrap();
        assert!(!svg.contains("<mask"));
        assert!(svg.contains("<path"));
    }

    #[test]
    fn quads_overlay_is_optional() {
        let set = set();
        let labels = labels(&set);
        let options = SvgOptions {
            show_quads: true,
            ..SvgOptions::default()
        };
        let svg = to_svg(
            &set,
            &labels,
            &StyleCollection::default(),
            &view(),
            &SvgMetadata::default(),
            options,
        )
        .unwrap();
        assert!(svg.contains("id=\"label-quads\""));
    }

    #[test]
    fn metadata_is_embedded_and_escaped() {
        let metadata = SvgMetadata {
            title: Some("rings"),
            description: Some("a < b"),
            config_json: Some("{\"skip_distance\":0.0}"),
        };
        let svg = to_svg(
            &set(),
            &[],
            &StyleCollection::default(),
            &view(),
            &metadata,
            SvgOptions::default(),
        )
        .unwrap();
        assert!(svg.contains("<title>rings</title>"));
        assert!(svg.contains("a &lt; b"));
        assert!(svg.contains("<contour-labels:config"));
    }

    #[test]
    fn missing_style_is_an_error() {
        let set = set();
        let labels = labels(&set);
        let err = to_svg(
            &set,
            &labels,
            &StyleCollection::new(vec![]),
            &view(),
            &SvgMetadata::default(),
            SvgOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LabelError::StyleIndexOutOfRange { .. }));
    }

    #[test]
    fn mapper_renders_through_backend() {
        let mut mapper =
            LabeledContourMapper::new().with_text_metrics(Box::new(MonospaceMetrics::default()));
        let mut backend = SvgBackend::new(view(), SvgOptions::default());

        let drawn = mapper.render(&set(), &view_state(), &mut backend).unwrap();
        let svg = backend.finish(&SvgMetadata::default());

        assert_eq!(drawn, 1);
        assert!(svg.contains("<mask"));
        assert_eq!(text_contents(&svg), vec!["12.5"]);
    }
}
