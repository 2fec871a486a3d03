//! Label placement: drive the scanner over every line across the
//! smoothness tolerance ladder.

use log::trace;

use crate::feasibility::line_can_be_labeled;
use crate::metrics::LabelMetric;
use crate::scanner::{LabelCandidate, Scanner};
use crate::types::{IsolineSet, LabelConfig, Polyline};
use crate::view::ViewInfo;

/// The candidates found on one isoline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelGroup {
    /// Index of the line in its [`IsolineSet`].
    pub line: usize,
    /// Whether the line passed the feasibility test.
    pub feasible: bool,
    /// The tolerance that produced the candidates, if any did.
    pub tolerance: Option<f64>,
    /// Candidates in line-walk order.
    pub candidates: Vec<LabelCandidate>,
}

impl LabelGroup {
    /// Number of candidates.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Returns `true` if the line has no candidates.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Scan one line at each tolerance in turn, stopping at the first
/// tolerance that yields any candidate.
///
/// Returns the candidates and the tolerance that produced them.
pub fn place_line(
    scanner: &Scanner<'_>,
    polyline: &Polyline,
    metric: &LabelMetric,
    tolerances: &[f64],
) -> (Vec<LabelCandidate>, Option<f64>) {
    for &tolerance in tolerances {
        let mut window = polyline.ids();
        let mut candidates = Vec::new();
        while let Some(candidate) = scanner.next_label(&mut window, metric, tolerance) {
            candidates.push(candidate);
        }
        if !candidates.is_empty() {
            return (candidates, Some(tolerance));
        }
        trace!("no label run at tolerance {tolerance}, escalating");
    }
    (Vec::new(), None)
}

/// Place label candidates on every line of `set`.
///
/// Returns one group per line, in line order. Lines that fail the
/// feasibility test get an empty group.
#[must_use]
pub fn place_labels(
    set: &IsolineSet,
    metrics: &[LabelMetric],
    view: &ViewInfo,
    config: &LabelConfig,
) -> Vec<LabelGroup> {
    let scanner = Scanner::new(
        &set.points,
        view,
        config.skip_distance,
        config.orientation.min_scan_points(),
    );

    set.lines
        .iter()
        .zip(metrics)
        .enumerate()
        .map(|(line, (polyline, metric))| {
            if !line_can_be_labeled(polyline, &set.points, metric, view) {
                return LabelGroup {
                    line,
                    ..LabelGroup::default()
                };
            }
            let (candidates, tolerance) =
                place_line(&scanner, polyline, metric, &config.smoothness_tolerances);
            trace!(
                "line {line}: {} candidates at tolerance {tolerance:?}",
                candidates.len()
            );
            LabelGroup {
                line,
                feasible: true,
                tolerance,
                candidates,
            }
        })
        .collect()
}
