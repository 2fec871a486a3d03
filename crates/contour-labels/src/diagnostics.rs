//! Labeling diagnostics: timing and counts for each stage.
//!
//! [`label_isolines_with_diagnostics`] runs the same pass as
//! [`label_isolines`](crate::label_isolines) and records how long each
//! stage took and what it produced. Time is read through the [`Clock`]
//! trait so this crate never touches a platform timer itself.
//!
//! Durations serialize as fractional seconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::instantiate::{build_stencil_quads, instantiate_labels, label_transform};
use crate::metrics::{TextMetrics, build_label_metrics};
use crate::overlap::resolve_overlaps;
use crate::placer::{LabelGroup, place_labels};
use crate::types::{IsolineSet, LabelConfig, LabelError};
use crate::view::{ViewInfo, ViewState};
use crate::{LabelLayout, StyleCollection, check_inputs};

/// Source of timestamps for diagnostics.
pub trait Clock {
    /// A point in time.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Diagnostics collected from one labeling pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelDiagnostics {
    /// Input checks and projection setup.
    pub view_setup: StageDiagnostics,
    /// Label text, style, and size.
    pub metrics: StageDiagnostics,
    /// Feasibility test and smoothness scanning.
    pub placement: StageDiagnostics,
    /// Pairwise overlap removal.
    pub overlap: StageDiagnostics,
    /// Label records and stencil quads.
    pub instantiation: StageDiagnostics,
    /// Wall-clock duration of the whole pass.
    #[serde(with = "duration_secs")]
    pub total_duration: Duration,
    /// Summary counts.
    pub summary: LabelSummary,
}

/// Timing and metrics for one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of the stage.
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// What the stage produced.
    pub metrics: StageMetrics,
}

/// Stage-specific counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Projection setup.
    ViewSetup {
        /// Render window size in pixels.
        window_size: [u32; 2],
        /// Viewport size in pixels.
        viewport_size: [u32; 2],
    },
    /// Label metrics.
    Metrics {
        /// Number of lines.
        line_count: usize,
        /// Lines with a valid metric.
        valid_count: usize,
        /// Distinct label texts.
        distinct_texts: usize,
    },
    /// Placement.
    Placement {
        /// Lines that passed the feasibility test.
        feasible_lines: usize,
        /// Lines with at least one candidate.
        labeled_lines: usize,
        /// Candidates found.
        candidate_count: usize,
    },
    /// Overlap resolution.
    Overlap {
        /// Candidates before resolution.
        candidates_before: usize,
        /// Candidates after resolution.
        candidates_after: usize,
    },
    /// Instantiation.
    Instantiation {
        /// Labels emitted.
        label_count: usize,
        /// Stencil triangles built.
        stencil_triangles: usize,
    },
}

/// High-level counts for the pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSummary {
    /// Points in the isoline set.
    pub point_count: usize,
    /// Lines in the isoline set.
    pub line_count: usize,
    /// Labels emitted.
    pub label_count: usize,
}

impl LabelDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Labeling Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Input: {} points, {} lines",
            self.summary.point_count, self.summary.line_count,
        ));
        let total_ms = duration_ms(self.total_duration);
        lines.push(format!("Total duration: {total_ms:.3}ms"));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        for (name, stage) in self.stages() {
            let ms = duration_ms(stage.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&stage.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!("Labels: {}", self.summary.label_count));

        lines.join("\n")
    }

    /// Stages in execution order with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 5] {
        [
            ("View Setup", &self.view_setup),
            ("Metrics", &self.metrics),
            ("Placement", &self.placement),
            ("Overlap", &self.overlap),
            ("Instantiation", &self.instantiation),
        ]
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::ViewSetup {
            window_size,
            viewport_size,
        } => format!(
            "window {}x{}, viewport {}x{}",
            window_size[0], window_size[1], viewport_size[0], viewport_size[1]
        ),
        StageMetrics::Metrics {
            line_count,
            valid_count,
            distinct_texts,
        } => format!("{valid_count}/{line_count} lines valid, {distinct_texts} distinct texts"),
        StageMetrics::Placement {
            feasible_lines,
            labeled_lines,
            candidate_count,
        } => format!(
            "{feasible_lines} feasible, {labeled_lines} labeled, {candidate_count} candidates"
        ),
        StageMetrics::Overlap {
            candidates_before,
            candidates_after,
        } => format!(
            "{candidates_before}->{candidates_after} candidates ({} removed)",
            candidates_before.saturating_sub(*candidates_after)
        ),
        StageMetrics::Instantiation {
            label_count,
            stencil_triangles,
        } => format!("{label_count} labels, {stencil_triangles} stencil triangles"),
    }
}

fn candidate_count(groups: &[LabelGroup]) -> usize {
    groups.iter().map(LabelGroup::len).sum()
}

/// Run the labeling pass, recording per-stage diagnostics.
///
/// Produces the same [`LabelLayout`] as
/// [`label_isolines`](crate::label_isolines).
///
/// # Errors
///
/// Returns the same errors as [`label_isolines`](crate::label_isolines).
pub fn label_isolines_with_diagnostics<C: Clock>(
    set: &IsolineSet,
    styles: &StyleCollection,
    mapping: Option<&[f64]>,
    config: &LabelConfig,
    view: &ViewState,
    text_metrics: &dyn TextMetrics,
    clock: &C,
) -> Result<(LabelLayout, LabelDiagnostics), LabelError> {
    let start = clock.now();

    let t = clock.now();
    check_inputs(set, styles, config)?;
    let view = ViewInfo::new(view)?;
    let view_setup = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::ViewSetup {
            window_size: view.window_size(),
            viewport_size: view.viewport_size(),
        },
    };

    let t = clock.now();
    let metrics = build_label_metrics(set, styles, mapping, text_metrics, config.rendered_dpi)?;
    let mut texts: Vec<&str> = metrics
        .iter()
        .filter(|m| m.valid)
        .map(|m| m.text.as_str())
        .collect();
    texts.sort_unstable();
    texts.dedup();
    let metrics_stage = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Metrics {
            line_count: metrics.len(),
            valid_count: metrics.iter().filter(|m| m.valid).count(),
            distinct_texts: texts.len(),
        },
    };

    let t = clock.now();
    let mut groups = place_labels(set, &metrics, &view, config);
    let candidates_before = candidate_count(&groups);
    let placement = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Placement {
            feasible_lines: groups.iter().filter(|g| g.feasible).count(),
            labeled_lines: groups.iter().filter(|g| !g.is_empty()).count(),
            candidate_count: candidates_before,
        },
    };

    let t = clock.now();
    resolve_overlaps(&mut groups);
    let overlap = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Overlap {
            candidates_before,
            candidates_after: candidate_count(&groups),
        },
    };

    let t = clock.now();
    let labels = instantiate_labels(
        &groups,
        &metrics,
        &view,
        config.orientation,
        label_transform,
    );
    let stencil = build_stencil_quads(&labels);
    let instantiation = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Instantiation {
            label_count: labels.len(),
            stencil_triangles: stencil.indices.len() / 3,
        },
    };

    let diagnostics = LabelDiagnostics {
        view_setup,
        metrics: metrics_stage,
        placement,
        overlap,
        instantiation,
        total_duration: clock.elapsed(&start),
        summary: LabelSummary {
            point_count: set.points.len(),
            line_count: set.lines.len(),
            label_count: labels.len(),
        },
    };

    Ok((
        LabelLayout {
            metrics,
            groups,
            labels,
        },
        diagnostics,
    ))
}
