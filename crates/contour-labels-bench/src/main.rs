//! contour-labels-bench: CLI tool for label placement parameter
//! experimentation and diagnostics.
//!
//! Labels an isoline scene with configurable parameters, printing
//! detailed per-stage diagnostics. Useful for:
//!
//! - Tuning the smoothness tolerance ladder and skip distance
//! - Comparing basis and screen-angle orientation
//! - Measuring per-stage durations to identify bottlenecks
//! - Seeing how many candidates overlap resolution discards
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin contour-labels-bench -- [OPTIONS] [SCENE_PATH]
//! ```
//!
//! Without a scene file, a synthetic set of concentric rings is labeled.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod scene;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use contour_labels::diagnostics::{Clock, LabelDiagnostics};
use contour_labels::{
    LabelConfig, LabeledContourMapper, MonospaceMetrics, OrientationMode, ViewInfo,
};
use contour_labels_export::{SvgBackend, SvgMetadata, SvgOptions};

use crate::scene::Scene;

/// Label placement experimentation and diagnostics for contour-labels.
///
/// Places value labels on an isoline scene with configurable parameters
/// and prints detailed per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "contour-labels-bench", version)]
struct Cli {
    /// Path to a scene JSON file. Synthetic rings are used when omitted.
    scene_path: Option<PathBuf>,

    /// Number of synthetic rings.
    #[arg(long, default_value_t = 8, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    rings: usize,

    /// Points per synthetic ring.
    #[arg(long, default_value_t = 90, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(3..))]
    ring_points: usize,

    /// Synthetic window size in pixels (square).
    #[arg(long, default_value_t = 801, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(2..))]
    window: u32,

    /// Minimum display gap between labels on one line, in pixels.
    #[arg(long, default_value_t = LabelConfig::DEFAULT_SKIP_DISTANCE)]
    skip_distance: f64,

    /// Comma-separated smoothness tolerance ladder.
    #[arg(long, value_delimiter = ',')]
    tolerances: Option<Vec<f64>>,

    /// Resolution labels are measured at.
    #[arg(long, default_value_t = LabelConfig::DEFAULT_RENDERED_DPI, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    dpi: u32,

    /// Label orientation representation.
    #[arg(long, value_enum, default_value_t = Orientation::Basis)]
    orientation: Orientation,

    /// Draw isolines without labels.
    #[arg(long)]
    hide_labels: bool,

    /// Write SVG output to file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Outline label quads in the SVG output.
    #[arg(long)]
    show_quads: bool,

    /// Write the scene being labeled as JSON, e.g. to seed a scene file.
    #[arg(long)]
    write_scene: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full label config as a JSON string.
    ///
    /// When provided, all other label parameter flags are ignored.
    /// The JSON must be a valid `LabelConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Label orientation selection.
#[derive(Clone, Copy, ValueEnum)]
enum Orientation {
    /// Actor-space right/up vectors.
    Basis,
    /// Screen rotation angle in degrees.
    ScreenAngle,
}

/// Build a [`LabelConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<LabelConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(LabelConfig {
        label_visibility: !cli.hide_labels,
        skip_distance: cli.skip_distance,
        smoothness_tolerances: cli
            .tolerances
            .clone()
            .unwrap_or_else(|| LabelConfig::DEFAULT_SMOOTHNESS_TOLERANCES.to_vec()),
        rendered_dpi: cli.dpi,
        orientation: match cli.orientation {
            Orientation::Basis => OrientationMode::Basis,
            Orientation::ScreenAngle => OrientationMode::ScreenAngle,
        },
    })
}

fn load_scene(cli: &Cli) -> Result<Scene, String> {
    let Some(ref path) = cli.scene_path else {
        return Ok(Scene::rings(cli.rings, cli.ring_points, cli.window));
    };
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    serde_json::from_str(&json).map_err(|e| format!("Error parsing {}: {e}", path.display()))
}

/// Render the scene through the stateful mapper into an SVG document.
fn render_svg(
    scene: &Scene,
    config: &LabelConfig,
    title: &str,
    show_quads: bool,
) -> Result<String, String> {
    let view = ViewInfo::new(&scene.view).map_err(|e| format!("View error: {e}"))?;
    let mut mapper =
        LabeledContourMapper::new().with_text_metrics(Box::new(MonospaceMetrics::default()));
    mapper.set_config(config.clone());
    mapper.set_styles(scene.styles.clone());
    mapper.set_mapping(scene.mapping.clone());

    let options = SvgOptions {
        show_quads,
        dpi: config.rendered_dpi,
        ..SvgOptions::default()
    };
    let mut backend = SvgBackend::new(view, options);
    mapper
        .render(&scene.set, &scene.view, &mut backend)
        .map_err(|e| format!("Labeling error: {e}"))?;

    let config_json =
        serde_json::to_string(config).map_err(|e| format!("Error serializing config: {e}"))?;
    let metadata = SvgMetadata {
        title: Some(title),
        description: None,
        config_json: Some(&config_json),
    };
    Ok(backend.finish(&metadata))
}

fn write_output(path: &Path, contents: &str, what: &str) {
    match std::fs::write(path, contents) {
        Ok(()) => {
            eprintln!(
                "{what} written to {} ({} bytes)",
                path.display(),
                contents.len(),
            );
        }
        Err(e) => {
            eprintln!("Error writing {what} to {}: {e}", path.display());
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let scene = match load_scene(&cli) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let title = cli
        .scene_path
        .as_deref()
        .and_then(Path::file_stem)
        .and_then(|s| s.to_str())
        .unwrap_or("rings");

    eprintln!(
        "Scene: {title} ({} lines, {} points)",
        scene.set.lines.len(),
        scene.set.points.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    if let Some(ref scene_path) = cli.write_scene {
        match serde_json::to_string_pretty(&scene) {
            Ok(json) => write_output(scene_path, &json, "Scene"),
            Err(e) => {
                eprintln!("Error serializing scene: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    let text_metrics = MonospaceMetrics::default();
    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match contour_labels::diagnostics::label_isolines_with_diagnostics(
            &scene.set,
            &scene.styles,
            scene.mapping.as_deref(),
            &config,
            &scene.view,
            &text_metrics,
            &StdClock,
        ) {
            Ok((_layout, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }
                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Labeling error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if let Some(ref svg_path) = cli.svg {
        match render_svg(&scene, &config, title, cli.show_quads) {
            Ok(svg) => write_output(svg_path, &svg, "SVG"),
            Err(msg) => {
                eprintln!("{msg}");
                return ExitCode::FAILURE;
            }
        }
    }

    // Print summary when multiple runs.
    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&LabelDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[LabelDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("View Setup", |d| d.view_setup.duration),
        ("Metrics", |d| d.metrics.duration),
        ("Placement", |d| d.placement.duration),
        ("Overlap", |d| d.overlap.duration),
        ("Instantiation", |d| d.instantiation.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
