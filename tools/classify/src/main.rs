//! Object-based classification of one image.
//!
//! Reads a multi-band GeoTIFF and per-class GeoJSON training polygons,
//! segments the image (or replays a segment raster), builds the object
//! table, fits the bundled nearest-centroid model and writes the classified
//! raster plus a JSON run report. Optional verification polygons produce an
//! accuracy section in the report.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use obia_core::classification::{assess_accuracy, paint, AccuracyReport, NearestCentroid};
use obia_core::overlay::{class_code, class_name};
use obia_core::{
    overlay, ClassificationDriver, GridSegmenter, ObiaError, ObjectPipeline, PipelineParams,
    PrecomputedSegments, Segmenter,
};
use obia_io::{
    aligned_classes, read_image, read_label_raster, scan_class_dir, training_classes,
    write_label_raster, ClassSpec,
};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "classify", about = "Segment an image and classify its objects from training polygons")]
struct Args {
    /// Multi-band GeoTIFF to classify.
    #[arg(short, long)]
    image: PathBuf,

    /// Training class as NAME=PATH to a GeoJSON file. Repeat for each class;
    /// order sets the class codes (1, 2, ...).
    #[arg(short, long = "class", value_name = "NAME=PATH")]
    classes: Vec<ClassSpec>,

    /// Directory of <class>.geojson training files, used when no --class is given.
    #[arg(short, long)]
    training_dir: Option<PathBuf>,

    /// Directory of <class>.geojson verification files for the accuracy report.
    #[arg(long)]
    validation_dir: Option<PathBuf>,

    /// Precomputed segment raster (integer GeoTIFF). Without it the image is
    /// split into a regular grid.
    #[arg(long)]
    segments: Option<PathBuf>,

    /// JSON run configuration; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    n_segments: Option<usize>,

    #[arg(long)]
    compactness: Option<f64>,

    #[arg(long)]
    sigma: Option<f64>,

    /// Skip the [0, 1] intensity stretch.
    #[arg(long)]
    no_rescale: bool,

    /// Also write a binary mask of this class.
    #[arg(long, value_name = "CLASS")]
    export_class: Option<String>,

    /// Pixel value used for the exported class.
    #[arg(long)]
    export_value: Option<u32>,

    /// Classified GeoTIFF.
    #[arg(short, long, default_value = "classified.tif")]
    output: PathBuf,

    /// JSON run report.
    #[arg(short, long, default_value = "report.json")]
    report: PathBuf,
}

// ── Run configuration ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ExportMask {
    class: String,
    #[serde(default = "default_export_value")]
    value: u32,
}

fn default_export_value() -> u32 {
    1
}

/// Effective settings of one run. Loaded from `--config`, overridden by flags,
/// echoed into the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct RunConfig {
    #[serde(flatten)]
    pipeline: PipelineParams,
    export: Option<ExportMask>,
}

impl RunConfig {
    fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    fn apply_overrides(&mut self, args: &Args) {
        let seg = &mut self.pipeline.segmentation;
        if let Some(n) = args.n_segments {
            seg.n_segments = n;
        }
        if let Some(c) = args.compactness {
            seg.compactness = c;
        }
        if let Some(s) = args.sigma {
            seg.sigma = s;
        }
        if args.no_rescale {
            self.pipeline.rescale_intensity = false;
        }
        if let Some(class) = &args.export_class {
            self.export = Some(ExportMask {
                class: class.clone(),
                value: args.export_value.unwrap_or_else(default_export_value),
            });
        } else if let (Some(export), Some(value)) = (self.export.as_mut(), args.export_value) {
            export.value = value;
        }
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RunReport {
    image: PathBuf,
    rows: usize,
    cols: usize,
    bands: usize,
    config: RunConfig,
    classes: Vec<String>,
    n_objects: usize,
    n_labeled: usize,
    /// Training objects per class name.
    training_objects: BTreeMap<String, usize>,
    /// Classes whose polygons touched no segment.
    empty_classes: Vec<String>,
    /// Classified pixels per class name.
    classified_pixels: BTreeMap<String, usize>,
    accuracy: Option<AccuracyReport>,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();
}

fn class_specs(args: &Args) -> Result<Vec<ClassSpec>> {
    if !args.classes.is_empty() {
        return Ok(args.classes.clone());
    }
    let Some(dir) = &args.training_dir else {
        bail!("no training classes: pass --class NAME=PATH or --training-dir");
    };
    let specs = scan_class_dir(dir)
        .with_context(|| format!("scanning training dir {}", dir.display()))?;
    if specs.is_empty() {
        bail!("no *.geojson files in {}", dir.display());
    }
    Ok(specs)
}

/// Code of the training class named `class`.
fn export_code(names: &[&str], class: &str) -> Result<u32> {
    match names.iter().position(|&n| n == class) {
        Some(idx) => Ok(class_code(idx)),
        None => bail!("export class {class:?} is not one of the training classes"),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = RunConfig::load(args.config.as_deref())?;
    config.apply_overrides(&args);

    let (image, geometry) = read_image(&args.image)
        .with_context(|| format!("reading image {}", args.image.display()))?;
    let (rows, cols) = image.shape();
    let bands = image.bands;
    info!(path = %args.image.display(), rows, cols, bands, "image loaded");

    let specs = class_specs(&args)?;
    let classes = training_classes(&specs);
    let names: Vec<&str> = classes.iter().map(|c| c.name.as_str()).collect();
    info!(classes = ?names, "training classes");

    let segmenter: Box<dyn Segmenter> = match &args.segments {
        Some(path) => {
            let (map, _) = read_label_raster(path)
                .with_context(|| format!("reading segments {}", path.display()))?;
            Box::new(PrecomputedSegments::new(map))
        }
        None => Box::new(GridSegmenter),
    };

    let pipeline = ObjectPipeline::new(config.pipeline.clone());
    let prepared = match pipeline.run(image, &geometry, &classes, segmenter.as_ref()) {
        Ok(p) => p,
        Err(ObiaError::AmbiguousSegmentation(report)) => {
            for pair in &report.class_pairs {
                error!(
                    first = %pair.first_name,
                    second = %pair.second_name,
                    shared_segments = pair.shared_segments,
                    "classes share segments"
                );
            }
            if !report.overlap_segments.is_empty() {
                error!(
                    segments = report.overlap_segments.len(),
                    "segments contain pixels where training polygons overlap"
                );
            }
            bail!(
                "segmentation is too coarse: {} segment(s) overlap more than one class; \
                 increase n_segments or fix the training polygons",
                report.segments.len()
            );
        }
        Err(e) => return Err(e).context("preparing object table"),
    };

    let mut model = NearestCentroid::default();
    let predictions = ClassificationDriver::run(&prepared.table, &mut model)
        .context("classifying objects")?;
    let classified = paint(&prepared.segments, &predictions);

    write_label_raster(&args.output, &classified.data, &geometry)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(path = %args.output.display(), "classified raster written");

    if let Some(export) = &config.export {
        let code = export_code(&names, &export.class)?;
        let mask_path = args.output.with_file_name(format!("{}_mask.tif", export.class));
        write_label_raster(&mask_path, &classified.mask_class(code, export.value), &geometry)
            .with_context(|| format!("writing {}", mask_path.display()))?;
        info!(path = %mask_path.display(), class = %export.class, "class mask written");
    }

    let accuracy = match &args.validation_dir {
        Some(dir) => {
            let verification = aligned_classes(&names, dir);
            let truth = overlay(&verification, &geometry).context("burning verification polygons")?;
            match assess_accuracy(&truth, &classified) {
                Ok(report) => Some(report),
                Err(ObiaError::NoVerificationPixels) => {
                    warn!(dir = %dir.display(), "verification polygons cover no pixels");
                    None
                }
                Err(e) => return Err(e).context("assessing accuracy"),
            }
        }
        None => None,
    };

    let label = |code: u32| class_name(&classes, code).unwrap_or("unclassified").to_string();
    let report = RunReport {
        image: args.image.clone(),
        rows,
        cols,
        bands,
        config,
        classes: names.iter().map(|n| n.to_string()).collect(),
        n_objects: prepared.table.len(),
        n_labeled: prepared.table.n_labeled(),
        training_objects: prepared
            .table
            .class_counts()
            .into_iter()
            .map(|(code, n)| (label(code), n))
            .collect(),
        empty_classes: prepared.assignment.empty_classes.iter().map(|&c| label(c)).collect(),
        classified_pixels: classified
            .class_counts()
            .into_iter()
            .map(|(code, n)| (label(code), n))
            .collect(),
        accuracy,
    };
    write_json(&args.report, &report)?;
    info!(path = %args.report.display(), "run report written");

    if let Some(acc) = &report.accuracy {
        println!(
            "Overall accuracy: {:.2}% ({} / {} pixels)",
            acc.accuracy * 100.0,
            acc.correct_pixels,
            acc.evaluated_pixels
        );
    }
    Ok(())
}
