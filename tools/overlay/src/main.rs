//! Ground-truth overlay: burns per-class training polygons onto the grid of a
//! reference image and writes the result as a single-band GeoTIFF.
//! Class codes follow the class order (1, 2, ...); 0 = no ground truth.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use obia_core::overlay;
use obia_io::{read_image, scan_class_dir, training_classes, write_label_raster, ClassSpec};

#[derive(Parser, Debug)]
#[command(name = "overlay", about = "Rasterize training polygons into a ground-truth GeoTIFF")]
struct Args {
    /// Reference GeoTIFF providing the grid and georeferencing.
    #[arg(short, long)]
    image: PathBuf,

    /// Class as NAME=PATH to a GeoJSON file, repeatable.
    #[arg(short, long = "class", value_name = "NAME=PATH")]
    classes: Vec<ClassSpec>,

    /// Directory of <class>.geojson files, used when no --class is given.
    #[arg(short, long)]
    training_dir: Option<PathBuf>,

    /// Output ground-truth GeoTIFF.
    #[arg(short, long, default_value = "ground_truth.tif")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();
    let args = Args::parse();

    let specs = if !args.classes.is_empty() {
        args.classes.clone()
    } else if let Some(dir) = &args.training_dir {
        scan_class_dir(dir).with_context(|| format!("scanning {}", dir.display()))?
    } else {
        bail!("no classes: pass --class NAME=PATH or --training-dir");
    };
    if specs.is_empty() {
        bail!("no *.geojson class files found");
    }

    let (_, geometry) = read_image(&args.image)
        .with_context(|| format!("reading reference image {}", args.image.display()))?;
    let classes = training_classes(&specs);
    let truth = overlay(&classes, &geometry).context("burning training polygons")?;

    write_label_raster(&args.output, &truth.codes, &geometry)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(path = %args.output.display(), "ground truth written");

    let total = truth.codes.len().max(1) as f64;
    let counts = truth.class_pixel_counts(classes.len());
    println!("{:<4} {:<20} {:>10} {:>8}", "Code", "Class", "Pixels", "Cover%");
    println!("{}", "-".repeat(45));
    for (idx, (class, n)) in classes.iter().zip(&counts).enumerate() {
        println!(
            "{:<4} {:<20} {:>10} {:>7.2}%",
            idx + 1,
            class.name,
            n,
            *n as f64 / total * 100.0
        );
        if *n == 0 {
            warn!(class = %class.name, "class covers no pixel of the image");
        }
    }
    let overlaps = truth.overlap_count();
    if overlaps > 0 {
        println!("{:<4} {:<20} {:>10} {:>7.2}%", "-", "(overlap)", overlaps, overlaps as f64 / total * 100.0);
    }
    Ok(())
}
