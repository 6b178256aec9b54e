use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use serde::Serialize;

use floortag::config::CalibrationConfig;
use floortag::detect::detector::{Detection, Detector, DetectorConfig};
use floortag::detect::image::GrayImage;
use floortag::detect::quad::QuadThreshParams;
use floortag::dict::Dictionary;
use floortag::mapping::{CalibrationMap, PlaneMapper, Projection};

/// Marker localization CLI — detect floor markers in PNG/JPEG frames and
/// project them onto the calibrated world plane
#[derive(Parser)]
#[command(name = "floortag-locate", version)]
struct Args {
    /// Input frames, processed in order (PNG or JPEG)
    #[arg(required = true)]
    images: Vec<String>,

    /// Marker dictionary to detect
    #[arg(long, default_value = "4x4_50")]
    dict: String,

    /// Calibration config file (TOML); replaces --dict and --world-* flags
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Physical width of the calibration rectangle, in world units
    #[arg(long)]
    world_width: Option<f64>,

    /// Physical height of the calibration rectangle, in world units
    #[arg(long)]
    world_height: Option<f64>,

    /// Shrink frames by this factor before the quad search
    #[arg(short = 'd', long = "decimate", default_value_t = 1.0)]
    quad_decimate: f32,

    /// Blur sigma applied before the quad search; negative sharpens
    #[arg(short = 'b', long = "blur", default_value_t = 0.0)]
    quad_sigma: f32,

    /// Sharpening applied to decoded cell samples
    #[arg(short = 's', long = "sharpening", default_value_t = 0.25)]
    decode_sharpening: f64,

    /// Accept decodes with up to this many corrected bit errors
    #[arg(long, default_value_t = 1)]
    max_hamming: u8,

    /// Skip the full-resolution edge refit
    #[arg(long)]
    no_refine: bool,

    /// Emit one JSON record per frame instead of text lines
    #[arg(long)]
    json: bool,

    /// Indent the JSON records
    #[arg(long)]
    pretty: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Serialize)]
struct FrameRecord<'a> {
    file: &'a str,
    image_width: u32,
    image_height: u32,
    calibrated: bool,
    detections: Vec<DetectionRecord<'a>>,
}

#[derive(Serialize)]
struct DetectionRecord<'a> {
    #[serde(flatten)]
    detection: &'a Detection,
    /// World-plane position of the marker center, absent until calibrated.
    #[serde(skip_serializing_if = "Option::is_none")]
    world: Option<[f64; 2]>,
}

fn read_gray(path: &str) -> Result<GrayImage> {
    let luma = image::open(path)
        .with_context(|| format!("opening {path}"))?
        .into_luma8();
    let (w, h) = luma.dimensions();
    Ok(GrayImage::from_buf(w, h, w, luma.into_raw()))
}

/// Resolve the dictionary and calibration table from either a config file
/// or the --dict/--world-* flags.
fn calibration_setup(args: &Args) -> Result<(Dictionary, CalibrationMap)> {
    if let Some(path) = &args.config {
        let cfg = CalibrationConfig::load(path)
            .with_context(|| format!("loading calibration config {}", path.display()))?;
        return Ok((cfg.dictionary()?, cfg.calibration_map()));
    }

    let width = args
        .world_width
        .context("--world-width is required without --config")?;
    let height = args
        .world_height
        .context("--world-height is required without --config")?;
    anyhow::ensure!(
        width > 0.0 && height > 0.0,
        "world dimensions must be positive, got {width} x {height}"
    );
    let dict = Dictionary::builtin(&args.dict)
        .with_context(|| format!("unknown marker dictionary: {}", args.dict))?;
    Ok((dict, CalibrationMap::rectangle(width, height)))
}

fn world_of(mapper: &PlaneMapper, det: &Detection) -> Option<[f64; 2]> {
    match mapper.pixel_to_world(det.center[0], det.center[1]) {
        Projection::Point(p) => Some([p.x, p.y]),
        Projection::NoCalibration | Projection::Degenerate => None,
    }
}

fn emit<T: Serialize>(record: &T, pretty: bool) -> Result<()> {
    let line = if pretty {
        serde_json::to_string_pretty(record)?
    } else {
        serde_json::to_string(record)?
    };
    println!("{line}");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.quiet { "warn" } else { "info" }),
    )
    .init();

    let (dict, map) = calibration_setup(&args)?;

    let detector = Detector::new(
        dict,
        DetectorConfig {
            quad_decimate: args.quad_decimate,
            quad_sigma: args.quad_sigma,
            refine_edges: !args.no_refine,
            decode_sharpening: args.decode_sharpening,
            max_hamming: args.max_hamming,
            quad_params: QuadThreshParams::default(),
        },
    );
    let mut mapper = PlaneMapper::new(map);

    for path in &args.images {
        let frame = read_gray(path)?;
        debug!("detecting in {} ({}x{})", path, frame.width, frame.height);

        let detections = detector.detect(&frame);
        mapper.compute_homography(&detections);
        info!(
            "{}: {} markers, calibrated: {}",
            path,
            detections.len(),
            mapper.is_calibrated()
        );

        if args.json {
            let record = FrameRecord {
                file: path,
                image_width: frame.width,
                image_height: frame.height,
                calibrated: mapper.is_calibrated(),
                detections: detections
                    .iter()
                    .map(|det| DetectionRecord {
                        detection: det,
                        world: world_of(&mapper, det),
                    })
                    .collect(),
            };
            emit(&record, args.pretty)?;
        } else {
            for det in &detections {
                if let Some([x, y]) = world_of(&mapper, det) {
                    println!("ID {} → World: ({:.2}, {:.2})", det.id, x, y);
                }
            }
        }
    }

    Ok(())
}
