// ============================================================================
// WarpFE CLI - headless bulge/pinch via command-line arguments
// ============================================================================
//
// Usage examples:
//   warpfe --input photo.png --point 120,80 --effect pinch --output out.png
//   warpfe -i *.jpg --region 200,150 --strength 0.8 --output-dir warped/
//   warpfe -i face.png --radius-px 64 --engine cpu --overlay -o marked.png
//
// No window is opened in CLI mode. Files are processed one after another.
// ============================================================================

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use warpfe::effect::{EffectKind, EffectParameters, EffectRadius, WarpRequest, apply_effect};
use warpfe::engine::{self, EffectEngine, EngineBackend};
use warpfe::io::{SaveFormat, encode_and_write, load_image_sync};
use warpfe::mapper::ImagePoint;
use warpfe::selection::{Selection, SelectionMode};
use warpfe::surface::RenderSurface;

/// WarpFE headless bulge/pinch processor.
#[derive(Parser, Debug)]
#[command(
    name = "warpfe",
    about = "WarpFE headless bulge/pinch processor",
    long_about = "Apply a bulge or pinch warp to image files without opening the GUI.\n\n\
                  Example:\n  \
                  warpfe --input photo.png --point 120,80 --effect pinch --output out.png\n  \
                  warpfe -i *.jpg --region 200,150 --output-dir warped/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Warp center as "X,Y" in native pixels. Defaults to the image center.
    #[arg(long, value_name = "X,Y", conflicts_with = "region")]
    pub point: Option<String>,

    /// Select a 100×100 region centered on "X,Y"; the warp is centered on the region.
    #[arg(long, value_name = "X,Y")]
    pub region: Option<String>,

    /// Effect kind: bulge or pinch.
    #[arg(short, long, default_value = "bulge")]
    pub effect: String,

    /// Strength in -1..1.
    #[arg(short, long, default_value_t = 0.5, allow_negative_numbers = true)]
    pub strength: f32,

    /// Radius as a fraction (0..1) of the smaller image side.
    #[arg(short, long, default_value_t = 0.5, conflicts_with = "radius_px")]
    pub radius: f32,

    /// Radius in absolute pixels instead of a fraction.
    #[arg(long, value_name = "PX")]
    pub radius_px: Option<f32>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, bmp, tga, tiff. Inferred from --output when omitted.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Engine backend: auto, cpu, gpu, none.
    #[arg(long, default_value = "auto")]
    pub engine: String,

    /// Draw the selection marker / outline onto the result.
    #[arg(long)]
    pub overlay: bool,

    /// Print per-file timing.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when a CLI-mode flag is present in the process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

/// Everything per-file processing needs, resolved once from the arguments.
struct Job {
    kind: EffectKind,
    strength: f32,
    radius: EffectRadius,
    selection: Option<(SelectionMode, ImagePoint)>,
    format: SaveFormat,
    quality: u8,
    overlay: bool,
}

/// Run all CLI processing and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let job = match build_job(&args) {
        Ok(job) => job,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }
    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }
    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let backend = EngineBackend::parse(&args.engine).unwrap_or_else(|| {
        eprintln!("warning: unknown engine '{}', using auto", args.engine);
        EngineBackend::Auto
    });
    let engine = engine::create_engine(backend, "Auto");
    if args.verbose {
        match engine.as_deref() {
            Some(e) => println!("engine: {}", e.name()),
            None => println!("engine: none"),
        }
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let start = Instant::now();

        let Some(output_path) =
            build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref(), job.format)
        else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, &job, engine.as_deref()) {
            Ok(()) => {
                if multi || args.verbose {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn build_job(args: &CliArgs) -> Result<Job, String> {
    let kind = EffectKind::parse(&args.effect)
        .ok_or_else(|| format!("unknown effect '{}' (expected bulge or pinch)", args.effect))?;
    let params = EffectParameters::new(kind, args.strength, args.radius);
    let radius = match args.radius_px {
        Some(px) => EffectRadius::Pixels(px),
        None => params.effect_radius(),
    };
    let selection = match (&args.point, &args.region) {
        (Some(p), _) => Some((SelectionMode::Point, parse_point(p)?)),
        (None, Some(r)) => Some((SelectionMode::Region, parse_point(r)?)),
        (None, None) => None,
    };
    let format = match &args.format {
        Some(f) => SaveFormat::from_name(f).ok_or_else(|| format!("unknown format '{}'", f))?,
        None => args.output.as_deref().map(SaveFormat::from_path).unwrap_or_default(),
    };
    Ok(Job {
        kind,
        strength: params.strength(),
        radius,
        selection,
        format,
        quality: args.quality,
        overlay: args.overlay,
    })
}

fn run_one(input: &Path, output: &Path, job: &Job, engine: Option<&dyn EffectEngine>) -> Result<(), String> {
    let image = load_image_sync(input).map_err(|e| format!("load failed: {}", e))?;

    let selection = select(job, &image);
    let request = WarpRequest {
        kind: job.kind,
        center: selection.center(),
        radius: job.radius,
        strength: job.strength,
    };
    let rendered = apply_effect(engine, &image, &request).map_err(|e| e.to_string())?;

    let mut surface = RenderSurface::default();
    surface.present(&rendered);
    if job.overlay {
        surface.draw_overlay(&selection.overlay());
    }

    encode_and_write(surface.image(), output, job.format, job.quality).map_err(|e| format!("save failed: {}", e))
}

/// Selection for one file; the image center stands in when none was given.
fn select(job: &Job, image: &image::RgbaImage) -> Selection {
    let (mode, at) = job.selection.unwrap_or((
        SelectionMode::Point,
        ImagePoint::new(image.width() as f32 / 2.0, image.height() as f32 / 2.0),
    ));
    mode.provider().select(at)
}

/// Parse "X,Y" (whitespace tolerated).
fn parse_point(s: &str) -> Result<ImagePoint, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{}'", s))?;
    let x: f32 = x.trim().parse().map_err(|_| format!("bad X in '{}'", s))?;
    let y: f32 = y.trim().parse().map_err(|_| format!("bad Y in '{}'", s))?;
    if !x.is_finite() || !y.is_finite() {
        return Err(format!("non-finite coordinate in '{}'", s));
    }
    Ok(ImagePoint::new(x, y))
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);
        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output`
/// 2. `--output-dir` (input stem + format extension)
/// 3. next to the input as `<stem>_warped.<ext>`
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: SaveFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_warped.{}", stem, ext)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["warpfe", "--input", "a.png"];
        argv.extend_from_slice(extra);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn parses_point_with_spaces() {
        assert_eq!(parse_point(" 12.5 , 7 ").unwrap(), ImagePoint::new(12.5, 7.0));
        assert!(parse_point("12").is_err());
        assert!(parse_point("a,b").is_err());
    }

    #[test]
    fn job_uses_fraction_radius_by_default() {
        let job = build_job(&args(&["--strength", "-0.4"])).unwrap();
        assert_eq!(job.radius, EffectRadius::Fraction(0.5));
        assert_eq!(job.strength, -0.4);
        assert!(job.selection.is_none());
    }

    #[test]
    fn job_with_pixel_radius_and_region() {
        let job = build_job(&args(&["--radius-px", "64", "--region", "10,10", "--effect", "pinch"])).unwrap();
        assert_eq!(job.radius, EffectRadius::Pixels(64.0));
        assert_eq!(job.kind, EffectKind::Pinch);
        assert_eq!(job.selection, Some((SelectionMode::Region, ImagePoint::new(10.0, 10.0))));
    }

    #[test]
    fn unknown_effect_is_rejected() {
        assert!(build_job(&args(&["--effect", "swirl"])).is_err());
    }

    #[test]
    fn default_selection_is_image_center() {
        let job = build_job(&args(&[])).unwrap();
        let img = image::RgbaImage::new(400, 300);
        assert_eq!(select(&job, &img).center(), ImagePoint::new(200.0, 150.0));
    }

    #[test]
    fn output_path_priority() {
        let input = Path::new("shots/cat.jpg");
        assert_eq!(
            build_output_path(input, Some(Path::new("x.png")), None, SaveFormat::Png),
            Some(PathBuf::from("x.png"))
        );
        assert_eq!(
            build_output_path(input, None, Some(Path::new("out")), SaveFormat::Tiff),
            Some(PathBuf::from("out/cat.tiff"))
        );
        assert_eq!(
            build_output_path(input, None, None, SaveFormat::Png),
            Some(PathBuf::from("shots/cat_warped.png"))
        );
    }

    #[test]
    fn missing_engine_fails_the_file_without_panicking() {
        let dir = std::env::temp_dir().join(format!("warpfe_cli_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("in.png");
        image::RgbaImage::new(8, 8).save(&input).unwrap();
        let job = build_job(&args(&[])).unwrap();
        let res = run_one(&input, &dir.join("out.png"), &job, None);
        let _ = std::fs::remove_dir_all(&dir);
        assert!(res.unwrap_err().contains("unavailable"));
    }
}
