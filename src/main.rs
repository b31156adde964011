use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use framemat::{annotate_video, AnnotateOptions, Annotator, Progress, ProgressPhase, ZoneConfig, DEFAULT_BATCH_SIZE};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the zone layout for a content size without touching any video
    Layout {
        /// Zone configuration file (TOML or JSON)
        zones: PathBuf,
        /// Content width in pixels
        width: u32,
        /// Content height in pixels
        height: u32,
    },
}

#[derive(Parser, Debug)]
#[command(version, about = "Overlay per-frame annotations onto a video, laid out in margin zones.")]
struct Args {
    /// Optional subcommands
    #[command(subcommand)]
    cmd: Option<Command>,

    /// Input video file
    input: Option<PathBuf>,

    /// Output video file
    output: Option<PathBuf>,

    /// Zone configuration file (TOML or JSON)
    zones: Option<PathBuf>,

    /// Annotation files (TOML or JSON), merged in the order given
    annotations: Vec<PathBuf>,

    /// Number of render workers (defaults to the number of CPUs)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Frames rendered per batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Keep extracted and rendered frames
    #[arg(long, default_value_t = false)]
    keep_workdir: bool,

    /// Create the working directory inside this directory
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Additional font directory, searched before system fonts (repeatable)
    #[arg(long = "font-dir")]
    font_dirs: Vec<PathBuf>,

    /// Only log warnings and errors
    #[arg(long, short, default_value_t = false)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let filter = if args.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let mut options = AnnotateOptions::default().with_batch_size(args.batch_size).with_keep_workdir(args.keep_workdir);
    if let Some(n) = args.concurrency {
        options = options.with_concurrency(n);
    }
    if let Some(dir) = &args.workdir {
        options = options.with_workdir_root(dir);
    }
    for dir in &args.font_dirs {
        options = options.with_font_dir(dir);
    }

    if let Some(Command::Layout { zones, width, height }) = &args.cmd {
        return print_layout(zones, *width, *height, &options);
    }

    let (input, output, zones_path) = match (&args.input, &args.output, &args.zones) {
        (Some(i), Some(o), Some(z)) => (i, o, z),
        _ => return Err(anyhow!("Usage: framemat <INPUT> <OUTPUT> <ZONES> <ANNOTATIONS>...")),
    };
    if args.annotations.is_empty() {
        return Err(anyhow!("At least one annotation file must be given"));
    }
    if !input.is_file() {
        return Err(anyhow!("Input video {} does not exist", input.display()));
    }

    let zones = ZoneConfig::load(zones_path).with_context(|| format!("loading zones from {}", zones_path.display()))?;

    let progress_bar: Arc<Mutex<Option<ProgressBar>>> = Arc::new(Mutex::new(None));
    let pb_clone = Arc::clone(&progress_bar);

    let report = annotate_video(input, output, &zones, &args.annotations, &options, move |progress: Progress| {
        let mut pb_guard = pb_clone.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match progress.phase {
            ProgressPhase::ExtractingFrames => println!("Extracting video frames..."),
            ProgressPhase::RenderingFrames => {
                if pb_guard.is_none() {
                    let pb = ProgressBar::new(progress.total as u64);
                    pb.set_style(
                        ProgressStyle::default_bar()
                            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
                            .unwrap_or_else(|_| ProgressStyle::default_bar())
                            .progress_chars("#>-"),
                    );
                    pb.set_message("Rendering frames");
                    *pb_guard = Some(pb);
                }
                if let Some(ref pb) = *pb_guard {
                    pb.set_position(progress.completed as u64);
                }
            }
            ProgressPhase::AssemblingVideo => {
                if let Some(pb) = pb_guard.take() {
                    pb.finish_with_message("Done");
                }
                println!("Assembling {}...", output.display());
            }
            ProgressPhase::Complete => {}
        }
    })
    .with_context(|| format!("annotating {}", input.display()))?;

    println!("\nAnnotated video written to {}", output.display());
    println!("Frames: {} rendered, {} without annotations", report.rendered, report.fallback);
    for failure in &report.failures {
        println!("  frame {} ({}): {}", failure.frame, failure.source.display(), failure.error);
    }
    Ok(())
}

fn print_layout(zones_path: &Path, width: u32, height: u32, options: &AnnotateOptions) -> Result<()> {
    let zones = ZoneConfig::load(zones_path).with_context(|| format!("loading zones from {}", zones_path.display()))?;
    let annotator = Annotator::new(&zones, width, height, &options.fonts()).context("solving zone layout")?;
    let layout = annotator.layout();
    let (canvas_w, canvas_h) = layout.canvas_size();
    println!("Canvas: {}x{}", canvas_w, canvas_h);
    for zone in layout.zones() {
        let r = zone.rect;
        println!(
            "{:<24} {}  x={:<5} y={:<5} w={:<5} h={:<5} style={} ({}px)",
            zone.name, zone.location, r.x, r.y, r.w, r.h, zone.style.name, zone.style.font_size
        );
    }
    Ok(())
}
