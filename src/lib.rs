//! # framemat - annotated video frames
//!
//! `framemat` draws time-indexed annotations (captions, bounding boxes,
//! classification labels) onto the frames of a video. The source frame is
//! placed inside a larger canvas made of margin *zones* stacked on its four
//! sides, so annotations can live next to the picture as well as on it.
//!
//! ## Features
//!
//! - Zone layout with absolute or fractional margin sizes
//! - Named styles with colors, border width and font
//! - Text and box annotations keyed by 1-based frame number
//! - Parallel frame rendering
//! - Progress reporting for integration with UI applications
//!
//! ## Example
//!
//! ```no_run
//! use framemat::{annotate_video, AnnotateOptions, ZoneConfig};
//! use std::path::{Path, PathBuf};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let zones = ZoneConfig::load(Path::new("zones.toml"))?;
//! let report = annotate_video(
//!     Path::new("talk.mp4"),
//!     Path::new("talk-annotated.mp4"),
//!     &zones,
//!     &[PathBuf::from("objects.json"), PathBuf::from("transcript.json")],
//!     &AnnotateOptions::default(),
//!     |progress| println!("{}", progress.message),
//! )?;
//! println!("{} frames rendered", report.rendered);
//! # Ok(())
//! # }
//! ```
//!
//! ## Rendering single frames
//!
//! ```no_run
//! use framemat::{Annotation, AnnotationSet, Annotator, SystemFonts, ZoneConfig};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let zones = ZoneConfig::load(Path::new("zones.toml"))?;
//! let mut annotator = Annotator::new(&zones, 1920, 1080, &SystemFonts::new())?;
//!
//! let mut set = AnnotationSet::new();
//! set.push(1, Annotation::boxed("content", (100, 200), (64, 64), "face (97%)").with_style("face"));
//! annotator.add_annotations(set)?;
//!
//! let source = image::open("000001.jpg")?.to_rgb8();
//! let composite = annotator.annotate_frame(1, &source)?;
//! composite.image.save("annotated.jpg")?;
//! # Ok(())
//! # }
//! ```

pub mod annotation;
pub mod compositor;
pub mod config;
pub mod error;
pub mod font;
pub mod pipeline;
pub mod style;
pub mod video;
pub mod zone;

pub use annotation::{Annotation, AnnotationDecl, AnnotationKind, AnnotationSet, FrameAnnotations, Ref};
pub use compositor::{Composite, Compositor, TextAnchor};
pub use config::{load_annotations, parse_annotations, ConfigFormat, ZoneConfig};
pub use error::{Error, FrameDrawError, FrameError, FrameIoError, Result};
pub use font::{FontSource, LineMetrics, ScaledFont, SystemFonts, Typeface};
pub use pipeline::{collect_frames, FrameJob, FrameOutcome, RenderPipeline, RenderReport, DEFAULT_BATCH_SIZE};
pub use style::{Style, StyleDecl, StyleSheet, Styles};
pub use video::{StreamInfo, ToolPaths};
pub use zone::{Layout, Location, Rect, Zone, ZoneDecl, CONTENT_ZONE};

use image::RgbImage;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Represents the current phase of an annotation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressPhase {
    /// Splitting the source into frames (and audio) with ffmpeg
    ExtractingFrames,
    /// Compositing annotated frames
    RenderingFrames,
    /// Joining rendered frames and audio into the output video
    AssemblingVideo,
    /// Run finished
    Complete,
}

/// Progress information for annotation runs
///
/// This struct provides detailed progress information that can be used
/// to display progress in UI applications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    /// Current phase of the run
    pub phase: ProgressPhase,
    /// Number of items completed in the current phase
    pub completed: usize,
    /// Total number of items in the current phase (0 if unknown/indeterminate)
    pub total: usize,
    /// Percentage complete (0.0 to 100.0)
    pub percentage: f64,
    /// Human-readable message describing current status
    pub message: String,
}

impl Progress {
    /// Create a new progress update for extracting frames
    pub fn extracting_frames() -> Self {
        Self {
            phase: ProgressPhase::ExtractingFrames,
            completed: 0,
            total: 0,
            percentage: 0.0,
            message: "Extracting frames from video...".to_string(),
        }
    }

    /// Create a new progress update for frame rendering
    pub fn rendering_frames(completed: usize, total: usize) -> Self {
        let percentage = if total > 0 { (completed as f64 / total as f64) * 100.0 } else { 0.0 };
        Self {
            phase: ProgressPhase::RenderingFrames,
            completed,
            total,
            percentage,
            message: format!("Rendering frame {} of {}", completed, total),
        }
    }

    /// Create a new progress update for assembling the output video
    pub fn assembling_video() -> Self {
        Self {
            phase: ProgressPhase::AssemblingVideo,
            completed: 0,
            total: 0,
            percentage: 0.0,
            message: "Assembling annotated video...".to_string(),
        }
    }

    /// Create a completion progress update
    pub fn complete(total_frames: usize) -> Self {
        Self {
            phase: ProgressPhase::Complete,
            completed: total_frames,
            total: total_frames,
            percentage: 100.0,
            message: format!("Annotation complete: {} frames", total_frames),
        }
    }
}

/// Options for an annotation run
#[derive(Debug, Clone)]
pub struct AnnotateOptions {
    /// Render workers; `None` uses every available CPU
    pub concurrency: Option<usize>,
    /// Frames in flight per batch
    pub batch_size: usize,
    /// Keep the extracted and rendered frames after the run
    pub keep_workdir: bool,
    /// Extra directories searched for fonts, before the system ones
    pub font_dirs: Vec<PathBuf>,
    /// Where the working directory is created; the system temp dir when `None`
    pub workdir_root: Option<PathBuf>,
    /// ffmpeg and ffprobe executables
    pub tools: ToolPaths,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            concurrency: None,
            batch_size: DEFAULT_BATCH_SIZE,
            keep_workdir: false,
            font_dirs: Vec::new(),
            workdir_root: None,
            tools: ToolPaths::default(),
        }
    }
}

impl AnnotateOptions {
    /// Set the number of render workers
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Set the number of frames per batch
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Keep the working directory, also when the run fails
    pub fn with_keep_workdir(mut self, keep: bool) -> Self {
        self.keep_workdir = keep;
        self
    }

    /// Add a font directory, searched after those added earlier
    pub fn with_font_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.font_dirs.push(dir.into());
        self
    }

    /// Create the working directory inside `dir`
    pub fn with_workdir_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir_root = Some(dir.into());
        self
    }

    /// Use other ffmpeg and ffprobe executables
    pub fn with_tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    /// Font lookup with `font_dirs` searched first.
    pub fn fonts(&self) -> SystemFonts {
        self.font_dirs.iter().rev().fold(SystemFonts::new(), |fonts, dir| fonts.with_dir(dir))
    }

    /// Render pipeline with these worker and batch settings.
    pub fn pipeline(&self) -> RenderPipeline {
        let pipeline = RenderPipeline::new().with_batch_size(self.batch_size);
        match self.concurrency {
            Some(n) => pipeline.with_concurrency(n),
            None => pipeline,
        }
    }
}

/// A solved layout plus the annotations bound to it.
#[derive(Debug, Clone)]
pub struct Annotator {
    layout: Layout,
    annotations: FrameAnnotations,
}

impl Annotator {
    /// Lay out `config` around a `content_width` x `content_height` frame and
    /// load its fonts.
    pub fn new(config: &ZoneConfig, content_width: u32, content_height: u32, fonts: &dyn FontSource) -> Result<Self> {
        let sheet = config.style_sheet()?;
        let layout = Layout::solve(&config.zones, &sheet, content_width, content_height, fonts)?;
        let (width, height) = layout.canvas_size();
        info!("Canvas {}x{}, content {}x{} at {:?}", width, height, content_width, content_height, layout.content().rect);
        Ok(Self { layout, annotations: FrameAnnotations::new() })
    }

    /// Bind `set` and append it to the annotations already held.
    pub fn add_annotations(&mut self, set: AnnotationSet) -> Result<usize> {
        self.annotations.bind(&self.layout, set)
    }

    /// Get the solved layout
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Get the bound annotations
    pub fn annotations(&self) -> &FrameAnnotations {
        &self.annotations
    }

    /// Compositor borrowing this layout and these annotations.
    pub fn compositor(&self) -> Compositor<'_> {
        Compositor::new(&self.layout, &self.annotations)
    }

    /// Render one frame in memory.
    pub fn annotate_frame(&self, frame: u32, source: &RgbImage) -> std::result::Result<Composite, FrameDrawError> {
        self.compositor().render(frame, source)
    }

    /// Render every numbered frame image in `src_dir` into `dst_dir`.
    pub fn render_directory<F>(
        &self,
        src_dir: &Path,
        dst_dir: &Path,
        pipeline: &RenderPipeline,
        progress_callback: Option<F>,
    ) -> Result<RenderReport>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        fs::create_dir_all(dst_dir)?;
        let jobs = collect_frames(src_dir, dst_dir)?;
        pipeline.run(&self.compositor(), &jobs, progress_callback)
    }
}

/// Annotate `input` into `output`.
///
/// Configuration, annotation files, zone and style references and fonts
/// are all checked before ffprobe or ffmpeg run. If any frame ends up
/// without an output file the run fails with [`Error::FrameGap`] instead of
/// assembling a video with missing frames.
pub fn annotate_video<F>(
    input: &Path,
    output: &Path,
    zones: &ZoneConfig,
    annotation_files: &[PathBuf],
    options: &AnnotateOptions,
    progress_callback: F,
) -> Result<RenderReport>
where
    F: Fn(Progress) + Send + Sync,
{
    let sheet = zones.style_sheet()?;
    let sets = annotation_files.iter().map(|path| load_annotations(path)).collect::<Result<Vec<_>>>()?;
    for set in &sets {
        set.check_names(|zone| zone == CONTENT_ZONE || zones.zones.contains_key(zone), |style| sheet.contains(style))?;
    }
    let fonts = options.fonts();
    for font in sheet.fonts() {
        fonts.require(font)?;
    }

    let stream = video::probe(input, &options.tools)?;
    let workdir = match &options.workdir_root {
        Some(root) => tempfile::Builder::new().prefix("framemat-").tempdir_in(root)?,
        None => tempfile::Builder::new().prefix("framemat-").tempdir()?,
    };
    let result = run_in_workdir(workdir.path(), input, output, zones, sets, &stream, &fonts, options, &progress_callback);
    if options.keep_workdir {
        let kept = workdir.keep();
        info!("Kept working directory {}", kept.display());
    }
    let report = result?;
    progress_callback(Progress::complete(report.total()));
    Ok(report)
}

#[allow(clippy::too_many_arguments)]
fn run_in_workdir<F>(
    workdir: &Path,
    input: &Path,
    output: &Path,
    zones: &ZoneConfig,
    sets: Vec<AnnotationSet>,
    stream: &StreamInfo,
    fonts: &SystemFonts,
    options: &AnnotateOptions,
    progress_callback: &F,
) -> Result<RenderReport>
where
    F: Fn(Progress) + Send + Sync,
{
    let input_dir = workdir.join("input");
    let output_dir = workdir.join("output");
    fs::create_dir_all(&input_dir)?;
    fs::create_dir_all(&output_dir)?;
    let audio_path = workdir.join("audio.wav");
    let audio = stream.has_audio.then_some(audio_path.as_path());

    progress_callback(Progress::extracting_frames());
    video::extract_frames(input, &stream.fps, &input_dir, audio, &options.tools)?;

    let jobs = collect_frames(&input_dir, &output_dir)?;
    let first = jobs.first().ok_or_else(|| Error::ExternalTool {
        tool: options.tools.ffmpeg.to_string_lossy().into_owned(),
        reason: format!("no frames extracted from {}", input.display()),
    })?;
    let (width, height) = image::image_dimensions(&first.source)
        .map_err(|e| Error::config(format!("reading first frame {}: {}", first.source.display(), e)))?;

    let mut annotator = Annotator::new(zones, width, height, fonts)?;
    for set in sets {
        annotator.add_annotations(set)?;
    }

    let total = jobs.len();
    progress_callback(Progress::rendering_frames(0, total));
    let report = options.pipeline().run(
        &annotator.compositor(),
        &jobs,
        Some(|completed: usize, total: usize| progress_callback(Progress::rendering_frames(completed, total))),
    )?;

    let missing: Vec<u32> = report.missing().collect();
    if let Some(&first_missing) = missing.first() {
        return Err(Error::FrameGap { count: missing.len(), first: first_missing });
    }

    progress_callback(Progress::assembling_video());
    video::assemble_video(&output_dir, &stream.fps, audio, output, &options.tools)?;
    Ok(report)
}
