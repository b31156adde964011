//! Parallel frame rendering.
//!
//! Frames are rendered on a `rayon` pool, one batch at a time. Batching only
//! bounds how much work is in flight; the output file name carries the frame
//! number, so completion order never matters.

use image::RgbImage;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use walkdir::WalkDir;

use crate::compositor::Compositor;
use crate::error::{Error, FrameError, FrameIoError, Result};

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// One frame to render: read `source`, write `destination`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// 1-based, as numbered by the frame extractor
    pub frame: u32,
}

/// What ended up at a job's destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The annotated frame
    Rendered,
    /// The source without annotations (or a blank canvas if the source was unreadable)
    Fallback,
    /// Nothing
    Failed,
}

#[derive(Debug)]
pub struct FrameFailure {
    pub frame: u32,
    pub source: PathBuf,
    pub outcome: FrameOutcome,
    pub error: FrameError,
}

/// Summary of a pipeline run.
#[derive(Debug, Default)]
pub struct RenderReport {
    pub rendered: usize,
    pub fallback: usize,
    pub batches: usize,
    pub failures: Vec<FrameFailure>,
}

impl RenderReport {
    /// Number of frames the run was given.
    pub fn total(&self) -> usize {
        self.rendered + self.fallback + self.missing().count()
    }

    /// Frames with no output file.
    pub fn missing(&self) -> impl Iterator<Item = u32> + '_ {
        self.failures.iter().filter(|f| f.outcome == FrameOutcome::Failed).map(|f| f.frame)
    }

    pub fn is_complete(&self) -> bool {
        self.missing().next().is_none()
    }
}

/// List the numbered frame images in `src_dir` and pair each with a
/// destination of the same name in `dst_dir`, ordered by frame number.
pub fn collect_frames(src_dir: &Path, dst_dir: &Path) -> Result<Vec<FrameJob>> {
    let mut jobs: Vec<FrameJob> = Vec::new();
    for entry in WalkDir::new(src_dir).min_depth(1).max_depth(1).into_iter() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let path = entry.into_path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"));
        if !is_image {
            continue;
        }
        let Some(frame) = path.file_stem().and_then(|s| s.to_str()).and_then(|s| s.parse::<u32>().ok()) else {
            debug!("Ignoring {}: not a numbered frame", path.display());
            continue;
        };
        let Some(name) = path.file_name() else {
            continue;
        };
        let destination = dst_dir.join(name);
        jobs.push(FrameJob { source: path, destination, frame });
    }
    jobs.sort_by_key(|job| job.frame);

    if let Some(pair) = jobs.windows(2).find(|pair| pair[0].frame == pair[1].frame) {
        return Err(Error::config(format!(
            "frame {} appears twice: {} and {}",
            pair[0].frame,
            pair[0].source.display(),
            pair[1].source.display()
        )));
    }
    if let Some(pair) = jobs.windows(2).find(|pair| pair[1].frame != pair[0].frame + 1) {
        warn!("Frame numbering jumps from {} to {}", pair[0].frame, pair[1].frame);
    }
    Ok(jobs)
}

/// Worker pool settings for rendering.
#[derive(Debug, Clone)]
pub struct RenderPipeline {
    concurrency: usize,
    batch_size: usize,
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPipeline {
    /// One worker per available CPU, batches of [`DEFAULT_BATCH_SIZE`].
    pub fn new() -> Self {
        let concurrency = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self { concurrency, batch_size: DEFAULT_BATCH_SIZE }
    }

    /// Set the number of worker threads (at least one)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the number of frames per batch (at least one)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Get the number of worker threads
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Get the number of frames per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Render every job and block until all of them have finished.
    ///
    /// Per-frame failures never abort the run: they are logged, a fallback
    /// frame is written where possible, and everything is summarised in the
    /// returned [`RenderReport`]. Only failing to set up the pool or the
    /// output directories is an error.
    pub fn run<F>(&self, compositor: &Compositor<'_>, jobs: &[FrameJob], progress_callback: Option<F>) -> Result<RenderReport>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let parents: BTreeSet<&Path> = jobs.iter().filter_map(|job| job.destination.parent()).collect();
        for parent in parents {
            fs::create_dir_all(parent)?;
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .thread_name(|i| format!("framemat-render-{}", i))
            .build()
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;

        let total = jobs.len();
        let completed = AtomicUsize::new(0);
        let mut report = RenderReport::default();
        info!("Rendering {} frames with {} workers", total, self.concurrency);

        for (index, batch) in jobs.chunks(self.batch_size).enumerate() {
            debug!("Batch {}: frames {}..={}", index + 1, batch[0].frame, batch[batch.len() - 1].frame);
            let results: Vec<(FrameOutcome, Option<FrameFailure>)> = pool.install(|| {
                batch
                    .par_iter()
                    .map(|job| {
                        let result = render_job(compositor, job);
                        let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
                        if let Some(ref callback) = progress_callback {
                            callback(current, total);
                        }
                        result
                    })
                    .collect()
            });
            report.batches += 1;
            for (outcome, failure) in results {
                match outcome {
                    FrameOutcome::Rendered => report.rendered += 1,
                    FrameOutcome::Fallback => report.fallback += 1,
                    FrameOutcome::Failed => {}
                }
                report.failures.extend(failure);
            }
        }

        report.failures.sort_by_key(|f| f.frame);
        Ok(report)
    }
}

fn render_job(compositor: &Compositor<'_>, job: &FrameJob) -> (FrameOutcome, Option<FrameFailure>) {
    let started = Instant::now();
    let source = match image::open(&job.source) {
        Ok(img) => img.to_rgb8(),
        Err(source) => {
            let err = FrameIoError { action: "reading", path: job.source.clone(), source };
            return fall_back(compositor, job, None, err.into());
        }
    };

    let err: FrameError = match compositor.render(job.frame, &source) {
        Ok(composite) => match save(&composite.image, &job.destination) {
            Ok(()) => {
                debug!(
                    "Frame {}: {} -> {} in {:.3}s",
                    job.frame,
                    job.source.display(),
                    job.destination.display(),
                    started.elapsed().as_secs_f64()
                );
                return (FrameOutcome::Rendered, None);
            }
            Err(e) => e.into(),
        },
        Err(e) => e.into(),
    };
    fall_back(compositor, job, Some(&source), err)
}

fn fall_back(
    compositor: &Compositor<'_>,
    job: &FrameJob,
    source: Option<&RgbImage>,
    err: FrameError,
) -> (FrameOutcome, Option<FrameFailure>) {
    warn!("Frame {} ({}): {}; writing it without annotations", job.frame, job.source.display(), err);
    let canvas = compositor.blank_canvas(source);
    let outcome = match save(&canvas, &job.destination) {
        Ok(()) => FrameOutcome::Fallback,
        Err(write_err) => {
            error!("Frame {} ({}) has no output: {}", job.frame, job.source.display(), write_err);
            FrameOutcome::Failed
        }
    };
    let failure = FrameFailure { frame: job.frame, source: job.source.clone(), outcome, error: err };
    (outcome, Some(failure))
}

fn save(image: &RgbImage, path: &Path) -> std::result::Result<(), FrameIoError> {
    image
        .save(path)
        .map_err(|source| FrameIoError { action: "writing", path: path.to_path_buf(), source })
}
