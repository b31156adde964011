use std::path::PathBuf;
use thiserror::Error;

/// Setup-tier errors. Any of these aborts the run before frames are touched
/// (or, for `FrameGap`, before the output video is assembled).
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unknown zone '{zone}' referenced by an annotation on frame {frame}")]
    UnknownZone { zone: String, frame: u32 },

    #[error("unknown style '{style}' referenced by {referrer}")]
    UnknownStyle { style: String, referrer: String },

    /// `size` is `None` when the font was looked up before the content size was known.
    #[error("cannot load font '{font}'{}: {reason}", at_size(.size))]
    FontLoad { font: String, size: Option<u32>, reason: String },

    #[error("{tool} failed: {reason}")]
    ExternalTool { tool: String, reason: String },

    #[error("{count} frame(s) have no output file, first missing frame is {first}")]
    FrameGap { count: usize, first: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

fn at_size(size: &Option<u32>) -> String {
    size.map(|px| format!(" at {}px", px)).unwrap_or_default()
}

/// A single annotation (or a whole frame) could not be drawn.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameDrawError {
    #[error("annotation still refers to {kind} '{name}' by name")]
    Unbound { kind: &'static str, name: String },

    #[error("font has no glyph for {ch:?}")]
    MissingGlyph { ch: char },

    #[error("source frame is {actual:?}, layout expects {expected:?}")]
    SizeMismatch { expected: (u32, u32), actual: (u32, u32) },
}

/// Reading or writing a frame image failed.
#[derive(Error, Debug)]
#[error("{action} {path}: {source}")]
pub struct FrameIoError {
    pub action: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: image::ImageError,
}

/// Frame-tier errors. These are logged and recovered, never propagated as
/// [`Error`].
#[derive(Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    Draw(#[from] FrameDrawError),

    #[error(transparent)]
    Io(#[from] FrameIoError),
}
