//! Font loading and glyph rasterization.
//!
//! The compositor only sees [`Typeface`]; [`SystemFonts`] backs it with
//! `ab_glyph` outlines loaded from `.ttf`/`.otf` files.

use ab_glyph::{point, Font, FontArc, GlyphId, PxScale, ScaleFont};
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use walkdir::WalkDir;

use crate::error::{Error, FrameDrawError, Result};

/// Vertical metrics of a scaled font, in pixels. `descent` is zero or negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    pub ascent: f32,
    pub descent: f32,
}

impl LineMetrics {
    pub fn height(&self) -> f32 {
        self.ascent - self.descent
    }
}

/// A font at a fixed pixel size.
pub trait Typeface: Send + Sync + fmt::Debug {
    fn line_metrics(&self) -> LineMetrics;

    /// Horizontal advance of `text` in pixels.
    fn advance(&self, text: &str) -> std::result::Result<f32, FrameDrawError>;

    /// Rasterize `text` with the left end of its baseline at `origin`. `plot`
    /// receives canvas coordinates and a coverage in `0.0..=1.0`; it may be
    /// called with coordinates outside the canvas.
    fn rasterize(
        &self,
        text: &str,
        origin: (f32, f32),
        plot: &mut dyn FnMut(i32, i32, f32),
    ) -> std::result::Result<(), FrameDrawError>;
}

/// Where fonts come from. Called once per style while the layout is built.
pub trait FontSource {
    fn load(&self, font: &str, size: u32) -> Result<Arc<dyn Typeface>>;
}

/// An `ab_glyph` font scaled to a pixel height.
#[derive(Clone)]
pub struct ScaledFont {
    font: FontArc,
    scale: PxScale,
}

impl fmt::Debug for ScaledFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScaledFont").field("scale", &self.scale.y).finish()
    }
}

impl ScaledFont {
    pub fn new(font: FontArc, size: u32) -> Self {
        Self { font, scale: PxScale::from(size as f32) }
    }

    /// Glyph ids and pen x-offsets for every drawable char of `text`, plus the
    /// total advance.
    fn layout(&self, text: &str) -> std::result::Result<(Vec<(GlyphId, f32)>, f32), FrameDrawError> {
        let scaled = self.font.as_scaled(self.scale);
        let mut glyphs = Vec::with_capacity(text.len());
        let mut caret = 0.0f32;
        let mut previous: Option<GlyphId> = None;
        for ch in text.chars().filter(|c| !c.is_control()) {
            let id = scaled.glyph_id(ch);
            if id.0 == 0 && !ch.is_whitespace() {
                return Err(FrameDrawError::MissingGlyph { ch });
            }
            if let Some(prev) = previous {
                caret += scaled.kern(prev, id);
            }
            glyphs.push((id, caret));
            caret += scaled.h_advance(id);
            previous = Some(id);
        }
        Ok((glyphs, caret))
    }
}

impl Typeface for ScaledFont {
    fn line_metrics(&self) -> LineMetrics {
        let scaled = self.font.as_scaled(self.scale);
        LineMetrics { ascent: scaled.ascent(), descent: scaled.descent() }
    }

    fn advance(&self, text: &str) -> std::result::Result<f32, FrameDrawError> {
        self.layout(text).map(|(_, width)| width)
    }

    fn rasterize(
        &self,
        text: &str,
        origin: (f32, f32),
        plot: &mut dyn FnMut(i32, i32, f32),
    ) -> std::result::Result<(), FrameDrawError> {
        let (glyphs, _) = self.layout(text)?;
        for (id, offset) in glyphs {
            let glyph = id.with_scale_and_position(self.scale, point(origin.0 + offset, origin.1));
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                let (left, top) = (bounds.min.x as i32, bounds.min.y as i32);
                outlined.draw(|gx, gy, coverage| plot(left + gx as i32, top + gy as i32, coverage));
            }
        }
        Ok(())
    }
}

/// Loads fonts by path, or by file name from a list of font directories.
pub struct SystemFonts {
    dirs: Vec<PathBuf>,
    cache: Mutex<HashMap<PathBuf, FontArc>>,
}

impl SystemFonts {
    pub fn new() -> Self {
        Self { dirs: default_font_dirs(), cache: Mutex::new(HashMap::new()) }
    }

    /// Search `dir` before the default directories.
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dirs.insert(0, dir.into());
        self
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Resolve a font reference to a file on disk.
    pub fn locate(&self, font: &str) -> Option<PathBuf> {
        let direct = Path::new(font);
        if direct.is_file() {
            return Some(direct.to_path_buf());
        }
        self.dirs.iter().filter(|d| d.is_dir()).find_map(|dir| {
            WalkDir::new(dir)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .find(|e| {
                    e.file_type().is_file()
                        && e.file_name().to_str().is_some_and(|n| n.eq_ignore_ascii_case(font))
                })
                .map(|e| e.into_path())
        })
    }

    /// Like [`SystemFonts::locate`], but a missing font is an [`Error::FontLoad`].
    pub fn require(&self, font: &str) -> Result<PathBuf> {
        self.locate(font).ok_or_else(|| Error::FontLoad {
            font: font.to_string(),
            size: None,
            reason: format!("not found in {} font directories", self.dirs.len()),
        })
    }
}

impl Default for SystemFonts {
    fn default() -> Self {
        Self::new()
    }
}

impl FontSource for SystemFonts {
    fn load(&self, font: &str, size: u32) -> Result<Arc<dyn Typeface>> {
        let load_error = |reason: String| Error::FontLoad { font: font.to_string(), size: Some(size), reason };

        let path = self
            .locate(font)
            .ok_or_else(|| load_error(format!("not found in {} font directories", self.dirs.len())))?;

        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let face = match cache.get(&path) {
            Some(face) => face.clone(),
            None => {
                let bytes = fs::read(&path).map_err(|e| load_error(format!("reading {}: {}", path.display(), e)))?;
                let face = FontArc::try_from_vec(bytes).map_err(|e| load_error(format!("{}: {}", path.display(), e)))?;
                debug!("Loaded font {} from {}", font, path.display());
                cache.insert(path, face.clone());
                face
            }
        };
        Ok(Arc::new(ScaledFont::new(face, size)))
    }
}

fn default_font_dirs() -> Vec<PathBuf> {
    let mut dirs_list: Vec<PathBuf> = Vec::new();
    if let Some(mut d) = dirs::data_dir() {
        d.push("framemat");
        d.push("fonts");
        dirs_list.push(d);
    }
    if let Some(d) = dirs::font_dir() {
        dirs_list.push(d);
    }
    for system in ["/usr/share/fonts", "/usr/local/share/fonts", "/Library/Fonts", "/System/Library/Fonts", "C:\\Windows\\Fonts"] {
        dirs_list.push(PathBuf::from(system));
    }
    dirs_list
}
