//! Per-frame compositing.
//!
//! Output for a frame is a pure function of the layout, the bound
//! annotations, the frame number and the source pixels.

use image::{imageops, Rgb, RgbImage};
use log::warn;

use crate::annotation::{Annotation, AnnotationKind, FrameAnnotations};
use crate::error::FrameDrawError;
use crate::style::Style;
use crate::zone::{Layout, Zone};

const CANVAS_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const ZONE_OUTLINE: Rgb<u8> = Rgb([255, 255, 255]);

/// Which line of the text sits on the anchor point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    /// Top of the line (ascender) at the anchor
    Ascender,
    /// Bottom of the line (descender) at the anchor
    Descender,
}

/// A rendered frame and the annotations that could not be drawn on it.
#[derive(Debug)]
pub struct Composite {
    pub image: RgbImage,
    /// Index into the frame's annotation list, and why it was skipped
    pub failures: Vec<(usize, FrameDrawError)>,
}

/// Renders frames into the canvas described by a [`Layout`].
#[derive(Debug, Clone, Copy)]
pub struct Compositor<'a> {
    layout: &'a Layout,
    annotations: &'a FrameAnnotations,
}

impl<'a> Compositor<'a> {
    pub fn new(layout: &'a Layout, annotations: &'a FrameAnnotations) -> Self {
        Self { layout, annotations }
    }

    pub fn layout(&self) -> &Layout {
        self.layout
    }

    /// A black canvas with `source` pasted at the content zone's origin.
    pub fn blank_canvas(&self, source: Option<&RgbImage>) -> RgbImage {
        let (width, height) = self.layout.canvas_size();
        let mut canvas = RgbImage::from_pixel(width, height, CANVAS_BACKGROUND);
        if let Some(source) = source {
            let origin = self.layout.content().rect;
            imageops::replace(&mut canvas, source, origin.x as i64, origin.y as i64);
        }
        canvas
    }

    /// Render `frame` (1-based). Fails only when `source` does not match the
    /// content size; individual annotations that fail are skipped and
    /// reported in [`Composite::failures`].
    pub fn render(&self, frame: u32, source: &RgbImage) -> Result<Composite, FrameDrawError> {
        let expected = self.layout.content_size();
        if source.dimensions() != expected {
            return Err(FrameDrawError::SizeMismatch { expected, actual: source.dimensions() });
        }

        let mut canvas = self.blank_canvas(Some(source));
        for zone in self.layout.zones() {
            let r = zone.rect;
            outline(&mut canvas, r.x as i64, r.y as i64, (r.x + r.w) as i64, (r.y + r.h) as i64, 1, ZONE_OUTLINE);
        }
        for zone in self.layout.zones() {
            if let Some(title) = zone.title.as_deref() {
                let inset = zone.style.border as i32;
                if let Err(e) = draw_text(&mut canvas, zone, &zone.style, (inset, inset), title, false, TextAnchor::Ascender) {
                    warn!("Frame {}: cannot draw title of zone '{}': {}", frame, zone.name, e);
                }
            }
        }

        let mut failures = Vec::new();
        for (index, annotation) in self.annotations.get(frame).iter().enumerate() {
            if let Err(e) = draw_annotation(&mut canvas, annotation) {
                warn!("Frame {}: skipping annotation #{}: {}", frame, index + 1, e);
                failures.push((index, e));
            }
        }
        Ok(Composite { image: canvas, failures })
    }
}

fn draw_annotation(canvas: &mut RgbImage, annotation: &Annotation) -> Result<(), FrameDrawError> {
    let zone = annotation.bound_zone()?;
    let style = annotation.bound_style()?;
    match &annotation.kind {
        AnnotationKind::Text { text, fill } => {
            draw_text(canvas, zone, style, annotation.position, text, *fill, TextAnchor::Ascender)
        }
        AnnotationKind::Box { text, size } => {
            if !text.is_empty() {
                style.font.advance(text)?;
            }
            let (x, y) = zone.point(annotation.position.0, annotation.position.1);
            let (x, y) = (x as i64, y as i64);
            let (w, h) = (size.0 as i64, size.1 as i64);
            if style.border > 0 {
                outline(canvas, x, y, x + w, y + h, style.border, style.foreground);
                outline(canvas, x - 1, y - 1, x + w + 1, y + h + 1, 1, style.background);
            }
            if text.is_empty() {
                return Ok(());
            }
            draw_text(canvas, zone, style, annotation.position, text, true, TextAnchor::Descender)
        }
    }
}

/// Draw `text` at `position` inside `zone`. With `fill`, the line box behind
/// the text is painted in the style's background first.
pub fn draw_text(
    canvas: &mut RgbImage,
    zone: &Zone,
    style: &Style,
    position: (i32, i32),
    text: &str,
    fill: bool,
    anchor: TextAnchor,
) -> Result<(), FrameDrawError> {
    let font = &style.font;
    let metrics = font.line_metrics();
    let width = font.advance(text)?;
    let (x, y) = zone.point(position.0, position.1);
    let baseline = match anchor {
        TextAnchor::Ascender => y as f32 + metrics.ascent,
        TextAnchor::Descender => y as f32 + metrics.descent,
    };

    if fill && width > 0.0 {
        let top = (baseline - metrics.ascent).floor() as i64;
        let bottom = (baseline - metrics.descent).ceil() as i64 - 1;
        let right = x as i64 + width.ceil() as i64 - 1;
        fill_rect(canvas, x as i64, top, right, bottom, style.background);
    }

    let color = style.foreground;
    font.rasterize(text, (x as f32, baseline), &mut |px: i32, py: i32, coverage: f32| {
        blend(canvas, px as i64, py as i64, color, coverage)
    })
}

fn in_bounds(canvas: &RgbImage, x: i64, y: i64) -> bool {
    x >= 0 && y >= 0 && x < canvas.width() as i64 && y < canvas.height() as i64
}

fn blend(canvas: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>, coverage: f32) {
    if !in_bounds(canvas, x, y) {
        return;
    }
    let coverage = coverage.clamp(0.0, 1.0);
    if coverage <= 0.0 {
        return;
    }
    let pixel = canvas.get_pixel_mut(x as u32, y as u32);
    for channel in 0..3 {
        let under = pixel[channel] as f32;
        pixel[channel] = (under + (color[channel] as f32 - under) * coverage).round() as u8;
    }
}

/// Fill the inclusive rectangle `(x0, y0)..=(x1, y1)`, clipped to the canvas.
fn fill_rect(canvas: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    let (max_x, max_y) = (canvas.width() as i64 - 1, canvas.height() as i64 - 1);
    let (x0, y0, x1, y1) = (x0.max(0), y0.max(0), x1.min(max_x), y1.min(max_y));
    if x0 > x1 || y0 > y1 {
        return;
    }
    for y in y0..=y1 {
        for x in x0..=x1 {
            canvas.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Outline the inclusive rectangle `(x0, y0)..=(x1, y1)` with lines `width`
/// pixels thick, growing inward.
fn outline(canvas: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, width: u32, color: Rgb<u8>) {
    for inset in 0..width as i64 {
        let (l, t, r, b) = (x0 + inset, y0 + inset, x1 - inset, y1 - inset);
        if l > r || t > b {
            break;
        }
        fill_rect(canvas, l, t, r, t, color);
        fill_rect(canvas, l, b, r, b, color);
        fill_rect(canvas, l, t, l, b, color);
        fill_rect(canvas, r, t, r, b, color);
    }
}
