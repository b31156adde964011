#![allow(dead_code)]
use std::fs;
use std::path::Path;
use std::sync::Arc;

use framemat::{
    Annotator, ConfigFormat, Error, FontSource, FrameDrawError, LineMetrics, Typeface, ZoneConfig,
};
use image::{Rgb, RgbImage};

pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const LIME: Rgb<u8> = Rgb([0, 255, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

/// Font file name that [`BlockFonts`] refuses to load.
pub const UNLOADABLE_FONT: &str = "unloadable.ttf";

/// Monospaced test font. Every ASCII glyph is a solid block `size` pixels
/// tall sitting on the baseline, with a one pixel gap on its right inside a
/// `size / 2` wide cell. Whitespace advances without drawing. Anything
/// outside ASCII has no glyph.
#[derive(Debug)]
pub struct BlockFont {
    pub size: u32,
}

impl BlockFont {
    pub fn cell(&self) -> u32 {
        (self.size / 2).max(2)
    }

    fn check(&self, text: &str) -> Result<Vec<char>, FrameDrawError> {
        let chars: Vec<char> = text.chars().filter(|c| !c.is_control()).collect();
        match chars.iter().find(|c| !c.is_ascii()) {
            Some(&ch) => Err(FrameDrawError::MissingGlyph { ch }),
            None => Ok(chars),
        }
    }
}

impl Typeface for BlockFont {
    fn line_metrics(&self) -> LineMetrics {
        LineMetrics { ascent: self.size as f32, descent: 0.0 }
    }

    fn advance(&self, text: &str) -> Result<f32, FrameDrawError> {
        Ok((self.check(text)?.len() as u32 * self.cell()) as f32)
    }

    fn rasterize(
        &self,
        text: &str,
        origin: (f32, f32),
        plot: &mut dyn FnMut(i32, i32, f32),
    ) -> Result<(), FrameDrawError> {
        let chars = self.check(text)?;
        let (left, top) = (origin.0.floor() as i32, (origin.1 - self.size as f32).floor() as i32);
        let cell = self.cell() as i32;
        for (index, ch) in chars.iter().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let x0 = left + index as i32 * cell;
            for dy in 0..self.size as i32 {
                for dx in 0..cell - 1 {
                    plot(x0 + dx, top + dy, 1.0);
                }
            }
        }
        Ok(())
    }
}

/// Hands out [`BlockFont`]s for any font name except [`UNLOADABLE_FONT`].
#[derive(Debug, Default)]
pub struct BlockFonts;

impl FontSource for BlockFonts {
    fn load(&self, font: &str, size: u32) -> framemat::Result<Arc<dyn Typeface>> {
        if font == UNLOADABLE_FONT {
            return Err(Error::FontLoad { font: font.to_string(), size: Some(size), reason: "refused by test font source".into() });
        }
        Ok(Arc::new(BlockFont { size }))
    }
}

pub fn zones(toml: &str) -> ZoneConfig {
    ZoneConfig::parse(toml, Some(ConfigFormat::Toml), "test zones").unwrap()
}

pub fn annotator(toml: &str, width: u32, height: u32) -> Annotator {
    Annotator::new(&zones(toml), width, height, &BlockFonts).unwrap()
}

pub fn solid(width: u32, height: u32, color: Rgb<u8>) -> RgbImage {
    RgbImage::from_pixel(width, height, color)
}

/// Write `count` numbered PNG frames (`000001.png`, ...) into `dir`.
pub fn write_frames(dir: &Path, count: u32, width: u32, height: u32) {
    fs::create_dir_all(dir).unwrap();
    for frame in 1..=count {
        let shade = (frame % 200) as u8 + 20;
        solid(width, height, Rgb([shade, shade, shade])).save(dir.join(format!("{:06}.png", frame))).unwrap();
    }
}
