//! Style resolution.
//!
//! Styles are resolved in two steps. [`StyleSheet::resolve`] parses colors and
//! fills in defaults as soon as the configuration is read. Font sizes may be
//! a fraction of the content height, so fonts are only loaded by
//! [`StyleSheet::finalize`], which needs that height.

use image::Rgb;
use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::font::{FontSource, Typeface};

pub const DEFAULT_STYLE: &str = "default";

fn default_foreground() -> String {
    "white".to_string()
}
fn default_border() -> u32 {
    2
}
fn default_font() -> String {
    "LiberationSans-Bold.ttf".to_string()
}
fn default_fontsize() -> f64 {
    0.02
}

/// A style as written in the zone configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StyleDecl {
    #[serde(default = "default_foreground")]
    pub foreground: String,
    /// Complement of the foreground when unset
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default = "default_border")]
    pub border: u32,
    #[serde(default = "default_font")]
    pub font: String,
    /// Fraction of the content height when below 1, else pixels
    #[serde(default = "default_fontsize")]
    pub fontsize: f64,
}

impl Default for StyleDecl {
    fn default() -> Self {
        Self {
            foreground: default_foreground(),
            background: None,
            border: default_border(),
            font: default_font(),
            fontsize: default_fontsize(),
        }
    }
}

/// A fully resolved style. Shared by zones and annotations through `Arc`.
#[derive(Clone)]
pub struct Style {
    pub name: String,
    pub foreground: Rgb<u8>,
    pub background: Rgb<u8>,
    pub border: u32,
    pub font_name: String,
    pub font_size: u32,
    pub font: Arc<dyn Typeface>,
}

impl fmt::Debug for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Style")
            .field("name", &self.name)
            .field("foreground", &self.foreground.0)
            .field("background", &self.background.0)
            .field("border", &self.border)
            .field("font", &format_args!("{}@{}px", self.font_name, self.font_size))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PendingStyle {
    foreground: Rgb<u8>,
    background: Rgb<u8>,
    border: u32,
    font: String,
    fontsize: f64,
}

/// Styles with colors resolved, waiting for the content height.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleSheet {
    styles: IndexMap<String, PendingStyle>,
}

impl StyleSheet {
    pub fn resolve(decls: &IndexMap<String, StyleDecl>) -> Result<Self> {
        let mut styles = IndexMap::with_capacity(decls.len() + 1);
        for (name, decl) in decls {
            let foreground = parse_color(&decl.foreground)
                .ok_or_else(|| Error::config(format!("style '{}': invalid foreground color '{}'", name, decl.foreground)))?;
            let background = match decl.background.as_deref() {
                Some(bg) => parse_color(bg)
                    .ok_or_else(|| Error::config(format!("style '{}': invalid background color '{}'", name, bg)))?,
                None => complement(foreground),
            };
            if !decl.fontsize.is_finite() || decl.fontsize <= 0.0 {
                return Err(Error::config(format!("style '{}': fontsize must be positive, got {}", name, decl.fontsize)));
            }
            styles.insert(
                name.clone(),
                PendingStyle { foreground, background, border: decl.border, font: decl.font.clone(), fontsize: decl.fontsize },
            );
        }
        if !styles.contains_key(DEFAULT_STYLE) {
            let decl = StyleDecl::default();
            let foreground = parse_color(&decl.foreground).unwrap_or(Rgb([255, 255, 255]));
            styles.insert(
                DEFAULT_STYLE.to_string(),
                PendingStyle { foreground, background: complement(foreground), border: decl.border, font: decl.font, fontsize: decl.fontsize },
            );
        }
        Ok(Self { styles })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.styles.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.styles.keys().map(String::as_str)
    }

    /// Every font referenced by a style, once each, in declaration order.
    pub fn fonts(&self) -> Vec<&str> {
        let mut fonts: Vec<&str> = Vec::with_capacity(self.styles.len());
        for pending in self.styles.values() {
            if !fonts.contains(&pending.font.as_str()) {
                fonts.push(&pending.font);
            }
        }
        fonts
    }

    /// Resolve font sizes against the content height and load every font.
    pub fn finalize(&self, content_height: u32, fonts: &dyn FontSource) -> Result<Styles> {
        let mut styles = IndexMap::with_capacity(self.styles.len());
        for (name, pending) in &self.styles {
            let font_size = resolve_font_size(pending.fontsize, content_height);
            if font_size == 0 {
                return Err(Error::config(format!(
                    "style '{}': fontsize {} resolves to 0px for content height {}",
                    name, pending.fontsize, content_height
                )));
            }
            let font = fonts.load(&pending.font, font_size)?;
            styles.insert(
                name.clone(),
                Arc::new(Style {
                    name: name.clone(),
                    foreground: pending.foreground,
                    background: pending.background,
                    border: pending.border,
                    font_name: pending.font.clone(),
                    font_size,
                    font,
                }),
            );
        }
        Ok(Styles { styles })
    }
}

/// Resolved styles by name.
#[derive(Debug, Clone)]
pub struct Styles {
    styles: IndexMap<String, Arc<Style>>,
}

impl Styles {
    pub fn get(&self, name: &str) -> Option<&Arc<Style>> {
        self.styles.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Style>> {
        self.styles.values()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

/// Font size in pixels: fractions of the content height below 1, pixels otherwise.
pub fn resolve_font_size(fontsize: f64, content_height: u32) -> u32 {
    if fontsize < 1.0 {
        (content_height as f64 * fontsize).floor() as u32
    } else {
        fontsize.floor() as u32
    }
}

/// Parse a CSS color (names, hex, `rgb()`, `hsl()`); alpha is dropped.
pub fn parse_color(input: &str) -> Option<Rgb<u8>> {
    let parsed: csscolorparser::Color = input.trim().parse().ok()?;
    let [r, g, b, _] = parsed.to_rgba8();
    Some(Rgb([r, g, b]))
}

pub fn complement(color: Rgb<u8>) -> Rgb<u8> {
    Rgb([255 - color[0], 255 - color[1], 255 - color[2]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decls(items: &[(&str, StyleDecl)]) -> IndexMap<String, StyleDecl> {
        items.iter().map(|(n, d)| (n.to_string(), d.clone())).collect()
    }

    #[test]
    fn parses_names_and_hex() {
        assert_eq!(parse_color("white"), Some(Rgb([255, 255, 255])));
        assert_eq!(parse_color(" #ff8000 "), Some(Rgb([255, 128, 0])));
        assert_eq!(parse_color("#0f0"), Some(Rgb([0, 255, 0])));
        assert_eq!(parse_color("rgb(1, 2, 3)"), Some(Rgb([1, 2, 3])));
        assert_eq!(parse_color("notacolor"), None);
    }

    #[test]
    fn missing_background_is_the_complement() {
        let sheet = StyleSheet::resolve(&decls(&[(
            "label",
            StyleDecl { foreground: "#102030".into(), ..StyleDecl::default() },
        )]))
        .unwrap();
        let label = &sheet.styles["label"];
        assert_eq!(label.background, Rgb([0xef, 0xdf, 0xcf]));
    }

    #[test]
    fn default_style_is_synthesized() {
        let sheet = StyleSheet::resolve(&IndexMap::new()).unwrap();
        assert!(sheet.contains(DEFAULT_STYLE));
        let default = &sheet.styles[DEFAULT_STYLE];
        assert_eq!(default.foreground, Rgb([255, 255, 255]));
        assert_eq!(default.background, Rgb([0, 0, 0]));
        assert_eq!(default.border, 2);
    }

    #[test]
    fn declared_default_is_kept() {
        let sheet = StyleSheet::resolve(&decls(&[(
            DEFAULT_STYLE,
            StyleDecl { foreground: "red".into(), ..StyleDecl::default() },
        )]))
        .unwrap();
        assert_eq!(sheet.styles.len(), 1);
        assert_eq!(sheet.styles[DEFAULT_STYLE].foreground, Rgb([255, 0, 0]));
    }

    #[test]
    fn bad_color_names_style_and_field() {
        let err = StyleSheet::resolve(&decls(&[(
            "ocr",
            StyleDecl { background: Some("blurple-ish".into()), ..StyleDecl::default() },
        )]))
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'ocr'"), "{msg}");
        assert!(msg.contains("background"), "{msg}");
    }

    #[test]
    fn fonts_are_listed_once() {
        let sheet = StyleSheet::resolve(&decls(&[
            ("a", StyleDecl { font: "Mono.ttf".into(), ..StyleDecl::default() }),
            ("b", StyleDecl::default()),
            ("c", StyleDecl { font: "Mono.ttf".into(), fontsize: 30.0, ..StyleDecl::default() }),
        ]))
        .unwrap();
        assert_eq!(sheet.fonts(), ["Mono.ttf", "LiberationSans-Bold.ttf"]);
    }

    #[test]
    fn font_sizes_resolve_against_content_height() {
        assert_eq!(resolve_font_size(0.02, 1080), 21);
        assert_eq!(resolve_font_size(0.5, 101), 50);
        assert_eq!(resolve_font_size(18.9, 1080), 18);
        assert_eq!(resolve_font_size(1.0, 1080), 1);
    }
}
