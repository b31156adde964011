//! Zone layout.
//!
//! Margin zones are stacked around the original frame like picture-frame
//! mattes, in declaration order. A north or west zone pushes everything
//! placed before it away from the canvas origin; south and east zones only
//! extend the trailing edge.

use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::font::FontSource;
use crate::style::{Style, StyleSheet, Styles, DEFAULT_STYLE};

/// Name of the implicit zone holding the source frame.
pub const CONTENT_ZONE: &str = "content";

/// Largest canvas side. Frames are written as JPEG, which stores each
/// dimension in 16 bits.
pub const MAX_CANVAS_SIDE: u32 = 65_535;

/// A zone as written in the zone configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ZoneDecl {
    #[serde(default)]
    pub title: Option<String>,
    pub location: String,
    /// Fraction of the content dimension when below 1, else pixels
    pub size: f64,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    North,
    South,
    East,
    West,
    Center,
}

impl Location {
    /// Only the first character counts, after trimming and lowercasing, so
    /// "north", "N" and " n " are all north.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().chars().next()?.to_ascii_lowercase() {
            'n' => Some(Location::North),
            's' => Some(Location::South),
            'e' => Some(Location::East),
            'w' => Some(Location::West),
            'c' => Some(Location::Center),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Location::North => 'n',
            Location::South => 's',
            Location::East => 'e',
            Location::West => 'w',
            Location::Center => 'c',
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A pixel rectangle on the canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    /// Create a rectangle from its top-left corner and size
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
}

/// A zone with its final geometry.
#[derive(Debug, Clone)]
pub struct Zone {
    pub name: String,
    pub title: Option<String>,
    pub location: Location,
    /// Resolved size in pixels
    pub size: u32,
    pub style: Arc<Style>,
    pub rect: Rect,
}

impl Zone {
    /// Canvas position of an offset inside this zone.
    pub fn point(&self, dx: i32, dy: i32) -> (i32, i32) {
        (self.rect.x as i32 + dx, self.rect.y as i32 + dy)
    }
}

/// Result of placing zones: one rect per zone (content first) and the canvas size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub rects: Vec<Rect>,
    pub width: u32,
    pub height: u32,
}

/// Pixel size of a zone. Fractions apply to the content height for north and
/// south zones and to the content width for east and west zones.
pub fn resolve_zone_size(size: f64, location: Location, content_width: u32, content_height: u32) -> u32 {
    if size < 1.0 {
        let dimension = match location {
            Location::North | Location::South => content_height,
            _ => content_width,
        };
        (size * dimension as f64).trunc() as u32
    } else {
        size.trunc() as u32
    }
}

/// Validate zone declarations against the style sheet and return each zone's
/// normalized location and declared size, in declaration order.
pub fn check_zone_decls(decls: &IndexMap<String, ZoneDecl>, sheet: &StyleSheet) -> Result<Vec<(Location, f64)>> {
    let mut margins = Vec::with_capacity(decls.len());
    for (name, decl) in decls {
        if name == CONTENT_ZONE {
            return Err(Error::config("the 'content' zone is implicit and cannot be declared"));
        }
        let location = Location::parse(&decl.location).ok_or_else(|| {
            Error::config(format!("zone '{}': location '{}' is not north, south, east or west", name, decl.location))
        })?;
        if location == Location::Center {
            return Err(Error::config(format!("zone '{}': only the content zone can be centered", name)));
        }
        if !decl.size.is_finite() || decl.size <= 0.0 {
            return Err(Error::config(format!("zone '{}': size must be positive, got {}", name, decl.size)));
        }
        let style = decl.style.as_deref().unwrap_or(DEFAULT_STYLE);
        if !sheet.contains(style) {
            return Err(Error::config(format!("zone '{}' refers to non-existing style '{}'", name, style)));
        }
        margins.push((location, decl.size));
    }
    Ok(margins)
}

/// Place margin zones around a `content_width` x `content_height` frame.
///
/// `rects[0]` is the content zone, `rects[i + 1]` belongs to `margins[i]`.
/// The canvas height is rounded up to an even number. A canvas side beyond
/// [`MAX_CANVAS_SIDE`] is a configuration error.
pub fn place_zones(margins: &[(Location, f64)], content_width: u32, content_height: u32) -> Result<Placement> {
    check_side("content width", content_width)?;
    check_side("content height", content_height)?;
    let mut rects = Vec::with_capacity(margins.len() + 1);
    rects.push(Rect::new(0, 0, content_width, content_height));
    let (mut pwidth, mut pheight) = (content_width, content_height);

    for (index, &(location, size)) in margins.iter().enumerate() {
        let size = resolve_zone_size(size, location, content_width, content_height);
        let grow = |extent: u32, side: &str| {
            extent.checked_add(size).filter(|grown| *grown <= MAX_CANVAS_SIDE).ok_or_else(|| {
                Error::config(format!(
                    "margin zone #{} ({}, {}px) makes the canvas {} exceed {}px",
                    index + 1,
                    location,
                    size,
                    side,
                    MAX_CANVAS_SIDE
                ))
            })
        };
        // Shifted rects stay inside the grown extent, so they cannot overflow.
        let rect = match location {
            Location::North => {
                let grown = grow(pheight, "height")?;
                for placed in rects.iter_mut() {
                    placed.y += size;
                }
                let rect = Rect::new(0, 0, pwidth, size);
                pheight = grown;
                rect
            }
            Location::South => {
                let rect = Rect::new(0, pheight, pwidth, size);
                pheight = grow(pheight, "height")?;
                rect
            }
            Location::East => {
                let rect = Rect::new(pwidth, 0, size, pheight);
                pwidth = grow(pwidth, "width")?;
                rect
            }
            Location::West => {
                let grown = grow(pwidth, "width")?;
                for placed in rects.iter_mut() {
                    placed.x += size;
                }
                let rect = Rect::new(0, 0, size, pheight);
                pwidth = grown;
                rect
            }
            Location::Center => {
                return Err(Error::config(format!("margin zone #{} cannot be centered", index + 1)));
            }
        };
        rects.push(rect);
    }

    if pheight % 2 == 1 {
        pheight += 1;
        check_side("canvas height", pheight)?;
    }
    Ok(Placement { rects, width: pwidth, height: pheight })
}

fn check_side(what: &str, value: u32) -> Result<()> {
    if value > MAX_CANVAS_SIDE {
        return Err(Error::config(format!("{} {}px exceeds {}px", what, value, MAX_CANVAS_SIDE)));
    }
    Ok(())
}

fn zone_list(decls: &IndexMap<String, ZoneDecl>) -> String {
    decls.keys().enumerate().map(|(i, name)| format!("#{} {}", i + 1, name)).collect::<Vec<_>>().join(", ")
}

/// The frozen zone layout for one run.
#[derive(Debug, Clone)]
pub struct Layout {
    zones: IndexMap<String, Arc<Zone>>,
    styles: Styles,
    width: u32,
    height: u32,
}

impl Layout {
    /// Validate the zone declarations, place every zone, then resolve font
    /// sizes against the content height and load the fonts.
    pub fn solve(
        decls: &IndexMap<String, ZoneDecl>,
        sheet: &StyleSheet,
        content_width: u32,
        content_height: u32,
        fonts: &dyn FontSource,
    ) -> Result<Self> {
        if content_width == 0 || content_height == 0 {
            return Err(Error::config(format!("content size {}x{} is empty", content_width, content_height)));
        }

        let margins = check_zone_decls(decls, sheet)?;
        let placement = place_zones(&margins, content_width, content_height).map_err(|e| match e {
            Error::Configuration(msg) => Error::config(format!("{} (zones in order: {})", msg, zone_list(decls))),
            other => other,
        })?;
        let styles = sheet.finalize(content_height, fonts)?;
        let default_style = styles
            .get(DEFAULT_STYLE)
            .cloned()
            .ok_or_else(|| Error::config("style table has no default style"))?;

        let mut zones = IndexMap::with_capacity(decls.len() + 1);
        zones.insert(
            CONTENT_ZONE.to_string(),
            Arc::new(Zone {
                name: CONTENT_ZONE.to_string(),
                title: None,
                location: Location::Center,
                size: 1,
                style: default_style.clone(),
                rect: placement.rects[0],
            }),
        );
        for ((name, decl), (&(location, size), rect)) in decls.iter().zip(margins.iter().zip(&placement.rects[1..])) {
            let style = match decl.style.as_deref() {
                Some(style) => styles
                    .get(style)
                    .cloned()
                    .ok_or_else(|| Error::config(format!("zone '{}' refers to non-existing style '{}'", name, style)))?,
                None => default_style.clone(),
            };
            let size = resolve_zone_size(size, location, content_width, content_height);
            debug!("Zone {} ({}) size {}px at {:?}", name, location, size, rect);
            zones.insert(
                name.clone(),
                Arc::new(Zone { name: name.clone(), title: decl.title.clone(), location, size, style, rect: *rect }),
            );
        }

        Ok(Self { zones, styles, width: placement.width, height: placement.height })
    }

    /// Look up a zone by name
    pub fn zone(&self, name: &str) -> Option<&Arc<Zone>> {
        self.zones.get(name)
    }

    /// The implicit content zone.
    pub fn content(&self) -> &Arc<Zone> {
        &self.zones[0]
    }

    /// Zones in placement order, content first.
    pub fn zones(&self) -> impl Iterator<Item = &Arc<Zone>> {
        self.zones.values()
    }

    /// Get the resolved styles
    pub fn styles(&self) -> &Styles {
        &self.styles
    }

    /// Look up a resolved style by name
    pub fn style(&self, name: &str) -> Option<&Arc<Style>> {
        self.styles.get(name)
    }

    /// Canvas size in pixels.
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Size of the source frame in pixels.
    pub fn content_size(&self) -> (u32, u32) {
        let rect = self.content().rect;
        (rect.w, rect.h)
    }
}
