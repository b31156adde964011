//! Annotations and binding.
//!
//! Annotations arrive with zone and style *names*. Binding swaps each name
//! for the shared object from the [`Layout`], once. The compositor refuses to
//! draw anything still holding a name.

use log::debug;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, FrameDrawError, Result};
use crate::style::Style;
use crate::zone::{Layout, Zone};

/// A reference given either by name or already resolved.
#[derive(Debug, Clone)]
pub enum Ref<T> {
    Named(String),
    Bound(Arc<T>),
}

impl<T> Ref<T> {
    pub fn named(name: impl Into<String>) -> Self {
        Ref::Named(name.into())
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, Ref::Bound(_))
    }

    pub fn bound(&self) -> Option<&Arc<T>> {
        match self {
            Ref::Bound(target) => Some(target),
            Ref::Named(_) => None,
        }
    }
}

/// One annotation as written in an annotation file. A `size` makes it a
/// box, otherwise it is text and `text` is required.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AnnotationDecl {
    pub zone: String,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub position: (i32, i32),
    #[serde(default)]
    pub size: Option<(u32, u32)>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub fill: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationKind {
    /// A caption, optionally on a filled background
    Text { text: String, fill: bool },
    /// A bordered box with an optional label on top
    Box { text: String, size: (u32, u32) },
}

#[derive(Debug, Clone)]
pub struct Annotation {
    pub zone: Ref<Zone>,
    /// `None` until bound, then the zone's style if none was named
    pub style: Option<Ref<Style>>,
    /// Offset from the zone origin
    pub position: (i32, i32),
    pub kind: AnnotationKind,
}

impl Annotation {
    pub fn text(zone: &str, position: (i32, i32), text: impl Into<String>) -> Self {
        Self {
            zone: Ref::named(zone),
            style: None,
            position,
            kind: AnnotationKind::Text { text: text.into(), fill: false },
        }
    }

    pub fn boxed(zone: &str, position: (i32, i32), size: (u32, u32), text: impl Into<String>) -> Self {
        Self { zone: Ref::named(zone), style: None, position, kind: AnnotationKind::Box { text: text.into(), size } }
    }

    pub fn with_style(mut self, style: &str) -> Self {
        self.style = Some(Ref::named(style));
        self
    }

    pub fn with_fill(mut self, fill: bool) -> Self {
        if let AnnotationKind::Text { fill: ref mut f, .. } = self.kind {
            *f = fill;
        }
        self
    }

    pub fn is_bound(&self) -> bool {
        self.zone.is_bound() && self.style.as_ref().is_some_and(Ref::is_bound)
    }

    /// The bound zone, or an error naming the dangling reference.
    pub fn bound_zone(&self) -> std::result::Result<&Arc<Zone>, FrameDrawError> {
        match &self.zone {
            Ref::Bound(zone) => Ok(zone),
            Ref::Named(name) => Err(FrameDrawError::Unbound { kind: "zone", name: name.clone() }),
        }
    }

    pub fn bound_style(&self) -> std::result::Result<&Arc<Style>, FrameDrawError> {
        match &self.style {
            Some(Ref::Bound(style)) => Ok(style),
            Some(Ref::Named(name)) => Err(FrameDrawError::Unbound { kind: "style", name: name.clone() }),
            None => Err(FrameDrawError::Unbound { kind: "style", name: String::new() }),
        }
    }

    /// Resolve zone and style in place. References that are already bound
    /// are left alone.
    pub fn bind(&mut self, layout: &Layout, frame: u32) -> Result<()> {
        let zone = match &self.zone {
            Ref::Bound(zone) => zone.clone(),
            Ref::Named(name) => layout
                .zone(name)
                .cloned()
                .ok_or_else(|| Error::UnknownZone { zone: name.clone(), frame })?,
        };
        let style = match &self.style {
            Some(Ref::Bound(_)) => None,
            Some(Ref::Named(name)) => Some(layout.style(name).cloned().ok_or_else(|| Error::UnknownStyle {
                style: name.clone(),
                referrer: format!("an annotation on frame {}", frame),
            })?),
            None => Some(zone.style.clone()),
        };
        if !self.zone.is_bound() {
            self.zone = Ref::Bound(zone);
        }
        if let Some(style) = style {
            self.style = Some(Ref::Bound(style));
        }
        Ok(())
    }
}

impl TryFrom<AnnotationDecl> for Annotation {
    type Error = Error;

    fn try_from(decl: AnnotationDecl) -> Result<Self> {
        let kind = match decl.size {
            Some(size) => {
                if decl.fill.is_some() {
                    return Err(Error::config(format!("box in zone '{}': 'fill' only applies to text", decl.zone)));
                }
                AnnotationKind::Box { text: decl.text.unwrap_or_default(), size }
            }
            None => {
                let text = decl
                    .text
                    .ok_or_else(|| Error::config(format!("text in zone '{}' has no 'text'", decl.zone)))?;
                AnnotationKind::Text { text, fill: decl.fill.unwrap_or(false) }
            }
        };
        Ok(Annotation { zone: Ref::Named(decl.zone), style: decl.style.map(Ref::Named), position: decl.position, kind })
    }
}

/// Annotations from one source, keyed by 1-based frame number.
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet {
    pub frames: BTreeMap<u32, Vec<Annotation>>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: u32, annotation: Annotation) {
        self.frames.entry(frame).or_default().push(annotation);
    }

    pub fn len(&self) -> usize {
        self.frames.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.values().all(Vec::is_empty)
    }

    /// Check frame numbers and every zone and style name without a layout,
    /// so bad references are caught before any frame is extracted.
    pub fn check_names(&self, has_zone: impl Fn(&str) -> bool, has_style: impl Fn(&str) -> bool) -> Result<()> {
        for (&frame, annotations) in &self.frames {
            if frame == 0 {
                return Err(Error::config("annotation frame numbers start at 1"));
            }
            for annotation in annotations {
                if let Ref::Named(zone) = &annotation.zone {
                    if !has_zone(zone) {
                        return Err(Error::UnknownZone { zone: zone.clone(), frame });
                    }
                }
                if let Some(Ref::Named(style)) = &annotation.style {
                    if !has_style(style) {
                        return Err(Error::UnknownStyle {
                            style: style.clone(),
                            referrer: format!("an annotation on frame {}", frame),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Bound annotations for every frame, in draw order.
#[derive(Debug, Clone, Default)]
pub struct FrameAnnotations {
    frames: BTreeMap<u32, Vec<Annotation>>,
}

impl FrameAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `set` against `layout` and append it after anything bound
    /// earlier. Nothing is appended if any annotation fails to bind.
    pub fn bind(&mut self, layout: &Layout, set: AnnotationSet) -> Result<usize> {
        let mut bound: BTreeMap<u32, Vec<Annotation>> = BTreeMap::new();
        let mut count = 0;
        for (frame, mut annotations) in set.frames {
            if frame == 0 {
                return Err(Error::config("annotation frame numbers start at 1"));
            }
            for annotation in annotations.iter_mut() {
                annotation.bind(layout, frame)?;
            }
            count += annotations.len();
            bound.insert(frame, annotations);
        }
        for (frame, annotations) in bound {
            self.frames.entry(frame).or_default().extend(annotations);
        }
        debug!("Bound {} annotations, {} frames annotated", count, self.frames.len());
        Ok(count)
    }

    /// Annotations for `frame`, empty if none.
    pub fn get(&self, frame: u32) -> &[Annotation] {
        self.frames.get(&frame).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn len(&self) -> usize {
        self.frames.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the bound annotations back out, e.g. to merge them into another set.
    pub fn into_set(self) -> AnnotationSet {
        AnnotationSet { frames: self.frames }
    }
}
