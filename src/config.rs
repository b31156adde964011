//! Zone and annotation configuration files.
//!
//! Both are read from TOML or JSON, picked by file extension. Zone
//! declaration order is significant, so maps keep insertion order.

use indexmap::IndexMap;
use log::info;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::annotation::{Annotation, AnnotationDecl, AnnotationSet};
use crate::error::{Error, Result};
use crate::style::{StyleDecl, StyleSheet};
use crate::zone::{check_zone_decls, ZoneDecl};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// `None` for unknown extensions; those are tried as TOML, then JSON.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("toml") => Some(ConfigFormat::Toml),
            Some("json") => Some(ConfigFormat::Json),
            _ => None,
        }
    }
}

fn parse<T: DeserializeOwned>(text: &str, format: Option<ConfigFormat>, origin: &str) -> Result<T> {
    match format {
        Some(ConfigFormat::Toml) => toml::from_str(text).map_err(|e| Error::config(format!("{}: {}", origin, e))),
        Some(ConfigFormat::Json) => serde_json::from_str(text).map_err(|e| Error::config(format!("{}: {}", origin, e))),
        None => toml::from_str(text).or_else(|toml_err| {
            serde_json::from_str(text).map_err(|json_err| {
                Error::config(format!("{}: not TOML ({}) or JSON ({})", origin, toml_err, json_err))
            })
        }),
    }
}

fn read(path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::config(format!("reading {} {}: {}", what, path.display(), e)))
}

/// Zones and styles for a run.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ZoneConfig {
    #[serde(default)]
    pub zones: IndexMap<String, ZoneDecl>,
    #[serde(default)]
    pub styles: IndexMap<String, StyleDecl>,
}

impl ZoneConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = read(path, "zone configuration")?;
        let config = Self::parse(&text, ConfigFormat::from_path(path), &path.display().to_string())?;
        info!("Loaded {} zones and {} styles from {}", config.zones.len(), config.styles.len(), path.display());
        Ok(config)
    }

    /// Parse and validate. `origin` names the source in error messages.
    pub fn parse(text: &str, format: Option<ConfigFormat>, origin: &str) -> Result<Self> {
        let config: ZoneConfig = parse(text, format, origin)?;
        config.style_sheet()?;
        Ok(config)
    }

    /// Resolve colors and check every zone declaration.
    pub fn style_sheet(&self) -> Result<StyleSheet> {
        let sheet = StyleSheet::resolve(&self.styles)?;
        check_zone_decls(&self.zones, &sheet)?;
        Ok(sheet)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AnnotationFile {
    #[serde(default)]
    annotations: IndexMap<String, Vec<AnnotationDecl>>,
}

/// Read one annotation file.
pub fn load_annotations(path: &Path) -> Result<AnnotationSet> {
    let text = read(path, "annotation file")?;
    let set = parse_annotations(&text, ConfigFormat::from_path(path), &path.display().to_string())?;
    info!("Loaded {} annotations for {} frames from {}", set.len(), set.frames.len(), path.display());
    Ok(set)
}

/// Parse an annotation document. Frame keys must be positive integers; keys
/// naming the same frame (`"7"`, `"07"`) are merged in document order.
pub fn parse_annotations(text: &str, format: Option<ConfigFormat>, origin: &str) -> Result<AnnotationSet> {
    let file: AnnotationFile = parse(text, format, origin)?;
    let mut set = AnnotationSet::new();
    for (key, decls) in file.annotations {
        let frame = key
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|frame| *frame > 0)
            .ok_or_else(|| Error::config(format!("{}: frame key '{}' is not a positive integer", origin, key)))?;
        let annotations = set.frames.entry(frame).or_default();
        for decl in decls {
            let annotation =
                Annotation::try_from(decl).map_err(|e| Error::config(format!("{}: frame {}: {}", origin, key, e)))?;
            annotations.push(annotation);
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationKind, Ref};

    const ZONES_TOML: &str = r##"
[styles.caption]
foreground = "yellow"
background = "#202020"
border = 1
fontsize = 24

[zones.whisper-en]
title = "English"
location = "south"
size = 0.1
style = "caption"

[zones.labels]
location = "West"
size = 200
"##;

    #[test]
    fn toml_zones_keep_declaration_order() {
        let config = ZoneConfig::parse(ZONES_TOML, Some(ConfigFormat::Toml), "zones.toml").unwrap();
        let names: Vec<&str> = config.zones.keys().map(String::as_str).collect();
        assert_eq!(names, ["whisper-en", "labels"]);
        assert_eq!(config.styles["caption"].fontsize, 24.0);
        assert_eq!(config.styles["caption"].font, "LiberationSans-Bold.ttf");
        assert_eq!(config.zones["whisper-en"].title.as_deref(), Some("English"));
    }

    #[test]
    fn json_zones_parse_without_extension() {
        let text = r#"{"zones": {"b": {"location": "north", "size": 10}, "a": {"location": "e", "size": 0.2}}}"#;
        let config = ZoneConfig::parse(text, None, "zones").unwrap();
        let names: Vec<&str> = config.zones.keys().map(String::as_str).collect();
        assert_eq!(names, ["b", "a"]);
        assert!(config.styles.is_empty());
    }

    #[test]
    fn declaring_content_is_rejected() {
        let text = r#"{"zones": {"content": {"location": "north", "size": 10}}}"#;
        let err = ZoneConfig::parse(text, Some(ConfigFormat::Json), "zones.json").unwrap_err();
        assert!(err.to_string().contains("content"));
    }

    #[test]
    fn zone_with_unknown_style_is_rejected() {
        let text = r#"{"zones": {"x": {"location": "north", "size": 10, "style": "missing"}}}"#;
        let err = ZoneConfig::parse(text, Some(ConfigFormat::Json), "zones.json").unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("missing")));
    }

    #[test]
    fn bad_location_is_rejected() {
        let text = r#"{"zones": {"x": {"location": "up", "size": 10}}}"#;
        assert!(ZoneConfig::parse(text, Some(ConfigFormat::Json), "zones.json").is_err());
    }

    #[test]
    fn annotations_from_json() {
        let text = r#"{"annotations": {
            "10": [
                {"zone": "content", "style": "object", "position": [5, 6], "size": [30, 40], "text": "dog (88%)"},
                {"zone": "imageclassification", "text": "dog (88 %), cat (10 %)"}
            ],
            "2": [{"zone": "whisper-en", "text": "hello", "fill": true}]
        }}"#;
        let set = parse_annotations(text, Some(ConfigFormat::Json), "a.json").unwrap();
        assert_eq!(set.len(), 3);
        let frame10 = &set.frames[&10];
        assert!(matches!(frame10[0].kind, AnnotationKind::Box { size: (30, 40), .. }));
        assert!(matches!(frame10[1].kind, AnnotationKind::Text { fill: false, .. }));
        assert!(matches!(frame10[0].zone, Ref::Named(ref z) if z == "content"));
        assert!(matches!(set.frames[&2][0].kind, AnnotationKind::Text { fill: true, .. }));
    }

    #[test]
    fn annotations_from_toml() {
        let text = r#"
[[annotations."3"]]
zone = "content"
position = [1, 2]
size = [3, 4]

[[annotations."3"]]
zone = "scenedetect"
text = "Scene 1"
"#;
        let set = parse_annotations(text, Some(ConfigFormat::Toml), "a.toml").unwrap();
        assert_eq!(set.frames[&3].len(), 2);
        assert!(matches!(set.frames[&3][0].kind, AnnotationKind::Box { ref text, .. } if text.is_empty()));
    }

    #[test]
    fn box_with_negative_size_is_rejected() {
        let text = r#"{"annotations": {"1": [{"zone": "content", "size": [10, -5], "text": "dog"}]}}"#;
        assert!(matches!(parse_annotations(text, Some(ConfigFormat::Json), "a.json"), Err(Error::Configuration(_))));
    }

    #[test]
    fn text_without_text_names_the_frame() {
        let text = r#"{"annotations": {"12": [{"zone": "captions"}]}}"#;
        let err = parse_annotations(text, Some(ConfigFormat::Json), "a.json").unwrap_err();
        assert!(err.to_string().contains("frame 12"), "{err}");
    }

    #[test]
    fn equivalent_frame_keys_merge_in_document_order() {
        let text = r#"{"annotations": {
            "1": [{"zone": "content", "text": "first"}],
            "01": [{"zone": "content", "text": "second"}]
        }}"#;
        let set = parse_annotations(text, Some(ConfigFormat::Json), "a.json").unwrap();
        let texts: Vec<&str> = set.frames[&1]
            .iter()
            .map(|a| match &a.kind {
                AnnotationKind::Text { text, .. } | AnnotationKind::Box { text, .. } => text.as_str(),
            })
            .collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[test]
    fn frame_keys_must_be_positive() {
        for key in ["0", "-1", "first"] {
            let text = format!(r#"{{"annotations": {{"{key}": []}}}}"#);
            assert!(parse_annotations(&text, Some(ConfigFormat::Json), "a.json").is_err(), "{key}");
        }
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("z.TOML")), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_path(Path::new("a.yaml")), None);
    }
}
