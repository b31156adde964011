mod common;

use common::{annotator, solid, BLACK, BLUE, LIME, RED, WHITE};
use framemat::{Annotation, AnnotationSet, Annotator, FrameDrawError};
use image::{Rgb, RgbImage};

// 40x30 content, a 20px caption strip below it and a 12px label column on
// the right: a 52x50 canvas. Block glyphs are 10px tall in 5px cells.
const ZONES: &str = r#"
[styles.default]
fontsize = 10

[styles.cap]
foreground = "red"
background = "blue"
border = 1
fontsize = 10

[styles.alt]
foreground = "lime"
border = 1
fontsize = 10

[zones.captions]
location = "south"
size = 20
style = "cap"

[zones.labels]
title = "T"
location = "east"
size = 12
style = "alt"
"#;

const GRAY: Rgb<u8> = Rgb([90, 90, 90]);

fn with(frame: u32, annotations: Vec<Annotation>) -> Annotator {
    let mut annotator = annotator(ZONES, 40, 30);
    let mut set = AnnotationSet::new();
    for annotation in annotations {
        set.push(frame, annotation);
    }
    annotator.add_annotations(set).unwrap();
    annotator
}

fn render(annotator: &Annotator, frame: u32, source: &RgbImage) -> RgbImage {
    let composite = annotator.annotate_frame(frame, source).unwrap();
    assert!(composite.failures.is_empty(), "{:?}", composite.failures);
    composite.image
}

fn count(image: &RgbImage, color: Rgb<u8>) -> usize {
    image.pixels().filter(|p| **p == color).count()
}

#[test]
fn unannotated_frame_is_source_inside_outlined_zones() {
    let annotator = with(1, vec![]);
    let image = render(&annotator, 1, &solid(40, 30, GRAY));

    assert_eq!(image.dimensions(), (52, 50));
    assert_eq!(*image.get_pixel(5, 5), GRAY);
    assert_eq!(*image.get_pixel(39, 29), GRAY);
    assert_eq!(*image.get_pixel(0, 5), WHITE);
    assert_eq!(*image.get_pixel(5, 0), WHITE);
    assert_eq!(*image.get_pixel(5, 30), WHITE);
    assert_eq!(*image.get_pixel(40, 10), WHITE);
    assert_eq!(*image.get_pixel(10, 40), BLACK);
    assert_eq!(*image.get_pixel(46, 20), BLACK);
}

#[test]
fn zone_title_is_drawn_inside_the_border() {
    let annotator = with(1, vec![]);
    let image = render(&annotator, 1, &solid(40, 30, GRAY));
    assert_eq!(*image.get_pixel(41, 1), LIME);
    assert_eq!(*image.get_pixel(44, 10), LIME);
    assert_eq!(*image.get_pixel(45, 5), BLACK);
    assert_eq!(*image.get_pixel(41, 11), BLACK);
}

#[test]
fn text_uses_the_zone_style_and_zone_origin() {
    let annotator = with(1, vec![Annotation::text("captions", (2, 4), "AB")]);
    let image = render(&annotator, 1, &solid(40, 30, GRAY));

    assert_eq!(*image.get_pixel(2, 34), RED);
    assert_eq!(*image.get_pixel(5, 43), RED);
    assert_eq!(*image.get_pixel(7, 34), RED);
    assert_eq!(*image.get_pixel(6, 34), BLACK);
    assert_eq!(*image.get_pixel(11, 34), BLACK);
    assert_eq!(*image.get_pixel(2, 44), BLACK);
}

#[test]
fn fill_paints_the_line_box_behind_text() {
    let annotator = with(1, vec![Annotation::text("captions", (2, 4), "AB").with_fill(true)]);
    let image = render(&annotator, 1, &solid(40, 30, GRAY));

    assert_eq!(*image.get_pixel(2, 34), RED);
    assert_eq!(*image.get_pixel(6, 34), BLUE);
    assert_eq!(*image.get_pixel(11, 43), BLUE);
    assert_eq!(*image.get_pixel(12, 34), BLACK);
    assert_eq!(*image.get_pixel(2, 44), BLACK);
}

#[test]
fn later_annotations_draw_over_earlier_ones() {
    let red_then_lime = with(
        10,
        vec![Annotation::text("captions", (2, 4), "A"), Annotation::text("captions", (2, 4), "A").with_style("alt")],
    );
    let lime_then_red = with(
        10,
        vec![Annotation::text("captions", (2, 4), "A").with_style("alt"), Annotation::text("captions", (2, 4), "A")],
    );
    let source = solid(40, 30, GRAY);
    assert_eq!(*render(&red_then_lime, 10, &source).get_pixel(3, 35), LIME);
    assert_eq!(*render(&lime_then_red, 10, &source).get_pixel(3, 35), RED);
}

#[test]
fn annotations_only_appear_on_their_frame() {
    let annotator = with(10, vec![Annotation::text("captions", (2, 4), "A")]);
    let source = solid(40, 30, GRAY);
    assert_eq!(*render(&annotator, 10, &source).get_pixel(3, 35), RED);
    assert_eq!(*render(&annotator, 9, &source).get_pixel(3, 35), BLACK);
    assert_eq!(*render(&annotator, 11, &source).get_pixel(3, 35), BLACK);
}

#[test]
fn box_without_label_draws_only_its_border() {
    let annotator = with(1, vec![Annotation::boxed("content", (5, 5), (10, 8), "").with_style("cap")]);
    let image = render(&annotator, 1, &solid(40, 30, BLACK));

    assert_eq!(count(&image, RED), 36);
    assert_eq!(count(&image, BLUE), 44);
    assert_eq!(*image.get_pixel(5, 5), RED);
    assert_eq!(*image.get_pixel(15, 13), RED);
    assert_eq!(*image.get_pixel(4, 4), BLUE);
    assert_eq!(*image.get_pixel(16, 14), BLUE);
    assert_eq!(*image.get_pixel(10, 9), BLACK);
}

#[test]
fn box_label_sits_on_the_top_edge() {
    let annotator = with(1, vec![Annotation::boxed("content", (5, 15), (10, 8), "AB").with_style("cap")]);
    let image = render(&annotator, 1, &solid(40, 30, BLACK));

    assert_eq!(*image.get_pixel(5, 5), RED);
    assert_eq!(*image.get_pixel(8, 14), RED);
    assert_eq!(*image.get_pixel(9, 10), BLUE);
    assert_eq!(*image.get_pixel(14, 14), BLUE);
    assert_eq!(*image.get_pixel(15, 10), BLACK);
    assert_eq!(*image.get_pixel(5, 4), BLACK);
    assert_eq!(*image.get_pixel(5, 15), RED);
    assert_eq!(*image.get_pixel(10, 23), RED);
    assert_eq!(*image.get_pixel(4, 20), BLUE);
}

#[test]
fn missing_glyph_skips_only_that_annotation() {
    let annotator = with(
        2,
        vec![Annotation::text("captions", (2, 4), "café"), Annotation::text("captions", (20, 4), "ok")],
    );
    let composite = annotator.annotate_frame(2, &solid(40, 30, GRAY)).unwrap();

    assert_eq!(composite.failures, vec![(0, FrameDrawError::MissingGlyph { ch: 'é' })]);
    assert_eq!(*composite.image.get_pixel(2, 34), BLACK);
    assert_eq!(*composite.image.get_pixel(20, 34), RED);
}

#[test]
fn unrenderable_box_label_leaves_no_border() {
    let annotator = with(3, vec![Annotation::boxed("content", (5, 5), (10, 8), "ñ").with_style("cap")]);
    let composite = annotator.annotate_frame(3, &solid(40, 30, BLACK)).unwrap();
    assert_eq!(composite.failures.len(), 1);
    assert_eq!(count(&composite.image, RED), 0);
    assert_eq!(count(&composite.image, BLUE), 0);
}

#[test]
fn wrong_source_size_fails_the_frame() {
    let annotator = with(1, vec![]);
    let err = annotator.annotate_frame(1, &solid(10, 10, GRAY)).unwrap_err();
    assert_eq!(err, FrameDrawError::SizeMismatch { expected: (40, 30), actual: (10, 10) });
}

#[test]
fn off_canvas_drawing_is_clipped() {
    let annotator = with(
        4,
        vec![
            Annotation::text("content", (-100, -100), "far away").with_fill(true),
            Annotation::boxed("labels", (5, 45), (100, 100), "edge"),
        ],
    );
    let image = render(&annotator, 4, &solid(40, 30, GRAY));
    assert_eq!(image.dimensions(), (52, 50));
}

#[test]
fn rendering_is_deterministic() {
    let annotator = with(
        6,
        vec![
            Annotation::boxed("content", (3, 3), (20, 12), "cat").with_style("alt"),
            Annotation::text("captions", (1, 1), "meow").with_fill(true),
        ],
    );
    let mut source = solid(40, 30, GRAY);
    source.put_pixel(7, 7, Rgb([1, 2, 3]));
    let first = render(&annotator, 6, &source);
    let second = render(&annotator, 6, &source);
    assert_eq!(first.as_raw(), second.as_raw());
}
