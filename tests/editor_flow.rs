//! End-to-end flows through `Editor::dispatch`, the way the shell drives it.

use std::time::Instant;

use image::{Rgba, RgbaImage};
use snapredact::error::{CropError, EditorError};
use snapredact::export::{DownloadSink, encode_png};
use snapredact::geometry::{Point, Rect};
use snapredact::handoff::{CAPTURE_KEY, CaptureHandoff, KeyValueStore, MemoryStore};
use snapredact::render::render_display;
use snapredact::tool::{Mode, Tool};
use snapredact::{Editor, InputEvent, Outcome, Status};
use tempfile::tempdir;

const GRAY: Rgba<u8> = Rgba([200, 200, 200, 255]);

/// An 800x600 capture shown at half size, offset inside the window.
fn half_size_editor() -> Editor {
    let mut editor = Editor::default();
    editor.load_image(RgbaImage::from_pixel(800, 600, GRAY));
    editor.dispatch(
        InputEvent::Resize(Rect::new(10.0, 20.0, 400.0, 300.0)),
        Instant::now(),
    );
    editor
}

fn drag(editor: &mut Editor, from: (f64, f64), to: (f64, f64)) -> Outcome {
    let now = Instant::now();
    editor.dispatch(InputEvent::PointerDown(Point::new(from.0, from.1)), now);
    editor.dispatch(InputEvent::PointerMove(Point::new(to.0, to.1)), now);
    editor.dispatch(InputEvent::PointerUp(Point::new(to.0, to.1)), now)
}

#[test]
fn crop_rebases_redactions_through_scaled_display() {
    let mut editor = half_size_editor();
    editor.dispatch(InputEvent::ActivateTool(Tool::Annotate), Instant::now());
    // Bitmap (50,50,20,20) and (150,150,20,20).
    assert!(matches!(drag(&mut editor, (35.0, 45.0), (45.0, 55.0)), Outcome::ElementAdded(_)));
    assert!(matches!(drag(&mut editor, (85.0, 95.0), (95.0, 105.0)), Outcome::ElementAdded(_)));

    editor.dispatch(InputEvent::ActivateTool(Tool::Crop), Instant::now());
    // Bitmap (100,100)-(300,250).
    let Outcome::Cropped(outcome) = drag(&mut editor, (60.0, 70.0), (160.0, 145.0)) else {
        panic!("crop should succeed");
    };
    assert_eq!((outcome.width, outcome.height), (200, 150));
    assert_eq!(outcome.dropped, 1);
    assert_eq!(editor.mode(), Mode::None);

    let document = editor.document().unwrap();
    assert_eq!(document.bitmap().width(), 200);
    assert_eq!(document.bitmap().height(), 150);
    let bounds = document.elements()[0].bounds();
    assert_eq!(bounds, Rect::new(50.0, 50.0, 20.0, 20.0));
    assert_eq!(editor.surface().dimensions(), (200, 150));
    assert_eq!(editor.surface().get_pixel(60, 60), &Rgba([0, 0, 0, 255]));
}

#[test]
fn one_pixel_annotation_is_discarded() {
    let mut editor = half_size_editor();
    editor.dispatch(InputEvent::ActivateTool(Tool::Annotate), Instant::now());
    let outcome = drag(&mut editor, (60.0, 70.0), (60.5, 70.5));
    assert!(matches!(outcome, Outcome::Cancelled));
    assert!(editor.document().unwrap().elements().is_empty());
    assert_eq!(editor.surface().get_pixel(100, 100), &GRAY);
}

#[test]
fn one_pixel_crop_fails_and_keeps_document() {
    let mut editor = half_size_editor();
    editor.dispatch(InputEvent::ActivateTool(Tool::Crop), Instant::now());
    let outcome = drag(&mut editor, (60.0, 70.0), (60.5, 70.5));
    let Outcome::Failed(err) = outcome else {
        panic!("expected a crop failure, got {outcome:?}");
    };
    assert!(matches!(err, EditorError::Crop(CropError::TooSmall { .. })));
    assert_eq!(err.user_message(), "Crop area too small");

    let bitmap = editor.document().unwrap().bitmap();
    assert_eq!((bitmap.width(), bitmap.height()), (800, 600));
    assert_eq!(editor.mode(), Mode::Crop, "crop mode stays active after a failed crop");
    assert_eq!(editor.surface().get_pixel(0, 0), &GRAY, "guides are cleared");
}

#[test]
fn activating_a_tool_cancels_the_other_drag() {
    let mut editor = half_size_editor();
    let now = Instant::now();
    editor.dispatch(InputEvent::ActivateTool(Tool::Annotate), now);
    editor.dispatch(InputEvent::PointerDown(Point::new(30.0, 30.0)), now);
    editor.dispatch(InputEvent::PointerMove(Point::new(80.0, 80.0)), now);
    assert!(editor.is_dragging());

    let outcome = editor.dispatch(InputEvent::ActivateTool(Tool::Crop), now);
    assert!(matches!(outcome, Outcome::Cancelled));
    assert_eq!(editor.mode(), Mode::Crop);
    assert!(!editor.is_dragging());
    assert!(editor.document().unwrap().elements().is_empty());

    editor.dispatch(InputEvent::ToggleTool(Tool::Crop), now);
    assert_eq!(editor.mode(), Mode::None);
}

#[test]
fn leaving_the_canvas_cancels_without_committing() {
    let mut editor = half_size_editor();
    let now = Instant::now();
    editor.dispatch(InputEvent::ActivateTool(Tool::Annotate), now);
    editor.dispatch(InputEvent::PointerDown(Point::new(30.0, 30.0)), now);
    editor.dispatch(InputEvent::PointerMove(Point::new(80.0, 80.0)), now);

    assert!(matches!(editor.dispatch(InputEvent::PointerLeave, now), Outcome::Cancelled));
    assert!(matches!(
        editor.dispatch(InputEvent::PointerUp(Point::new(90.0, 90.0)), now),
        Outcome::Ignored
    ));
    assert_eq!(editor.mode(), Mode::Annotate);
    assert!(editor.document().unwrap().elements().is_empty());
    assert_eq!(editor.surface().get_pixel(60, 60), &GRAY);
}

#[test]
fn leaving_the_canvas_discards_the_crop_selection() {
    let mut editor = half_size_editor();
    let now = Instant::now();
    editor.dispatch(InputEvent::ActivateTool(Tool::Crop), now);
    editor.dispatch(InputEvent::PointerDown(Point::new(60.0, 70.0)), now);
    editor.dispatch(InputEvent::PointerMove(Point::new(160.0, 145.0)), now);
    let clean = render_display(editor.document().unwrap());
    assert_ne!(editor.surface(), &clean, "guides are drawn while dragging");

    assert!(matches!(editor.dispatch(InputEvent::PointerLeave, now), Outcome::Cancelled));
    let document = editor.document().unwrap();
    assert_eq!(editor.surface(), &render_display(document));
    assert_eq!((document.bitmap().width(), document.bitmap().height()), (800, 600));
    assert_eq!(editor.mode(), Mode::Crop);
    assert!(!editor.is_dragging());
}

#[test]
fn export_after_load_is_the_capture_on_white() {
    let mut source = RgbaImage::from_pixel(16, 8, Rgba([10, 20, 30, 255]));
    source.put_pixel(3, 3, Rgba([0, 0, 0, 0]));
    let mut editor = Editor::default();
    editor.load_image(source.clone());

    let flat = editor.flatten().unwrap();
    assert_eq!(flat.dimensions(), (16, 8));
    assert_eq!(flat.get_pixel(0, 0), source.get_pixel(0, 0));
    assert_eq!(flat.get_pixel(3, 3), &Rgba([255, 255, 255, 255]));
}

#[test]
fn capture_handoff_opens_in_crop_mode_and_is_consumed() {
    let png = encode_png(&RgbaImage::from_pixel(32, 24, GRAY)).unwrap();
    let mut store = MemoryStore::new();
    CaptureHandoff::new(png, true)
        .publish(&mut store, CAPTURE_KEY)
        .unwrap();

    let mut editor = Editor::default();
    editor.load_from_store(&mut store, CAPTURE_KEY).unwrap();
    assert_eq!(editor.status(), &Status::Ready);
    assert_eq!(editor.mode(), Mode::Crop);
    assert_eq!(store.get(CAPTURE_KEY).unwrap(), None);

    assert!(editor.load_from_store(&mut store, CAPTURE_KEY).is_err());
    assert!(matches!(editor.status(), Status::Failed(_)));
    assert_eq!(editor.mode(), Mode::None);
}

#[test]
fn export_writes_redacted_png_to_download_folder() {
    let dir = tempdir().unwrap();
    let mut editor = Editor::default();
    editor.load_image(RgbaImage::from_pixel(40, 30, GRAY));
    editor.dispatch(InputEvent::Resize(Rect::new(0.0, 0.0, 40.0, 30.0)), Instant::now());
    editor.dispatch(InputEvent::ActivateTool(Tool::Annotate), Instant::now());
    drag(&mut editor, (5.0, 5.0), (15.0, 15.0));

    let mut sink = DownloadSink::new(dir.path(), "Redacted");
    let path = editor.export_to(&mut sink).unwrap();
    assert!(path.ends_with(".png"));

    let saved = image::open(&path).unwrap().to_rgba8();
    assert_eq!(saved.dimensions(), (40, 30));
    assert_eq!(saved.get_pixel(10, 10), &Rgba([0, 0, 0, 255]));
    assert_eq!(saved.get_pixel(20, 20), &GRAY);
}
