//! Display and export rendering.
//!
//! Both renders are pure functions of the [`Document`]. The [`RenderPipeline`]
//! owns the display surface the shell uploads, plus the transient previews
//! (crop guides, in-progress redaction) drawn on top of it.

use image::{Pixel, Rgba, RgbaImage, imageops};

use crate::document::Document;
use crate::error::CropError;
use crate::geometry::{PixelRect, Rect};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const MASK: Rgba<u8> = Rgba([0, 0, 0, 128]);
const PLACEHOLDER: Rgba<u8> = Rgba([48, 48, 52, 255]);

/// Size of the placeholder surface shown after a load failure.
pub const PLACEHOLDER_SIZE: (u32, u32) = (480, 270);

/// Composes the bitmap 1:1 with every element on top, in insertion order.
pub fn render_display(document: &Document) -> RgbaImage {
    let mut surface = document.bitmap().pixels().clone();
    let (w, h) = surface.dimensions();
    for element in document.elements() {
        if let Some(rect) = element.bounds().to_pixel_rect(w, h) {
            fill_rect(&mut surface, rect, element.color);
        }
    }
    surface
}

/// Flattens the document at original resolution onto an opaque white
/// background. Element coordinates are projected by the working-copy scale
/// and rounded so redaction edges are solid.
pub fn render_export(document: &Document) -> RgbaImage {
    let original = document.original();
    let (w, h) = original.dimensions();
    let mut out = RgbaImage::from_pixel(w, h, WHITE);
    imageops::overlay(&mut out, original, 0, 0);

    let (scale_x, scale_y) = document.scale_factors();
    for element in document.elements() {
        let bounds = element.bounds();
        let projected = Rect::new(
            bounds.x * scale_x,
            bounds.y * scale_y,
            bounds.width * scale_x,
            bounds.height * scale_y,
        );
        if let Some(rect) = projected.to_pixel_rect(w, h) {
            fill_rect(&mut out, rect, element.color);
        }
    }
    out
}

/// Copies `region` of `source` into a fresh buffer without resampling.
/// Zero-size or out-of-bounds regions are errors rather than no-ops.
pub fn copy_region(source: &RgbaImage, region: PixelRect) -> Result<RgbaImage, CropError> {
    if region.is_empty() {
        return Err(CropError::ZeroSizeCopy {
            width: region.width,
            height: region.height,
        });
    }
    if !region.fits_within(source.width(), source.height()) {
        return Err(CropError::OutOfBounds {
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            bounds_w: source.width(),
            bounds_h: source.height(),
        });
    }
    Ok(imageops::crop_imm(source, region.x, region.y, region.width, region.height).to_image())
}

/// Fills `rect` with `color`, alpha-blending translucent colors.
pub fn fill_rect(target: &mut RgbaImage, rect: PixelRect, color: Rgba<u8>) {
    let x_end = (rect.x + rect.width).min(target.width());
    let y_end = (rect.y + rect.height).min(target.height());
    for y in rect.y..y_end {
        for x in rect.x..x_end {
            if color[3] == 255 {
                target.put_pixel(x, y, color);
            } else {
                target.get_pixel_mut(x, y).blend(&color);
            }
        }
    }
}

/// Line and handle sizes for the crop guides, in bitmap pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuideStyle {
    pub line_width: u32,
    pub dash: u32,
    pub handle: u32,
}

impl GuideStyle {
    /// Keeps guides a constant on-screen size for a canvas shown at
    /// `bitmap_px_per_display_px`.
    pub fn for_scale(bitmap_px_per_display_px: f64) -> Self {
        let px = bitmap_px_per_display_px.max(0.25);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let size = |display: f64| ((display * px).round() as u32).max(1);
        Self {
            line_width: size(1.5),
            dash: size(6.0),
            handle: size(8.0),
        }
    }
}

impl Default for GuideStyle {
    fn default() -> Self {
        Self::for_scale(1.0)
    }
}

/// Dims everything outside `selection`, then draws a dashed border and four
/// corner handles. Purely visual.
pub fn draw_crop_guides(target: &mut RgbaImage, selection: Rect, style: GuideStyle) {
    let (w, h) = target.dimensions();
    let sel = selection.to_pixel_rect(w, h);
    let inside = |x: u32, y: u32| {
        sel.is_some_and(|s| x >= s.x && x < s.x + s.width && y >= s.y && y < s.y + s.height)
    };
    for (x, y, pixel) in target.enumerate_pixels_mut() {
        if !inside(x, y) {
            pixel.blend(&MASK);
        }
    }

    let Some(sel) = sel else {
        return;
    };
    let right = sel.x + sel.width - 1;
    let bottom = sel.y + sel.height - 1;
    let dash_color = |along: u32| {
        if (along / style.dash) % 2 == 0 {
            WHITE
        } else {
            BLACK
        }
    };
    for t in 0..style.line_width {
        for x in sel.x..=right {
            let c = dash_color(x - sel.x);
            put_clipped(target, x, sel.y.saturating_add(t), c);
            put_clipped(target, x, bottom.saturating_sub(t), c);
        }
        for y in sel.y..=bottom {
            let c = dash_color(y - sel.y);
            put_clipped(target, sel.x.saturating_add(t), y, c);
            put_clipped(target, right.saturating_sub(t), y, c);
        }
    }

    let half = style.handle / 2;
    for (cx, cy) in [(sel.x, sel.y), (right, sel.y), (sel.x, bottom), (right, bottom)] {
        let handle = PixelRect::new(
            cx.saturating_sub(half),
            cy.saturating_sub(half),
            style.handle,
            style.handle,
        );
        fill_rect(target, handle, WHITE);
    }
}

fn put_clipped(target: &mut RgbaImage, x: u32, y: u32, color: Rgba<u8>) {
    if x < target.width() && y < target.height() {
        target.put_pixel(x, y, color);
    }
}

/// The display surface plus the transient preview state drawn over it.
#[derive(Debug)]
pub struct RenderPipeline {
    surface: RgbaImage,
    /// Pixels captured when an annotate drag began; restored every frame.
    snapshot: Option<RgbaImage>,
    dirty: bool,
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPipeline {
    pub fn new() -> Self {
        let (w, h) = PLACEHOLDER_SIZE;
        Self {
            surface: RgbaImage::from_pixel(w, h, PLACEHOLDER),
            snapshot: None,
            dirty: true,
        }
    }

    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    /// Returns whether the surface changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn redraw(&mut self, document: &Document) {
        self.snapshot = None;
        self.surface = render_display(document);
        self.dirty = true;
    }

    pub fn show_placeholder(&mut self) {
        let (w, h) = PLACEHOLDER_SIZE;
        self.snapshot = None;
        self.surface = RgbaImage::from_pixel(w, h, PLACEHOLDER);
        self.dirty = true;
    }

    pub fn show_crop_guides(&mut self, document: &Document, selection: Rect, style: GuideStyle) {
        self.surface = render_display(document);
        draw_crop_guides(&mut self.surface, selection, style);
        self.dirty = true;
    }

    pub fn begin_annotate_preview(&mut self) {
        self.snapshot = Some(self.surface.clone());
    }

    /// Draws the in-progress rectangle over the pre-drag pixels, so earlier
    /// frames never accumulate.
    pub fn update_annotate_preview(&mut self, rect: Rect, color: Rgba<u8>) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        self.surface.clone_from(snapshot);
        let (w, h) = self.surface.dimensions();
        if let Some(rect) = rect.to_pixel_rect(w, h) {
            fill_rect(&mut self.surface, rect, color);
        }
        self.dirty = true;
    }

    pub fn cancel_annotate_preview(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.surface = snapshot;
            self.dirty = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([x as u8, y as u8, 7, 255]))
    }

    #[test]
    fn display_draws_elements_in_order() {
        let mut doc = Document::new(gradient(20, 20), None);
        doc.add_element(Rect::new(0.0, 0.0, 10.0, 10.0), RED);
        doc.add_element(Rect::new(5.0, 5.0, 10.0, 10.0), BLACK);
        let out = render_display(&doc);
        assert_eq!(*out.get_pixel(2, 2), RED);
        assert_eq!(*out.get_pixel(7, 7), BLACK, "later element is on top");
        assert_eq!(*out.get_pixel(18, 18), Rgba([18, 18, 7, 255]));
    }

    #[test]
    fn export_of_untouched_document_equals_source_on_white() {
        let mut source = gradient(8, 8);
        source.put_pixel(3, 3, Rgba([10, 20, 30, 0]));
        let doc = Document::new(source.clone(), None);
        let out = render_export(&doc);

        let mut expected = RgbaImage::from_pixel(8, 8, WHITE);
        imageops::overlay(&mut expected, &source, 0, 0);
        assert_eq!(out, expected);
        assert!(out.pixels().all(|p| p[3] == 255), "export must be opaque");
    }

    #[test]
    fn export_rounds_redaction_edges() {
        let mut doc = Document::new(gradient(10, 10), None);
        doc.add_element(Rect::new(2.4, 2.6, 3.2, 2.0), BLACK);
        let out = render_export(&doc);
        assert_eq!(*out.get_pixel(2, 3), BLACK);
        assert_eq!(*out.get_pixel(4, 4), BLACK);
        assert_ne!(*out.get_pixel(5, 3), BLACK);
        assert_ne!(*out.get_pixel(2, 2), BLACK);
    }

    #[test]
    fn export_renders_at_original_resolution() {
        let mut doc = Document::new(gradient(200, 100), Some(100));
        doc.add_element(Rect::new(10.0, 10.0, 5.0, 5.0), BLACK);
        let out = render_export(&doc);
        assert_eq!(out.dimensions(), (200, 100));
        assert_eq!(*out.get_pixel(20, 20), BLACK);
        assert_eq!(*out.get_pixel(29, 29), BLACK);
        assert_ne!(*out.get_pixel(30, 30), BLACK);
    }

    #[test]
    fn zero_size_copy_is_an_error() {
        let src = gradient(10, 10);
        assert!(matches!(
            copy_region(&src, PixelRect::new(2, 2, 0, 4)),
            Err(CropError::ZeroSizeCopy { .. })
        ));
        assert!(matches!(
            copy_region(&src, PixelRect::new(8, 8, 4, 4)),
            Err(CropError::OutOfBounds { .. })
        ));
        let ok = copy_region(&src, PixelRect::new(2, 3, 4, 5)).unwrap();
        assert_eq!(ok.dimensions(), (4, 5));
        assert_eq!(*ok.get_pixel(0, 0), *src.get_pixel(2, 3));
    }

    #[test]
    fn annotate_preview_does_not_accumulate() {
        let doc = Document::new(gradient(20, 20), None);
        let mut pipeline = RenderPipeline::new();
        pipeline.redraw(&doc);
        pipeline.begin_annotate_preview();
        pipeline.update_annotate_preview(Rect::new(0.0, 0.0, 10.0, 10.0), RED);
        pipeline.update_annotate_preview(Rect::new(0.0, 0.0, 4.0, 4.0), RED);
        assert_eq!(*pipeline.surface().get_pixel(2, 2), RED);
        assert_eq!(*pipeline.surface().get_pixel(8, 8), Rgba([8, 8, 7, 255]));

        pipeline.cancel_annotate_preview();
        assert_eq!(pipeline.surface(), &render_display(&doc));
    }

    #[test]
    fn crop_guides_dim_only_outside() {
        let doc = Document::new(RgbaImage::from_pixel(40, 40, Rgba([200, 200, 200, 255])), None);
        let mut pipeline = RenderPipeline::new();
        pipeline.show_crop_guides(&doc, Rect::new(10.0, 10.0, 20.0, 20.0), GuideStyle::default());
        let s = pipeline.surface();
        assert!(s.get_pixel(2, 20)[0] < 200, "outside is dimmed");
        assert_eq!(s.get_pixel(20, 20)[0], 200, "inside is untouched");
    }
}
