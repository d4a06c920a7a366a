//! The editable document: one source bitmap plus an ordered list of redaction
//! rectangles drawn on top of it.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use log::debug;

use crate::geometry::{PixelRect, Rect};

pub type ElementId = u64;

/// Annotations smaller than this (in bitmap pixels, on either axis) are
/// treated as accidental clicks.
pub const MIN_ELEMENT_SIZE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Rect,
}

/// A committed redaction rectangle in current bitmap pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayElement {
    pub id: ElementId,
    pub kind: ElementKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: Rgba<u8>,
}

impl OverlayElement {
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    fn set_bounds(&mut self, rect: Rect) {
        self.x = rect.x;
        self.y = rect.y;
        self.width = rect.width;
        self.height = rect.height;
    }
}

/// Immutable pixel buffer currently being edited.
#[derive(Debug, Clone)]
pub struct SourceBitmap {
    pixels: RgbaImage,
}

impl SourceBitmap {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    bitmap: SourceBitmap,
    /// Full-resolution image retained when the working bitmap was downscaled.
    original: Option<RgbaImage>,
    elements: Vec<OverlayElement>,
    next_id: ElementId,
}

impl Document {
    /// Seeds a document from a decoded capture. When `max_working_size` is set
    /// and the capture is larger, editing happens on a downscaled copy while
    /// the original is kept for cropping and export.
    pub fn new(image: RgbaImage, max_working_size: Option<u32>) -> Self {
        let (width, height) = image.dimensions();
        let longest = width.max(height);
        let (bitmap, original) = match max_working_size {
            Some(max) if max > 0 && longest > max => {
                let ratio = f64::from(max) / f64::from(longest);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let (w, h) = (
                    ((f64::from(width) * ratio).round() as u32).max(1),
                    ((f64::from(height) * ratio).round() as u32).max(1),
                );
                debug!("working copy downscaled from {width}x{height} to {w}x{h}");
                let working = imageops::resize(&image, w, h, FilterType::Triangle);
                (SourceBitmap::new(working), Some(image))
            }
            _ => (SourceBitmap::new(image), None),
        };

        Self {
            bitmap,
            original,
            elements: Vec::new(),
            next_id: 1,
        }
    }

    pub fn bitmap(&self) -> &SourceBitmap {
        &self.bitmap
    }

    /// The full-resolution image crops copy from and exports render at.
    pub fn original(&self) -> &RgbaImage {
        self.original.as_ref().unwrap_or(&self.bitmap.pixels)
    }

    /// `original / working` per axis; both 1 unless the working copy is scaled.
    pub fn scale_factors(&self) -> (f64, f64) {
        let original = self.original();
        (
            f64::from(original.width()) / f64::from(self.bitmap.width()),
            f64::from(original.height()) / f64::from(self.bitmap.height()),
        )
    }

    pub fn elements(&self) -> &[OverlayElement] {
        &self.elements
    }

    pub fn element(&self, id: ElementId) -> Option<&OverlayElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Appends a redaction rectangle on top of the existing ones. The rectangle
    /// is normalized and clipped to the bitmap first; anything not larger than
    /// [`MIN_ELEMENT_SIZE`] on both axes is rejected.
    pub fn add_element(&mut self, rect: Rect, color: Rgba<u8>) -> Option<ElementId> {
        let rect = Rect::new(rect.x, rect.y, rect.width.abs(), rect.height.abs())
            .clamp_to(f64::from(self.bitmap.width()), f64::from(self.bitmap.height()));
        if rect.width <= MIN_ELEMENT_SIZE || rect.height <= MIN_ELEMENT_SIZE {
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.elements.push(OverlayElement {
            id,
            kind: ElementKind::Rect,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            color,
        });
        Some(id)
    }

    pub fn remove_element(&mut self, id: ElementId) -> bool {
        let before = self.elements.len();
        self.elements.retain(|e| e.id != id);
        self.elements.len() != before
    }

    pub fn clear_elements(&mut self) {
        self.elements.clear();
    }

    /// Swaps in a cropped bitmap cut from `source_region` of the original and
    /// re-bases every element into its coordinate space. Elements left without
    /// any overlap are dropped, partially visible ones are clipped.
    ///
    /// The cropped bitmap becomes the new original, so the scale factors of
    /// any later crop are measured against it.
    pub fn replace_source_bitmap(&mut self, new_bitmap: RgbaImage, source_region: PixelRect) {
        let scale = self.scale_factors();
        let (new_w, new_h) = (
            f64::from(new_bitmap.width()),
            f64::from(new_bitmap.height()),
        );

        let elements = self
            .elements
            .iter()
            .filter_map(|element| {
                let projected = reproject(element.bounds(), scale, source_region);
                if !projected.overlaps_bounds(new_w, new_h) {
                    debug!("element {} dropped by crop", element.id);
                    return None;
                }
                let mut element = element.clone();
                element.set_bounds(projected.clamp_to(new_w, new_h));
                Some(element)
            })
            .collect();

        self.bitmap = SourceBitmap::new(new_bitmap);
        self.original = None;
        self.elements = elements;
    }
}

/// Scales a working-space rectangle into original space and translates it so
/// `source_region`'s corner becomes the origin. Components are rounded to
/// whole pixels.
pub fn reproject(rect: Rect, scale: (f64, f64), source_region: PixelRect) -> Rect {
    let (scale_x, scale_y) = scale;
    Rect::new(
        (rect.x * scale_x - f64::from(source_region.x)).round(),
        (rect.y * scale_y - f64::from(source_region.y)).round(),
        (rect.width * scale_x).round(),
        (rect.height * scale_y).round(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn doc(w: u32, h: u32) -> Document {
        Document::new(RgbaImage::new(w, h), None)
    }

    #[test]
    fn ids_are_unique_and_order_is_kept() {
        let mut d = doc(100, 100);
        let a = d.add_element(Rect::new(0.0, 0.0, 10.0, 10.0), BLACK);
        let b = d.add_element(Rect::new(5.0, 5.0, 10.0, 10.0), BLACK);
        assert_ne!(a, b);
        let ids: Vec<_> = d.elements().iter().map(|e| Some(e.id)).collect();
        assert_eq!(ids, vec![a, b], "insertion order is z-order");
    }

    #[test]
    fn tiny_rectangles_are_rejected() {
        let mut d = doc(100, 100);
        assert_eq!(d.add_element(Rect::new(10.0, 10.0, 1.0, 1.0), BLACK), None);
        assert_eq!(d.add_element(Rect::new(10.0, 10.0, 40.0, 1.0), BLACK), None);
        assert!(d.elements().is_empty());
    }

    #[test]
    fn added_rectangles_are_clipped_to_the_bitmap() {
        let mut d = doc(50, 50);
        let id = d.add_element(Rect::new(40.0, 40.0, 30.0, 30.0), BLACK).unwrap();
        assert_eq!(d.element(id).unwrap().bounds(), Rect::new(40.0, 40.0, 10.0, 10.0));
    }

    #[test]
    fn remove_and_clear() {
        let mut d = doc(100, 100);
        let id = d.add_element(Rect::new(0.0, 0.0, 10.0, 10.0), BLACK).unwrap();
        d.add_element(Rect::new(20.0, 0.0, 10.0, 10.0), BLACK);
        assert!(d.remove_element(id));
        assert!(!d.remove_element(id));
        assert_eq!(d.elements().len(), 1);
        d.clear_elements();
        assert!(d.elements().is_empty());
    }

    #[test]
    fn downscaled_working_copy_keeps_original() {
        let d = Document::new(RgbaImage::new(2000, 1000), Some(1000));
        assert_eq!((d.bitmap().width(), d.bitmap().height()), (1000, 500));
        assert_eq!(d.original().dimensions(), (2000, 1000));
        assert_eq!(d.scale_factors(), (2.0, 2.0));
    }

    #[test]
    fn reproject_matches_manual_scale_and_translate() {
        let r = reproject(
            Rect::new(150.5, 152.0, 20.2, 19.6),
            (2.0, 2.0),
            PixelRect::new(200, 200, 400, 300),
        );
        assert_eq!(r, Rect::new(101.0, 104.0, 40.0, 39.0));
    }

    #[test]
    fn replacing_bitmap_drops_and_clips_elements() {
        let mut d = doc(800, 600);
        let outside = d.add_element(Rect::new(50.0, 50.0, 20.0, 20.0), BLACK).unwrap();
        let inside = d.add_element(Rect::new(150.0, 150.0, 20.0, 20.0), BLACK).unwrap();
        let partial = d.add_element(Rect::new(90.0, 240.0, 40.0, 40.0), BLACK).unwrap();

        d.replace_source_bitmap(RgbaImage::new(200, 150), PixelRect::new(100, 100, 200, 150));

        assert!(d.element(outside).is_none());
        assert_eq!(d.element(inside).unwrap().bounds(), Rect::new(50.0, 50.0, 20.0, 20.0));
        assert_eq!(d.element(partial).unwrap().bounds(), Rect::new(0.0, 140.0, 30.0, 10.0));
        assert_eq!(d.scale_factors(), (1.0, 1.0));
    }
}
