//! Interactive cropping.
//!
//! A crop always copies from the retained full-resolution original, never from
//! the working copy, so repeated crops do not lose resolution.

use log::{debug, info, warn};

use crate::document::Document;
use crate::error::CropError;
use crate::geometry::{PixelRect, Rect};
use crate::render::{self, GuideStyle, RenderPipeline};
use crate::tool::Selection;

/// Selections must be larger than this, in pixels, on both axes.
pub const MIN_CROP_SIZE: u32 = 1;

/// Result of a committed crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropOutcome {
    /// Region of the original image the new bitmap was cut from.
    pub source: PixelRect,
    pub width: u32,
    pub height: u32,
    pub dropped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CropEngine {
    guides: GuideStyle,
}

impl CropEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches guide thickness to how many bitmap pixels one display pixel covers.
    pub fn set_display_scale(&mut self, bitmap_px_per_display_px: f64) {
        self.guides = GuideStyle::for_scale(bitmap_px_per_display_px);
    }

    pub fn preview(&self, pipeline: &mut RenderPipeline, document: &Document, selection: Selection) {
        let bounds = current_bounds(document);
        let rect = selection.rect().clamp_to(bounds.0, bounds.1);
        pipeline.show_crop_guides(document, rect, self.guides);
    }

    pub fn cancel(&self, pipeline: &mut RenderPipeline, document: &Document) {
        pipeline.redraw(document);
    }

    /// Commits `selection`. On error the document is untouched and the view
    /// is restored to the last valid state.
    pub fn commit(
        &self,
        pipeline: &mut RenderPipeline,
        document: &mut Document,
        selection: Selection,
    ) -> Result<CropOutcome, CropError> {
        let result = complete_crop(document, selection.rect());
        match &result {
            Ok(outcome) => info!(
                "cropped to {}x{} from original region {:?}, {} element(s) dropped",
                outcome.width, outcome.height, outcome.source, outcome.dropped
            ),
            Err(err) => warn!("crop aborted: {err}"),
        }
        pipeline.redraw(document);
        result
    }
}

fn current_bounds(document: &Document) -> (f64, f64) {
    let bitmap = document.bitmap();
    (f64::from(bitmap.width()), f64::from(bitmap.height()))
}

/// Crops `document` to `selection` (current bitmap space).
///
/// The selection is normalized and clamped to the working bitmap, mapped into
/// original-image space by the working-copy scale factors, rounded and clamped
/// there, and copied 1:1 from the original. Elements are re-projected by the
/// document.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn complete_crop(document: &mut Document, selection: Rect) -> Result<CropOutcome, CropError> {
    let (cur_w, cur_h) = current_bounds(document);
    let clamped = selection.clamp_to(cur_w, cur_h);
    if clamped.width <= f64::from(MIN_CROP_SIZE) || clamped.height <= f64::from(MIN_CROP_SIZE) {
        return Err(CropError::TooSmall {
            width: clamped.width.max(0.0) as u32,
            height: clamped.height.max(0.0) as u32,
        });
    }

    let (scale_x, scale_y) = document.scale_factors();
    let original = document.original();
    let source = to_source_region(clamped, scale_x, scale_y, original.width(), original.height());
    debug!("crop selection {clamped:?} maps to original region {source:?}");

    let cropped = render::copy_region(original, source)?;
    let before = document.elements().len();
    document.replace_source_bitmap(cropped, source);

    Ok(CropOutcome {
        source,
        width: source.width,
        height: source.height,
        dropped: before - document.elements().len(),
    })
}

/// Scales a working-space rectangle into the original and clamps it there,
/// keeping at least one pixel on each axis.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_source_region(rect: Rect, scale_x: f64, scale_y: f64, orig_w: u32, orig_h: u32) -> PixelRect {
    let (ow, oh) = (f64::from(orig_w), f64::from(orig_h));
    let sx = (rect.x * scale_x).round().clamp(0.0, (ow - 1.0).max(0.0));
    let sy = (rect.y * scale_y).round().clamp(0.0, (oh - 1.0).max(0.0));
    let sw = (rect.width * scale_x).round().clamp(1.0, (ow - sx).max(1.0));
    let sh = (rect.height * scale_y).round().clamp(1.0, (oh - sy).max(1.0));
    PixelRect::new(sx as u32, sy as u32, sw as u32, sh as u32)
}
