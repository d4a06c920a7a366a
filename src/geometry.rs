//! Points, rectangles and the display → bitmap coordinate mapper.

/// A position in either display or bitmap space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle stored as min corner plus non-negative size.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Normalized rectangle spanned by two arbitrary corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        let (min_x, max_x) = if a.x < b.x { (a.x, b.x) } else { (b.x, a.x) };
        let (min_y, max_y) = if a.y < b.y { (a.y, b.y) } else { (b.y, a.y) };
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Intersection with `[0, width] × [0, height]`. Degenerate results keep a
    /// zero size rather than going negative.
    pub fn clamp_to(&self, width: f64, height: f64) -> Self {
        let x0 = self.x.clamp(0.0, width);
        let y0 = self.y.clamp(0.0, height);
        let x1 = self.right().clamp(0.0, width);
        let y1 = self.bottom().clamp(0.0, height);
        Self::new(x0, y0, (x1 - x0).max(0.0), (y1 - y0).max(0.0))
    }

    /// Whether any area of this rectangle falls inside `[0, width) × [0, height)`.
    pub fn overlaps_bounds(&self, width: f64, height: f64) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.x < width
            && self.y < height
            && self.right() > 0.0
            && self.bottom() > 0.0
    }

    /// Rounds each component independently, then clips to the given bounds.
    /// Returns `None` when nothing of the rectangle survives.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_pixel_rect(&self, bounds_w: u32, bounds_h: u32) -> Option<PixelRect> {
        let x0 = self.x.round();
        let y0 = self.y.round();
        let x1 = x0 + self.width.round();
        let y1 = y0 + self.height.round();

        let x0 = x0.clamp(0.0, f64::from(bounds_w));
        let y0 = y0.clamp(0.0, f64::from(bounds_h));
        let x1 = x1.clamp(0.0, f64::from(bounds_w));
        let y1 = y1.clamp(0.0, f64::from(bounds_h));
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(PixelRect::new(
            x0 as u32,
            y0 as u32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        ))
    }
}

/// Integer rectangle in bitmap pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn fits_within(&self, bounds_w: u32, bounds_h: u32) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(bounds_w)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(bounds_h)
    }
}

/// Maps pointer positions from the on-screen canvas rectangle to bitmap pixels.
///
/// The display rectangle is cached and must be refreshed whenever the
/// viewport or the bitmap changes size.
#[derive(Debug, Clone)]
pub struct CoordinateMapper {
    display: Rect,
    bitmap_width: u32,
    bitmap_height: u32,
    scale_x: f64,
    scale_y: f64,
}

impl CoordinateMapper {
    pub fn new(bitmap_width: u32, bitmap_height: u32) -> Self {
        let mut mapper = Self {
            display: Rect::new(0.0, 0.0, f64::from(bitmap_width), f64::from(bitmap_height)),
            bitmap_width,
            bitmap_height,
            scale_x: 1.0,
            scale_y: 1.0,
        };
        mapper.recompute();
        mapper
    }

    pub fn set_display_rect(&mut self, display: Rect) {
        self.display = display;
        self.recompute();
    }

    pub fn set_bitmap_size(&mut self, width: u32, height: u32) {
        self.bitmap_width = width;
        self.bitmap_height = height;
        self.recompute();
    }

    pub fn display_rect(&self) -> Rect {
        self.display
    }

    pub fn scale(&self) -> (f64, f64) {
        (self.scale_x, self.scale_y)
    }

    fn recompute(&mut self) {
        // A collapsed canvas maps 1:1 instead of dividing by zero.
        self.scale_x = if self.display.width > 0.0 {
            f64::from(self.bitmap_width) / self.display.width
        } else {
            1.0
        };
        self.scale_y = if self.display.height > 0.0 {
            f64::from(self.bitmap_height) / self.display.height
        } else {
            1.0
        };
    }

    pub fn to_bitmap_space(&self, display_point: Point) -> Point {
        let x = (display_point.x - self.display.x) * self.scale_x;
        let y = (display_point.y - self.display.y) * self.scale_y;
        Point::new(
            x.clamp(0.0, f64::from(self.bitmap_width)),
            y.clamp(0.0, f64::from(self.bitmap_height)),
        )
    }
}
