//! North-up affine georeferencing of a pixel grid.

use naturalness_common::BoundingBox;

/// Maps pixel indices to WGS84 coordinates for a north-up grid.
///
/// `x = west + col * pixel_width`, `y = north - row * pixel_height`; pixel
/// `(row, col)` covers the cell whose top-left corner is at that point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub west: f64,
    pub north: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub width: usize,
    pub height: usize,
}

/// Half-open pixel window `[row_start, row_end) x [col_start, col_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl Window {
    pub fn is_empty(&self) -> bool {
        self.row_start >= self.row_end || self.col_start >= self.col_end
    }
}

impl Affine {
    /// Transform stretching a `width` x `height` grid over `bbox`.
    pub fn from_bounds(bbox: &BoundingBox, width: usize, height: usize) -> Self {
        Self {
            west: bbox.west(),
            north: bbox.north(),
            pixel_width: bbox.width() / width.max(1) as f64,
            pixel_height: bbox.height() / height.max(1) as f64,
            width,
            height,
        }
    }

    pub fn east(&self) -> f64 {
        self.west + self.width as f64 * self.pixel_width
    }

    pub fn south(&self) -> f64 {
        self.north - self.height as f64 * self.pixel_height
    }

    /// Coordinates of a pixel's center.
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.west + (col as f64 + 0.5) * self.pixel_width,
            self.north - (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// `[min_x, min_y, max_x, max_y]` of the cell covered by a pixel.
    pub fn cell_bounds(&self, row: usize, col: usize) -> [f64; 4] {
        let min_x = self.west + col as f64 * self.pixel_width;
        let max_y = self.north - row as f64 * self.pixel_height;
        [min_x, max_y - self.pixel_height, min_x + self.pixel_width, max_y]
    }

    /// Smallest window holding every pixel that intersects `bounds`
    /// (`[min_x, min_y, max_x, max_y]`).
    pub fn window(&self, bounds: [f64; 4]) -> Window {
        let [min_x, min_y, max_x, max_y] = bounds;
        let col_start = ((min_x - self.west) / self.pixel_width).floor();
        let col_end = ((max_x - self.west) / self.pixel_width).ceil();
        let row_start = ((self.north - max_y) / self.pixel_height).floor();
        let row_end = ((self.north - min_y) / self.pixel_height).ceil();

        Window {
            row_start: clamp_bound(row_start, self.height),
            row_end: clamp_bound(row_end, self.height),
            col_start: clamp_bound(col_start, self.width),
            col_end: clamp_bound(col_end, self.width),
        }
    }

    /// Six-coefficient form `[c, a, b, f, d, e]` in GDAL order.
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.west,
            self.pixel_width,
            0.0,
            self.north,
            0.0,
            -self.pixel_height,
        ]
    }
}

fn clamp_bound(value: f64, len: usize) -> usize {
    if value <= 0.0 {
        0
    } else {
        (value as usize).min(len)
    }
}
