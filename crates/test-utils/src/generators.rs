//! Generators for synthetic rasters, TIFF payloads and GeoJSON.

use std::io::Cursor;

use bytes::Bytes;
use serde_json::{json, Value};
use tiff::encoder::{colortype, TiffEncoder};

/// A row-major grid filled with `value`.
pub fn uniform_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// A uniform grid with a rectangular block set to `block_value`.
///
/// The block covers rows `rows.0..rows.1` and columns `cols.0..cols.1`.
///
/// # Example
///
/// ```
/// use test_utils::grid_with_block;
///
/// // 20x20 ones with the south-west quadrant at 0.5
/// let grid = grid_with_block(20, 20, 1.0, (10, 20), (0, 10), 0.5);
/// assert_eq!(grid[0], 1.0);
/// assert_eq!(grid[10 * 20], 0.5);
/// assert_eq!(grid[10 * 20 + 10], 1.0);
/// ```
pub fn grid_with_block(
    width: usize,
    height: usize,
    base: f32,
    rows: (usize, usize),
    cols: (usize, usize),
    block_value: f32,
) -> Vec<f32> {
    let mut data = uniform_grid(width, height, base);
    for row in rows.0..rows.1.min(height) {
        for col in cols.0..cols.1.min(width) {
            data[row * width + col] = block_value;
        }
    }
    data
}

/// Encode a single-band signed 16-bit TIFF, as the provider returns for NDVI.
pub fn encode_tiff_i16(width: u32, height: u32, data: &[i16]) -> Bytes {
    let mut buffer = Cursor::new(Vec::new());
    TiffEncoder::new(&mut buffer)
        .expect("Failed to create TIFF encoder")
        .write_image::<colortype::GrayI16>(width, height, data)
        .expect("Failed to encode TIFF");
    Bytes::from(buffer.into_inner())
}

/// Encode a single-band 8-bit TIFF.
pub fn encode_tiff_u8(width: u32, height: u32, data: &[u8]) -> Bytes {
    let mut buffer = Cursor::new(Vec::new());
    TiffEncoder::new(&mut buffer)
        .expect("Failed to create TIFF encoder")
        .write_image::<colortype::Gray8>(width, height, data)
        .expect("Failed to encode TIFF");
    Bytes::from(buffer.into_inner())
}

/// GeoJSON polygon geometry of an axis-aligned rectangle.
pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[
            [min_x, min_y],
            [max_x, min_y],
            [max_x, max_y],
            [min_x, max_y],
            [min_x, min_y]
        ]]
    })
}

/// GeoJSON feature wrapping [`rectangle`].
pub fn square_feature(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Value {
    json!({
        "type": "Feature",
        "geometry": rectangle(min_x, min_y, max_x, max_y),
        "properties": {}
    })
}

/// GeoJSON FeatureCollection of the given features.
pub fn feature_collection(features: Vec<Value>) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": features
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_is_clipped_to_grid() {
        let grid = grid_with_block(4, 4, 0.0, (2, 10), (2, 10), 1.0);
        assert_eq!(grid.iter().filter(|v| **v == 1.0).count(), 4);
    }

    #[test]
    fn test_rectangle_is_closed() {
        let ring = &rectangle(0.0, 0.0, 1.0, 2.0)["coordinates"][0];
        assert_eq!(ring.as_array().unwrap().len(), 5);
        assert_eq!(ring[0], ring[4]);
    }

    #[test]
    fn test_encoded_tiff_has_header() {
        let bytes = encode_tiff_u8(2, 1, &[1, 2]);
        assert!(bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*"));
    }
}
