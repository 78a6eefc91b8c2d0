//! Decoding of provider GeoTIFF responses into normalized grids.

use std::io::Cursor;

use naturalness_common::{IndexSpec, NaturalnessError, NaturalnessResult};
use tiff::decoder::{Decoder, DecodingResult};

/// A single-band grid as stored in a provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedGrid {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
}

/// Decode the first image of a TIFF response.
pub fn decode_tiff(bytes: &[u8]) -> NaturalnessResult<DecodedGrid> {
    let mut decoder = Decoder::new(Cursor::new(bytes)).map_err(decode_error)?;
    let (width, height) = decoder.dimensions().map_err(decode_error)?;
    let (width, height) = (width as usize, height as usize);

    let data = match decoder.read_image().map_err(decode_error)? {
        DecodingResult::F32(data) => data,
        DecodingResult::F64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U8(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U16(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I16(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| v as f32).collect(),
    };

    if data.len() != width * height {
        return Err(NaturalnessError::Decode(format!(
            "expected a single-band {}x{} image, got {} samples",
            width,
            height,
            data.len()
        )));
    }

    Ok(DecodedGrid {
        data,
        width,
        height,
    })
}

/// Scale every pixel through the index divisor, leaving nodata untouched.
pub fn normalize(grid: &mut DecodedGrid, spec: &IndexSpec) {
    if spec.normalization_divisor.is_none() {
        return;
    }
    for value in grid.data.iter_mut() {
        *value = spec.normalize(*value as f64) as f32;
    }
}

fn decode_error(err: tiff::TiffError) -> NaturalnessError {
    NaturalnessError::Decode(err.to_string())
}
