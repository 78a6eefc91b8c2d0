//! Single-band GeoTIFF output in EPSG:4326.

use std::io::{BufWriter, Seek, Write};

use axum::body::Body;
use futures::StreamExt;
use tempfile::NamedTempFile;
use tiff::encoder::{colortype::Gray32Float, TiffEncoder};
use tiff::tags::Tag;
use tokio_util::io::ReaderStream;

use imagery::RasterResult;
use naturalness_common::{NaturalnessError, NaturalnessResult};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

/// GeoKeyDirectory for a geographic WGS84 raster with area pixels.
const WGS84_GEOKEYS: [u16; 16] = [
    1, 1, 0, 3, // header: version 1.1.0, 3 keys
    1024, 0, 1, 2, // GTModelTypeGeoKey = geographic
    1025, 0, 1, 1, // GTRasterTypeGeoKey = pixel is area
    2048, 0, 1, 4326, // GeographicTypeGeoKey = WGS84
];

/// Encode `raster` as a Float32 GeoTIFF into `writer`.
pub fn write_geotiff<W: Write + Seek>(writer: W, raster: &RasterResult) -> NaturalnessResult<()> {
    let width = raster.width as u32;
    let height = raster.height as u32;
    let bbox = raster.bbox;

    let pixel_scale = [
        bbox.width() / raster.width.max(1) as f64,
        bbox.height() / raster.height.max(1) as f64,
        0.0,
    ];
    let tiepoint = [0.0, 0.0, 0.0, bbox.west(), bbox.north(), 0.0];
    let nodata = format!("{}", raster.nodata());

    let mut encoder = TiffEncoder::new(writer).map_err(encode_error)?;
    let mut image = encoder
        .new_image::<Gray32Float>(width, height)
        .map_err(encode_error)?;

    let dir = image.encoder();
    dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &pixel_scale[..])
        .map_err(encode_error)?;
    dir.write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(encode_error)?;
    dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), &WGS84_GEOKEYS[..])
        .map_err(encode_error)?;
    dir.write_tag(Tag::Unknown(GDAL_NODATA), nodata.as_str())
        .map_err(encode_error)?;

    image.write_data(&raster.data).map_err(encode_error)?;
    Ok(())
}

/// Write `raster` to a temporary file that is deleted when the handle drops.
pub fn write_temp_geotiff(raster: &RasterResult) -> NaturalnessResult<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("naturalness-")
        .suffix(".tiff")
        .tempfile()?;

    {
        let mut writer = BufWriter::new(file.as_file_mut());
        write_geotiff(&mut writer, raster)?;
        writer.flush()?;
    }

    Ok(file)
}

/// Stream `file` as a response body.
///
/// The file is deleted once the body is fully sent or dropped.
pub fn temp_file_body(file: NamedTempFile) -> NaturalnessResult<Body> {
    let reader = file.reopen()?;
    let temp_path = file.into_temp_path();

    let stream = ReaderStream::new(tokio::fs::File::from_std(reader)).map(move |chunk| {
        let _keep = &temp_path;
        chunk
    });
    Ok(Body::from_stream(stream))
}

fn encode_error(err: tiff::TiffError) -> NaturalnessError {
    NaturalnessError::Internal(format!("Failed to encode GeoTIFF: {}", err))
}
