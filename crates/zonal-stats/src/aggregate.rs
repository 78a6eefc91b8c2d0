//! Raster-to-vector aggregation.

use metrics::counter;
use rayon::prelude::*;
use tracing::{debug, info};

use naturalness_common::{NaturalnessError, NaturalnessResult};

use crate::affine::{Affine, Window};
use crate::feature::FeatureCollection;
use crate::geometry::Zone;
use crate::stats::{Statistic, ZoneSample};

/// A borrowed single-band grid with its georeferencing.
#[derive(Debug, Clone, Copy)]
pub struct RasterGrid<'a> {
    /// Row-major values, row 0 at the north edge.
    pub data: &'a [f32],
    pub affine: Affine,
    pub nodata: Option<f64>,
}

impl<'a> RasterGrid<'a> {
    pub fn new(data: &'a [f32], affine: Affine, nodata: Option<f64>) -> NaturalnessResult<Self> {
        if data.len() != affine.width * affine.height {
            return Err(NaturalnessError::Internal(format!(
                "Raster has {} values but the transform describes {}x{}",
                data.len(),
                affine.width,
                affine.height
            )));
        }
        Ok(Self {
            data,
            affine,
            nodata,
        })
    }

    fn value(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.affine.width + col] as f64
    }

    fn is_nodata(&self, value: f64) -> bool {
        value.is_nan() || self.nodata.map_or(false, |nodata| value == nodata)
    }

    /// Pixels of `zone`: those whose center lies inside it, or, when no
    /// center does, the single pixel whose cell shares the most area with it.
    /// A zone sharing no area with the grid gets no pixels.
    fn sample(&self, zone: &Zone) -> ZoneSample {
        let mut sample = ZoneSample::default();
        let window = self.affine.window(zone.bounds());
        let mut hit = false;

        for row in window.row_start..window.row_end {
            for col in window.col_start..window.col_end {
                let (x, y) = self.affine.pixel_center(row, col);
                if !zone.contains_point(x, y) {
                    continue;
                }
                hit = true;
                self.push(&mut sample, row, col);
            }
        }

        if !hit {
            if let Some((row, col)) = self.largest_overlap(zone, window) {
                debug!(row, col, "No pixel center inside zone, using largest overlapping pixel");
                self.push(&mut sample, row, col);
            }
        }

        sample
    }

    /// Pixel of `window` whose cell overlaps `zone` the most; ties go to the
    /// first in row-major order.
    fn largest_overlap(&self, zone: &Zone, window: Window) -> Option<(usize, usize)> {
        let mut best = None;
        let mut best_area = 0.0;
        for row in window.row_start..window.row_end {
            for col in window.col_start..window.col_end {
                let area = zone.clipped_area(self.affine.cell_bounds(row, col));
                if area > best_area {
                    best_area = area;
                    best = Some((row, col));
                }
            }
        }
        best
    }

    fn push(&self, sample: &mut ZoneSample, row: usize, col: usize) {
        let value = self.value(row, col);
        if self.is_nodata(value) {
            sample.nodata_count += 1;
        } else {
            sample.values.push(value);
        }
    }
}

/// Compute `stats` for every feature and write them into its properties.
///
/// Features keep their order, geometry and existing properties; statistic
/// names overwrite same-named properties. Geometries are validated before any
/// pixel is read.
pub fn aggregate(
    grid: &RasterGrid<'_>,
    mut collection: FeatureCollection,
    stats: &[(String, Statistic)],
) -> NaturalnessResult<FeatureCollection> {
    let zones = collection.zones()?;

    let summaries: Vec<_> = zones
        .par_iter()
        .map(|zone| grid.sample(zone).summarize(stats))
        .collect();

    for (feature, summary) in collection.features.iter_mut().zip(summaries) {
        feature.properties.extend(summary);
    }

    counter!("zonal_features_total").increment(collection.features.len() as u64);
    info!(
        features = collection.features.len(),
        stats = stats.len(),
        "Aggregated raster over features"
    );
    Ok(collection)
}
