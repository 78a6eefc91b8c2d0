//! WGS84 bounding box type and operations.

use serde::{Deserialize, Serialize};

use crate::error::{NaturalnessError, NaturalnessResult};

/// A geographic area of interest in WGS84 degrees.
///
/// Construction always validates `west < east`, `south < north` and that all
/// coordinates lie inside `[-180, 180] x [-90, 90]`. On the wire the box is the
/// four-element array `[west, south, east, north]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    west: f64,
    south: f64,
    east: f64,
    north: f64,
}

impl BoundingBox {
    /// Create a validated bounding box from its four edges.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> NaturalnessResult<Self> {
        let coords = [west, south, east, north];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(NaturalnessError::validation(format!(
                "Invalid bounding box {:?}: coordinates must be finite",
                coords
            )));
        }
        if !(-180.0..=180.0).contains(&west) || !(-180.0..=180.0).contains(&east) {
            return Err(NaturalnessError::validation(format!(
                "Invalid bounding box {:?}: longitude must lie within [-180, 180]",
                coords
            )));
        }
        if !(-90.0..=90.0).contains(&south) || !(-90.0..=90.0).contains(&north) {
            return Err(NaturalnessError::validation(format!(
                "Invalid bounding box {:?}: latitude must lie within [-90, 90]",
                coords
            )));
        }
        if west >= east || south >= north {
            return Err(NaturalnessError::validation(format!(
                "Invalid bounding box {:?}: expected west < east and south < north",
                coords
            )));
        }

        Ok(Self {
            west,
            south,
            east,
            north,
        })
    }

    /// Smallest box enclosing all given `(lon, lat)` points.
    pub fn from_points<I>(points: I) -> NaturalnessResult<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut west = f64::MAX;
        let mut south = f64::MAX;
        let mut east = f64::MIN;
        let mut north = f64::MIN;
        let mut seen = false;

        for (lon, lat) in points {
            seen = true;
            west = west.min(lon);
            east = east.max(lon);
            south = south.min(lat);
            north = north.max(lat);
        }

        if !seen {
            return Err(NaturalnessError::validation(
                "Cannot derive a bounding box from an empty geometry set",
            ));
        }

        Self::new(west, south, east, north)
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn east(&self) -> f64 {
        self.east
    }

    pub fn north(&self) -> f64 {
        self.north
    }

    /// Width in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Height in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Get the center point of the bounding box.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.west + self.east) / 2.0,
            (self.south + self.north) / 2.0,
        )
    }

    /// Check if a point is contained within this bbox (edges inclusive).
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        lon >= self.west && lon <= self.east && lat >= self.south && lat <= self.north
    }

    /// Check if this bbox overlaps another with a non-empty interior.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.west < other.east
            && self.east > other.west
            && self.south < other.north
            && self.north > other.south
    }

    /// As `[west, south, east, north]`.
    pub fn to_array(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }

    /// Pixel dimensions `(width, height)` of this box at `resolution` meters per pixel.
    ///
    /// Ground distances are measured with the WGS84 ellipsoid's meridian and
    /// parallel degree lengths at the box's central latitude. Each side is at
    /// least one pixel.
    pub fn pixel_dimensions(&self, resolution: f64) -> NaturalnessResult<(u32, u32)> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(NaturalnessError::validation(format!(
                "Resolution must be a positive number of meters per pixel, got {}",
                resolution
            )));
        }

        let (_, center_lat) = self.center();
        let phi = center_lat.to_radians();
        let meters_per_deg_lat =
            111_132.92 - 559.82 * (2.0 * phi).cos() + 1.175 * (4.0 * phi).cos();
        let meters_per_deg_lon = 111_412.84 * phi.cos() - 93.5 * (3.0 * phi).cos();

        let width = (self.width() * meters_per_deg_lon / resolution).round().max(1.0);
        let height = (self.height() * meters_per_deg_lat / resolution).round().max(1.0);

        Ok((width as u32, height as u32))
    }

    /// Stable textual key for fingerprints and logs.
    ///
    /// Coordinates are written at full precision, so distinct boxes never
    /// share a key.
    pub fn cache_key(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.west, self.south, self.east, self.north
        )
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = NaturalnessError;

    fn try_from(value: [f64; 4]) -> Result<Self, Self::Error> {
        Self::new(value[0], value[1], value[2], value[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self {
        bbox.to_array()
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.west, self.south, self.east, self.north
        )
    }
}
