//! Core types produced by the imagery provider.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use naturalness_common::{BoundingBox, Index};

/// Processing units actually billed for a request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Consumption {
    /// Nothing was measured: the response came from the cache, or the provider
    /// sent no consumption metadata. Distinct from a measured zero.
    Unknown,
    Measured(f64),
}

impl Consumption {
    pub fn measured(&self) -> Option<f64> {
        match self {
            Consumption::Unknown => None,
            Consumption::Measured(value) => Some(*value),
        }
    }
}

impl std::fmt::Display for Consumption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Consumption::Unknown => f.write_str("unknown"),
            Consumption::Measured(value) => write!(f, "{}", value),
        }
    }
}

impl Serialize for Consumption {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Consumption::Unknown => serializer.serialize_str("unknown"),
            Consumption::Measured(value) => serializer.serialize_f64(*value),
        }
    }
}

impl<'de> Deserialize<'de> for Consumption {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(Consumption::Measured(value)),
            Repr::Text(text) if text == "unknown" => Ok(Consumption::Unknown),
            Repr::Text(text) => Err(serde::de::Error::custom(format!(
                "expected a number or \"unknown\", got \"{}\"",
                text
            ))),
        }
    }
}

/// Predicted and billed processing units of one request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessingUnitEstimate {
    pub estimated_low: f64,
    pub estimated_high: f64,
    pub consumed: Consumption,
    /// The request was answered from the de-duplication cache.
    pub cache_hit: bool,
}

impl ProcessingUnitEstimate {
    /// Estimate for a fingerprint already present in the cache.
    pub fn cached() -> Self {
        Self {
            estimated_low: 0.0,
            estimated_high: 0.0,
            consumed: Consumption::Unknown,
            cache_hit: true,
        }
    }

    /// Computed estimate, consumption not yet known.
    pub fn computed(estimated_low: f64, estimated_high: f64) -> Self {
        Self {
            estimated_low,
            estimated_high,
            consumed: Consumption::Unknown,
            cache_hit: false,
        }
    }

    /// Whether `actual` lies inside the estimated range.
    pub fn covers(&self, actual: f64) -> bool {
        self.estimated_low <= actual && actual <= self.estimated_high
    }

    pub fn with_consumed(mut self, consumed: Consumption) -> Self {
        self.consumed = consumed;
        self
    }
}

/// A fetched, normalized single-band raster.
///
/// Values are row-major with row 0 at the northern edge of `bbox`.
#[derive(Debug, Clone)]
pub struct RasterResult {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub bbox: BoundingBox,
    pub index: Index,
    pub cost: ProcessingUnitEstimate,
}

impl RasterResult {
    /// Get the value at a specific pixel.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.data.get(row * self.width + col).copied()
    }

    /// Nodata sentinel of the raster's index.
    pub fn nodata(&self) -> f64 {
        self.index.spec().nodata_value
    }

    /// `(height, width)` in pixels.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }
}
