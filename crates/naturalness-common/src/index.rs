//! Index catalog.
//!
//! Every supported index is described by one row of a static table. Code that
//! needs per-index behavior looks the row up instead of branching on the index.
//!
//! The literal values are kept as deployed: NDVI is scaled by `2^15 - 1` while
//! NATURALNESS uses `2^16 - 1`, and WATER uses nodata `0` although its
//! evaluation script declares `255`. Both asymmetries are possible
//! inconsistencies upstream and are intentionally not reconciled here.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::NaturalnessError;

/// A named vegetation/water/naturalness index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Index {
    Ndvi,
    Water,
    Naturalness,
}

impl Index {
    pub const ALL: [Index; 3] = [Index::Ndvi, Index::Water, Index::Naturalness];

    /// Catalog row for this index.
    pub fn spec(&self) -> &'static IndexSpec {
        match self {
            Index::Ndvi => &CATALOG[0],
            Index::Water => &CATALOG[1],
            Index::Naturalness => &CATALOG[2],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Index::Ndvi => "NDVI",
            Index::Water => "WATER",
            Index::Naturalness => "NATURALNESS",
        }
    }
}

impl std::fmt::Display for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Index {
    type Err = NaturalnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Index::ALL
            .into_iter()
            .find(|index| index.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                NaturalnessError::validation(format!(
                    "Unknown index '{}'. Available: NDVI, WATER, NATURALNESS",
                    s
                ))
            })
    }
}

/// Declared output sample format, as used by the provider's cost model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[serde(rename = "8bit")]
    Bit8,
    #[serde(rename = "16bit")]
    Bit16,
    #[serde(rename = "32bit")]
    Bit32,
    OctetStream,
}

impl OutputFormat {
    /// Multiplicative cost factor charged for this output format.
    pub fn cost_factor(&self) -> f64 {
        match self {
            OutputFormat::Bit8 => 1.0,
            OutputFormat::Bit16 => 1.0,
            OutputFormat::Bit32 => 2.0,
            OutputFormat::OctetStream => 1.4,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = NaturalnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "8bit" | "8-bit" | "uint8" => Ok(OutputFormat::Bit8),
            "16bit" | "16-bit" | "uint16" | "int16" => Ok(OutputFormat::Bit16),
            "32bit" | "32-bit" | "float32" => Ok(OutputFormat::Bit32),
            "octet-stream" | "octet_stream" => Ok(OutputFormat::OctetStream),
            other => Err(NaturalnessError::configuration(format!(
                "Output format '{}' is not supported for processing unit calculation",
                other
            ))),
        }
    }
}

/// Immutable per-index attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub index: Index,
    /// Identifier of the provider-side evaluation script (file stem).
    pub evalscript_id: &'static str,
    /// Sentinel marking pixels without valid data.
    pub nodata_value: f64,
    /// Divisor mapping provider integers into the canonical domain, if any.
    pub normalization_divisor: Option<f64>,
    /// Input bands the evaluation script reads, as charged by the cost model.
    pub band_count: u32,
    pub output_format: OutputFormat,
}

static CATALOG: [IndexSpec; 3] = [
    IndexSpec {
        index: Index::Ndvi,
        evalscript_id: "NDVI",
        nodata_value: -999.0,
        normalization_divisor: Some(32_767.0),
        band_count: 2,
        output_format: OutputFormat::Bit8,
    },
    IndexSpec {
        index: Index::Water,
        evalscript_id: "WATER",
        nodata_value: 0.0,
        normalization_divisor: None,
        band_count: 1,
        output_format: OutputFormat::Bit8,
    },
    IndexSpec {
        index: Index::Naturalness,
        evalscript_id: "NATURALNESS",
        nodata_value: -999.0,
        normalization_divisor: Some(65_535.0),
        band_count: 3,
        output_format: OutputFormat::Bit8,
    },
];

impl IndexSpec {
    /// Whether `value` is this index's nodata sentinel.
    pub fn is_nodata(&self, value: f64) -> bool {
        value == self.nodata_value
    }

    /// Map a provider value into the canonical domain; nodata passes through.
    pub fn normalize(&self, value: f64) -> f64 {
        match self.normalization_divisor {
            Some(divisor) if !self.is_nodata(value) => value / divisor,
            _ => value,
        }
    }

    /// Inverse of [`IndexSpec::normalize`].
    pub fn denormalize(&self, value: f64) -> f64 {
        match self.normalization_divisor {
            Some(divisor) if !self.is_nodata(value) => value * divisor,
            _ => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_rows_match_index() {
        for index in Index::ALL {
            assert_eq!(index.spec().index, index);
            assert_eq!(index.spec().evalscript_id, index.as_str());
        }
    }

    #[test]
    fn test_parse_index_case_insensitive() {
        assert_eq!("ndvi".parse::<Index>().unwrap(), Index::Ndvi);
        assert_eq!("Naturalness".parse::<Index>().unwrap(), Index::Naturalness);
        assert!("evi".parse::<Index>().unwrap_err().is_validation());
    }

    #[test]
    fn test_index_serde_names() {
        assert_eq!(serde_json::to_string(&Index::Water).unwrap(), "\"WATER\"");
        let index: Index = serde_json::from_str("\"NATURALNESS\"").unwrap();
        assert_eq!(index, Index::Naturalness);
    }

    #[test]
    fn test_output_format_factors() {
        assert_eq!(OutputFormat::Bit8.cost_factor(), 1.0);
        assert_eq!(OutputFormat::Bit16.cost_factor(), 1.0);
        assert_eq!(OutputFormat::Bit32.cost_factor(), 2.0);
        assert_eq!(OutputFormat::OctetStream.cost_factor(), 1.4);
    }

    #[test]
    fn test_unknown_output_format_is_configuration_error() {
        let err = "12bit".parse::<OutputFormat>().unwrap_err();
        assert!(matches!(err, NaturalnessError::Configuration(_)));
    }

    #[test]
    fn test_normalize_roundtrip() {
        for index in Index::ALL {
            let spec = index.spec();
            for raw in [0.0, 1.0, 1234.0, 32_767.0] {
                let back = spec.denormalize(spec.normalize(raw));
                assert!((back - raw).abs() < 1e-6, "{} {} -> {}", index, raw, back);
            }
        }
    }

    #[test]
    fn test_normalize_preserves_nodata() {
        let ndvi = Index::Ndvi.spec();
        assert_eq!(ndvi.normalize(-999.0), -999.0);
        assert!((ndvi.normalize(32_767.0) - 1.0).abs() < 1e-12);

        let water = Index::Water.spec();
        assert_eq!(water.normalize(1.0), 1.0);
    }
}
