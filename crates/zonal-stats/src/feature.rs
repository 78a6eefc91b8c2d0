//! GeoJSON feature collections carried through aggregation untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use naturalness_common::{BoundingBox, NaturalnessError, NaturalnessResult};

use crate::geometry::Zone;

/// A GeoJSON FeatureCollection.
///
/// Geometries and unknown members are kept as raw JSON so that output
/// coordinates are exactly the input coordinates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureCollection {
    /// Type identifier (always "FeatureCollection").
    #[serde(rename = "type")]
    pub type_: String,

    pub features: Vec<Feature>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A GeoJSON Feature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feature {
    /// Type identifier (always "Feature").
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    pub geometry: Value,

    /// `null` in the input is read as an empty object.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Map<String, Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            type_: "FeatureCollection".to_string(),
            features,
            extra: Map::new(),
        }
    }

    /// Parse every feature geometry into a zone, failing on the first invalid one.
    pub fn zones(&self) -> NaturalnessResult<Vec<Zone>> {
        if self.type_ != "FeatureCollection" {
            return Err(NaturalnessError::validation(format!(
                "Expected a FeatureCollection, got '{}'",
                self.type_
            )));
        }

        self.features
            .iter()
            .enumerate()
            .map(|(i, feature)| {
                Zone::from_geojson(&feature.geometry).map_err(|e| {
                    NaturalnessError::validation(format!("Feature {}: {}", i, e))
                })
            })
            .collect()
    }

    /// Bounding box enclosing every geometry of the collection.
    pub fn bounds(&self) -> NaturalnessResult<BoundingBox> {
        let zones = self.zones()?;
        BoundingBox::from_points(zones.iter().flat_map(|zone| zone.vertices()))
    }
}

impl Feature {
    pub fn new(geometry: Value) -> Self {
        Self {
            type_: "Feature".to_string(),
            id: None,
            geometry,
            properties: Map::new(),
            extra: Map::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}
