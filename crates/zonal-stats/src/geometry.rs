//! Polygonal zones parsed from GeoJSON geometries.

use serde_json::Value;

use naturalness_common::{NaturalnessError, NaturalnessResult};

/// A polygon as an outer ring followed by zero or more holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub rings: Vec<Vec<(f64, f64)>>,
}

impl Polygon {
    /// Even-odd ray casting over all rings, so holes are excluded.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        let mut inside = false;
        for ring in &self.rings {
            if ring_crossings(ring, x, y) {
                inside = !inside;
            }
        }
        inside
    }

    /// Area of this polygon inside the rectangle `[min_x, min_y, max_x, max_y]`.
    pub fn clipped_area(&self, rect: [f64; 4]) -> f64 {
        let mut rings = self.rings.iter().map(|ring| ring_area(&clip_ring(ring, rect)));
        let outer = rings.next().unwrap_or(0.0);
        (outer - rings.sum::<f64>()).max(0.0)
    }
}

/// Sutherland-Hodgman clipping of a ring against an axis-aligned rectangle.
///
/// Concave rings may come out with degenerate edges along the rectangle
/// border, which leaves their area intact.
fn clip_ring(ring: &[(f64, f64)], rect: [f64; 4]) -> Vec<(f64, f64)> {
    let [min_x, min_y, max_x, max_y] = rect;
    let mut points = ring.to_vec();

    points = clip_half_plane(&points, |p| p.0 >= min_x, |a, b| at_x(a, b, min_x));
    points = clip_half_plane(&points, |p| p.0 <= max_x, |a, b| at_x(a, b, max_x));
    points = clip_half_plane(&points, |p| p.1 >= min_y, |a, b| at_y(a, b, min_y));
    clip_half_plane(&points, |p| p.1 <= max_y, |a, b| at_y(a, b, max_y))
}

fn clip_half_plane<F, G>(points: &[(f64, f64)], inside: F, crossing: G) -> Vec<(f64, f64)>
where
    F: Fn((f64, f64)) -> bool,
    G: Fn((f64, f64), (f64, f64)) -> (f64, f64),
{
    let Some(&last) = points.last() else {
        return Vec::new();
    };

    let mut output = Vec::with_capacity(points.len() + 4);
    let mut prev = last;
    for &current in points {
        match (inside(prev), inside(current)) {
            (true, true) => output.push(current),
            (true, false) => output.push(crossing(prev, current)),
            (false, true) => {
                output.push(crossing(prev, current));
                output.push(current);
            }
            (false, false) => {}
        }
        prev = current;
    }
    output
}

// Only called for segments with endpoints on both sides of the line.
fn at_x(a: (f64, f64), b: (f64, f64), x: f64) -> (f64, f64) {
    let t = (x - a.0) / (b.0 - a.0);
    (x, a.1 + t * (b.1 - a.1))
}

fn at_y(a: (f64, f64), b: (f64, f64), y: f64) -> (f64, f64) {
    let t = (y - a.1) / (b.1 - a.1);
    (a.0 + t * (b.0 - a.0), y)
}

/// Unsigned shoelace area.
fn ring_area(ring: &[(f64, f64)]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        twice_area += (ring[j].0 - ring[i].0) * (ring[j].1 + ring[i].1);
        j = i;
    }
    twice_area.abs() / 2.0
}

/// Whether a horizontal ray from `(x, y)` crosses `ring` an odd number of times.
fn ring_crossings(ring: &[(f64, f64)], x: f64, y: f64) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];

        if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Area a statistic is computed over: one or more polygons.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub polygons: Vec<Polygon>,
}

impl Zone {
    /// Parse a GeoJSON `Polygon` or `MultiPolygon` geometry object.
    pub fn from_geojson(geometry: &Value) -> NaturalnessResult<Self> {
        let kind = geometry
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| NaturalnessError::validation("Geometry has no type"))?;
        let coordinates = geometry
            .get("coordinates")
            .ok_or_else(|| NaturalnessError::validation("Geometry has no coordinates"))?;

        let polygons = match kind {
            "Polygon" => vec![parse_polygon(coordinates)?],
            "MultiPolygon" => coordinates
                .as_array()
                .ok_or_else(|| invalid("MultiPolygon coordinates must be an array"))?
                .iter()
                .map(parse_polygon)
                .collect::<NaturalnessResult<Vec<_>>>()?,
            other => {
                return Err(NaturalnessError::validation(format!(
                    "Unsupported geometry type '{}', expected Polygon or MultiPolygon",
                    other
                )))
            }
        };

        if polygons.is_empty() {
            return Err(invalid("MultiPolygon has no polygons"));
        }
        Ok(Self { polygons })
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.polygons.iter().any(|p| p.contains_point(x, y))
    }

    /// Area of the zone inside `rect`; zero when they only touch or are disjoint.
    pub fn clipped_area(&self, rect: [f64; 4]) -> f64 {
        self.polygons.iter().map(|p| p.clipped_area(rect)).sum()
    }

    /// `[min_x, min_y, max_x, max_y]` of every vertex.
    pub fn bounds(&self) -> [f64; 4] {
        let mut bounds = [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
        for (x, y) in self.vertices() {
            bounds[0] = bounds[0].min(x);
            bounds[1] = bounds[1].min(y);
            bounds[2] = bounds[2].max(x);
            bounds[3] = bounds[3].max(y);
        }
        bounds
    }

    pub fn vertices(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.polygons
            .iter()
            .flat_map(|p| p.rings.iter())
            .flat_map(|ring| ring.iter().copied())
    }
}

fn parse_polygon(value: &Value) -> NaturalnessResult<Polygon> {
    let rings = value
        .as_array()
        .ok_or_else(|| invalid("Polygon coordinates must be an array of rings"))?
        .iter()
        .map(parse_ring)
        .collect::<NaturalnessResult<Vec<_>>>()?;

    match rings.first() {
        Some(outer) if outer.len() >= 4 => Ok(Polygon { rings }),
        _ => Err(invalid("Polygon needs an outer ring of at least 4 positions")),
    }
}

fn parse_ring(value: &Value) -> NaturalnessResult<Vec<(f64, f64)>> {
    value
        .as_array()
        .ok_or_else(|| invalid("Ring must be an array of positions"))?
        .iter()
        .map(|position| {
            let x = position.get(0).and_then(Value::as_f64);
            let y = position.get(1).and_then(Value::as_f64);
            match (x, y) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Ok((x, y)),
                _ => Err(invalid("Position must hold two numbers")),
            }
        })
        .collect()
}

fn invalid(msg: &str) -> NaturalnessError {
    NaturalnessError::validation(format!("Invalid geometry: {}", msg))
}
