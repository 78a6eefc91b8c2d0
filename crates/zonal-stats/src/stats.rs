//! Statistic vocabulary and computation.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde_json::{json, Map, Value};

use naturalness_common::{NaturalnessError, NaturalnessResult};

/// Statistics computed when a request names none.
pub const DEFAULT_STATS: [Statistic; 4] = [
    Statistic::Count,
    Statistic::Min,
    Statistic::Max,
    Statistic::Mean,
];

/// A named zonal statistic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statistic {
    Min,
    Max,
    Mean,
    Median,
    Sum,
    Count,
    Std,
    Range,
    Majority,
    Minority,
    Unique,
    Nodata,
    /// `percentile_<q>` with `q` in `[0, 100]`.
    Percentile(f64),
}

impl Statistic {
    /// Property name the statistic is written under.
    pub fn name(&self) -> String {
        match self {
            Statistic::Min => "min".into(),
            Statistic::Max => "max".into(),
            Statistic::Mean => "mean".into(),
            Statistic::Median => "median".into(),
            Statistic::Sum => "sum".into(),
            Statistic::Count => "count".into(),
            Statistic::Std => "std".into(),
            Statistic::Range => "range".into(),
            Statistic::Majority => "majority".into(),
            Statistic::Minority => "minority".into(),
            Statistic::Unique => "unique".into(),
            Statistic::Nodata => "nodata".into(),
            Statistic::Percentile(q) => format!("percentile_{}", q),
        }
    }
}

impl FromStr for Statistic {
    type Err = NaturalnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stat = match s {
            "min" => Statistic::Min,
            "max" => Statistic::Max,
            "mean" => Statistic::Mean,
            "median" => Statistic::Median,
            "sum" => Statistic::Sum,
            "count" => Statistic::Count,
            "std" => Statistic::Std,
            "range" => Statistic::Range,
            "majority" => Statistic::Majority,
            "minority" => Statistic::Minority,
            "unique" => Statistic::Unique,
            "nodata" => Statistic::Nodata,
            other => {
                let q = other
                    .strip_prefix("percentile_")
                    .and_then(|q| q.parse::<f64>().ok())
                    .filter(|q| (0.0..=100.0).contains(q))
                    .ok_or_else(|| {
                        NaturalnessError::validation(format!(
                            "Statistic '{}' is not supported. Available: min, max, mean, median, \
                             sum, count, std, range, majority, minority, unique, nodata, percentile_<q>",
                            other
                        ))
                    })?;
                Statistic::Percentile(q)
            }
        };
        Ok(stat)
    }
}

/// Parse requested statistic names, keeping their order and spelling.
///
/// An empty list selects [`DEFAULT_STATS`].
pub fn parse_stats<S: AsRef<str>>(names: &[S]) -> NaturalnessResult<Vec<(String, Statistic)>> {
    if names.is_empty() {
        return Ok(DEFAULT_STATS.iter().map(|s| (s.name(), *s)).collect());
    }

    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            name.parse::<Statistic>().map(|stat| (name.to_string(), stat))
        })
        .collect()
}

/// Valid and nodata pixels of one zone.
#[derive(Debug, Default, Clone)]
pub struct ZoneSample {
    pub values: Vec<f64>,
    pub nodata_count: usize,
}

impl ZoneSample {
    /// Compute `stats` as JSON properties. Value statistics of an empty sample are null.
    pub fn summarize(mut self, stats: &[(String, Statistic)]) -> Map<String, Value> {
        self.values.sort_by(|a, b| a.total_cmp(b));
        let values = &self.values;
        let count = values.len();
        let mut properties = Map::new();

        for (name, stat) in stats {
            let value = match stat {
                Statistic::Count => json!(count),
                Statistic::Nodata => json!(self.nodata_count),
                _ if count == 0 => Value::Null,
                Statistic::Min => json!(values[0]),
                Statistic::Max => json!(values[count - 1]),
                Statistic::Range => json!(values[count - 1] - values[0]),
                Statistic::Sum => json!(sum(values)),
                Statistic::Mean => json!(mean(values)),
                Statistic::Std => json!(std(values)),
                Statistic::Median => json!(percentile(values, 50.0)),
                Statistic::Percentile(q) => json!(percentile(values, *q)),
                Statistic::Majority => json!(mode(values, true)),
                Statistic::Minority => json!(mode(values, false)),
                Statistic::Unique => json!(unique(values)),
            };
            properties.insert(name.clone(), value);
        }

        properties
    }
}

fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

fn mean(values: &[f64]) -> f64 {
    sum(values) / values.len() as f64
}

/// Population standard deviation.
fn std(values: &[f64]) -> f64 {
    let mean = mean(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Linearly interpolated percentile of sorted, non-empty `values`.
fn percentile(values: &[f64], q: f64) -> f64 {
    let pos = q / 100.0 * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    values[lo] + (values[hi] - values[lo]) * (pos - lo as f64)
}

fn histogram(values: &[f64]) -> BTreeMap<u64, (f64, usize)> {
    let mut counts = BTreeMap::new();
    for v in values {
        counts.entry(v.to_bits()).or_insert((*v, 0)).1 += 1;
    }
    counts
}

/// Most (or least) frequent value; ties resolve to the smallest value.
fn mode(values: &[f64], most: bool) -> f64 {
    let mut best: Option<(f64, usize)> = None;
    for (value, count) in histogram(values).into_values() {
        let better = match best {
            None => true,
            Some((best_value, best_count)) => {
                let wins = if most { count > best_count } else { count < best_count };
                wins || (count == best_count && value < best_value)
            }
        };
        if better {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value).unwrap_or(f64::NAN)
}

fn unique(values: &[f64]) -> usize {
    histogram(values).len()
}
