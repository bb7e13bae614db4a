use gwm_core::coords::normalize;
use gwm_core::{PointStats, Row, VariableSpec};
use gwm_data::Aggregation;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A representative row with its resolved WGS84 position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub code: String,
    pub lat: f64,
    pub lon: f64,
    pub region: Option<String>,
    pub row: Row,
}

/// Map markers plus per-point statistics for one variable and region.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointSet {
    pub points: Vec<MapPoint>,
    pub stats: BTreeMap<String, PointStats>,
}

impl PointSet {
    /// Resolve representative coordinates. Representatives whose position
    /// cannot be normalized are left off the map; their stats remain.
    pub fn resolve(aggregation: Aggregation, spec: &VariableSpec) -> Self {
        let total = aggregation.representatives.len();
        let points: Vec<MapPoint> = aggregation
            .representatives
            .into_iter()
            .filter_map(|row| {
                let code = row.code(spec.code_field)?;
                let position = normalize(row.number(spec.x_field), row.number(spec.y_field))?;
                let region = spec.region_field.and_then(|field| row.text(field));
                Some(MapPoint {
                    code,
                    lat: position.lat,
                    lon: position.lon,
                    region,
                    row,
                })
            })
            .collect();
        if points.len() < total {
            debug!("{} of {} points have no usable position", total - points.len(), total);
        }
        Self {
            points,
            stats: aggregation.stats,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.stats.is_empty()
    }

    pub fn stats_for(&self, code: &str) -> Option<&PointStats> {
        self.stats.get(code)
    }
}
