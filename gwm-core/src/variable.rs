use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Columns a variable's backend table exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableSpec {
    /// Backend table name.
    pub table: &'static str,
    /// Human-readable label.
    pub label: &'static str,
    /// Monitoring point code column.
    pub code_field: &'static str,
    /// Easting or longitude column.
    pub x_field: &'static str,
    /// Northing or latitude column.
    pub y_field: &'static str,
    /// Observation date column.
    pub date_field: &'static str,
    /// Aquifer system / basin column, if the table has one.
    pub region_field: Option<&'static str>,
    /// Measured value columns.
    pub value_fields: &'static [&'static str],
}

impl VariableSpec {
    /// Column projection used when fetching rows for this variable.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec![
            self.code_field.to_string(),
            self.x_field.to_string(),
            self.y_field.to_string(),
            self.date_field.to_string(),
        ];
        if let Some(region) = self.region_field {
            columns.push(region.to_string());
        }
        columns.extend(self.value_fields.iter().map(|f| f.to_string()));
        columns
    }
}

const DEPTH: VariableSpec = VariableSpec {
    table: "well_depth",
    label: "Well depth",
    code_field: "point_code",
    x_field: "x",
    y_field: "y",
    date_field: "sample_date",
    region_field: Some("aquifer_system"),
    value_fields: &["depth_m"],
};

const NITRATE: VariableSpec = VariableSpec {
    table: "nitrate_samples",
    label: "Nitrate",
    code_field: "point_code",
    x_field: "x",
    y_field: "y",
    date_field: "sample_date",
    region_field: Some("aquifer_system"),
    value_fields: &["no3_mg_l"],
};

const CONDUCTIVITY: VariableSpec = VariableSpec {
    table: "conductivity_samples",
    label: "Electrical conductivity",
    code_field: "point_code",
    x_field: "x",
    y_field: "y",
    date_field: "sample_date",
    region_field: Some("aquifer_system"),
    value_fields: &["ec_us_cm"],
};

const FLOW: VariableSpec = VariableSpec {
    table: "flow_measurements",
    label: "Flow",
    code_field: "station_code",
    x_field: "lon",
    y_field: "lat",
    date_field: "measured_at",
    region_field: Some("basin"),
    value_fields: &["discharge_m3_s", "stage_m"],
};

const METEO: VariableSpec = VariableSpec {
    table: "meteo_readings",
    label: "Meteorological",
    code_field: "station_code",
    x_field: "lon",
    y_field: "lat",
    date_field: "reading_date",
    region_field: None,
    value_fields: &["rain_mm", "temp_c"],
};

/// Measured quantity selectable in the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variable {
    Depth,
    Nitrate,
    Conductivity,
    Flow,
    Meteo,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown variable: {0}")]
pub struct UnknownVariable(pub String);

impl Variable {
    pub const ALL: [Variable; 5] = [
        Variable::Depth,
        Variable::Nitrate,
        Variable::Conductivity,
        Variable::Flow,
        Variable::Meteo,
    ];

    /// Lowercase identifier used in cache keys and on the command line.
    pub fn slug(&self) -> &'static str {
        match self {
            Variable::Depth => "depth",
            Variable::Nitrate => "nitrate",
            Variable::Conductivity => "conductivity",
            Variable::Flow => "flow",
            Variable::Meteo => "meteo",
        }
    }

    pub fn spec(&self) -> &'static VariableSpec {
        match self {
            Variable::Depth => &DEPTH,
            Variable::Nitrate => &NITRATE,
            Variable::Conductivity => &CONDUCTIVITY,
            Variable::Flow => &FLOW,
            Variable::Meteo => &METEO,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Variable {
    type Err = UnknownVariable;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Variable::ALL
            .into_iter()
            .find(|v| v.slug() == lowered)
            .ok_or_else(|| UnknownVariable(s.to_string()))
    }
}
