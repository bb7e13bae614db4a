//! Point, region and history queries.

use crate::context::Context;
use crate::OutputFormat;
use gwm_core::{Region, Row, Variable, VariableSpec};
use gwm_query::PointSet;
use log::info;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// One CSV line per monitoring point.
#[derive(Debug, Serialize, PartialEq)]
pub struct PointRecord {
    pub code: String,
    pub lat: f64,
    pub lon: f64,
    pub region: String,
    pub first_date: String,
    pub last_date: String,
    pub samples: u64,
}

impl PointRecord {
    pub fn from_point_set(points: &PointSet) -> Vec<PointRecord> {
        points
            .points
            .iter()
            .map(|point| {
                let stats = points.stats_for(&point.code).cloned().unwrap_or_default();
                PointRecord {
                    code: point.code.clone(),
                    lat: point.lat,
                    lon: point.lon,
                    region: point.region.clone().unwrap_or_default(),
                    first_date: stats.min.unwrap_or_default(),
                    last_date: stats.max.unwrap_or_default(),
                    samples: stats.count,
                }
            })
            .collect()
    }
}

fn open_output(output: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    })
}

pub fn write_points<W: Write>(points: &PointSet, format: OutputFormat, writer: W) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let mut writer = writer;
            serde_json::to_writer_pretty(&mut writer, points)?;
            writeln!(writer)?;
            writer.flush()?;
        }
        OutputFormat::Csv => {
            let mut csv = csv::Writer::from_writer(writer);
            for record in PointRecord::from_point_set(points) {
                csv.serialize(record)?;
            }
            csv.flush()?;
        }
    }
    Ok(())
}

/// Rows as CSV with the variable's columns as header; absent values are empty.
pub fn write_history<W: Write>(
    rows: &[Row],
    spec: &VariableSpec,
    format: OutputFormat,
    writer: W,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let mut writer = writer;
            serde_json::to_writer_pretty(&mut writer, rows)?;
            writeln!(writer)?;
            writer.flush()?;
        }
        OutputFormat::Csv => {
            let columns = spec.columns();
            let mut csv = csv::Writer::from_writer(writer);
            csv.write_record(&columns)?;
            for row in rows {
                csv.write_record(columns.iter().map(|c| row.text(c).unwrap_or_default()))?;
            }
            csv.flush()?;
        }
    }
    Ok(())
}

pub async fn run_points(
    context: &Context,
    variable: Variable,
    region: &Region,
    format: OutputFormat,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let points = context.orchestrator.load_points(variable, region).await?;
    info!(
        "{} in {}: {} points, {} with observations",
        variable,
        region,
        points.points.len(),
        points.stats.len()
    );
    write_points(&points, format, open_output(output)?)
}

pub async fn run_regions(context: &Context, variable: Variable) -> anyhow::Result<()> {
    let regions = context.orchestrator.load_regions(variable).await?;
    if regions.is_empty() {
        info!("{} has no regions", variable);
    }
    let mut out = io::stdout().lock();
    for region in regions {
        writeln!(out, "{}", region)?;
    }
    Ok(())
}

pub async fn run_history(
    context: &Context,
    variable: Variable,
    code: &str,
    format: OutputFormat,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let rows = context.orchestrator.load_point_history(variable, code).await?;
    info!("{} {}: {} observations", variable, code, rows.len());
    write_history(&rows, variable.spec(), format, open_output(output)?)
}
