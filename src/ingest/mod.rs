//! CSV ingestion of the cleaned dataset and the optional stability feed.
//!
//! Rows failing validation are rejected one by one and counted in the
//! returned [`LoadReport`]; a bad row never aborts the load. Only an
//! unreadable file or a header lacking required columns is fatal.

pub mod csv;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::date_util::parse_date;
use crate::diagnostics::StabilitySummary;
use crate::error::{Error, Result};
use crate::records::{LoadReport, PerformanceRecord};

use self::csv::{CsvRow, CsvTable};

/// Columns of the cleaned dataset export, in file order.
pub const RECORD_COLUMNS: [&str; 20] = [
    "date",
    "campaign_id",
    "company",
    "campaign_type",
    "target_audience",
    "duration",
    "channel",
    "conversion_rate",
    "spend",
    "roi",
    "location",
    "language",
    "clicks",
    "impressions",
    "engagement_score",
    "customer_segment",
    "ctr",
    "cpc",
    "cpm",
    "engagement_rate",
];

const REQUIRED_RECORD_COLUMNS: [&str; 6] =
    ["date", "channel", "spend", "roi", "clicks", "impressions"];

pub const STABILITY_COLUMNS: [&str; 5] = ["month_id", "channel", "spend", "roi_mean", "roi_cv"];

/// Read performance records from CSV text.
pub fn read_records(
    reader: impl BufRead,
    source: &str,
) -> Result<(Vec<PerformanceRecord>, LoadReport)> {
    let table = CsvTable::read(reader)?;
    let mut report = LoadReport::new(source);
    if table.is_empty() {
        log::warn!("{source}: no header, nothing to load");
        return Ok((Vec::new(), report));
    }
    table.require(&REQUIRED_RECORD_COLUMNS)?;

    let mut records = Vec::new();
    for row in table.rows() {
        if row.width() != table.width() {
            log::debug!(
                "{source}: line {} has {} cells, header has {}",
                row.line,
                row.width(),
                table.width()
            );
        }
        match record_from_row(&row).and_then(|r| {
            r.validated().map_err(|reason| Error::malformed(row.line, reason))
        }) {
            Ok(record) => {
                records.push(record);
                report.accept();
            }
            Err(e) => report.reject(&e),
        }
    }
    log::info!(
        "{source}: {} rows read, {} rejected",
        report.rows_loaded,
        report.rows_rejected
    );
    Ok((records, report))
}

pub fn read_records_file(path: impl AsRef<Path>) -> Result<(Vec<PerformanceRecord>, LoadReport)> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read_records(BufReader::new(file), &path.display().to_string())
}

/// Read the stability feed from CSV text.
pub fn read_stability(
    reader: impl BufRead,
    source: &str,
) -> Result<(Vec<StabilitySummary>, LoadReport)> {
    let table = CsvTable::read(reader)?;
    let mut report = LoadReport::new(source);
    if table.is_empty() {
        return Ok((Vec::new(), report));
    }
    table.require(&STABILITY_COLUMNS)?;

    let mut rows = Vec::new();
    for row in table.rows() {
        match stability_from_row(&row) {
            Ok(summary) => {
                rows.push(summary);
                report.accept();
            }
            Err(e) => report.reject(&e),
        }
    }
    log::info!(
        "{source}: {} stability rows read, {} rejected",
        report.rows_loaded,
        report.rows_rejected
    );
    Ok((rows, report))
}

/// Read the stability feed from a file. A missing file is not an error: the
/// feed is optional and its absence means an empty ranking.
pub fn read_stability_file(path: impl AsRef<Path>) -> Result<(Vec<StabilitySummary>, LoadReport)> {
    let path = path.as_ref();
    let source = path.display().to_string();
    if !path.exists() {
        log::info!("{source}: stability feed not present");
        return Ok((Vec::new(), LoadReport::new(source)));
    }
    let file = File::open(path)?;
    read_stability(BufReader::new(file), &source)
}

fn record_from_row(row: &CsvRow<'_>) -> Result<PerformanceRecord> {
    let line = row.line;
    let field = |name: &str| -> Result<f64> { parse_float(row.get(name), name, line) };
    let optional = |name: &str| -> Result<f64> {
        match row.get(name) {
            "" => Ok(0.0),
            s => parse_float(s, name, line),
        }
    };

    let date = parse_date(row.get("date"))
        .ok_or_else(|| Error::malformed(line, format!("invalid date '{}'", row.get("date"))))?;
    let campaign_id = match row.get("campaign_id") {
        "" => 0,
        s => parse_count(s, "campaign_id", line)? as i64,
    };
    let engagement_score = match row.get("engagement_score") {
        "" => 0,
        s => parse_float(s, "engagement_score", line)?.round() as i64,
    };

    Ok(PerformanceRecord {
        date,
        campaign_id,
        company: row.get("company").to_string(),
        campaign_type: row.get("campaign_type").to_string(),
        target_audience: row.get("target_audience").to_string(),
        duration: row.get("duration").to_string(),
        channel: row.get("channel").to_string(),
        conversion_rate: optional("conversion_rate")?,
        spend: field("spend")?,
        roi: field("roi")?,
        location: row.get("location").to_string(),
        language: row.get("language").to_string(),
        clicks: parse_count(row.get("clicks"), "clicks", line)?,
        impressions: parse_count(row.get("impressions"), "impressions", line)?,
        engagement_score,
        customer_segment: row.get("customer_segment").to_string(),
        engagement_rate: optional("engagement_rate")?,
        ctr: None,
        cpc: None,
        cpm: None,
    })
}

fn stability_from_row(row: &CsvRow<'_>) -> Result<StabilitySummary> {
    let line = row.line;
    let month_id = parse_date(row.get("month_id")).ok_or_else(|| {
        Error::malformed(line, format!("invalid month_id '{}'", row.get("month_id")))
    })?;
    let channel = row.get("channel");
    if channel.is_empty() {
        return Err(Error::malformed(line, "channel is empty"));
    }
    let summary = StabilitySummary {
        month_id,
        channel: channel.to_string(),
        spend: parse_float(row.get("spend"), "spend", line)?,
        roi_mean: parse_float(row.get("roi_mean"), "roi_mean", line)?,
        roi_cv: parse_float(row.get("roi_cv"), "roi_cv", line)?,
    };
    Ok(summary)
}

/// Finite float, with `$` and thousands separators tolerated.
fn parse_float(s: &str, name: &str, line: usize) -> Result<f64> {
    let cleaned: String = s.chars().filter(|c| *c != '$' && *c != ',').collect();
    match cleaned.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(Error::malformed(line, format!("{name} is not a number: '{s}'"))),
    }
}

/// Non-negative whole number. Float spellings such as `120.0` are accepted
/// since dataframe exports widen integer columns that once held nulls.
fn parse_count(s: &str, name: &str, line: usize) -> Result<u64> {
    if let Ok(v) = s.parse::<u64>() {
        return Ok(v);
    }
    let v = parse_float(s, name, line)?;
    if v < 0.0 || v.fract() != 0.0 || v > u64::MAX as f64 {
        return Err(Error::malformed(
            line,
            format!("{name} must be a non-negative whole number, got '{s}'"),
        ));
    }
    Ok(v as u64)
}
