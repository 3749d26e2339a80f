use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::date_util::{format_date, parse_date};
use crate::diagnostics::StabilitySummary;
use crate::records::PerformanceRecord;
use crate::views::{ChannelMonthly, ChannelRoi, DailyKpi};

// ── Records ────────────────────────────────────────────────────────

/// Replace the whole dataset in one transaction.
pub fn replace_records(
    conn: &mut Connection,
    records: &[PerformanceRecord],
) -> Result<usize, rusqlite::Error> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM campaign_performance", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO campaign_performance (
                date, campaign_id, company, campaign_type, target_audience, duration,
                channel, conversion_rate, spend, roi, location, language,
                clicks, impressions, engagement_score, customer_segment,
                ctr, cpc, cpm, engagement_rate
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                       ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
        )?;
        for r in records {
            stmt.execute(params![
                format_date(r.date),
                r.campaign_id,
                r.company,
                r.campaign_type,
                r.target_audience,
                r.duration,
                r.channel,
                r.conversion_rate,
                r.spend,
                r.roi,
                r.location,
                r.language,
                r.clicks as i64,
                r.impressions as i64,
                r.engagement_score,
                r.customer_segment,
                r.ctr,
                r.cpc,
                r.cpm,
                r.engagement_rate,
            ])?;
        }
    }
    tx.commit()?;
    Ok(records.len())
}

/// A record as read back from the table, before validation.
pub type StoredRecord = std::result::Result<PerformanceRecord, String>;

/// Load every stored record in date order. Rows with an unparseable date,
/// negative counts or a value of the wrong type come back as `Err` with a
/// reason so the caller can count them.
pub fn load_records(conn: &Connection) -> Result<Vec<StoredRecord>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT id, date, campaign_id, company, campaign_type, target_audience, duration,
                channel, conversion_rate, spend, roi, location, language,
                clicks, impressions, engagement_score, customer_segment, engagement_rate
         FROM campaign_performance
         ORDER BY date, id",
    )?;
    let rows = stmt.query_map([], record_from_row)?;
    rows.collect()
}

fn record_from_row(row: &Row<'_>) -> Result<StoredRecord, rusqlite::Error> {
    let id: i64 = row.get(0)?;
    match decode_record(row) {
        Ok(record) => Ok(record.map_err(|reason| format!("row {id}: {reason}"))),
        Err(
            e @ (rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)),
        ) => Ok(Err(format!("row {id}: {e}"))),
        Err(e) => Err(e),
    }
}

fn decode_record(row: &Row<'_>) -> Result<StoredRecord, rusqlite::Error> {
    let date: String = row.get(1)?;
    let Some(date) = parse_date(&date) else {
        return Ok(Err(format!("invalid date '{date}'")));
    };
    let clicks: i64 = row.get(13)?;
    let impressions: i64 = row.get(14)?;
    if clicks < 0 || impressions < 0 {
        return Ok(Err("negative clicks or impressions".to_string()));
    }
    Ok(Ok(PerformanceRecord {
        date,
        campaign_id: row.get(2)?,
        company: row.get(3)?,
        campaign_type: row.get(4)?,
        target_audience: row.get(5)?,
        duration: row.get(6)?,
        channel: row.get(7)?,
        conversion_rate: row.get(8)?,
        spend: row.get(9)?,
        roi: row.get(10)?,
        location: row.get(11)?,
        language: row.get(12)?,
        clicks: clicks as u64,
        impressions: impressions as u64,
        engagement_score: row.get(15)?,
        customer_segment: row.get(16)?,
        engagement_rate: row.get(17)?,
        ctr: None,
        cpc: None,
        cpm: None,
    }))
}

// ── Stability feed ─────────────────────────────────────────────────

pub fn replace_stability(
    conn: &mut Connection,
    rows: &[StabilitySummary],
) -> Result<usize, rusqlite::Error> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM roi_stability_summary", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO roi_stability_summary (month_id, channel, spend, roi_mean, roi_cv)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for s in rows {
            stmt.execute(params![
                format_date(s.month_id),
                s.channel,
                s.spend,
                s.roi_mean,
                s.roi_cv
            ])?;
        }
    }
    tx.commit()?;
    Ok(rows.len())
}

/// Load the stability feed, skipping rows with an unparseable `month_id`.
pub fn load_stability(conn: &Connection) -> Result<Vec<StabilitySummary>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT month_id, channel, spend, roi_mean, roi_cv
         FROM roi_stability_summary
         ORDER BY month_id, channel, id",
    )?;
    let rows = stmt.query_map([], |row| {
        let month_id: String = row.get(0)?;
        Ok((
            month_id,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, f64>(3)?,
            row.get::<_, f64>(4)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (month_id, channel, spend, roi_mean, roi_cv) = row?;
        match parse_date(&month_id) {
            Some(month_id) => out.push(StabilitySummary {
                month_id,
                channel,
                spend,
                roi_mean,
                roi_cv,
            }),
            None => log::warn!("skipping stability row with month_id '{month_id}'"),
        }
    }
    Ok(out)
}

// ── Materialized views ─────────────────────────────────────────────

/// Row counts written by [`write_views`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaterializeCounts {
    pub daily_kpi: usize,
    pub channel_monthly: usize,
    pub channel_roi: usize,
}

/// Rewrite the three view tables in one transaction.
pub fn write_views(
    conn: &mut Connection,
    daily: &[DailyKpi],
    monthly: &[ChannelMonthly],
    roi: &[ChannelRoi],
) -> Result<MaterializeCounts, rusqlite::Error> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "DELETE FROM vw_marketing_kpi;
         DELETE FROM vw_campaign_monthly;
         DELETE FROM vw_campaign_roi_map;",
    )?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO vw_marketing_kpi
                (dt, spend, impressions, clicks, ctr, cpc_avg, cpm_avg, roi_avg, n_rows)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for k in daily {
            stmt.execute(params![
                format_date(k.dt),
                k.spend,
                k.impressions as i64,
                k.clicks as i64,
                k.ctr,
                k.cpc_avg,
                k.cpm_avg,
                k.roi_avg,
                k.n_rows as i64,
            ])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO vw_campaign_monthly
                (month_id, channel, spend, impressions, clicks, ctr, cpc_avg, cpm_avg,
                 roi_avg, conversion_rate_avg, n_rows)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;
        for m in monthly {
            stmt.execute(params![
                format_date(m.month_id),
                m.channel,
                m.spend,
                m.impressions as i64,
                m.clicks as i64,
                m.ctr,
                m.cpc_avg,
                m.cpm_avg,
                m.roi_avg,
                m.conversion_rate_avg,
                m.n_rows as i64,
            ])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO vw_campaign_roi_map (channel, spend, roi_avg, n_rows)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for r in roi {
            stmt.execute(params![r.channel, r.spend, r.roi_avg, r.n_rows as i64])?;
        }
    }
    tx.commit()?;
    Ok(MaterializeCounts {
        daily_kpi: daily.len(),
        channel_monthly: monthly.len(),
        channel_roi: roi.len(),
    })
}

// ── Table stats ────────────────────────────────────────────────────

/// Tables reported by `status`.
pub const STATUS_TABLES: [&str; 5] = [
    "campaign_performance",
    "roi_stability_summary",
    "vw_marketing_kpi",
    "vw_campaign_monthly",
    "vw_campaign_roi_map",
];

pub fn table_counts(conn: &Connection) -> Result<Vec<(String, i64)>, rusqlite::Error> {
    STATUS_TABLES
        .iter()
        .map(|table| {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok((table.to_string(), count))
        })
        .collect()
}

/// First and last date in `campaign_performance`.
pub fn record_date_bounds(
    conn: &Connection,
) -> Result<Option<(String, String)>, rusqlite::Error> {
    conn.query_row(
        "SELECT MIN(date), MAX(date) FROM campaign_performance",
        [],
        |row| {
            let min: Option<String> = row.get(0)?;
            let max: Option<String> = row.get(1)?;
            Ok(min.zip(max))
        },
    )
}

// ── Load jobs ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct LoadJob {
    pub id: i64,
    pub target: String,
    pub source: String,
    pub status: String,
    pub rows_loaded: u64,
    pub rows_rejected: u64,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub error_message: Option<String>,
}

pub fn insert_load_job(
    conn: &Connection,
    target: &str,
    source: &str,
) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO load_jobs (target, source, status, started_at)
         VALUES (?1, ?2, 'running', datetime('now'))",
        params![target, source],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_load_job(
    conn: &Connection,
    job_id: i64,
    status: &str,
    rows_loaded: u64,
    rows_rejected: u64,
    error_message: Option<&str>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "UPDATE load_jobs SET
            status = ?2, completed_at = datetime('now'),
            rows_loaded = ?3, rows_rejected = ?4,
            error_message = ?5
         WHERE id = ?1",
        params![
            job_id,
            status,
            rows_loaded as i64,
            rows_rejected as i64,
            error_message,
        ],
    )?;
    Ok(())
}

/// Most recent load jobs, newest first.
pub fn recent_load_jobs(conn: &Connection, limit: usize) -> Result<Vec<LoadJob>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT id, target, source, status, rows_loaded, rows_rejected,
                started_at, completed_at, error_message
         FROM load_jobs ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok(LoadJob {
            id: row.get(0)?,
            target: row.get(1)?,
            source: row.get(2)?,
            status: row.get(3)?,
            rows_loaded: row.get::<_, i64>(4)? as u64,
            rows_rejected: row.get::<_, i64>(5)? as u64,
            started_at: row.get(6)?,
            completed_at: row.get(7)?,
            error_message: row.get(8)?,
        })
    })?;
    rows.collect()
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}
