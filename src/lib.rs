pub mod date_util;
pub mod diagnostics;
pub mod error;
pub mod ingest;
pub mod query;
pub mod records;
pub mod report;
pub mod stats;
pub mod storage;
pub mod views;

pub use diagnostics::{
    ChannelStability, Quadrant, QuadrantMap, QuadrantPoint, StabilitySummary,
};
pub use error::{Error, Result};
pub use query::{DateRange, Period, QueryContext, ViewName, ViewRows};
pub use records::{LoadReport, LoadStatus, PerformanceRecord, RecordStore};
pub use report::DashboardReport;
pub use storage::Database;
pub use views::{ChannelMonthly, ChannelRoi, DailyKpi, KpiMetric};

// Re-export repository types needed by the binary crate, but not the module itself
pub use storage::repository::{LoadJob, MaterializeCounts};

use std::path::Path;

use serde::Serialize;

use storage::repository;

/// Config key naming a stability CSV used when the table is empty.
pub const CONFIG_STABILITY_CSV: &str = "stability_csv";
/// Config key holding the range spec used when no range is given.
pub const CONFIG_DEFAULT_PERIOD: &str = "default_period";

const TARGET_RECORDS: &str = "campaign_performance";
const TARGET_STABILITY: &str = "roi_stability_summary";

/// Snapshot of what the warehouse holds.
#[derive(Debug, Clone, Serialize)]
pub struct WarehouseStatus {
    pub tables: Vec<(String, i64)>,
    /// First and last record date, as stored.
    pub date_range: Option<(String, String)>,
    pub recent_loads: Vec<LoadJob>,
}

/// Main entry point for the campaign performance warehouse.
pub struct AdsDW {
    db: Database,
}

impl AdsDW {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    // ── Ingestion ──────────────────────────────────────────────────

    /// Replace the dataset with the valid rows of a CSV file. When every row
    /// is rejected the stored dataset is left as it was.
    pub async fn ingest_csv(&self, path: impl AsRef<Path>) -> Result<LoadReport> {
        let path = path.as_ref();
        let job_id = self.start_job(TARGET_RECORDS, path).await?;

        let (records, report) = match ingest::read_records_file(path) {
            Ok(loaded) => loaded,
            Err(e) => {
                self.fail_job(job_id, &e).await?;
                return Err(e);
            }
        };

        if report.status == LoadStatus::Failed {
            log::warn!("{}: every row rejected, keeping existing data", report.source);
        } else {
            let count = self
                .db
                .writer()
                .call(move |conn| repository::replace_records(conn, &records))
                .await?;
            log::info!("stored {count} records from {}", report.source);
        }

        self.finish_job(job_id, &report).await?;
        Ok(report)
    }

    /// Replace the stability feed with the valid rows of a CSV file.
    pub async fn ingest_stability_csv(&self, path: impl AsRef<Path>) -> Result<LoadReport> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )));
        }
        let job_id = self.start_job(TARGET_STABILITY, path).await?;

        let (rows, report) = match ingest::read_stability_file(path) {
            Ok(loaded) => loaded,
            Err(e) => {
                self.fail_job(job_id, &e).await?;
                return Err(e);
            }
        };

        if report.status == LoadStatus::Failed {
            log::warn!("{}: every row rejected, keeping existing feed", report.source);
        } else {
            let count = self
                .db
                .writer()
                .call(move |conn| repository::replace_stability(conn, &rows))
                .await?;
            log::info!("stored {count} stability rows from {}", report.source);
        }

        self.finish_job(job_id, &report).await?;
        Ok(report)
    }

    async fn start_job(&self, target: &'static str, path: &Path) -> Result<i64> {
        let source = path.display().to_string();
        let job_id = self
            .db
            .writer()
            .call(move |conn| repository::insert_load_job(conn, target, &source))
            .await?;
        Ok(job_id)
    }

    async fn finish_job(&self, job_id: i64, report: &LoadReport) -> Result<()> {
        let status = format!("{:?}", report.status);
        let (loaded, rejected) = (report.rows_loaded, report.rows_rejected);
        self.db
            .writer()
            .call(move |conn| {
                repository::update_load_job(conn, job_id, &status, loaded, rejected, None)
            })
            .await?;
        Ok(())
    }

    async fn fail_job(&self, job_id: i64, err: &Error) -> Result<()> {
        let message = err.to_string();
        self.db
            .writer()
            .call(move |conn| {
                repository::update_load_job(conn, job_id, "Failed", 0, 0, Some(&message))
            })
            .await?;
        Ok(())
    }

    // ── Query context ──────────────────────────────────────────────

    /// Load the stored dataset and stability feed into a fresh query context.
    ///
    /// Stored rows that fail validation are skipped and counted in the
    /// returned report. The stability feed comes from its table, or from the
    /// `stability_csv` file when the table is empty.
    pub async fn load_context(&self) -> Result<(QueryContext, LoadReport)> {
        let stored = self
            .db
            .reader()
            .call(|conn| repository::load_records(conn))
            .await?;

        let mut report = LoadReport::new(TARGET_RECORDS);
        let mut records = Vec::with_capacity(stored.len());
        for (idx, row) in stored.into_iter().enumerate() {
            match row.and_then(|r| r.validated()) {
                Ok(record) => {
                    records.push(record);
                    report.accept();
                }
                Err(reason) => report.reject(&Error::malformed(idx + 1, reason)),
            }
        }
        if report.rows_rejected > 0 {
            log::warn!("skipped {} invalid stored records", report.rows_rejected);
        }

        let stability = self.load_stability().await?;
        log::info!(
            "loaded {} records and {} stability rows",
            records.len(),
            stability.len()
        );

        let ctx = QueryContext::new(RecordStore::new(records)).with_stability(stability);
        Ok((ctx, report))
    }

    async fn load_stability(&self) -> Result<Vec<StabilitySummary>> {
        let rows = self
            .db
            .reader()
            .call(|conn| repository::load_stability(conn))
            .await?;
        if !rows.is_empty() {
            return Ok(rows);
        }

        match self.config_get(CONFIG_STABILITY_CSV).await? {
            Some(path) => {
                let (rows, _) = ingest::read_stability_file(&path)?;
                Ok(rows)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Rebuild the three materialized view tables from the stored dataset.
    pub async fn materialize(&self) -> Result<MaterializeCounts> {
        let (ctx, _) = self.load_context().await?;
        let daily = ctx.all_daily_kpi().to_vec();
        let monthly = ctx.all_channel_monthly().to_vec();
        let roi = ctx.channel_roi().to_vec();

        let counts = self
            .db
            .writer()
            .call(move |conn| repository::write_views(conn, &daily, &monthly, &roi))
            .await?;
        log::info!(
            "materialized {} daily, {} monthly, {} channel rows",
            counts.daily_kpi,
            counts.channel_monthly,
            counts.channel_roi
        );
        Ok(counts)
    }

    pub async fn status(&self) -> Result<WarehouseStatus> {
        let status = self
            .db
            .reader()
            .call(|conn| {
                Ok::<_, rusqlite::Error>(WarehouseStatus {
                    tables: repository::table_counts(conn)?,
                    date_range: repository::record_date_bounds(conn)?,
                    recent_loads: repository::recent_load_jobs(conn, 5)?,
                })
            })
            .await?;
        Ok(status)
    }

    // ── Config ─────────────────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        let value = self
            .db
            .reader()
            .call(move |conn| repository::get_config(conn, &key))
            .await?;
        Ok(value)
    }

    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        if key == CONFIG_DEFAULT_PERIOD {
            Period::parse(value)?;
        }
        let key = key.to_string();
        let value = value.to_string();
        self.db
            .writer()
            .call(move |conn| repository::set_config(conn, &key, &value))
            .await?;
        Ok(())
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        let entries = self
            .db
            .reader()
            .call(|conn| repository::list_config(conn))
            .await?;
        Ok(entries)
    }

    /// The configured default period, if one is set.
    pub async fn default_period(&self) -> Result<Option<Period>> {
        self.config_get(CONFIG_DEFAULT_PERIOD)
            .await?
            .map(|spec| Period::parse(&spec))
            .transpose()
    }
}
