use clap::{Args, Parser, Subcommand};

use adsdw::{AdsDW, DateRange, KpiMetric, Period, QueryContext, ViewRows};

#[derive(Parser)]
#[command(name = "adsdw", about = "Marketing campaign performance warehouse CLI")]
struct Cli {
    /// Database path (default: ~/.adsdw/adsdw.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the campaign dataset with the valid rows of a CSV file
    Ingest {
        /// Path to the cleaned dataset CSV
        path: String,
    },
    /// Replace the ROI stability feed, or rank channels by stability
    Stability {
        /// Path to a stability CSV to load; omit to show the ranking
        path: Option<String>,
        #[command(flatten)]
        range: RangeArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rebuild the materialized view tables
    Materialize,
    /// Show a view over a date range
    View {
        /// daily_kpi, channel_monthly or channel_roi
        name: String,
        #[command(flatten)]
        range: RangeArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Output as CSV
        #[arg(long, conflicts_with = "json")]
        csv: bool,
    },
    /// Period-over-period change of a daily KPI
    Delta {
        /// spend, impressions, clicks, ctr, cpc, cpm or roi
        metric: String,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Classify channels into ROI vs spend quadrants
    Quadrants {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Dashboard summary for a date range
    Report {
        #[command(flatten)]
        range: RangeArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show warehouse status
    Status,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct RangeArgs {
    /// Period: 2021, 2021-H1, 2021-Q3, 2021-07, 2021-W05, 2021-07-04, 30d, 2m or all
    #[arg(long, short)]
    period: Option<String>,
    /// Start date (YYYY-MM-DD), inclusive
    #[arg(long, conflicts_with = "period")]
    from: Option<String>,
    /// End date (YYYY-MM-DD), inclusive
    #[arg(long, conflicts_with = "period")]
    to: Option<String>,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => adsdw::Database::open_at(path).await?,
        None => adsdw::Database::open().await?,
    };
    let dw = AdsDW::new(db);

    match cli.command {
        Commands::Ingest { path } => {
            let report = dw.ingest_csv(&path).await?;
            print_load_report(&report);
        }
        Commands::Stability {
            path: Some(path),
            ..
        } => {
            let report = dw.ingest_stability_csv(&path).await?;
            print_load_report(&report);
        }
        Commands::Stability {
            path: None,
            range,
            json,
        } => {
            let ctx = load_context(&dw).await?;
            let range = resolve_range(&dw, &ctx, &range, ctx.default_range()).await?;
            handle_stability(&ctx, range, json)?;
        }
        Commands::Materialize => {
            let counts = dw.materialize().await?;
            println!("Materialized views");
            println!("  vw_marketing_kpi:    {} rows", counts.daily_kpi);
            println!("  vw_campaign_monthly: {} rows", counts.channel_monthly);
            println!("  vw_campaign_roi_map: {} rows", counts.channel_roi);
        }
        Commands::View {
            name,
            range,
            json,
            csv,
        } => {
            let ctx = load_context(&dw).await?;
            let range = resolve_range(&dw, &ctx, &range, None).await?;
            let rows = ctx.get_view(&name, range)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if csv {
                print!("{}", adsdw::report::view_csv(&rows));
            } else {
                print_view(&rows);
            }
        }
        Commands::Delta { metric, range } => {
            let metric: KpiMetric = metric.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            let ctx = load_context(&dw).await?;
            let range = resolve_range(&dw, &ctx, &range, ctx.default_range()).await?;
            let delta = ctx.kpi_delta(metric, range);
            let days = ctx.kpi_series(metric, range).len();
            println!(
                "{}: {} over {range} ({days} days)",
                metric.as_str(),
                format_delta(delta)
            );
        }
        Commands::Quadrants { json } => {
            let ctx = load_context(&dw).await?;
            let map = ctx.quadrants();
            if json {
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                print_quadrants(&map);
            }
        }
        Commands::Report { range, json } => {
            let ctx = load_context(&dw).await?;
            let range = resolve_range(&dw, &ctx, &range, ctx.default_range()).await?;
            let report = adsdw::DashboardReport::build(&ctx, range);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Status => {
            print_status(&dw).await?;
        }
        Commands::Config { action } => {
            handle_config(&dw, action).await?;
        }
    }

    Ok(())
}

async fn load_context(dw: &AdsDW) -> anyhow::Result<QueryContext> {
    let (ctx, report) = dw.load_context().await?;
    if report.rows_rejected > 0 {
        eprintln!(
            "warning: {} stored rows failed validation and were skipped",
            report.rows_rejected
        );
    }
    if ctx.store().is_empty() {
        log::warn!("warehouse is empty. Run 'adsdw ingest <CSV>' first.");
    }
    Ok(ctx)
}

/// Explicit dates win, then `--period`, then the configured default period,
/// then `fallback`, then all time.
async fn resolve_range(
    dw: &AdsDW,
    ctx: &QueryContext,
    args: &RangeArgs,
    fallback: Option<DateRange>,
) -> anyhow::Result<DateRange> {
    if args.from.is_some() || args.to.is_some() {
        let full = DateRange::all();
        let start = match args.from.as_deref() {
            Some(s) => parse_day(s)?,
            None => full.start,
        };
        let end = match args.to.as_deref() {
            Some(s) => parse_day(s)?,
            None => full.end,
        };
        return Ok(DateRange::new(start, end));
    }
    if let Some(spec) = args.period.as_deref() {
        return Ok(ctx.resolve_period(&Period::parse(spec)?));
    }
    if let Some(period) = dw.default_period().await? {
        return Ok(ctx.resolve_period(&period));
    }
    Ok(fallback.unwrap_or_else(DateRange::all))
}

fn parse_day(s: &str) -> anyhow::Result<chrono::NaiveDate> {
    adsdw::date_util::parse_date(s)
        .ok_or_else(|| anyhow::anyhow!("invalid date '{s}' (expected YYYY-MM-DD)"))
}

fn handle_stability(ctx: &QueryContext, range: DateRange, json: bool) -> anyhow::Result<()> {
    let ranking = ctx.stability_ranking(range);
    if json {
        println!("{}", serde_json::to_string_pretty(&ranking)?);
        return Ok(());
    }
    if !ctx.has_stability() {
        println!("No stability data. Run 'adsdw stability <CSV>' or set stability_csv.");
        return Ok(());
    }
    println!("Channel Stability ({range})");
    print_stability(&ranking);
    Ok(())
}

async fn print_status(dw: &AdsDW) -> anyhow::Result<()> {
    let status = dw.status().await?;
    println!("Warehouse Status");
    for (table, count) in &status.tables {
        println!("  {table:<24} {count}");
    }
    match &status.date_range {
        Some((start, end)) => println!("  Dates: {start} to {end}"),
        None => println!("  Dates: no data"),
    }
    if let Some(last) = status.recent_loads.first() {
        println!(
            "  Last load: {} from {} ({}, {} rows, {} rejected) at {}",
            last.target,
            last.source,
            last.status,
            last.rows_loaded,
            last.rows_rejected,
            last.completed_at.as_deref().unwrap_or(&last.started_at)
        );
    } else {
        println!("  Last load: never");
    }
    Ok(())
}

async fn handle_config(dw: &AdsDW, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match dw.config_get(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            dw.config_set(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = dw.config_list().await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}

fn format_delta(delta: f64) -> String {
    let arrow = if delta >= 0.0 { "▲" } else { "▼" };
    format!("{arrow} {:.1}%", delta.abs() * 100.0)
}

fn opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(v) => format!("{v:.decimals$}"),
        None => "-".to_string(),
    }
}

fn print_load_report(report: &adsdw::LoadReport) {
    println!("Load: {}", report.source);
    println!("  Status:   {:?}", report.status);
    println!("  Loaded:   {} rows", report.rows_loaded);
    println!("  Rejected: {} rows", report.rows_rejected);
    for reason in &report.rejections {
        println!("    {reason}");
    }
    if report.rows_rejected as usize > report.rejections.len() {
        println!(
            "    ... and {} more",
            report.rows_rejected as usize - report.rejections.len()
        );
    }
}

fn print_view(rows: &ViewRows) {
    if rows.is_empty() {
        println!("No rows.");
        return;
    }
    match rows {
        ViewRows::DailyKpi(rows) => {
            println!(
                "{:<10}  {:>12}  {:>11}  {:>8}  {:>7}  {:>8}  {:>9}  {:>6}  {:>4}",
                "dt", "spend", "impressions", "clicks", "ctr", "cpc", "cpm", "roi", "rows"
            );
            for k in rows {
                println!(
                    "{:<10}  {:>12.2}  {:>11}  {:>8}  {:>7}  {:>8}  {:>9}  {:>6.2}  {:>4}",
                    k.dt,
                    k.spend,
                    k.impressions,
                    k.clicks,
                    opt(k.ctr, 4),
                    opt(k.cpc_avg, 2),
                    opt(k.cpm_avg, 2),
                    k.roi_avg,
                    k.n_rows
                );
            }
        }
        ViewRows::ChannelMonthly(rows) => {
            println!(
                "{:<10}  {:<16}  {:>12}  {:>11}  {:>8}  {:>7}  {:>8}  {:>9}  {:>6}  {:>4}",
                "month",
                "channel",
                "spend",
                "impressions",
                "clicks",
                "ctr",
                "cpc",
                "cpm",
                "roi",
                "rows"
            );
            for m in rows {
                println!(
                    "{:<10}  {:<16}  {:>12.2}  {:>11}  {:>8}  {:>7}  {:>8}  {:>9}  {:>6.2}  {:>4}",
                    m.month_id,
                    m.channel,
                    m.spend,
                    m.impressions,
                    m.clicks,
                    opt(m.ctr, 4),
                    opt(m.cpc_avg, 2),
                    opt(m.cpm_avg, 2),
                    m.roi_avg,
                    m.n_rows
                );
            }
        }
        ViewRows::ChannelRoi(rows) => {
            println!("{:<16}  {:>14}  {:>7}  {:>6}", "channel", "spend", "roi", "rows");
            for r in rows {
                println!(
                    "{:<16}  {:>14.2}  {:>7.3}  {:>6}",
                    r.channel, r.spend, r.roi_avg, r.n_rows
                );
            }
        }
    }
}

fn print_quadrants(map: &adsdw::QuadrantMap) {
    let (Some(median_spend), Some(median_roi)) = (map.median_spend, map.median_roi) else {
        println!("No channels to classify.");
        return;
    };
    println!("ROI vs Spend Quadrants");
    println!("  Median spend: {median_spend:.2}");
    println!("  Median ROI:   {median_roi:.3}");
    for p in &map.points {
        println!(
            "  {:<16}  spend {:>14.2}  roi {:>7.3}  {}",
            p.channel, p.spend, p.roi_avg, p.quadrant
        );
    }
}

fn print_stability(ranking: &[adsdw::ChannelStability]) {
    if ranking.is_empty() {
        println!("  No stability rows in range.");
        return;
    }
    println!(
        "  {:<16}  {:>14}  {:>8}  {:>7}  {:>6}",
        "channel", "total_spend", "roi_mean", "roi_cv", "months"
    );
    for s in ranking {
        println!(
            "  {:<16}  {:>14.2}  {:>8.3}  {:>7.3}  {:>6}",
            s.channel, s.total_spend, s.roi_mean, s.roi_cv, s.months
        );
    }
}

fn print_report(report: &adsdw::DashboardReport) {
    println!("Marketing Campaign Report ({})", report.range);
    if report.cards.is_empty() {
        println!("  No data in range.");
    } else {
        for card in &report.cards {
            let value = match (card.label, card.value) {
                (_, None) => "-".to_string(),
                ("CTR", Some(v)) => format!("{:.2}%", v * 100.0),
                ("Avg Daily Spend", Some(v)) => format!("${v:.0}"),
                (_, Some(v)) => format!("{v:.2}"),
            };
            println!("  {:<16} {:>12}  {}", card.label, value, format_delta(card.delta));
        }
    }

    if !report.spend_share.is_empty() {
        println!();
        println!("Spend Share by Channel");
        for s in &report.spend_share {
            println!(
                "  {:<16} {:>14.2}  {:>5.1}%",
                s.channel,
                s.spend,
                s.share * 100.0
            );
        }
    }

    println!();
    print_quadrants(&report.quadrants);

    if !report.stability.is_empty() {
        println!();
        println!("Channel Stability");
        print_stability(&report.stability);
    }

    if !report.monthly.is_empty() {
        println!();
        println!("Monthly Performance");
        print_view(&ViewRows::ChannelMonthly(report.monthly.clone()));
    }
}
