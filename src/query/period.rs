use std::sync::LazyLock;

use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use regex::Regex;

use crate::date_util::{last_day_of_month, parse_date};
use crate::error::{Error, Result};
use crate::query::range::DateRange;

static RE_HALF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-H([12])$").unwrap());
static RE_QUARTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-Q([1-4])$").unwrap());
static RE_WEEK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-W(\d{1,2})$").unwrap());
static RE_MONTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());
static RE_TRAILING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,4})([dDmM])$").unwrap());

/// A reporting period. Trailing periods are resolved against an anchor date,
/// normally the last date observed in the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Period {
    All,
    Year(i32),
    Half(i32, u8),
    Quarter(i32, u8),
    Month(i32, u8),
    Week(i32, u8),
    Day(NaiveDate),
    TrailingDays(u32),
    TrailingMonths(u32),
}

impl Period {
    /// Parse a period string.
    ///
    /// Supported formats:
    /// - `all` — everything
    /// - `2021` — year
    /// - `2021-H1` — half
    /// - `2021-Q1` — quarter
    /// - `2021-01` — month
    /// - `2021-W05` — ISO week
    /// - `2021-01-15` — single day
    /// - `30d` — the last N days up to the anchor
    /// - `2m` — the last N months up to the anchor
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.eq_ignore_ascii_case("all") {
            return Ok(Period::All);
        }

        if let Some(caps) = RE_TRAILING.captures(s) {
            let n: u32 = caps[1].parse().unwrap();
            if n == 0 {
                return Err(Error::PeriodParse(format!("empty trailing period: {s}")));
            }
            return Ok(match &caps[2] {
                "d" | "D" => Period::TrailingDays(n),
                _ => Period::TrailingMonths(n),
            });
        }

        if s.len() == 4 {
            if let Ok(year) = s.parse::<i32>() {
                return Ok(Period::Year(year));
            }
        }

        if let Some(caps) = RE_HALF.captures(s) {
            let year: i32 = caps[1].parse().unwrap();
            let half: u8 = caps[2].parse().unwrap();
            return Ok(Period::Half(year, half));
        }

        if let Some(caps) = RE_QUARTER.captures(s) {
            let year: i32 = caps[1].parse().unwrap();
            let q: u8 = caps[2].parse().unwrap();
            return Ok(Period::Quarter(year, q));
        }

        if let Some(caps) = RE_WEEK.captures(s) {
            let year: i32 = caps[1].parse().unwrap();
            let week: u8 = caps[2].parse().unwrap();
            if NaiveDate::from_isoywd_opt(year, week as u32, Weekday::Mon).is_some() {
                return Ok(Period::Week(year, week));
            }
        }

        if let Some(caps) = RE_MONTH.captures(s) {
            let year: i32 = caps[1].parse().unwrap();
            let month: u8 = caps[2].parse().unwrap();
            if (1..=12).contains(&month) {
                return Ok(Period::Month(year, month));
            }
        }

        if let Some(day) = parse_date(s) {
            if s.len() == 10 {
                return Ok(Period::Day(day));
            }
        }

        Err(Error::PeriodParse(format!("unrecognized period: {s}")))
    }

    /// Convert to a canonical key string.
    pub fn to_key(&self) -> String {
        match self {
            Period::All => "all".to_string(),
            Period::Year(y) => format!("{y}"),
            Period::Half(y, h) => format!("{y}-H{h}"),
            Period::Quarter(y, q) => format!("{y}-Q{q}"),
            Period::Month(y, m) => format!("{y}-{m:02}"),
            Period::Week(y, w) => format!("{y}-W{w:02}"),
            Period::Day(d) => d.format("%Y-%m-%d").to_string(),
            Period::TrailingDays(n) => format!("{n}d"),
            Period::TrailingMonths(n) => format!("{n}m"),
        }
    }

    /// Inclusive date range for this period. `anchor` is the end of trailing
    /// periods and is ignored by calendar periods.
    pub fn date_range(&self, anchor: NaiveDate) -> DateRange {
        match self {
            Period::All => DateRange::all(),
            Period::Year(y) => DateRange::new(ymd(*y, 1, 1), ymd(*y, 12, 31)),
            Period::Half(y, h) => {
                if *h == 1 {
                    DateRange::new(ymd(*y, 1, 1), ymd(*y, 6, 30))
                } else {
                    DateRange::new(ymd(*y, 7, 1), ymd(*y, 12, 31))
                }
            }
            Period::Quarter(y, q) => {
                let start_month = (*q as u32 - 1) * 3 + 1;
                let end_month = *q as u32 * 3;
                DateRange::new(ymd(*y, start_month, 1), last_day_of_month(*y, end_month))
            }
            Period::Month(y, m) => {
                DateRange::new(ymd(*y, *m as u32, 1), last_day_of_month(*y, *m as u32))
            }
            Period::Week(y, w) => {
                let start = NaiveDate::from_isoywd_opt(*y, *w as u32, Weekday::Mon)
                    .unwrap_or(NaiveDate::MIN);
                DateRange::new(start, start + Duration::days(6))
            }
            Period::Day(d) => DateRange::new(*d, *d),
            Period::TrailingDays(n) => {
                DateRange::new(anchor - Duration::days(*n as i64 - 1), anchor)
            }
            Period::TrailingMonths(n) => {
                let start = anchor
                    .checked_sub_months(Months::new(*n))
                    .unwrap_or(NaiveDate::MIN);
                DateRange::new(start, anchor)
            }
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_key())
    }
}

/// Calendar date from parts already validated by `Period::parse`.
fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}
