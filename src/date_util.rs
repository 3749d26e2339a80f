use chrono::{Datelike, Duration, NaiveDate};

/// Get the last day of a given month.
pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.map(|d| d - Duration::days(1)).unwrap_or(NaiveDate::MAX)
}

/// Truncate a date to the first day of its month (the `month_id` key).
pub fn month_start(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

/// Parse an ISO-8601 calendar date. A trailing time part (`2021-03-04 00:00:00`
/// or `2021-03-04T00:00:00`) is tolerated and dropped.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let day = s.get(..10)?;
    let rest = &s[10..];
    if !(rest.is_empty() || rest.starts_with(' ') || rest.starts_with('T')) {
        return None;
    }
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

pub fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(last_day_of_month(2025, 1), d(2025, 1, 31));
        assert_eq!(last_day_of_month(2025, 2), d(2025, 2, 28));
        assert_eq!(last_day_of_month(2024, 2), d(2024, 2, 29)); // Leap year
        assert_eq!(last_day_of_month(2025, 12), d(2025, 12, 31));
    }

    #[test]
    fn test_month_start() {
        assert_eq!(month_start(d(2021, 7, 19)), d(2021, 7, 1));
        assert_eq!(month_start(d(2021, 7, 1)), d(2021, 7, 1));
    }

    #[test]
    fn test_parse_date_variants() {
        assert_eq!(parse_date("2021-03-04"), Some(d(2021, 3, 4)));
        assert_eq!(parse_date(" 2021-03-04 "), Some(d(2021, 3, 4)));
        assert_eq!(parse_date("2021-03-04 00:00:00"), Some(d(2021, 3, 4)));
        assert_eq!(parse_date("2021-03-04T00:00:00"), Some(d(2021, 3, 4)));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("2021-13-01"), None);
        assert_eq!(parse_date("03/04/2021"), None);
        assert_eq!(parse_date("2021-03-041"), None);
    }
}
