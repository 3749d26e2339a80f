use crate::date_util::format_date;
use crate::ingest::csv::escape;
use crate::query::ViewRows;

/// Render a view as CSV with a header row. Undefined rates are left blank.
pub fn view_csv(rows: &ViewRows) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(rows.len() + 1);
    match rows {
        ViewRows::DailyKpi(rows) => {
            lines.push("dt,spend,impressions,clicks,ctr,cpc_avg,cpm_avg,roi_avg,n_rows".into());
            for k in rows {
                lines.push(join(&[
                    format_date(k.dt),
                    k.spend.to_string(),
                    k.impressions.to_string(),
                    k.clicks.to_string(),
                    opt(k.ctr),
                    opt(k.cpc_avg),
                    opt(k.cpm_avg),
                    k.roi_avg.to_string(),
                    k.n_rows.to_string(),
                ]));
            }
        }
        ViewRows::ChannelMonthly(rows) => {
            lines.push(
                "month_id,channel,spend,impressions,clicks,ctr,cpc_avg,cpm_avg,roi_avg,conversion_rate_avg,n_rows"
                    .into(),
            );
            for m in rows {
                lines.push(join(&[
                    format_date(m.month_id),
                    m.channel.clone(),
                    m.spend.to_string(),
                    m.impressions.to_string(),
                    m.clicks.to_string(),
                    opt(m.ctr),
                    opt(m.cpc_avg),
                    opt(m.cpm_avg),
                    m.roi_avg.to_string(),
                    m.conversion_rate_avg.to_string(),
                    m.n_rows.to_string(),
                ]));
            }
        }
        ViewRows::ChannelRoi(rows) => {
            lines.push("channel,spend,roi_avg,n_rows".into());
            for r in rows {
                lines.push(join(&[
                    r.channel.clone(),
                    r.spend.to_string(),
                    r.roi_avg.to_string(),
                    r.n_rows.to_string(),
                ]));
            }
        }
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn opt(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn join(cells: &[String]) -> String {
    cells.iter().map(|c| escape(c)).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::{ChannelRoi, DailyKpi};
    use chrono::NaiveDate;

    #[test]
    fn test_daily_csv_blank_for_undefined() {
        let rows = ViewRows::DailyKpi(vec![DailyKpi {
            dt: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            spend: 12.5,
            impressions: 0,
            clicks: 0,
            ctr: None,
            cpc_avg: None,
            cpm_avg: None,
            roi_avg: 2.0,
            n_rows: 1,
        }]);
        let csv = view_csv(&rows);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "dt,spend,impressions,clicks,ctr,cpc_avg,cpm_avg,roi_avg,n_rows");
        assert_eq!(lines[1], "2021-01-01,12.5,0,0,,,,2,1");
    }

    #[test]
    fn test_channel_names_are_escaped() {
        let rows = ViewRows::ChannelRoi(vec![ChannelRoi {
            channel: "Ads, Display".into(),
            spend: 1.0,
            roi_avg: 0.5,
            n_rows: 2,
        }]);
        let csv = view_csv(&rows);
        assert!(csv.contains("\"Ads, Display\",1,0.5,2"), "{csv}");
    }

    #[test]
    fn test_empty_view_is_header_only() {
        let csv = view_csv(&ViewRows::ChannelRoi(Vec::new()));
        assert_eq!(csv, "channel,spend,roi_avg,n_rows\n");
    }
}
