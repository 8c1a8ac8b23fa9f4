//! Time bucketing for trend charts.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Bucket size for time-trend aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    #[default]
    Month,
    Year,
}

impl Granularity {
    /// First day of the bucket containing `date`.
    pub fn bucket_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Month => date.with_day(1).unwrap_or(date),
            Granularity::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        }
    }

    /// Start of the bucket after the one starting at `start`.
    pub fn next(self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Day => start.succ_opt(),
            Granularity::Month => {
                let (y, m) = if start.month() == 12 {
                    (start.year() + 1, 1)
                } else {
                    (start.year(), start.month() + 1)
                };
                NaiveDate::from_ymd_opt(y, m, 1)
            }
            Granularity::Year => NaiveDate::from_ymd_opt(start.year() + 1, 1, 1),
        }
    }

    /// Axis label for a bucket start.
    pub fn label(self, start: NaiveDate) -> String {
        match self {
            Granularity::Day => start.format("%Y-%m-%d").to_string(),
            Granularity::Month => start.format("%Y-%m").to_string(),
            Granularity::Year => start.format("%Y").to_string(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Month => "month",
            Granularity::Year => "year",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(Granularity::Day),
            "month" | "monthly" => Ok(Granularity::Month),
            "year" | "yearly" | "annual" => Ok(Granularity::Year),
            other => Err(format!("unknown granularity '{other}' (day, month, year)")),
        }
    }
}

/// Sum `points` into consecutive buckets from `start` to `end`.
///
/// Open bounds fall back to the earliest/latest point. Every bucket in the
/// span is present, zero when nothing fell into it. Points outside the span
/// are ignored.
pub fn bucket_series(
    points: &[(NaiveDate, f64)],
    granularity: Granularity,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<(NaiveDate, f64)> {
    let first = start.or_else(|| points.iter().map(|(d, _)| *d).min());
    let last = end.or_else(|| points.iter().map(|(d, _)| *d).max());
    let (Some(first), Some(last)) = (first, last) else {
        return Vec::new();
    };

    let first = granularity.bucket_start(first);
    let last = granularity.bucket_start(last);

    let mut sums: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (date, value) in points {
        let bucket = granularity.bucket_start(*date);
        if bucket >= first && bucket <= last {
            *sums.entry(bucket).or_insert(0.0) += value;
        }
    }

    let mut series = Vec::new();
    let mut cursor = Some(first);
    while let Some(bucket) = cursor {
        if bucket > last {
            break;
        }
        series.push((bucket, sums.get(&bucket).copied().unwrap_or(0.0)));
        cursor = granularity.next(bucket);
    }
    series
}
