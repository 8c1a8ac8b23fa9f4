//! Data Processor Module
//! Cleans crash records (type coercion, validation) and narrows them to the
//! requested region and time range.

use crate::config::RunConfig;
use crate::data::record::{CrashDataset, CrashRecord, Value, COUNTY, DATE, LAT, LON, STATE};
use crate::data::regions::{county_key, normalize_state};
use crate::error::{CrashError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info};

/// Numeric columns known regardless of chart requirements.
const KNOWN_NUMERIC: &[&str] = &[LAT, LON, "injuries", "fatalities"];

/// FARS-style latitude codes for "not reported / not available / unknown".
const UNKNOWN_LATITUDES: [f64; 3] = [77.7777, 88.8888, 99.9999];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// How a chart needs a field to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldKind {
    /// Any present value (text or number).
    Categorical,
    /// A finite number passing range checks.
    Numeric,
}

/// A field a chart cannot render without.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FieldRequirement {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldRequirement {
    pub fn categorical(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Categorical,
        }
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Numeric,
        }
    }
}

/// Why a row was dropped during cleaning.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum DropReason {
    Missing(String),
    Malformed(String),
    OutOfRange(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Missing(field) => write!(f, "missing {field}"),
            DropReason::Malformed(field) => write!(f, "malformed {field}"),
            DropReason::OutOfRange(field) => write!(f, "{field} out of range"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRow {
    pub index: usize,
    pub reason: DropReason,
}

/// What cleaning did to the dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleaningReport {
    pub examined: usize,
    pub dropped: Vec<DroppedRow>,
    pub outside_region: usize,
    pub outside_range: usize,
    pub retained: usize,
}

impl CleaningReport {
    /// Dropped-row counts grouped by reason.
    pub fn reason_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.dropped {
            *counts.entry(row.reason.to_string()).or_insert(0) += 1;
        }
        counts
    }
}

/// Outcome of coercing a single cell.
enum Coerced {
    Ok(Value),
    Malformed,
    OutOfRange,
}

/// Handles data cleaning and filtering operations.
pub struct DataProcessor;

impl DataProcessor {
    /// Clean `dataset` for one chart and restrict it to the run's region and range.
    ///
    /// `date`, `state` and the run's measure are always required, `county`
    /// when the region names one, and `lat`/`lon` when the dataset carries
    /// coordinates. Other optional fields that fail coercion are left absent
    /// rather than dropping the row.
    pub fn clean(
        dataset: &CrashDataset,
        config: &RunConfig,
        requirements: &[FieldRequirement],
    ) -> Result<(CrashDataset, CleaningReport)> {
        let mut required: BTreeSet<String> = [DATE, STATE].iter().map(|s| s.to_string()).collect();
        required.insert(config.measure.clone());
        if config.region.county.is_some() {
            required.insert(COUNTY.to_string());
        }
        for coordinate in [LAT, LON] {
            if dataset.has_column(coordinate) {
                required.insert(coordinate.to_string());
            }
        }
        let mut numeric: BTreeSet<String> = KNOWN_NUMERIC.iter().map(|s| s.to_string()).collect();
        numeric.insert(config.measure.clone());
        for req in requirements {
            required.insert(req.name.clone());
            if req.kind == FieldKind::Numeric {
                numeric.insert(req.name.clone());
            }
        }

        let wanted_county = config.region.county.as_deref().map(county_key);
        let mut report = CleaningReport {
            examined: dataset.len(),
            ..CleaningReport::default()
        };
        let mut kept = Vec::new();

        for (index, raw) in dataset.records().iter().enumerate() {
            let record = match Self::coerce_record(raw, &required, &numeric) {
                Ok(record) => record,
                Err(reason) => {
                    debug!(row = index, %reason, "dropped row");
                    report.dropped.push(DroppedRow { index, reason });
                    continue;
                }
            };

            if !Self::in_region(&record, config.region.state_code(), wanted_county.as_deref()) {
                report.outside_region += 1;
                continue;
            }
            let in_range = record
                .date()
                .is_some_and(|d| config.time_range.contains(d));
            if !in_range {
                report.outside_range += 1;
                continue;
            }
            kept.push(record);
        }

        report.retained = kept.len();
        info!(
            examined = report.examined,
            dropped = report.dropped.len(),
            outside_region = report.outside_region,
            outside_range = report.outside_range,
            retained = report.retained,
            "cleaned dataset"
        );

        if kept.is_empty() {
            return Err(CrashError::EmptyResult {
                region: config.region.to_string(),
                range: config.time_range.to_string(),
            });
        }

        Ok((CrashDataset::new(dataset.columns().to_vec(), kept), report))
    }

    /// Type every cell of one row; fail with the first reason to drop it.
    fn coerce_record(
        raw: &CrashRecord,
        required: &BTreeSet<String>,
        numeric: &BTreeSet<String>,
    ) -> std::result::Result<CrashRecord, DropReason> {
        let mut out = CrashRecord::new();

        for (column, value) in raw.iter() {
            let coerced = match column.as_str() {
                DATE => Self::coerce_date(value),
                STATE => Self::coerce_state(value),
                name if numeric.contains(name) => Self::coerce_number(name, value),
                _ => Coerced::Ok(value.clone()),
            };

            match coerced {
                Coerced::Ok(v) => out.insert(column.clone(), v),
                Coerced::Malformed if required.contains(column) => {
                    return Err(DropReason::Malformed(column.clone()))
                }
                Coerced::OutOfRange if required.contains(column) => {
                    return Err(DropReason::OutOfRange(column.clone()))
                }
                // optional field: leave it absent
                Coerced::Malformed | Coerced::OutOfRange => {}
            }
        }

        if let Some(missing) = required.iter().find(|name| out.get(name).is_none()) {
            return Err(DropReason::Missing(missing.clone()));
        }
        Ok(out)
    }

    fn coerce_date(value: &Value) -> Coerced {
        match value {
            Value::Date(_) => Coerced::Ok(value.clone()),
            Value::Text(s) => match Self::parse_date(s) {
                Some(dt) => Coerced::Ok(Value::Date(dt)),
                None => Coerced::Malformed,
            },
            Value::Number(_) => Coerced::Malformed,
        }
    }

    fn coerce_state(value: &Value) -> Coerced {
        let text = value.to_string();
        match normalize_state(&text) {
            Some(code) => Coerced::Ok(Value::Text(code.to_string())),
            None => Coerced::Malformed,
        }
    }

    fn coerce_number(column: &str, value: &Value) -> Coerced {
        let number = match value {
            Value::Number(n) => Some(*n),
            Value::Text(s) => Self::parse_number(s),
            Value::Date(_) => None,
        };
        let Some(n) = number else {
            return Coerced::Malformed;
        };

        let valid = match column {
            LAT => (-90.0..=90.0).contains(&n) && !UNKNOWN_LATITUDES.contains(&n),
            LON => (-180.0..=180.0).contains(&n),
            _ => n >= 0.0,
        };
        if valid {
            Coerced::Ok(Value::Number(n))
        } else {
            Coerced::OutOfRange
        }
    }

    fn in_region(record: &CrashRecord, state: Option<&str>, county: Option<&str>) -> bool {
        if let Some(state) = state {
            if record.text(STATE) != Some(state) {
                return false;
            }
        }
        if let Some(county) = county {
            let matches = record
                .get(COUNTY)
                .is_some_and(|v| county_key(&v.to_string()) == county);
            if !matches {
                return false;
            }
        }
        true
    }

    /// Parse a finite number, tolerating surrounding whitespace.
    pub fn parse_number(raw: &str) -> Option<f64> {
        raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
    }

    /// Parse the date/time layouts seen in crash exports.
    ///
    /// Supports ISO dates and date-times, RFC 3339, `YYYY/MM/DD`, US
    /// `MM/DD/YYYY` with optional time, and the `/Date(ms±zzzz)/` form used by
    /// the NHTSA API.
    pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }

        if let Some(inner) = s.strip_prefix("/Date(").and_then(|r| r.strip_suffix(")/")) {
            return Self::parse_epoch_millis(inner);
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.naive_local());
        }
        for fmt in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(dt);
            }
        }
        for fmt in DATE_FORMATS {
            if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
                return d.and_hms_opt(0, 0, 0);
            }
        }
        None
    }

    /// `1672531200000-0500` → local date-time at that offset.
    fn parse_epoch_millis(inner: &str) -> Option<NaiveDateTime> {
        let split = inner
            .char_indices()
            .skip(1)
            .find(|(_, c)| *c == '+' || *c == '-')
            .map(|(i, _)| i);
        let (millis, offset) = match split {
            Some(i) => (&inner[..i], Some(&inner[i..])),
            None => (inner, None),
        };

        let utc = DateTime::<Utc>::from_timestamp_millis(millis.parse().ok()?)?;
        let Some(offset) = offset else {
            return Some(utc.naive_utc());
        };
        if offset.len() != 5 || !offset.is_ascii() {
            return None;
        }
        let sign = if offset.starts_with('-') { -1 } else { 1 };
        let hours: i32 = offset.get(1..3)?.parse().ok()?;
        let minutes: i32 = offset.get(3..5)?.parse().ok()?;
        let zone = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))?;
        Some(utc.with_timezone(&zone).naive_local())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Region, TimeRange};

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn row(date: &str, state: &str, county: &str, injuries: &str) -> CrashRecord {
        let mut r = CrashRecord::new();
        for (k, v) in [("date", date), ("state", state), ("county", county), ("injuries", injuries)] {
            if !v.is_empty() {
                r.insert(k, text(v));
            }
        }
        r
    }

    fn dataset(rows: Vec<CrashRecord>) -> CrashDataset {
        CrashDataset::new(
            vec!["date".into(), "state".into(), "county".into(), "injuries".into()],
            rows,
        )
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_supported_date_layouts() {
        let expect = ymd(2020, 3, 7);
        for raw in [
            "2020-03-07",
            "2020/03/07",
            "03/07/2020",
            "3/7/2020",
            "2020-03-07T14:30:00",
            "2020-03-07 14:30",
            "2020-03-07T14:30:00.250",
            "03/07/2020 02:30:00 PM",
            "2020-03-07T14:30:00-05:00",
        ] {
            let parsed = DataProcessor::parse_date(raw).unwrap_or_else(|| panic!("{raw}"));
            assert_eq!(parsed.date(), expect, "{raw}");
        }
    }

    #[test]
    fn parses_epoch_millis_with_offset() {
        // 2023-01-01T05:00:00Z is midnight at -0500
        let dt = DataProcessor::parse_date("/Date(1672549200000-0500)/").unwrap();
        assert_eq!(dt, ymd(2023, 1, 1).and_hms_opt(0, 0, 0).unwrap());
        let utc = DataProcessor::parse_date("/Date(1672549200000)/").unwrap();
        assert_eq!(utc, ymd(2023, 1, 1).and_hms_opt(5, 0, 0).unwrap());
    }

    #[test]
    fn rejects_malformed_dates() {
        for raw in [
            "",
            "yesterday",
            "2020-13-01",
            "2020-02-30",
            "/Date(abc)/",
            "/Date(1672549200000-1é2)/",
            "/Date(1672549200000+05)/",
        ] {
            assert!(DataProcessor::parse_date(raw).is_none(), "{raw}");
        }
    }

    #[test]
    fn drops_rows_missing_required_fields() {
        let data = dataset(vec![
            row("2020-01-01", "CA", "Kern", "1"),
            row("", "CA", "Kern", "1"),
            row("not a date", "CA", "Kern", "1"),
            row("2020-01-01", "ZZ", "Kern", "1"),
            row("2020-01-01", "CA", "Kern", "-3"),
            row("2020-01-01", "CA", "Kern", ""),
        ]);
        let config = RunConfig::default();
        let (clean, report) =
            DataProcessor::clean(&data, &config, &[FieldRequirement::numeric("injuries")]).unwrap();

        assert_eq!(clean.len(), 1);
        assert_eq!(report.retained, 1);
        let reasons: Vec<(usize, DropReason)> = report
            .dropped
            .iter()
            .map(|d| (d.index, d.reason.clone()))
            .collect();
        assert_eq!(
            reasons,
            vec![
                (1, DropReason::Missing("date".into())),
                (2, DropReason::Malformed("date".into())),
                (3, DropReason::Malformed("state".into())),
                (4, DropReason::OutOfRange("injuries".into())),
                (5, DropReason::Missing("injuries".into())),
            ]
        );
        assert_eq!(report.reason_counts().get("missing date"), Some(&1));
    }

    #[test]
    fn optional_fields_left_absent_not_dropped() {
        let mut r = row("2020-01-01", "CA", "", "2");
        r.insert("fatalities", text("bad"));
        r.insert("weather", text("Rain"));
        let data = dataset(vec![r]);

        let (clean, report) = DataProcessor::clean(&data, &RunConfig::default(), &[]).unwrap();
        assert!(report.dropped.is_empty());
        let kept = &clean.records()[0];
        assert_eq!(kept.number("injuries"), Some(2.0));
        assert_eq!(kept.get("fatalities"), None);
        assert_eq!(kept.get("county"), None);
        assert_eq!(kept.text("weather"), Some("Rain"));
        assert_eq!(kept.date(), Some(ymd(2020, 1, 1)));
    }

    #[test]
    fn coerces_types_and_normalizes_state() {
        let mut r = row("01/02/2020", "california", "Kern", " 4 ");
        r.insert("lat", text("35.37"));
        r.insert("lon", text("-119.02"));
        let data = dataset(vec![r]);
        let (clean, _) = DataProcessor::clean(&data, &RunConfig::default(), &[]).unwrap();
        let kept = &clean.records()[0];
        assert_eq!(kept.text("state"), Some("CA"));
        assert_eq!(kept.number("injuries"), Some(4.0));
        assert_eq!(kept.number("lat"), Some(35.37));
        assert_eq!(kept.number("lon"), Some(-119.02));
    }

    #[test]
    fn measure_is_required_without_chart_requirements() {
        let data = dataset(vec![
            row("2020-03-01", "CA", "Kern", ""),
            row("2020-04-01", "CA", "Kern", "2"),
            row("2020-05-01", "CA", "Kern", "n/a"),
        ]);
        let (clean, report) = DataProcessor::clean(&data, &RunConfig::default(), &[]).unwrap();
        assert_eq!(clean.len(), 1);
        assert_eq!(clean.records()[0].number("injuries"), Some(2.0));
        assert_eq!(
            report.dropped.iter().map(|d| d.reason.clone()).collect::<Vec<_>>(),
            vec![
                DropReason::Missing("injuries".into()),
                DropReason::Malformed("injuries".into()),
            ]
        );
    }

    #[test]
    fn coordinates_are_required_when_present() {
        let located = |lat: &str, lon: &str| {
            let mut r = row("2020-01-01", "CA", "Kern", "1");
            for (k, v) in [("lat", lat), ("lon", lon)] {
                if !v.is_empty() {
                    r.insert(k, text(v));
                }
            }
            r
        };
        let data = CrashDataset::new(
            vec![
                "date".into(),
                "state".into(),
                "county".into(),
                "injuries".into(),
                "lat".into(),
                "lon".into(),
            ],
            vec![
                located("35.37", "-119.02"),
                located("200", "-119.02"),
                located("35.37", ""),
                located("88.8888", "-119.02"),
            ],
        );
        let (clean, report) = DataProcessor::clean(&data, &RunConfig::default(), &[]).unwrap();
        assert_eq!(clean.len(), 1);
        assert_eq!(
            report.dropped.iter().map(|d| d.reason.clone()).collect::<Vec<_>>(),
            vec![
                DropReason::OutOfRange("lat".into()),
                DropReason::Missing("lon".into()),
                DropReason::OutOfRange("lat".into()),
            ]
        );
    }

    #[test]
    fn unknown_latitude_codes_are_absent() {
        let mut r = row("2020-01-01", "CA", "", "1");
        r.insert("lat", text("77.7777"));
        let data = dataset(vec![r]);
        let err = DataProcessor::clean(
            &data,
            &RunConfig::default(),
            &[FieldRequirement::numeric("lat")],
        )
        .unwrap_err();
        assert!(matches!(err, CrashError::EmptyResult { .. }));
    }

    #[test]
    fn region_and_range_filters_are_inclusive() {
        let data = dataset(vec![
            row("2019-12-31", "CA", "Kern", "1"),
            row("2020-01-01", "CA", "Kern", "1"),
            row("2020-12-31", "CA", "Kern County", "1"),
            row("2021-01-01", "CA", "Kern", "1"),
            row("2020-06-01", "NV", "Kern", "1"),
            row("2020-06-01", "CA", "Fresno", "1"),
            row("2020-06-01", "CA", "", "1"),
        ]);
        let config = RunConfig {
            region: Region::county("CA", "kern"),
            time_range: TimeRange::new(Some(ymd(2020, 1, 1)), Some(ymd(2020, 12, 31))),
            ..RunConfig::default()
        };

        let (clean, report) = DataProcessor::clean(&data, &config, &[]).unwrap();
        let dates: Vec<NaiveDate> = clean.records().iter().filter_map(|r| r.date()).collect();
        assert_eq!(dates, vec![ymd(2020, 1, 1), ymd(2020, 12, 31)]);
        assert_eq!(report.outside_range, 2);
        assert_eq!(report.outside_region, 2);
        assert_eq!(report.dropped.len(), 1);
    }

    #[test]
    fn state_region_matches_any_county() {
        let data = dataset(vec![
            row("2020-01-01", "CA", "Kern", "1"),
            row("2020-01-01", "6", "", "1"),
            row("2020-01-01", "NV", "Clark", "1"),
        ]);
        let config = RunConfig {
            region: Region::state("CA"),
            ..RunConfig::default()
        };
        let (clean, _) = DataProcessor::clean(&data, &config, &[]).unwrap();
        assert_eq!(clean.len(), 2);
    }

    #[test]
    fn empty_result_names_region_and_range() {
        let data = dataset(vec![row("2020-01-01", "CA", "Kern", "1")]);
        let config = RunConfig {
            region: Region::state("TX"),
            ..RunConfig::default()
        };
        match DataProcessor::clean(&data, &config, &[]) {
            Err(CrashError::EmptyResult { region, .. }) => assert_eq!(region, "TX"),
            other => panic!("expected empty result, got {other:?}"),
        }
    }
}
