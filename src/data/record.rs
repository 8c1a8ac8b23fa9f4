//! Crash Record Module
//! Row representation: a mapping from normalized column name to a typed value.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical column names the rest of the pipeline relies on.
pub const DATE: &str = "date";
pub const STATE: &str = "state";
pub const COUNTY: &str = "county";
pub const LAT: &str = "lat";
pub const LON: &str = "lon";

/// Column aliases seen in crash exports and the NHTSA API, after normalization.
const ALIASES: &[(&str, &str)] = &[
    ("crash_date", DATE),
    ("crashdate", DATE),
    ("accident_date", DATE),
    ("crash_date_time", DATE),
    ("date_time", DATE),
    ("state_name", STATE),
    ("statename", STATE),
    ("state_code", STATE),
    ("st", STATE),
    ("county_name", COUNTY),
    ("countyname", COUNTY),
    ("latitude", LAT),
    ("lng", LON),
    ("long", LON),
    ("longitude", LON),
    ("longitud", LON),
    ("fatals", "fatalities"),
    ("make", "vehicle_make"),
    ("make_name", "vehicle_make"),
    ("makename", "vehicle_make"),
];

/// A single typed cell. Absence is expressed by the key being missing.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{s}"),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{n}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// One crash row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrashRecord {
    fields: BTreeMap<String, Value>,
}

impl CrashRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.fields.insert(column.into(), value);
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.fields.remove(column)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_text)
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(Value::as_number)
    }

    pub fn datetime(&self) -> Option<NaiveDateTime> {
        self.get(DATE).and_then(Value::as_datetime)
    }

    /// Calendar date of the crash, once the date column has been parsed.
    pub fn date(&self) -> Option<NaiveDate> {
        self.datetime().map(|dt| dt.date())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for CrashRecord {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Ordered collection of crash records sharing a column set.
#[derive(Debug, Clone, Default)]
pub struct CrashDataset {
    columns: Vec<String>,
    records: Vec<CrashRecord>,
}

impl CrashDataset {
    pub fn new(columns: Vec<String>, records: Vec<CrashRecord>) -> Self {
        Self { columns, records }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Columns from `required` that this dataset does not have.
    pub fn missing_columns(&self, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|c| !self.has_column(c))
            .cloned()
            .collect()
    }

    pub fn records(&self) -> &[CrashRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append another dataset, keeping the first-seen column order.
    pub fn extend(&mut self, other: CrashDataset) {
        for column in other.columns {
            if !self.has_column(&column) {
                self.columns.push(column);
            }
        }
        self.records.extend(other.records);
    }

    /// Numeric values of a column, skipping absent cells.
    pub fn numbers(&self, column: &str) -> Vec<f64> {
        self.records.iter().filter_map(|r| r.number(column)).collect()
    }
}

/// Normalize a raw header into its canonical snake_case name, resolving aliases.
///
/// `"CrashDate"` becomes `date`, `"LONGITUD"` becomes `lon`, `"Vehicle Make"`
/// becomes `vehicle_make`.
pub fn normalize_column_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    let mut prev_lower = false;
    let mut pending_sep = false;

    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if ch.is_ascii_uppercase() && prev_lower {
                pending_sep = true;
            }
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch.to_ascii_lowercase());
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        } else {
            pending_sep = true;
            prev_lower = false;
        }
    }

    ALIASES
        .iter()
        .find(|(alias, _)| *alias == out)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_headers_and_aliases() {
        assert_eq!(normalize_column_name("CrashDate"), "date");
        assert_eq!(normalize_column_name("  Date "), "date");
        assert_eq!(normalize_column_name("LATITUDE"), "lat");
        assert_eq!(normalize_column_name("LONGITUD"), "lon");
        assert_eq!(normalize_column_name("vehicleMake"), "vehicle_make");
        assert_eq!(normalize_column_name("Vehicle Make"), "vehicle_make");
        assert_eq!(normalize_column_name("COUNTYNAME"), "county");
        assert_eq!(normalize_column_name("num--injured"), "num_injured");
        assert_eq!(normalize_column_name("FATALS"), "fatalities");
    }

    #[test]
    fn dataset_extend_unions_columns() {
        let mut a = CrashDataset::new(
            vec!["date".into(), "state".into()],
            vec![CrashRecord::from_iter([("state", Value::Text("CA".into()))])],
        );
        let b = CrashDataset::new(
            vec!["state".into(), "county".into()],
            vec![CrashRecord::from_iter([("county", Value::Text("Kern".into()))])],
        );
        a.extend(b);
        assert_eq!(a.columns(), ["date", "state", "county"]);
        assert_eq!(a.len(), 2);
        assert_eq!(
            a.missing_columns(&["lat".to_string(), "date".to_string()]),
            vec!["lat".to_string()]
        );
    }

    #[test]
    fn number_display_drops_integer_fraction() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
    }
}
