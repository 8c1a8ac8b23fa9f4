//! Crash Data Loader Module
//! Loads delimited files with Polars or fetches JSON records from a crash API,
//! and normalizes both into a [`CrashDataset`].

use crate::config::{InputSource, Region, TimeRange};
use crate::data::record::{normalize_column_name, CrashDataset, CrashRecord, Value, DATE, STATE};
use crate::error::{CrashError, Result};
use polars::prelude::*;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Loads crash records and checks the minimal column set at the boundary.
pub struct DataLoader {
    measure: String,
}

impl DataLoader {
    pub fn new(measure: impl Into<String>) -> Self {
        Self {
            measure: measure.into(),
        }
    }

    /// Columns every source must provide: date, state and the severity measure.
    pub fn required_columns(&self) -> Vec<String> {
        vec![DATE.to_string(), STATE.to_string(), self.measure.clone()]
    }

    /// Load from `source` and verify the minimal schema.
    ///
    /// `region` and `range` are forwarded to the API as server-side filters;
    /// local files are always read in full.
    pub fn load(
        &self,
        source: &InputSource,
        region: &Region,
        range: &TimeRange,
    ) -> Result<CrashDataset> {
        let dataset = match source {
            InputSource::Local {
                dir,
                files,
                extension,
                delimiter,
            } => self.load_dir(dir, files, extension, *delimiter)?,
            InputSource::Api {
                endpoint,
                api_key,
                api_key_param,
                params,
                timeout_secs,
            } => {
                let query = Self::build_query(
                    api_key.as_deref(),
                    api_key_param,
                    params,
                    region,
                    range,
                );
                self.fetch_api(endpoint, &query, Duration::from_secs(*timeout_secs))?
            }
        };

        Self::require_columns(&dataset, &self.required_columns(), &source.describe())?;
        info!(
            source = %source.describe(),
            rows = dataset.len(),
            columns = dataset.columns().len(),
            "loaded crash records"
        );
        Ok(dataset)
    }

    /// Fail with a schema error naming every column in `required` that is absent.
    pub fn require_columns(
        dataset: &CrashDataset,
        required: &[String],
        source_name: &str,
    ) -> Result<()> {
        let mut missing = dataset.missing_columns(required);
        missing.dedup();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CrashError::Schema {
                source_name: source_name.to_string(),
                missing,
            })
        }
    }

    /// Read every matching file under `dir` (or the explicit `files`) in sorted order.
    pub fn load_dir(
        &self,
        dir: &Path,
        files: &[PathBuf],
        extension: &str,
        delimiter: char,
    ) -> Result<CrashDataset> {
        if !dir.is_dir() {
            return Err(CrashError::data_source(
                dir.display().to_string(),
                "input directory does not exist",
            ));
        }

        let mut paths: Vec<PathBuf> = if files.is_empty() {
            fs::read_dir(dir)
                .map_err(|e| CrashError::data_source(dir.display().to_string(), e))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .filter(|p| {
                    p.extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
                })
                .collect()
        } else {
            files.iter().map(|f| dir.join(f)).collect()
        };
        paths.sort();

        if paths.is_empty() {
            return Err(CrashError::data_source(
                dir.display().to_string(),
                format!("no .{extension} files found"),
            ));
        }

        let mut dataset = CrashDataset::default();
        for path in &paths {
            let part = self.load_csv(path, delimiter)?;
            debug!(path = %path.display(), rows = part.len(), "read input file");
            dataset.extend(part);
        }
        Ok(dataset)
    }

    /// Load one delimited file using Polars, reading every column as text.
    pub fn load_csv(&self, path: &Path, delimiter: char) -> Result<CrashDataset> {
        let source_name = path.display().to_string();
        if !path.is_file() {
            return Err(CrashError::data_source(source_name, "file not found"));
        }
        if !delimiter.is_ascii() {
            return Err(CrashError::Config(format!(
                "delimiter '{delimiter}' must be a single ASCII character"
            )));
        }

        // Schema inference off: typing is the cleaner's job
        let df = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_separator(delimiter as u8)
            .with_infer_schema_length(Some(0))
            .finish()
            .and_then(|lf| lf.collect())
            .map_err(|e| CrashError::data_source(source_name.clone(), e))?;

        Self::dataset_from_frame(&df, &source_name)
    }

    /// Convert a text-typed DataFrame into records, normalizing column names.
    fn dataset_from_frame(df: &DataFrame, source_name: &str) -> Result<CrashDataset> {
        let raw_names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut columns: Vec<String> = Vec::with_capacity(raw_names.len());
        let mut records = vec![CrashRecord::new(); df.height()];

        for raw in &raw_names {
            let name = normalize_column_name(raw);
            if name.is_empty() {
                continue;
            }
            if columns.contains(&name) {
                warn!(source = source_name, column = %raw, canonical = %name, "duplicate column ignored");
                continue;
            }

            let series = df
                .column(raw)
                .and_then(|col| col.as_materialized_series().cast(&DataType::String))
                .map_err(|e| CrashError::data_source(source_name, e))?;
            let values = series
                .str()
                .map_err(|e| CrashError::data_source(source_name, e))?;

            for (record, value) in records.iter_mut().zip(values.into_iter()) {
                if let Some(text) = value.map(str::trim).filter(|t| !t.is_empty()) {
                    record.insert(name.clone(), Value::Text(text.to_string()));
                }
            }
            columns.push(name);
        }

        Ok(CrashDataset::new(columns, records))
    }

    /// Query parameters for the crash API: format, key, configured extras and
    /// server-side region/year filters.
    pub fn build_query(
        api_key: Option<&str>,
        api_key_param: &str,
        params: &BTreeMap<String, String>,
        region: &Region,
        range: &TimeRange,
    ) -> Vec<(String, String)> {
        let mut query = vec![("format".to_string(), "json".to_string())];
        if let Some(key) = api_key {
            query.push((api_key_param.to_string(), key.to_string()));
        }
        for (k, v) in params {
            query.push((k.clone(), v.clone()));
        }
        if let Some(state) = region.state_code() {
            query.push(("state".to_string(), state.to_string()));
        }
        if let Some(start) = range.start {
            query.push(("fromYear".to_string(), start.format("%Y").to_string()));
        }
        if let Some(end) = range.end {
            query.push(("toYear".to_string(), end.format("%Y").to_string()));
        }
        query
    }

    /// One blocking GET against the crash API.
    pub fn fetch_api(
        &self,
        endpoint: &str,
        query: &[(String, String)],
        timeout: Duration,
    ) -> Result<CrashDataset> {
        let param_names: Vec<&str> = query.iter().map(|(k, _)| k.as_str()).collect();
        info!(endpoint, params = ?param_names, "fetching crash data");

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CrashError::data_source(endpoint, e))?;

        let response = client
            .get(endpoint)
            .query(query)
            .send()
            .map_err(|e| CrashError::data_source(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrashError::data_source(
                endpoint,
                format!("API returned status {status}"),
            ));
        }

        let body = response
            .text()
            .map_err(|e| CrashError::data_source(endpoint, e))?;
        Self::dataset_from_json(&body, endpoint)
    }

    /// Parse an API body into records.
    ///
    /// Accepts a bare array, an object whose `Results`/`results`/`data` holds
    /// records, and the nested `Results: [[...]]` layout.
    pub fn dataset_from_json(body: &str, source_name: &str) -> Result<CrashDataset> {
        let parsed: JsonValue = serde_json::from_str(body)
            .map_err(|e| CrashError::data_source(source_name, format!("invalid JSON: {e}")))?;

        let rows = Self::find_records(&parsed).ok_or_else(|| {
            let snippet: String = body.chars().take(200).collect();
            CrashError::data_source(
                source_name,
                format!("unexpected response shape: {snippet}"),
            )
        })?;
        if rows.is_empty() {
            return Err(CrashError::data_source(
                source_name,
                "API returned no records",
            ));
        }

        let mut columns: Vec<String> = Vec::new();
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let mut record = CrashRecord::new();
            for (raw, value) in row {
                let name = normalize_column_name(raw);
                if name.is_empty() || record.get(&name).is_some() {
                    continue;
                }
                if !columns.contains(&name) {
                    columns.push(name.clone());
                }
                if let Some(text) = Self::scalar_text(value) {
                    record.insert(name, Value::Text(text));
                }
            }
            records.push(record);
        }

        Ok(CrashDataset::new(columns, records))
    }

    fn find_records(value: &JsonValue) -> Option<Vec<&Map<String, JsonValue>>> {
        match value {
            JsonValue::Array(items) => {
                let mut rows = Vec::new();
                for item in items {
                    match item {
                        JsonValue::Object(map) => rows.push(map),
                        JsonValue::Array(_) => rows.extend(Self::find_records(item)?),
                        _ => return None,
                    }
                }
                Some(rows)
            }
            JsonValue::Object(map) => ["Results", "results", "data"]
                .iter()
                .find_map(|key| map.get(*key))
                .and_then(Self::find_records),
            _ => None,
        }
    }

    fn scalar_text(value: &JsonValue) -> Option<String> {
        match value {
            JsonValue::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            JsonValue::Number(n) => Some(n.to_string()),
            JsonValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}
