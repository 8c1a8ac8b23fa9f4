//! Run Configuration
//! Region selector, time range, chart list and input/output locations for one run.

use crate::charts::{ChartSpec, Granularity, HeatmapChart, DistributionChart, TimeTrendChart};
use crate::data::regions::{county_key, normalize_state};
use crate::error::{CrashError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_INPUT_DIR: &str = "data";
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";
pub const DEFAULT_MEASURE: &str = "injuries";
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;

/// Where crash records come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InputSource {
    /// Delimited text files under a directory.
    Local {
        dir: PathBuf,
        /// Explicit file list, relative to `dir`. Empty means "every file
        /// with `extension`".
        #[serde(default)]
        files: Vec<PathBuf>,
        #[serde(default = "default_extension")]
        extension: String,
        #[serde(default = "default_delimiter")]
        delimiter: char,
    },
    /// HTTP(S) endpoint returning JSON records.
    Api {
        endpoint: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_api_key_param")]
        api_key_param: String,
        #[serde(default)]
        params: BTreeMap<String, String>,
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
}

impl InputSource {
    pub fn local(dir: impl Into<PathBuf>) -> Self {
        InputSource::Local {
            dir: dir.into(),
            files: Vec::new(),
            extension: default_extension(),
            delimiter: default_delimiter(),
        }
    }

    pub fn api(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        InputSource::Api {
            endpoint: endpoint.into(),
            api_key,
            api_key_param: default_api_key_param(),
            params: BTreeMap::new(),
            timeout_secs: default_timeout(),
        }
    }

    /// Short description used in logs and error messages.
    pub fn describe(&self) -> String {
        match self {
            InputSource::Local { dir, .. } => dir.display().to_string(),
            InputSource::Api { endpoint, .. } => endpoint.clone(),
        }
    }
}

impl Default for InputSource {
    fn default() -> Self {
        Self::local(DEFAULT_INPUT_DIR)
    }
}

fn default_extension() -> String {
    "csv".to_string()
}

fn default_delimiter() -> char {
    ','
}

fn default_api_key_param() -> String {
    "API_KEY".to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_API_TIMEOUT_SECS
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_measure() -> String {
    DEFAULT_MEASURE.to_string()
}

fn default_charts() -> Vec<ChartSpec> {
    vec![
        ChartSpec::TimeTrend(TimeTrendChart {
            measure: None,
            granularity: Granularity::Month,
        }),
        ChartSpec::Distribution(DistributionChart::default()),
        ChartSpec::Heatmap(HeatmapChart::default()),
    ]
}

/// Region selector. A county only makes sense inside a state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
}

impl Region {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn state(state: impl Into<String>) -> Self {
        Self {
            state: Some(state.into()),
            county: None,
        }
    }

    pub fn county(state: impl Into<String>, county: impl Into<String>) -> Self {
        Self {
            state: Some(state.into()),
            county: Some(county.into()),
        }
    }

    /// Validate and canonicalize the state to its postal code.
    fn normalized(&self) -> Result<Self> {
        let state = match &self.state {
            Some(raw) => Some(
                normalize_state(raw)
                    .ok_or_else(|| CrashError::Config(format!("unknown state '{raw}'")))?
                    .to_string(),
            ),
            None => None,
        };
        let county = self
            .county
            .as_ref()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if county.is_some() && state.is_none() {
            return Err(CrashError::Config(
                "a county filter requires a state".to_string(),
            ));
        }
        Ok(Self { state, county })
    }

    /// Postal code of the selected state, if any.
    pub fn state_code(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// File-name fragment: `all`, `ca` or `ca-kern`.
    pub fn label(&self) -> String {
        match (&self.state, &self.county) {
            (Some(state), Some(county)) => format!("{}-{}", state, county_key(county)),
            (Some(state), None) => state.clone(),
            _ => "all".to_string(),
        }
        .to_lowercase()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.state, &self.county) {
            (Some(state), Some(county)) => write!(f, "{county}, {state}"),
            (Some(state), None) => write!(f, "{state}"),
            _ => write!(f, "all regions"),
        }
    }
}

/// Inclusive calendar-date range. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

impl TimeRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    /// File-name fragment: `2020-01-01_2020-12-31`, with `any` for open bounds.
    pub fn label(&self) -> String {
        let fmt_bound = |d: Option<NaiveDate>| {
            d.map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "any".to_string())
        };
        format!("{}_{}", fmt_bound(self.start), fmt_bound(self.end))
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |d: Option<NaiveDate>| {
            d.map(|d| d.to_string()).unwrap_or_else(|| "any".to_string())
        };
        write!(f, "[{}, {}]", bound(self.start), bound(self.end))
    }
}

/// Everything one pipeline run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub input: InputSource,
    /// Tried when `input` fails with a data source error.
    #[serde(default)]
    pub fallback: Option<InputSource>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Primary severity measure; required at load and used by charts that
    /// do not name their own.
    #[serde(default = "default_measure")]
    pub measure: String,
    #[serde(default)]
    pub region: Region,
    #[serde(default)]
    pub time_range: TimeRange,
    #[serde(default = "default_charts")]
    pub charts: Vec<ChartSpec>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input: InputSource::default(),
            fallback: None,
            output_dir: default_output_dir(),
            measure: default_measure(),
            region: Region::default(),
            time_range: TimeRange::default(),
            charts: default_charts(),
        }
    }
}

impl RunConfig {
    /// Parse a TOML run file.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CrashError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| CrashError::ConfigFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|e| CrashError::ConfigFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Check cross-field constraints and canonicalize the region.
    pub fn validated(mut self) -> Result<Self> {
        self.region = self.region.normalized()?;
        if let (Some(start), Some(end)) = (self.time_range.start, self.time_range.end) {
            if start > end {
                return Err(CrashError::Config(format!(
                    "time range start {start} is after end {end}"
                )));
            }
        }
        self.measure = crate::data::normalize_column_name(&self.measure);
        if self.measure.is_empty() {
            return Err(CrashError::Config("measure must not be empty".to_string()));
        }
        Ok(self)
    }
}
