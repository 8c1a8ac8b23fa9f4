//! Command-line interface: an optional TOML run file plus per-flag overrides.

use crate::charts::{ChartSpec, Granularity};
use crate::config::{InputSource, RunConfig};
use crate::error::Result;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "crashcharts")]
#[command(
    author,
    version,
    about = "Filter road-crash records by region and time window and render charts"
)]
pub struct Cli {
    /// TOML run file; flags below override its values
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory of delimited crash files
    #[arg(short, long, value_name = "DIR")]
    pub input_dir: Option<PathBuf>,

    /// Where figures are written
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// State as postal code, name or FIPS number
    #[arg(long)]
    pub state: Option<String>,

    /// County within --state
    #[arg(long)]
    pub county: Option<String>,

    /// First day of the time window (YYYY-MM-DD, inclusive)
    #[arg(long, value_name = "DATE")]
    pub start: Option<NaiveDate>,

    /// Last day of the time window (YYYY-MM-DD, inclusive)
    #[arg(long, value_name = "DATE")]
    pub end: Option<NaiveDate>,

    /// Chart to render; repeat for several (time-trend, distribution, heatmap, top-categories)
    #[arg(long = "chart", value_name = "KIND")]
    pub charts: Vec<ChartSpec>,

    /// Bucket size for time-trend charts (day, month, year)
    #[arg(short, long)]
    pub granularity: Option<Granularity>,

    /// Primary severity measure column
    #[arg(short, long)]
    pub measure: Option<String>,

    /// Fetch records from this HTTP endpoint; --input-dir becomes the fallback
    #[arg(long, value_name = "URL")]
    pub api_endpoint: Option<String>,

    /// API key sent with API requests
    #[arg(long, env = "CRASH_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

impl Cli {
    /// Resolve the run file (or defaults), apply flag overrides and validate.
    pub fn into_config(self) -> Result<RunConfig> {
        let base = match &self.config {
            Some(path) => RunConfig::from_file(path)?,
            None => RunConfig::default(),
        };
        self.apply(base).validated()
    }

    /// Layer the flags that were given over `config`.
    pub fn apply(self, mut config: RunConfig) -> RunConfig {
        let local = self.input_dir.map(InputSource::local);

        match (self.api_endpoint, local) {
            (Some(endpoint), local) => {
                config.input = InputSource::api(endpoint, None);
                if local.is_some() {
                    config.fallback = local;
                }
            }
            (None, Some(local)) => config.input = local,
            (None, None) => {}
        }

        if let (Some(key), InputSource::Api { api_key, .. }) = (self.api_key, &mut config.input) {
            *api_key = Some(key);
        }

        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(measure) = self.measure {
            config.measure = measure;
        }
        if let Some(state) = self.state {
            config.region.state = Some(state);
        }
        if let Some(county) = self.county {
            config.region.county = Some(county);
        }
        if let Some(start) = self.start {
            config.time_range.start = Some(start);
        }
        if let Some(end) = self.end {
            config.time_range.end = Some(end);
        }
        if !self.charts.is_empty() {
            config.charts = self.charts;
        }
        if let Some(granularity) = self.granularity {
            for chart in &mut config.charts {
                if let ChartSpec::TimeTrend(trend) = chart {
                    trend.granularity = granularity;
                }
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::TimeTrendChart;
    use crate::error::CrashError;
    use std::fs;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("crashcharts").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn no_arguments_gives_defaults() {
        let config = parse(&[]).into_config().unwrap();
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn flags_override_fields() {
        let config = parse(&[
            "--input-dir",
            "crashes",
            "--output-dir",
            "figs",
            "--state",
            "06",
            "--county",
            "Kern",
            "--start",
            "2020-01-01",
            "--end",
            "2020-12-31",
            "--chart",
            "time-trend",
            "--chart",
            "top-categories",
            "--granularity",
            "year",
            "--measure",
            "Fatals",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.input, InputSource::local("crashes"));
        assert_eq!(config.output_dir, PathBuf::from("figs"));
        assert_eq!(config.region.state.as_deref(), Some("CA"));
        assert_eq!(config.region.county.as_deref(), Some("Kern"));
        assert_eq!(config.time_range.end, NaiveDate::from_ymd_opt(2020, 12, 31));
        assert_eq!(config.measure, "fatalities");
        assert_eq!(config.charts.len(), 2);
        assert_eq!(
            config.charts[0],
            ChartSpec::TimeTrend(TimeTrendChart {
                measure: None,
                granularity: Granularity::Year,
            })
        );
    }

    #[test]
    fn api_endpoint_keeps_input_dir_as_fallback() {
        let config = parse(&[
            "--api-endpoint",
            "https://crash.example/api",
            "--api-key",
            "secret",
            "--input-dir",
            "cache",
        ])
        .into_config()
        .unwrap();

        match &config.input {
            InputSource::Api {
                endpoint, api_key, ..
            } => {
                assert_eq!(endpoint, "https://crash.example/api");
                assert_eq!(api_key.as_deref(), Some("secret"));
            }
            other => panic!("unexpected input {other:?}"),
        }
        assert_eq!(config.fallback, Some(InputSource::local("cache")));
    }

    #[test]
    fn flags_override_run_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run.toml");
        fs::write(
            &path,
            "measure = \"injuries\"\n[region]\nstate = \"TX\"\n[[charts]]\nkind = \"heatmap\"\n",
        )
        .unwrap();

        let config = parse(&["--config", path.to_str().unwrap(), "--state", "Oregon"])
            .into_config()
            .unwrap();
        assert_eq!(config.region.state.as_deref(), Some("OR"));
        assert_eq!(config.charts.len(), 1);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(Cli::try_parse_from(["crashcharts", "--start", "01/02/2020"]).is_err());
        assert!(Cli::try_parse_from(["crashcharts", "--chart", "pie"]).is_err());

        let err = parse(&["--county", "Kern"]).into_config().unwrap_err();
        assert!(matches!(err, CrashError::Config(_)));

        let err = parse(&["--config", "/nonexistent/run.toml"])
            .into_config()
            .unwrap_err();
        assert!(matches!(err, CrashError::ConfigFile { .. }));
    }
}
