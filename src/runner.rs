//! Runner
//! Drives one batch job: load once, then clean and render each requested chart.

use crate::charts::{ChartContext, ChartSpec};
use crate::config::RunConfig;
use crate::data::{CleaningReport, CrashDataset, DataLoader, DataProcessor};
use crate::error::{CrashError, ErrorKind, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// What happened to one requested chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartOutcome {
    Produced {
        kind: &'static str,
        path: PathBuf,
        companions: Vec<PathBuf>,
    },
    /// Nothing matched the region and time range.
    Skipped { kind: &'static str, reason: String },
    Failed { kind: &'static str, reason: String },
}

impl ChartOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            ChartOutcome::Produced { kind, .. }
            | ChartOutcome::Skipped { kind, .. }
            | ChartOutcome::Failed { kind, .. } => kind,
        }
    }

    pub fn is_produced(&self) -> bool {
        matches!(self, ChartOutcome::Produced { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ChartOutcome::Failed { .. })
    }
}

impl fmt::Display for ChartOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartOutcome::Produced { kind, path, .. } => {
                write!(f, "produced {kind}: {}", path.display())
            }
            ChartOutcome::Skipped { kind, reason } => write!(f, "skipped  {kind}: {reason}"),
            ChartOutcome::Failed { kind, reason } => write!(f, "failed   {kind}: {reason}"),
        }
    }
}

/// Per-chart outcomes of a completed run, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub records_loaded: usize,
    pub outcomes: Vec<ChartOutcome>,
}

impl RunSummary {
    pub fn produced(&self) -> impl Iterator<Item = &ChartOutcome> {
        self.outcomes.iter().filter(|o| o.is_produced())
    }

    /// 0 unless every requested chart failed, then 1.
    pub fn exit_code(&self) -> i32 {
        if !self.outcomes.is_empty() && self.outcomes.iter().all(ChartOutcome::is_failed) {
            1
        } else {
            0
        }
    }

    /// Log every outcome; skipped and failed charts at warn level.
    pub fn log(&self) {
        for outcome in &self.outcomes {
            match outcome {
                ChartOutcome::Produced { .. } => info!("{outcome}"),
                _ => warn!("{outcome}"),
            }
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} record(s) loaded, {} of {} chart(s) produced",
            self.records_loaded,
            self.produced().count(),
            self.outcomes.len()
        )?;
        for outcome in &self.outcomes {
            writeln!(f, "  {outcome}")?;
        }
        Ok(())
    }
}

/// Loader → Cleaner → Chart Builder for one [`RunConfig`].
pub struct Pipeline {
    config: RunConfig,
}

impl Pipeline {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    fn context(&self) -> ChartContext {
        ChartContext {
            measure: self.config.measure.clone(),
            region: self.config.region.clone(),
            time_range: self.config.time_range,
        }
    }

    /// Run every requested chart.
    ///
    /// Errors only when the run must abort: the output directory cannot be
    /// created, no source could be read, or a required column is missing.
    /// Per-chart problems end up in the summary.
    pub fn run(&self) -> Result<RunSummary> {
        let config = &self.config;
        fs::create_dir_all(&config.output_dir).map_err(|e| {
            CrashError::Config(format!(
                "cannot create output directory {}: {e}",
                config.output_dir.display()
            ))
        })?;

        let dataset = self.load()?;
        self.check_chart_columns(&dataset)?;

        let ctx = self.context();
        let outcomes = config
            .charts
            .iter()
            .map(|chart| self.run_chart(chart, &dataset, &ctx))
            .collect();

        let summary = RunSummary {
            records_loaded: dataset.len(),
            outcomes,
        };
        summary.log();
        Ok(summary)
    }

    /// Load the primary source, falling back on a data source error.
    pub fn load(&self) -> Result<CrashDataset> {
        let config = &self.config;
        let loader = DataLoader::new(config.measure.clone());
        match loader.load(&config.input, &config.region, &config.time_range) {
            Err(err) if err.kind() == ErrorKind::DataSource => match &config.fallback {
                Some(fallback) => {
                    warn!(error = %err, fallback = %fallback.describe(), "primary source failed, trying fallback");
                    loader.load(fallback, &config.region, &config.time_range)
                }
                None => Err(err),
            },
            other => other,
        }
    }

    /// Every column a requested chart reads must exist before anything is cleaned.
    fn check_chart_columns(&self, dataset: &CrashDataset) -> Result<()> {
        let ctx = self.context();
        let required: BTreeSet<String> = self
            .config
            .charts
            .iter()
            .flat_map(|chart| chart.required_fields(&ctx))
            .map(|field| field.name)
            .collect();
        let required: Vec<String> = required.into_iter().collect();
        DataLoader::require_columns(dataset, &required, "loaded dataset")
    }

    /// The cleaned rows `chart` is drawn from.
    pub fn clean_for(
        &self,
        chart: &ChartSpec,
        dataset: &CrashDataset,
    ) -> Result<(CrashDataset, CleaningReport)> {
        let requirements = chart.required_fields(&self.context());
        DataProcessor::clean(dataset, &self.config, &requirements)
    }

    fn run_chart(&self, chart: &ChartSpec, dataset: &CrashDataset, ctx: &ChartContext) -> ChartOutcome {
        let kind = chart.kind();

        let cleaned = match self.clean_for(chart, dataset) {
            Ok((cleaned, _report)) => cleaned,
            Err(err) if err.kind() == ErrorKind::EmptyResult => {
                return ChartOutcome::Skipped {
                    kind,
                    reason: err.to_string(),
                };
            }
            Err(err) => {
                return ChartOutcome::Failed {
                    kind,
                    reason: err.to_string(),
                };
            }
        };

        match chart.build(&cleaned, ctx, &self.config.output_dir) {
            Ok(figure) => ChartOutcome::Produced {
                kind,
                path: figure.path,
                companions: figure.companions,
            },
            Err(err) => ChartOutcome::Failed {
                kind,
                reason: err.to_string(),
            },
        }
    }
}

/// Convenience wrapper around [`Pipeline::run`].
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    Pipeline::new(config.clone()).run()
}
