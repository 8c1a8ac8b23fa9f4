//! Charts module - chart specifications and figure rendering
//!
//! Every chart kind implements [`ChartBuilder`]; [`ChartSpec`] is the closed,
//! tagged set of kinds a run can request and dispatches to the builder.

mod distribution;
mod heatmap;
mod renderer;
mod top_categories;
mod trend;

pub use crate::stats::Granularity;
pub use distribution::DistributionChart;
pub use heatmap::{Dimension, HeatmapChart};
pub use renderer::{sanitize_file_component, Rendered, StaticChartRenderer};
pub use top_categories::TopCategoriesChart;
pub use trend::TimeTrendChart;

use crate::config::{Region, TimeRange};
use crate::data::{CrashDataset, FieldRequirement};
use crate::error::{CrashError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Run-level parameters every chart sees.
#[derive(Debug, Clone)]
pub struct ChartContext {
    /// Measure used when a chart does not name its own.
    pub measure: String,
    pub region: Region,
    pub time_range: TimeRange,
}

/// A persisted chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Figure {
    pub kind: &'static str,
    pub path: PathBuf,
    /// Companion files written alongside the image (e.g. a CSV summary).
    pub companions: Vec<PathBuf>,
}

/// Single interface every chart kind implements.
pub trait ChartBuilder {
    /// Stable kind name, used in file names and the config `kind` tag.
    fn kind(&self) -> &'static str;

    /// Fields the cleaner must guarantee for this chart.
    fn required_fields(&self, ctx: &ChartContext) -> Vec<FieldRequirement>;

    /// Chart-specific part of the output file name.
    fn params_label(&self, ctx: &ChartContext) -> String;

    /// Draw the chart from a cleaned dataset.
    fn render(&self, data: &CrashDataset, ctx: &ChartContext) -> Result<Rendered>;
}

/// A requested chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ChartSpec {
    TimeTrend(TimeTrendChart),
    Distribution(DistributionChart),
    Heatmap(HeatmapChart),
    TopCategories(TopCategoriesChart),
}

impl ChartSpec {
    pub fn builder(&self) -> &dyn ChartBuilder {
        match self {
            ChartSpec::TimeTrend(c) => c,
            ChartSpec::Distribution(c) => c,
            ChartSpec::Heatmap(c) => c,
            ChartSpec::TopCategories(c) => c,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.builder().kind()
    }

    pub fn required_fields(&self, ctx: &ChartContext) -> Vec<FieldRequirement> {
        self.builder().required_fields(ctx)
    }

    /// Deterministic file stem: kind, chart parameters, region and range.
    pub fn file_stem(&self, ctx: &ChartContext) -> String {
        let builder = self.builder();
        let stem = format!(
            "{}_{}_{}_{}",
            builder.kind(),
            builder.params_label(ctx),
            ctx.region.label(),
            ctx.time_range.label()
        );
        sanitize_file_component(&stem)
    }

    /// Render and persist this chart under `output_dir`.
    ///
    /// Fails with a render error if `data` lacks a required column; files are
    /// only replaced once every output rendered successfully.
    pub fn build(&self, data: &CrashDataset, ctx: &ChartContext, output_dir: &Path) -> Result<Figure> {
        let builder = self.builder();
        let required: Vec<String> = builder
            .required_fields(ctx)
            .into_iter()
            .map(|f| f.name)
            .collect();
        let missing = data.missing_columns(&required);
        if !missing.is_empty() {
            return Err(CrashError::render(
                builder.kind(),
                format!("dataset lacks required column(s) {}", missing.join(", ")),
            ));
        }

        let rendered = builder.render(data, ctx)?;
        let stem = self.file_stem(ctx);
        let figure = StaticChartRenderer::persist(builder.kind(), output_dir, &stem, rendered)?;
        info!(chart = builder.kind(), path = %figure.path.display(), "figure written");
        Ok(figure)
    }
}

impl fmt::Display for ChartSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Parse a bare kind name into its default specification (CLI `--chart`).
impl FromStr for ChartSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "time-trend" | "trend" => Ok(ChartSpec::TimeTrend(TimeTrendChart::default())),
            "distribution" | "histogram" => {
                Ok(ChartSpec::Distribution(DistributionChart::default()))
            }
            "heatmap" => Ok(ChartSpec::Heatmap(HeatmapChart::default())),
            "top-categories" | "top" => Ok(ChartSpec::TopCategories(TopCategoriesChart::default())),
            other => Err(format!(
                "unknown chart kind '{other}' (time-trend, distribution, heatmap, top-categories)"
            )),
        }
    }
}
