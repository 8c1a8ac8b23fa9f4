//! Heatmap chart: crashes (or a summed measure) cross-tabulated over two
//! dimensions, e.g. weekday by month or county by hour.

use crate::charts::renderer::{
    DrawResult, StaticChartRenderer, CAPTION_FONT, FIGURE_SIZE, LABEL_FONT,
};
use crate::charts::{ChartBuilder, ChartContext, Rendered};
use crate::data::{normalize_column_name, CrashDataset, CrashRecord, FieldRequirement};
use crate::error::Result;
use crate::stats::{AxisLabel, CrossTab, StatsCalculator};
use chrono::{Datelike, Timelike};
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// One heatmap axis: a calendar component of the crash date or a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Dimension {
    Year,
    Month,
    Weekday,
    Hour,
    Column(String),
}

impl Dimension {
    /// Axis label for `record`, or `None` when the record lacks the value.
    pub fn label_for(&self, record: &CrashRecord) -> Option<AxisLabel> {
        match self {
            Dimension::Year => {
                let y = record.date()?.year();
                Some(AxisLabel::ranked(y as i64, y.to_string()))
            }
            Dimension::Month => {
                let m = record.date()?.month0() as usize;
                Some(AxisLabel::ranked(m as i64, MONTHS[m]))
            }
            Dimension::Weekday => {
                let d = record.date()?.weekday().num_days_from_monday() as usize;
                Some(AxisLabel::ranked(d as i64, WEEKDAYS[d]))
            }
            Dimension::Hour => {
                let h = record.datetime()?.hour();
                Some(AxisLabel::ranked(h as i64, format!("{h:02}")))
            }
            Dimension::Column(name) => {
                let value = record.get(name)?.to_string();
                let value = value.trim();
                (!value.is_empty()).then(|| AxisLabel::from_text(value))
            }
        }
    }

    /// Column the cleaner must guarantee, if this axis reads one.
    pub fn column(&self) -> Option<&str> {
        match self {
            Dimension::Column(name) => Some(name),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Dimension::Year => "year",
            Dimension::Month => "month",
            Dimension::Weekday => "weekday",
            Dimension::Hour => "hour",
            Dimension::Column(name) => name,
        }
    }
}

impl From<String> for Dimension {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "year" => Dimension::Year,
            "month" => Dimension::Month,
            "weekday" | "day_of_week" | "dow" => Dimension::Weekday,
            "hour" => Dimension::Hour,
            _ => Dimension::Column(normalize_column_name(&raw)),
        }
    }
}

impl From<Dimension> for String {
    fn from(dim: Dimension) -> Self {
        dim.name().to_string()
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapChart {
    pub rows: Dimension,
    pub cols: Dimension,
    /// Summed per cell; `None` counts crashes.
    pub measure: Option<String>,
}

impl Default for HeatmapChart {
    fn default() -> Self {
        Self {
            rows: Dimension::Weekday,
            cols: Dimension::Month,
            measure: None,
        }
    }
}

impl HeatmapChart {
    pub fn table(&self, data: &CrashDataset) -> CrossTab {
        StatsCalculator::crosstab(data.records().iter().filter_map(|r| {
            let row = self.rows.label_for(r)?;
            let col = self.cols.label_for(r)?;
            let value = match &self.measure {
                Some(m) => r.number(m)?,
                None => 1.0,
            };
            Some((row, col, value))
        }))
    }
}

impl ChartBuilder for HeatmapChart {
    fn kind(&self) -> &'static str {
        "heatmap"
    }

    fn required_fields(&self, _ctx: &ChartContext) -> Vec<FieldRequirement> {
        let mut fields: Vec<FieldRequirement> = [&self.rows, &self.cols]
            .into_iter()
            .filter_map(Dimension::column)
            .map(FieldRequirement::categorical)
            .collect();
        if let Some(m) = &self.measure {
            fields.push(FieldRequirement::numeric(m.clone()));
        }
        fields
    }

    fn params_label(&self, _ctx: &ChartContext) -> String {
        format!(
            "{}-x-{}-{}",
            self.rows,
            self.cols,
            self.measure.as_deref().unwrap_or("count")
        )
    }

    fn render(&self, data: &CrashDataset, ctx: &ChartContext) -> Result<Rendered> {
        let table = self.table(data);
        let max = table.max_value();
        let n_rows = table.rows.len().max(1) as f64;
        let n_cols = table.cols.len().max(1) as f64;
        let caption = format!(
            "{} by {} and {} - {}",
            self.measure.as_deref().unwrap_or("Crashes"),
            self.rows,
            self.cols,
            ctx.region
        );

        let svg = StaticChartRenderer::render_svg(self.kind(), FIGURE_SIZE, |root| -> DrawResult {
            let mut chart = plotters::chart::ChartBuilder::on(root)
                .caption(caption, CAPTION_FONT)
                .margin(20)
                .x_label_area_size(50)
                .y_label_area_size(110)
                .build_cartesian_2d(-0.5..n_cols - 0.5, -0.5..n_rows - 0.5)?;

            let col_label = |x: &f64| StaticChartRenderer::category_label(&table.cols, *x);
            let row_label = |y: &f64| StaticChartRenderer::category_label(&table.rows, *y);
            chart
                .configure_mesh()
                .disable_mesh()
                .x_labels(table.cols.len().max(1))
                .y_labels(table.rows.len().max(1))
                .x_label_formatter(&col_label)
                .y_label_formatter(&row_label)
                .x_label_style(LABEL_FONT)
                .y_label_style(LABEL_FONT)
                .x_desc(self.cols.name())
                .y_desc(self.rows.name())
                .draw()?;

            let cells = table.cells.iter().enumerate().flat_map(|(r, row)| {
                row.iter().enumerate().map(move |(c, value)| {
                    let t = if max > 0.0 { value / max } else { 0.0 };
                    let (x, y) = (c as f64, r as f64);
                    Rectangle::new(
                        [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
                        StaticChartRenderer::heat_color(t).filled(),
                    )
                })
            });
            chart.draw_series(cells)?;
            Ok(())
        })?;

        Ok(Rendered::svg(svg))
    }
}
