//! Top-categories chart: the most frequent values of a categorical column,
//! with a CSV summary next to the figure.

use crate::charts::renderer::{
    DrawResult, StaticChartRenderer, BAR_FILL, CAPTION_FONT, EDGE_COLOR, FIGURE_SIZE, LABEL_FONT,
};
use crate::charts::{ChartBuilder, ChartContext, Rendered};
use crate::data::{CrashDataset, FieldRequirement};
use crate::error::{CrashError, Result};
use crate::stats::StatsCalculator;
use plotters::prelude::*;
use polars::prelude::{Column, CsvWriter, DataFrame, SerWriter};
use serde::{Deserialize, Serialize};

const DEFAULT_COLUMN: &str = "vehicle_make";
const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopCategoriesChart {
    pub column: String,
    pub top_n: usize,
}

impl Default for TopCategoriesChart {
    fn default() -> Self {
        Self {
            column: DEFAULT_COLUMN.to_string(),
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl TopCategoriesChart {
    /// Most frequent values, descending, ties broken by name.
    pub fn counts(&self, data: &CrashDataset) -> Vec<(String, usize)> {
        let values = data
            .records()
            .iter()
            .filter_map(|r| r.get(&self.column).map(|v| v.to_string()));
        StatsCalculator::value_counts(values, self.top_n)
    }

    /// `category,crashes` table for the counts.
    pub fn summary_csv(&self, counts: &[(String, usize)]) -> Result<Vec<u8>> {
        let categories: Vec<String> = counts.iter().map(|(c, _)| c.clone()).collect();
        let crashes: Vec<u32> = counts.iter().map(|(_, n)| *n as u32).collect();

        let mut buf = Vec::new();
        DataFrame::new(vec![
            Column::new("category".into(), categories),
            Column::new("crashes".into(), crashes),
        ])
        .and_then(|mut df| CsvWriter::new(&mut buf).include_header(true).finish(&mut df))
        .map_err(|e| CrashError::render(self.kind(), e))?;
        Ok(buf)
    }
}

impl ChartBuilder for TopCategoriesChart {
    fn kind(&self) -> &'static str {
        "top-categories"
    }

    fn required_fields(&self, _ctx: &ChartContext) -> Vec<FieldRequirement> {
        vec![FieldRequirement::categorical(self.column.clone())]
    }

    fn params_label(&self, _ctx: &ChartContext) -> String {
        format!("{}-top{}", self.column, self.top_n)
    }

    fn render(&self, data: &CrashDataset, ctx: &ChartContext) -> Result<Rendered> {
        let counts = self.counts(data);
        let csv = self.summary_csv(&counts)?;

        let labels: Vec<String> = counts.iter().map(|(c, _)| c.clone()).collect();
        let n = counts.len().max(1) as f64;
        let y_max = StaticChartRenderer::nice_ceiling(
            counts.first().map(|(_, c)| *c as f64).unwrap_or(0.0),
        );
        let caption = format!("Top {} {} - {}", self.top_n, self.column, ctx.region);

        let svg = StaticChartRenderer::render_svg(self.kind(), FIGURE_SIZE, |root| -> DrawResult {
            let mut chart = plotters::chart::ChartBuilder::on(root)
                .caption(caption, CAPTION_FONT)
                .margin(20)
                .x_label_area_size(60)
                .y_label_area_size(70)
                .build_cartesian_2d(-0.5..n - 0.5, 0.0..y_max)?;

            let label_at = |x: &f64| StaticChartRenderer::category_label(&labels, *x);
            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_labels(labels.len().max(1))
                .x_label_formatter(&label_at)
                .x_label_style(LABEL_FONT)
                .x_desc(self.column.as_str())
                .y_desc("Crashes")
                .draw()?;

            let bars = counts.iter().enumerate().map(|(i, (_, count))| {
                let x = i as f64;
                [(x - 0.4, 0.0), (x + 0.4, *count as f64)]
            });
            chart.draw_series(bars.clone().map(|b| Rectangle::new(b, BAR_FILL.filled())))?;
            chart.draw_series(bars.map(|b| Rectangle::new(b, EDGE_COLOR.stroke_width(1))))?;
            Ok(())
        })?;

        Ok(Rendered {
            svg,
            companions: vec![("csv".to_string(), csv)],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Region, TimeRange};
    use crate::data::{CrashRecord, Value};

    fn data() -> CrashDataset {
        let makes = ["Toyota", "Ford", "Honda", "Ford", "Toyota", "Ford", "Kia"];
        let records = makes
            .iter()
            .map(|m| CrashRecord::from_iter([("vehicle_make", Value::Text(m.to_string()))]))
            .collect();
        CrashDataset::new(vec!["vehicle_make".into()], records)
    }

    fn ctx() -> ChartContext {
        ChartContext {
            measure: "injuries".into(),
            region: Region::all(),
            time_range: TimeRange::default(),
        }
    }

    #[test]
    fn counts_are_ranked_and_truncated() {
        let chart = TopCategoriesChart {
            column: "vehicle_make".into(),
            top_n: 3,
        };
        assert_eq!(
            chart.counts(&data()),
            vec![
                ("Ford".to_string(), 3),
                ("Toyota".to_string(), 2),
                ("Honda".to_string(), 1),
            ]
        );
        assert_eq!(chart.params_label(&ctx()), "vehicle_make-top3");
    }

    #[test]
    fn companion_csv_lists_categories() {
        let chart = TopCategoriesChart {
            column: "vehicle_make".into(),
            top_n: 2,
        };
        let rendered = chart.render(&data(), &ctx()).unwrap();
        assert_eq!(rendered.companions.len(), 1);
        let (ext, bytes) = &rendered.companions[0];
        assert_eq!(ext, "csv");
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert_eq!(text, "category,crashes\nFord,3\nToyota,2\n");
    }
}
