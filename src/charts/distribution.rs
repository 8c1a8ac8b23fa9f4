//! Distribution chart: histogram of a severity measure.

use crate::charts::renderer::{
    DrawResult, StaticChartRenderer, BAR_FILL, CAPTION_FONT, EDGE_COLOR, FIGURE_SIZE, LABEL_FONT,
};
use crate::charts::{ChartBuilder, ChartContext, Rendered};
use crate::data::{CrashDataset, FieldRequirement};
use crate::error::Result;
use crate::stats::{StatsCalculator, DEFAULT_BINS};
use plotters::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionChart {
    /// Falls back to the run's measure.
    pub measure: Option<String>,
    pub bins: usize,
}

impl Default for DistributionChart {
    fn default() -> Self {
        Self {
            measure: None,
            bins: DEFAULT_BINS,
        }
    }
}

impl DistributionChart {
    fn measure<'a>(&'a self, ctx: &'a ChartContext) -> &'a str {
        self.measure.as_deref().unwrap_or(&ctx.measure)
    }
}

impl ChartBuilder for DistributionChart {
    fn kind(&self) -> &'static str {
        "distribution"
    }

    fn required_fields(&self, ctx: &ChartContext) -> Vec<FieldRequirement> {
        vec![FieldRequirement::numeric(self.measure(ctx))]
    }

    fn params_label(&self, ctx: &ChartContext) -> String {
        format!("{}-{}bins", self.measure(ctx), self.bins)
    }

    fn render(&self, data: &CrashDataset, ctx: &ChartContext) -> Result<Rendered> {
        let measure = self.measure(ctx);
        let values = data.numbers(measure);
        let stats = StatsCalculator::compute_descriptive_stats(&values);
        let hist = StatsCalculator::histogram(&values, self.bins);

        let (x_min, x_max) = match (hist.edges.first(), hist.edges.last()) {
            (Some(lo), Some(hi)) => (*lo, *hi),
            _ => (0.0, 1.0),
        };
        let y_max = StaticChartRenderer::nice_ceiling(hist.max_count() as f64);
        let caption = format!(
            "Distribution of {measure} - {} (n={}, mean={:.2}, median={:.2}, sd={:.2})",
            ctx.region, stats.count, stats.mean, stats.median, stats.std
        );

        let svg = StaticChartRenderer::render_svg(self.kind(), FIGURE_SIZE, |root| -> DrawResult {
            let mut chart = plotters::chart::ChartBuilder::on(root)
                .caption(caption, CAPTION_FONT)
                .margin(20)
                .x_label_area_size(50)
                .y_label_area_size(70)
                .build_cartesian_2d(x_min..x_max, 0.0..y_max)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_label_style(LABEL_FONT)
                .x_label_formatter(&|x: &f64| format!("{x:.1}"))
                .x_desc(measure)
                .y_desc("Crashes")
                .draw()?;

            let bars = hist.counts.iter().enumerate().map(|(i, count)| {
                let left = hist.edges[i];
                let right = hist.edges[i + 1];
                [(left, 0.0), (right, *count as f64)]
            });
            chart.draw_series(bars.clone().map(|b| Rectangle::new(b, BAR_FILL.filled())))?;
            chart.draw_series(bars.map(|b| Rectangle::new(b, EDGE_COLOR.stroke_width(1))))?;
            Ok(())
        })?;

        Ok(Rendered::svg(svg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Region, TimeRange};
    use crate::data::{CrashRecord, Value};

    fn ctx() -> ChartContext {
        ChartContext {
            measure: "injuries".into(),
            region: Region::state("TX"),
            time_range: TimeRange::default(),
        }
    }

    fn data(values: &[f64]) -> CrashDataset {
        let records = values
            .iter()
            .map(|v| CrashRecord::from_iter([("injuries", Value::Number(*v))]))
            .collect();
        CrashDataset::new(vec!["injuries".into()], records)
    }

    #[test]
    fn measure_falls_back_to_run_measure() {
        let chart = DistributionChart::default();
        assert_eq!(chart.params_label(&ctx()), "injuries-20bins");
        assert_eq!(
            chart.required_fields(&ctx()),
            vec![FieldRequirement::numeric("injuries")]
        );

        let chart = DistributionChart {
            measure: Some("fatalities".into()),
            bins: 8,
        };
        assert_eq!(chart.params_label(&ctx()), "fatalities-8bins");
    }

    #[test]
    fn renders_one_bar_per_bin() {
        let chart = DistributionChart {
            measure: None,
            bins: 4,
        };
        let rendered = chart.render(&data(&[0.0, 1.0, 1.0, 2.0, 5.0]), &ctx()).unwrap();
        assert!(rendered.svg.contains("n=5"));
        assert!(rendered.companions.is_empty());
    }

    #[test]
    fn constant_series_still_renders() {
        let chart = DistributionChart::default();
        assert!(chart.render(&data(&[3.0, 3.0]), &ctx()).is_ok());
    }
}
