//! Time-trend chart: crash count (or a summed measure) per time bucket.

use crate::charts::renderer::{
    DrawResult, StaticChartRenderer, CAPTION_FONT, FIGURE_SIZE, LABEL_FONT, LINE_COLOR,
};
use crate::charts::{ChartBuilder, ChartContext, Rendered};
use crate::data::{CrashDataset, FieldRequirement};
use crate::error::Result;
use crate::stats::{bucket_series, Granularity};
use chrono::NaiveDate;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeTrendChart {
    /// Summed per bucket; `None` counts crashes.
    pub measure: Option<String>,
    pub granularity: Granularity,
}

impl TimeTrendChart {
    /// Zero-filled series over the run's time range (or the data extent).
    pub fn series(&self, data: &CrashDataset, ctx: &ChartContext) -> Vec<(NaiveDate, f64)> {
        let points: Vec<(NaiveDate, f64)> = data
            .records()
            .iter()
            .filter_map(|r| {
                let date = r.date()?;
                let value = match &self.measure {
                    Some(m) => r.number(m)?,
                    None => 1.0,
                };
                Some((date, value))
            })
            .collect();

        bucket_series(
            &points,
            self.granularity,
            ctx.time_range.start,
            ctx.time_range.end,
        )
    }

    fn y_desc(&self) -> String {
        match &self.measure {
            Some(m) => format!("Total {m}"),
            None => "Crashes".to_string(),
        }
    }
}

impl ChartBuilder for TimeTrendChart {
    fn kind(&self) -> &'static str {
        "time-trend"
    }

    fn required_fields(&self, _ctx: &ChartContext) -> Vec<FieldRequirement> {
        self.measure
            .iter()
            .map(|m| FieldRequirement::numeric(m.clone()))
            .collect()
    }

    fn params_label(&self, _ctx: &ChartContext) -> String {
        format!(
            "{}-{}",
            self.measure.as_deref().unwrap_or("count"),
            self.granularity
        )
    }

    fn render(&self, data: &CrashDataset, ctx: &ChartContext) -> Result<Rendered> {
        let series = self.series(data, ctx);
        let labels: Vec<String> = series
            .iter()
            .map(|(d, _)| self.granularity.label(*d))
            .collect();
        let y_max = StaticChartRenderer::nice_ceiling(
            series.iter().map(|(_, v)| *v).fold(0.0, f64::max),
        );
        let x_max = (series.len() as f64 - 1.0).max(1.0);
        let caption = format!(
            "{} per {} - {}",
            self.y_desc(),
            self.granularity,
            ctx.region
        );
        let y_desc = self.y_desc();

        let svg = StaticChartRenderer::render_svg(self.kind(), FIGURE_SIZE, |root| -> DrawResult {
            let mut chart = plotters::chart::ChartBuilder::on(root)
                .caption(caption, CAPTION_FONT)
                .margin(20)
                .x_label_area_size(50)
                .y_label_area_size(70)
                .build_cartesian_2d(-0.5..x_max + 0.5, 0.0..y_max)?;

            let label_at = |x: &f64| StaticChartRenderer::category_label(&labels, *x);
            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_labels(labels.len().clamp(1, 12))
                .x_label_formatter(&label_at)
                .x_label_style(LABEL_FONT)
                .x_desc(format!("Period ({})", self.granularity))
                .y_desc(y_desc.as_str())
                .draw()?;

            let points: Vec<(f64, f64)> = series
                .iter()
                .enumerate()
                .map(|(i, (_, v))| (i as f64, *v))
                .collect();
            chart.draw_series(LineSeries::new(points.iter().copied(), LINE_COLOR.stroke_width(2)))?;
            chart.draw_series(
                points
                    .iter()
                    .map(|p| Circle::new(*p, 3, LINE_COLOR.filled())),
            )?;
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

    fn record(y: i32, m: u32, d: u32, injuries: f64) -> CrashRecord {
        let date = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        CrashRecord::from_iter([
            ("date", Value::Date(date)),
            ("state", Value::Text("CA".into())),
            ("injuries", Value::Number(injuries)),
        ])
    }

    fn ctx() -> ChartContext {
        ChartContext {
            measure: "injuries".into(),
            region: Region::state("CA"),
            time_range: TimeRange::new(
                NaiveDate::from_ymd_opt(2020, 1, 1),
                NaiveDate::from_ymd_opt(2020, 12, 31),
            ),
        }
    }

    fn data() -> CrashDataset {
        let records = (1..=12)
            .filter(|m| *m != 7)
            .map(|m| record(2020, m, 10, m as f64))
            .collect();
        CrashDataset::new(
            vec!["date".into(), "state".into(), "injuries".into()],
            records,
        )
    }

    #[test]
    fn gap_month_is_rendered_as_zero() {
        let chart = TimeTrendChart::default();
        let series = chart.series(&data(), &ctx());
        assert_eq!(series.len(), 12);
        assert_eq!(series[6].1, 0.0);
        assert!(series.iter().enumerate().all(|(i, (_, v))| i == 6 || *v == 1.0));
    }

    #[test]
    fn measure_is_summed() {
        let chart = TimeTrendChart {
            measure: Some("injuries".into()),
            granularity: Granularity::Year,
        };
        let series = chart.series(&data(), &ctx());
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].1, (1..=12).filter(|m| *m != 7).sum::<i32>() as f64);
        assert_eq!(
            chart.required_fields(&ctx()),
            vec![FieldRequirement::numeric("injuries")]
        );
    }

    #[test]
    fn renders_deterministic_svg() {
        let chart = TimeTrendChart::default();
        let a = chart.render(&data(), &ctx()).unwrap();
        let b = chart.render(&data(), &ctx()).unwrap();
        assert!(a.svg.contains("<svg"));
        assert_eq!(a, b);
    }
}
