//! Stats module - aggregation and descriptive statistics

mod calculator;
mod timeseries;

pub use calculator::{AxisLabel, CrossTab, DescriptiveStats, Histogram, StatsCalculator, DEFAULT_BINS};
pub use timeseries::{bucket_series, Granularity};
