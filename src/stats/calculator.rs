//! Statistics Calculator Module
//! Descriptive statistics, histogram binning, cross-tabulation and value counts.

use statrs::statistics::{Data, Distribution, Max, Median, Min};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Default histogram bin count.
pub const DEFAULT_BINS: usize = 20;

/// Summary statistics for one numeric series.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub p05: f64,
    pub p95: f64,
}

impl Default for DescriptiveStats {
    fn default() -> Self {
        Self {
            count: 0,
            mean: f64::NAN,
            median: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            max: f64::NAN,
            p05: f64::NAN,
            p95: f64::NAN,
        }
    }
}

/// Equal-width histogram. `edges` has one more entry than `counts`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Axis label for a cross-tabulation. Ranked labels (numbers, calendar
/// positions) sort by rank; the rest sort by text, ahead of ranked ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AxisLabel {
    pub rank: Option<i64>,
    pub text: String,
}

impl AxisLabel {
    pub fn ranked(rank: i64, text: impl Into<String>) -> Self {
        Self {
            rank: Some(rank),
            text: text.into(),
        }
    }

    /// Integer-looking text ranks numerically, anything else by text.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            rank: text.parse::<i64>().ok(),
            text,
        }
    }
}

/// Two-way table of summed values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrossTab {
    pub rows: Vec<String>,
    pub cols: Vec<String>,
    /// `cells[row][col]`; zero where no record fell.
    pub cells: Vec<Vec<f64>>,
}

impl CrossTab {
    pub fn max_value(&self) -> f64 {
        self.cells
            .iter()
            .flatten()
            .copied()
            .fold(0.0, f64::max)
    }
}

/// Handles statistical calculations.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute descriptive statistics for an array of values.
    pub fn compute_descriptive_stats(values: &[f64]) -> DescriptiveStats {
        let n = values.len();
        if n == 0 {
            return DescriptiveStats::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let data = Data::new(values.to_vec());
        let mean = data.mean().unwrap_or(f64::NAN);
        let std = if n > 1 {
            data.std_dev().unwrap_or(0.0)
        } else {
            0.0
        };

        DescriptiveStats {
            count: n,
            mean,
            median: data.median(),
            std,
            min: data.min(),
            max: data.max(),
            p05: Self::percentile(&sorted, 5.0),
            p95: Self::percentile(&sorted, 95.0),
        }
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    pub fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    /// Bin `values` into `bins` equal-width bins spanning their min..max.
    ///
    /// The last bin is closed on the right. A constant series gets a single
    /// bin of width 1 centred on the value.
    pub fn histogram(values: &[f64], bins: usize) -> Histogram {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return Histogram {
                edges: Vec::new(),
                counts: Vec::new(),
            };
        }

        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        if max == min {
            return Histogram {
                edges: vec![min - 0.5, min + 0.5],
                counts: vec![finite.len()],
            };
        }

        let bins = bins.max(1);
        let width = (max - min) / bins as f64;
        let edges: Vec<f64> = (0..=bins).map(|i| min + width * i as f64).collect();
        let mut counts = vec![0usize; bins];
        for v in finite {
            let idx = (((v - min) / width).floor() as usize).min(bins - 1);
            counts[idx] += 1;
        }

        Histogram { edges, counts }
    }

    /// Sum `value` over every (row, col) pair and lay the result out as a grid
    /// with both axes in label order.
    pub fn crosstab<I>(entries: I) -> CrossTab
    where
        I: IntoIterator<Item = (AxisLabel, AxisLabel, f64)>,
    {
        let mut sums: BTreeMap<(AxisLabel, AxisLabel), f64> = BTreeMap::new();
        let mut row_labels: BTreeMap<AxisLabel, ()> = BTreeMap::new();
        let mut col_labels: BTreeMap<AxisLabel, ()> = BTreeMap::new();

        for (row, col, value) in entries {
            row_labels.insert(row.clone(), ());
            col_labels.insert(col.clone(), ());
            *sums.entry((row, col)).or_insert(0.0) += value;
        }

        let rows: Vec<AxisLabel> = row_labels.into_keys().collect();
        let cols: Vec<AxisLabel> = col_labels.into_keys().collect();
        let cells = rows
            .iter()
            .map(|r| {
                cols.iter()
                    .map(|c| sums.get(&(r.clone(), c.clone())).copied().unwrap_or(0.0))
                    .collect()
            })
            .collect();

        CrossTab {
            rows: rows.into_iter().map(|l| l.text).collect(),
            cols: cols.into_iter().map(|l| l.text).collect(),
            cells,
        }
    }

    /// Frequency of each value, most frequent first, ties by name, truncated
    /// to `top_n`.
    pub fn value_counts<I, S>(values: I, top_n: usize) -> Vec<(String, usize)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for v in values {
            let v = v.as_ref().trim();
            if !v.is_empty() {
                *counts.entry(v.to_string()).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(top_n);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptive_stats_basic() {
        let stats = StatsCalculator::compute_descriptive_stats(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(stats.count, 4);
        assert!((stats.mean - 2.5).abs() < 1e-12);
        assert!((stats.median - 2.5).abs() < 1e-12);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        // sample std of 1..4
        assert!((stats.std - 1.290_994_448_735_805_6).abs() < 1e-9);
    }

    #[test]
    fn descriptive_stats_single_and_empty() {
        let one = StatsCalculator::compute_descriptive_stats(&[7.0]);
        assert_eq!(one.std, 0.0);
        assert_eq!(one.p95, 7.0);
        let none = StatsCalculator::compute_descriptive_stats(&[]);
        assert_eq!(none.count, 0);
        assert!(none.mean.is_nan());
    }

    #[test]
    fn percentile_interpolates() {
        let sorted = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert_eq!(StatsCalculator::percentile(&sorted, 50.0), 20.0);
        assert_eq!(StatsCalculator::percentile(&sorted, 10.0), 4.0);
    }

    #[test]
    fn histogram_puts_max_in_last_bin() {
        let hist = StatsCalculator::histogram(&[0.0, 1.0, 2.0, 3.0, 4.0], 4);
        assert_eq!(hist.edges, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(hist.counts, vec![1, 1, 1, 2]);
        assert_eq!(hist.total(), 5);
    }

    #[test]
    fn histogram_constant_series() {
        let hist = StatsCalculator::histogram(&[3.0, 3.0, 3.0], 10);
        assert_eq!(hist.edges, vec![2.5, 3.5]);
        assert_eq!(hist.counts, vec![3]);
        assert!(StatsCalculator::histogram(&[], 10).counts.is_empty());
    }

    #[test]
    fn crosstab_fills_zeros_and_orders_labels() {
        let entries = vec![
            (AxisLabel::from_text("10"), AxisLabel::ranked(2, "Tue"), 1.0),
            (AxisLabel::from_text("9"), AxisLabel::ranked(1, "Mon"), 2.0),
            (AxisLabel::from_text("9"), AxisLabel::ranked(1, "Mon"), 3.0),
            (AxisLabel::from_text("Kern"), AxisLabel::ranked(2, "Tue"), 4.0),
        ];
        let tab = StatsCalculator::crosstab(entries);
        assert_eq!(tab.rows, vec!["Kern", "9", "10"]);
        assert_eq!(tab.cols, vec!["Mon", "Tue"]);
        assert_eq!(
            tab.cells,
            vec![vec![0.0, 4.0], vec![5.0, 0.0], vec![0.0, 1.0]]
        );
        assert_eq!(tab.max_value(), 5.0);
    }

    #[test]
    fn value_counts_ranks_and_breaks_ties_by_name() {
        let makes = ["Ford", "Toyota", "Ford", "Honda", "Toyota", "Chevrolet", " ", "Ford"];
        let top = StatsCalculator::value_counts(makes, 3);
        assert_eq!(
            top,
            vec![
                ("Ford".to_string(), 3),
                ("Toyota".to_string(), 2),
                ("Chevrolet".to_string(), 1),
            ]
        );
    }
}
