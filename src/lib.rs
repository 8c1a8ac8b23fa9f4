//! crashcharts: load road-crash records, filter them by region and time
//! window, and render descriptive charts to SVG.

pub mod charts;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod runner;
pub mod stats;

pub use config::{InputSource, Region, RunConfig, TimeRange};
pub use error::{CrashError, ErrorKind, Result};
pub use runner::{run, ChartOutcome, Pipeline, RunSummary};
