//! crashcharts - batch road-crash chart generation
//!
//! Exit codes: 0 when the run completed (some charts may have been skipped or
//! failed), 1 when every requested chart failed, 2 when the run aborted.

use anyhow::Context;
use clap::Parser;
use crashcharts::cli::Cli;
use crashcharts::{logging, Pipeline};
use std::process::ExitCode;
use tracing::{error, info};

const EXIT_ABORTED: u8 = 2;

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_ABORTED)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<u8> {
    let config = cli.into_config().context("invalid run configuration")?;
    info!(
        input = %config.input.describe(),
        output = %config.output_dir.display(),
        region = %config.region,
        range = %config.time_range,
        charts = config.charts.len(),
        "starting run"
    );

    let summary = Pipeline::new(config).run().context("run aborted")?;
    print!("{summary}");
    Ok(summary.exit_code() as u8)
}
