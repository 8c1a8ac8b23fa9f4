//! Error Module
//! Error taxonomy shared by the loader, cleaner, chart builder and runner.

use std::path::PathBuf;
use thiserror::Error;

/// Broad category of a [`CrashError`], used by the runner's propagation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DataSource,
    Schema,
    EmptyResult,
    Render,
    Config,
}

#[derive(Error, Debug)]
pub enum CrashError {
    /// Input file/directory missing or unreadable, or the API failed.
    #[error("data source error ({source_name}): {message}")]
    DataSource { source_name: String, message: String },

    /// Required columns absent after load.
    #[error("schema error in {source_name}: missing required column(s) {}", missing.join(", "))]
    Schema {
        source_name: String,
        missing: Vec<String>,
    },

    /// Valid input but nothing left after cleaning and filtering.
    #[error("no rows left for region {region} and time range {range}")]
    EmptyResult { region: String, range: String },

    /// Chart could not be rendered or written.
    #[error("render error for {chart}: {message}")]
    Render { chart: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {message}")]
    ConfigFile { path: PathBuf, message: String },
}

impl CrashError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrashError::DataSource { .. } => ErrorKind::DataSource,
            CrashError::Schema { .. } => ErrorKind::Schema,
            CrashError::EmptyResult { .. } => ErrorKind::EmptyResult,
            CrashError::Render { .. } => ErrorKind::Render,
            CrashError::Config(_) | CrashError::ConfigFile { .. } => ErrorKind::Config,
        }
    }

    pub(crate) fn data_source(source_name: impl Into<String>, message: impl ToString) -> Self {
        CrashError::DataSource {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn render(chart: impl Into<String>, message: impl ToString) -> Self {
        CrashError::Render {
            chart: chart.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrashError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_lists_missing_columns() {
        let err = CrashError::Schema {
            source_name: "crashes.csv".into(),
            missing: vec!["date".into(), "state".into()],
        };
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.to_string().contains("date, state"));
    }

    #[test]
    fn config_variants_share_kind() {
        assert_eq!(CrashError::Config("x".into()).kind(), ErrorKind::Config);
        let file_err = CrashError::ConfigFile {
            path: PathBuf::from("run.toml"),
            message: "bad".into(),
        };
        assert_eq!(file_err.kind(), ErrorKind::Config);
    }
}
