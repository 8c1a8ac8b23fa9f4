//! Data module - loading, normalization and cleaning of crash records

mod loader;
mod processor;
mod record;
pub mod regions;

pub use loader::DataLoader;
pub use processor::{
    CleaningReport, DataProcessor, DropReason, DroppedRow, FieldKind, FieldRequirement,
};
pub use record::{
    normalize_column_name, CrashDataset, CrashRecord, Value, COUNTY, DATE, LAT, LON, STATE,
};
