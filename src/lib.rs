pub mod cli;
pub mod config;
pub mod contact;
pub mod detector;
pub mod dns;
pub mod domain_utils;
pub mod export;
pub mod finalizer;
pub mod ingest;
pub mod logger;
pub mod org_normalizer;
pub mod pipeline;
pub mod row;
pub mod task;

pub use detector::{ColumnMapping, CsvShape};
pub use pipeline::ProcessingError;
pub use row::Row;
pub use task::{CsvProcessor, Task, TaskStatus, TaskStore};
