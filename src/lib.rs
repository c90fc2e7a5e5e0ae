pub mod business_days;
pub mod clean;
pub mod combine;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod files;
pub mod pipeline;
pub mod report;
pub mod table;
pub mod validate;

pub use business_days::{get_business_days, BusinessDay};
pub use clean::{clean_dataset, Indexer};
pub use config::Config;
pub use error::{Error, Result};
pub use fetch::{HttpTransport, Transport};
pub use pipeline::{run, PipelineReport, StageOutcome};
pub use table::Table;
pub use validate::{collect_violations, validate_dataset, SchemaViolation};
