use std::path::PathBuf;

use thiserror::Error;

use crate::validate::SchemaViolation;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to fetch {url}: {reason}")]
    TransientFetch { url: String, reason: String },

    #[error("failed to parse sheet '{sheet}': {reason}")]
    Parse { sheet: String, reason: String },

    #[error("missing expected column: {0}")]
    MissingColumn(String),

    #[error("schema validation failed: {0}")]
    SchemaValidation(#[from] SchemaViolation),

    #[error("failed to render {}: {reason}", path.display())]
    Render { path: PathBuf, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Error::Csv {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
