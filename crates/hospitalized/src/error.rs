use std::path::PathBuf;

/// Errors raised while fetching, reshaping or writing the hospitalization tables.
///
/// None of these are recovered from: every one aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network failure (DNS, connect, TLS, body read)
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Upstream answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Malformed spreadsheet, CSV or cell value
    #[error("Cannot parse {what}: {reason}")]
    Parse { what: String, reason: String },

    /// A selected or derived-from column is absent
    #[error("Missing column '{column}' in {table}")]
    MissingColumn { column: String, table: String },

    /// Adding or joining would produce two columns with the same name
    #[error("Column '{0}' already exists")]
    DuplicateColumn(String),

    /// File system error, with the path involved
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid source definition
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Building, casting or encoding an Arrow table
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Planning or executing a join/derivation query
    #[error("Query error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),
}

impl Error {
    pub(crate) fn parse(what: impl Into<String>, reason: impl ToString) -> Self {
        Error::Parse {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for hospitalization pipeline operations
pub type Result<T> = std::result::Result<T, Error>;
