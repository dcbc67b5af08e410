// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

/// Page build errors. Any of these aborts the build.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed page configuration or missing keys
    #[error("Invalid page configuration: {0}")]
    Config(String),

    /// Template parse or render failure
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    /// File system error, with the path involved
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding of template data or the timestamp
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for page build operations
pub type Result<T> = std::result::Result<T, Error>;
