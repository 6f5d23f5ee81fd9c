//! I/O operations for benchmark results.
//!
//! Reading raw artifacts from disk and writing canonical results back out.

use crate::normalize::{normalize_slice, MalformedResultError};
use crate::result::BenchmarkResult;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading an artifact file.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The file could not be read.
    #[error("Failed to read result artifact {}: {source}", .path.display())]
    Read {
        /// Artifact path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The file was read but does not match the artifact schema.
    #[error("Malformed result artifact {}: {source}", .path.display())]
    Malformed {
        /// Artifact path.
        path: PathBuf,
        /// Schema violation.
        #[source]
        source: MalformedResultError,
    },
}

/// Read and normalize a raw artifact file.
pub fn read_artifact(path: impl AsRef<Path>) -> Result<BenchmarkResult, ArtifactError> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    normalize_slice(&data).map_err(|source| ArtifactError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a canonical result as pretty JSON in the array-of-suites shape.
pub fn write_result_json(result: &BenchmarkResult, path: impl AsRef<Path>) -> io::Result<()> {
    let json = serde_json::to_string_pretty(result)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    fs::write(path, json)
}
