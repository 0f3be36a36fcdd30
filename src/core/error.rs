//! Error types for MAID Runner operations.
//!
//! This module defines the canonical error type used throughout the kernel.
//! All components return `Result<T, MaidError>` for error handling. Note that
//! most *validation findings* are not errors: they travel as diagnostics (see
//! `core::diagnostics`). `MaidError` is reserved for conditions that stop a
//! run outright, such as an unreadable manifest directory.

use std::io;
use thiserror::Error;

/// Canonical error type for all MAID Runner operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
/// I/O and JSON errors auto-convert via `#[from]`.
#[derive(Error, Debug)]
pub enum MaidError {
    /// I/O error (auto-converts from `std::io::Error`)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON parse or serialise error (auto-converts from `serde_json::Error`)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Manifest set cannot be loaded (unreadable directory, bad filename, duplicate)
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Path resolution or normalisation error
    #[error("Path error: {0}")]
    Path(String),

    /// Configuration file error (`.maid.toml`)
    #[error("Config error: {0}")]
    Config(String),

    /// Validation run failed (errors or fatals in the final report)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Run aborted via the cooperative cancel signal
    #[error("Cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_error_display() {
        let err = MaidError::Manifest("duplicate task index 7".to_string());
        assert_eq!(format!("{}", err), "Manifest error: duplicate task index 7");
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(format!("{}", MaidError::Cancelled), "Cancelled");
    }

    #[test]
    fn test_io_error_converts() {
        let io = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err: MaidError = io.into();
        assert!(matches!(err, MaidError::Io(_)));
    }
}
