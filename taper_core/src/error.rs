//! Error types for the taper_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for taper_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Plan configuration rejected before generation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalogue validation error
    #[error("Catalogue validation error: {0}")]
    CatalogValidation(String),

    /// Medicine or form not present in the catalogue
    #[error("Unknown medicine: {0}")]
    UnknownMedicine(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
