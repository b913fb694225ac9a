//! Error types for dynform-core

use thiserror::Error;

/// Result type alias using dynform-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in dynform-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// No live control exists for the key
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// The descriptor is required and cannot be added or removed
    #[error("Field is not optional: {0}")]
    NotOptional(String),

    /// The optional descriptor already has a live control
    #[error("Optional field already selected: {0}")]
    AlreadySelected(String),

    /// Edits were attempted while the form is disabled
    #[error("Form is disabled")]
    Disabled,

    /// The descriptor set cannot be turned into a form
    #[error("Invalid descriptors: {0}")]
    InvalidDescriptors(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
