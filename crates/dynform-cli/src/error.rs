use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] dynform_core::Error),
    #[error(transparent)]
    Lookup(#[from] dynform_core::lookup::LookupError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to read descriptors at {path}: {message}")]
    Descriptors { path: String, message: String },
    #[error("Failed to access profiles at {path}: {message}")]
    Profiles { path: String, message: String },
    #[error("Invalid assignment '{0}': expected KEY=VALUE")]
    InvalidAssignment(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "No lookup source configured. Pass --options <PATH> or run `dynform config init --lookup-url <URL>`."
    )]
    LookupNotConfigured,
}
