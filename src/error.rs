use thiserror::Error;

/// Main error type for regdiff operations
#[derive(Error, Debug)]
pub enum RegdiffError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The caller supplied something we cannot work with (missing file, bad encoding)
    #[error("Invalid input: {0}")]
    InputValidation(String),

    /// The classification backend could not be reached or refused the request
    #[error("Classification backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend answered, but not with anything we can parse
    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("Job error: {0}")]
    Job(String),
}

pub type Result<T> = std::result::Result<T, RegdiffError>;
