use thiserror::Error;

/// Error type for invalid operations.
#[derive(Error, Debug)]
pub enum AlepError {
    #[error("{0}")]
    Error(String),
    #[error("No organ with id {0} in the canopy")]
    UnknownVertex(usize),
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("Weather data error at line {line}: {message}")]
    WeatherFormat { line: usize, message: String },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Missing weather column '{0}'")]
    MissingWeatherColumn(String),
    #[error("Weather window {start}..{end} is outside the {len} available records")]
    WeatherOutOfRange { start: usize, end: usize, len: usize },
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialisation error: {0}")]
    Serialisation(#[from] bincode::Error),
}

impl AlepError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        AlepError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        AlepError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience type for `Result<T, AlepError>`.
pub type AlepResult<T> = Result<T, AlepError>;
