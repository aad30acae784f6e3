//! Morris elementary-effects screening of model parameters
//!
//! The workflow follows three steps that can run in separate processes:
//!
//! 1. [`morris::sample`] draws one-at-a-time trajectories in the parameter ranges, and
//!    [`design::full_design`] repeats them for each value of the qualitative parameters.
//! 2. A [`ModelRunner`] evaluates every row of the design in parallel.
//! 3. [`morris::analyze`] computes the sensitivity indices from the samples and outputs.

pub mod design;
pub mod io;
pub mod model_runner;
pub mod morris;
pub mod parameter_set;

pub use design::{full_design, QualitativeParameter};
pub use model_runner::ModelRunner;
pub use morris::MorrisIndices;
pub use parameter_set::{ParameterRange, ParameterSet};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Sampling error: {0}")]
    SamplingError(String),
    #[error("Analysis error: {0}")]
    AnalysisError(String),
    #[error("Model evaluation failed: {0}")]
    ModelError(String),
    #[error("Failed to parse '{path}' at line {line}: {message}")]
    ParseError {
        path: String,
        line: usize,
        message: String,
    },
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
