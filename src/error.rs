use thiserror::Error;

/// Configuration errors, raised while a sampler is being set up.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum NestedError {
    #[error("Unknown error distribution: {0}")]
    UnknownDistribution(String),
    #[error("Unknown engine: {0}")]
    UnknownEngine(String),
    #[error("The dataset is empty")]
    EmptyData,
    #[error("Length of {what} is {found}, expected {expected}")]
    DataMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Invalid prior {0}")]
    InvalidPrior(String),
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
    #[error("Parameter index {index} to be kept is out of range ({npars} parameters)")]
    KeepOutOfRange { index: usize, npars: usize },
}

pub type Result<T> = std::result::Result<T, NestedError>;
