use descrint::ConfigurationError;
use descrint_error::{DescrIntError, ErrorCodes};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Input file {0} does not exist")]
    FileNotFound(String),
    #[error("Malformed input {path}: {reason}")]
    Malformed { path: String, reason: String },
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Failed to load config: {0}")]
    Config(#[from] Box<figment::Error>),
    #[error(transparent)]
    Engine(#[from] ConfigurationError),
    #[error("Failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn malformed(path: &str, reason: impl Into<String>) -> Self {
        CliError::Malformed {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

impl DescrIntError for CliError {
    fn code(&self) -> ErrorCodes {
        match self {
            CliError::FileNotFound(_) => ErrorCodes::NotFound,
            CliError::Malformed { .. } => ErrorCodes::DataLoss,
            CliError::DimensionMismatch { .. } => ErrorCodes::InvalidArgument,
            CliError::Config(_) => ErrorCodes::InvalidArgument,
            CliError::Engine(err) => err.code(),
            CliError::ThreadPool(_) => ErrorCodes::Internal,
            CliError::Io(err) => err.code(),
        }
    }
}
