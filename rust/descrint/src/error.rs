use descrint_error::{DescrIntError, ErrorCodes};
use thiserror::Error;

use crate::backend::BackendKind;

/// Construction failure. No engine exists after one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Invalid dimension {0}: must be a positive multiple of 8")]
    InvalidDimension(usize),
    #[error("Invalid depth {0}: must be between 4 and 8 bits")]
    InvalidDepth(usize),
    #[error("Backend {0} is not supported by this CPU")]
    UnsupportedBackend(BackendKind),
}

impl DescrIntError for ConfigurationError {
    fn code(&self) -> ErrorCodes {
        match self {
            ConfigurationError::InvalidDimension(_) => ErrorCodes::InvalidArgument,
            ConfigurationError::InvalidDepth(_) => ErrorCodes::InvalidArgument,
            ConfigurationError::UnsupportedBackend(_) => ErrorCodes::FailedPrecondition,
        }
    }
}
