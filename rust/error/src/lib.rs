// Error codes shared by every crate in the workspace. Each error type maps
// itself onto one of these so callers can handle failures generically.
use std::error::Error;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ErrorCodes {
    // UNKNOWN indicates an unknown error, typically an I/O failure outside our control.
    Unknown = 2,
    // INVALID_ARGUMENT indicates the caller specified an invalid argument or configuration.
    InvalidArgument = 3,
    // NOT_FOUND means a requested file or entity was not found.
    NotFound = 5,
    // FAILED_PRECONDITION indicates the host is not in a state required for the operation,
    // e.g. a backend was requested that the CPU cannot run.
    FailedPrecondition = 9,
    // INTERNAL errors are internal errors.
    Internal = 13,
    // DATA_LOSS indicates malformed or truncated input data.
    DataLoss = 15,
}

impl ErrorCodes {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCodes::InvalidArgument => "InvalidArgumentError",
            ErrorCodes::NotFound => "NotFoundError",
            ErrorCodes::FailedPrecondition => "FailedPreconditionError",
            ErrorCodes::DataLoss => "DataLossError",
            ErrorCodes::Internal => "InternalError",
            ErrorCodes::Unknown => "UnknownError",
        }
    }
}

pub trait DescrIntError: Error + Send {
    fn code(&self) -> ErrorCodes;
    fn boxed(self) -> Box<dyn DescrIntError>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

impl Error for Box<dyn DescrIntError> {}

impl DescrIntError for Box<dyn DescrIntError> {
    fn code(&self) -> ErrorCodes {
        self.as_ref().code()
    }
}

impl DescrIntError for std::io::Error {
    fn code(&self) -> ErrorCodes {
        match self.kind() {
            std::io::ErrorKind::NotFound => ErrorCodes::NotFound,
            std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::InvalidData => {
                ErrorCodes::DataLoss
            }
            _ => ErrorCodes::Unknown,
        }
    }
}
