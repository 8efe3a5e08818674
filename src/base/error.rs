use std::error;
use std::fmt;
use std::io;

/// Represents errors that can occur while talking to the RPLIDAR.
#[derive(Debug)]
pub enum Error {
    /// A command could not be completed within the configured retry ceiling.
    OperationFail { description: String },

    /// The bounded wait for a response (or a measurement record) expired.
    OperationTimeout,

    /// The received bytes do not form the expected response. Contains a description of the mismatch.
    ProtocolError { description: String },

    /// The underlying byte transport failed (e.g., the serial device went away).
    IoError(io::Error),
}

impl Error {
    /// Returns `true` when resending the originating command may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::ProtocolError { .. } | Error::OperationTimeout)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OperationFail { description } => write!(f, "operation failed: {}", description),
            Error::OperationTimeout => write!(f, "operation timeout"),
            Error::ProtocolError { description } => write!(f, "protocol error: {}", description),
            Error::IoError(err) => write!(f, "io error: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IoError(err)
    }
}

/// A specialized `Result` type for RPLIDAR operations.
pub type Result<T> = std::result::Result<T, Error>;
