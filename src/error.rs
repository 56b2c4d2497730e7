use std::io;
use std::net;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("browser: no candidate addresses")]
    ErrNoAddresses,
    #[error("browser: socket is closed")]
    ErrSocketClosed,
    #[error("browser: sender has already been executed")]
    ErrAlreadyExecuted,
    #[error("browser: empty response")]
    ErrEmptyResponse,
    #[error("Invalid arguments: {0}")]
    ErrInvalidArgument(String),
    #[error("browser: instance name exceeds 32 bytes")]
    ErrInstanceNameTooLong,
    #[error("Failed to get response from SQL Server Browser on {0}")]
    ErrNoResponse(String),
    #[error("Failed to lookup instance on {server} - {source}")]
    ErrLookupFailed {
        server: String,
        #[source]
        source: Box<Error>,
    },
    #[error("Port for {instance} not found in {server}")]
    ErrInstanceNotFound { instance: String, server: String },
    #[error("{0}")]
    Io(#[source] IoError),
    #[error("parse addr: {0}")]
    ParseIp(#[from] net::AddrParseError),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}
