use multinode_core::upstream::{PoolError, ShutdownError};
use std::fmt;

#[derive(Debug)]
pub(crate) enum CliError {
    Config(String),
    Io(String),
    Pool(String),
    General(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Pool(msg) => write!(f, "Pool error: {msg}"),
            Self::General(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(error: serde_json::Error) -> Self {
        Self::General(error.to_string())
    }
}

impl From<PoolError> for CliError {
    fn from(error: PoolError) -> Self {
        Self::Pool(error.to_string())
    }
}

impl From<ShutdownError> for CliError {
    fn from(error: ShutdownError) -> Self {
        Self::Pool(error.to_string())
    }
}

pub(crate) type CliResult<T> = Result<T, CliError>;

pub(crate) fn print_success(message: &str) {
    println!("[SUCCESS] {message}");
}

pub(crate) fn print_error(message: &str) {
    eprintln!("[ERROR] {message}");
}

pub(crate) fn print_info(message: &str) {
    println!("[INFO] {message}");
}
