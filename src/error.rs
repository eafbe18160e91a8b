/*!
error module defines the error types used in bgpmon-filter.
*/
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::{error::Error, fmt, io};

#[derive(Debug)]
pub enum RelayError {
    Io(io::Error),
    Config(String),
    Rules(RuleParseError),
    Bind(String),
    Upstream(String),
}

impl Error for RelayError {}

impl Display for RelayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Io(e) => write!(f, "I/O error: {e}"),
            RelayError::Config(s) => write!(f, "configuration error: {s}"),
            RelayError::Rules(e) => write!(f, "{e}"),
            RelayError::Bind(s) => write!(f, "failed to bind listening socket: {s}"),
            RelayError::Upstream(s) => write!(f, "failed to connect upstream: {s}"),
        }
    }
}

impl From<io::Error> for RelayError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            ErrorKind::NotFound => RelayError::Config(format!("file not found: {e}")),
            _ => RelayError::Io(e),
        }
    }
}

impl From<RuleParseError> for RelayError {
    fn from(e: RuleParseError) -> Self {
        RelayError::Rules(e)
    }
}

/// A rule-file (or config-file) parse error naming the offending line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleParseError {
    pub line: usize,
    pub message: String,
}

impl RuleParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        RuleParseError {
            line,
            message: message.into(),
        }
    }
}

impl Error for RuleParseError {}

impl Display for RuleParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at line {}: {}", self.line, self.message)
    }
}
