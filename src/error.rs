use std::fmt;

#[derive(Debug)]
pub enum InlineError {
    InvalidConfiguration(String),
    Io(std::io::Error),
}

impl fmt::Display for InlineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InlineError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            InlineError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for InlineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InlineError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for InlineError {
    fn from(value: std::io::Error) -> Self {
        InlineError::Io(value)
    }
}

/// A selector that falls outside the supported grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorError {
    pub selector: String,
    pub position: usize,
    pub message: String,
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unsupported selector {:?} at {}: {}",
            self.selector, self.position, self.message
        )
    }
}

impl std::error::Error for SelectorError {}
