use std::fmt;

/// An error that is nothing but its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringError(String);

impl StringError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for StringError {}

impl From<&str> for StringError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for StringError {
    fn from(message: String) -> Self {
        Self(message)
    }
}
