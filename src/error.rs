//! Crate error types and utilities

use thiserror::Error;

/// Errors produced while spawning and supervising child processes
#[derive(Error, Debug)]
pub enum TetherError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Spawn error: {0}")]
    Spawn(String),

    #[error("Write error: {0}")]
    Write(String),

    #[error("Signal error: {0}")]
    Signal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Other(String),
}

/// Crate-local result type
pub type Result<T> = std::result::Result<T, TetherError>;

// Convenience implementations
impl From<&str> for TetherError {
    fn from(s: &str) -> Self {
        TetherError::Other(s.to_string())
    }
}

impl From<String> for TetherError {
    fn from(s: String) -> Self {
        TetherError::Other(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = TetherError::InvalidCommand("command string is empty".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid command: command string is empty"
        );

        let error = TetherError::Write("child stdin is closed".to_string());
        assert_eq!(error.to_string(), "Write error: child stdin is closed");
    }

    #[test]
    fn test_from_implementations() {
        let error: TetherError = "test error".into();
        assert_eq!(error.to_string(), "Generic error: test error");

        let error: TetherError = "test error".to_string().into();
        assert_eq!(error.to_string(), "Generic error: test error");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe gone");
        let error: TetherError = io.into();
        assert!(matches!(error, TetherError::Io(_)));
    }
}
