//! Command-line representation for shell invocation
//!
//! A command is either a complete shell string or an ordered list of tokens
//! that is joined with single spaces into one. Either form runs through the
//! shell, so shell metacharacters (globs, pipes, redirects) keep their
//! meaning; nothing here escapes or quotes. The join step is isolated in
//! [`CommandLine::shell_string`] so a non-shell invocation mode could be
//! added later without touching callers.

use crate::error::{Result, TetherError};

/// A caller-supplied command, in string or token-list form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// A complete shell command string, e.g. `"ls -la | wc -l"`
    Line(String),
    /// Program name plus arguments, joined with single spaces before execution
    Argv(Vec<String>),
}

impl CommandLine {
    /// Render the command as the single string handed to the shell
    pub fn shell_string(&self) -> String {
        match self {
            CommandLine::Line(line) => line.clone(),
            CommandLine::Argv(tokens) => tokens.join(" "),
        }
    }

    /// Reject degenerate input before any process is created
    pub fn validate(&self) -> Result<()> {
        match self {
            CommandLine::Line(line) => {
                if line.trim().is_empty() {
                    return Err(TetherError::InvalidCommand(
                        "command string is empty".to_string(),
                    ));
                }
            }
            CommandLine::Argv(tokens) => {
                if tokens.is_empty() {
                    return Err(TetherError::InvalidCommand(
                        "argument list is empty".to_string(),
                    ));
                }
                if tokens[0].trim().is_empty() {
                    return Err(TetherError::InvalidCommand(
                        "program name is empty".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl From<&str> for CommandLine {
    fn from(line: &str) -> Self {
        CommandLine::Line(line.to_string())
    }
}

impl From<String> for CommandLine {
    fn from(line: String) -> Self {
        CommandLine::Line(line)
    }
}

impl From<Vec<String>> for CommandLine {
    fn from(tokens: Vec<String>) -> Self {
        CommandLine::Argv(tokens)
    }
}

impl From<Vec<&str>> for CommandLine {
    fn from(tokens: Vec<&str>) -> Self {
        CommandLine::Argv(tokens.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for CommandLine {
    fn from(tokens: &[&str]) -> Self {
        CommandLine::Argv(tokens.iter().map(|s| s.to_string()).collect())
    }
}
