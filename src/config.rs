//! Spawn options and TOML job specifications
//!
//! This module parses a TOML configuration into [`JobSpec`] values, applies
//! serde defaults, and performs strict validation with field-path error
//! messages. A jobs file uses top-level tables keyed by job name:
//!
//! ```toml
//! [transcriber]
//! command = "whisper"
//! args = ["--stdin"]
//!
//! [indexer]
//! command = "indexd --watch ."
//! verbose = true
//! ```

use crate::command::CommandLine;
use crate::error::{Result, TetherError};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Options applied when spawning a child process
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    /// Replacement environment for the child. The child inherits the
    /// caller's environment when this is `None`; a supplied map replaces it
    /// entirely rather than merging into it.
    pub environment: Option<HashMap<String, String>>,
    /// Emit spawn/teardown diagnostics at info level instead of debug
    pub verbose: bool,
}

/// One supervised job as declared in a TOML jobs file
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    /// Shell command to execute
    pub command: String,
    /// Extra arguments appended to the command, space-joined
    #[serde(default)]
    pub args: Vec<String>,
    /// Replacement environment for the child process
    #[serde(default)]
    pub environment: Option<HashMap<String, String>>,
    /// Promote spawn diagnostics to info level
    #[serde(default)]
    pub verbose: bool,
}

impl JobSpec {
    /// The command in the form accepted by the spawner
    pub fn command_line(&self) -> CommandLine {
        if self.args.is_empty() {
            CommandLine::Line(self.command.clone())
        } else {
            let mut tokens = Vec::with_capacity(self.args.len() + 1);
            tokens.push(self.command.clone());
            tokens.extend(self.args.iter().cloned());
            CommandLine::Argv(tokens)
        }
    }

    /// The spawn options declared by this job
    pub fn options(&self) -> SpawnOptions {
        SpawnOptions {
            environment: self.environment.clone(),
            verbose: self.verbose,
        }
    }
}

/// Top-level jobs file: a map of job name to [`JobSpec`]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct JobsFile {
    /// Map of job name -> spec
    #[serde(flatten)]
    pub jobs: HashMap<String, JobSpec>,
}

impl JobsFile {
    /// Validate the configuration with field-path error messages
    pub fn validate(&self) -> Result<()> {
        if self.jobs.is_empty() {
            return Err(TetherError::Configuration(
                "config must contain at least one job table".to_string(),
            ));
        }
        for (name, job) in &self.jobs {
            if name.trim().is_empty() {
                return Err(TetherError::Configuration(
                    "job name (table name) cannot be empty".to_string(),
                ));
            }
            if job.command.trim().is_empty() {
                return Err(TetherError::Configuration(format!(
                    "job '{}': command cannot be empty",
                    name
                )));
            }
            if let Some(env) = &job.environment {
                for key in env.keys() {
                    if key.trim().is_empty() {
                        return Err(TetherError::Configuration(format!(
                            "job '{}': environment keys cannot be empty",
                            name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Load a jobs file from a TOML file path
pub fn load_jobs_from_toml_path(path: impl AsRef<Path>) -> Result<JobsFile> {
    let data = fs::read_to_string(&path).map_err(|e| {
        TetherError::Configuration(format!("Failed to read config {:?}: {}", path.as_ref(), e))
    })?;
    load_jobs_from_toml_str(&data)
}

/// Load a jobs file from a TOML string
pub fn load_jobs_from_toml_str(input: &str) -> Result<JobsFile> {
    let cfg: JobsFile = toml::from_str(input)
        .map_err(|e| TetherError::Configuration(format!("TOML parse error: {}", e)))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> String {
        r#"
        [transcriber]
        command = "whisper"
        args = ["--stdin"]
        verbose = true

        [indexer]
        command = "indexd --watch ."

        [indexer.environment]
        INDEX_ROOT = "/srv/data"
        "#
        .to_string()
    }

    #[test]
    fn parses_and_validates_valid_config() {
        let cfg = load_jobs_from_toml_str(&valid_config()).expect("should parse");
        assert_eq!(cfg.jobs.len(), 2);

        let transcriber = &cfg.jobs["transcriber"];
        assert_eq!(
            transcriber.command_line().shell_string(),
            "whisper --stdin"
        );
        assert!(transcriber.options().verbose);

        let indexer = &cfg.jobs["indexer"];
        assert_eq!(indexer.command_line().shell_string(), "indexd --watch .");
        let env = indexer.options().environment.expect("environment set");
        assert_eq!(env["INDEX_ROOT"], "/srv/data");
    }

    #[test]
    fn errors_on_empty_file() {
        let err = load_jobs_from_toml_str("").unwrap_err();
        assert!(format!("{}", err).contains("at least one job"));
    }

    #[test]
    fn errors_on_empty_command() {
        let input = r#"
        [broken]
        command = "  "
        "#;
        let err = load_jobs_from_toml_str(input).unwrap_err();
        assert!(format!("{}", err).contains("job 'broken': command cannot be empty"));
    }

    #[test]
    fn errors_on_empty_environment_key() {
        let input = r#"
        [broken]
        command = "cat"

        [broken.environment]
        "" = "value"
        "#;
        let err = load_jobs_from_toml_str(input).unwrap_err();
        assert!(format!("{}", err).contains("environment keys cannot be empty"));
    }

    #[test]
    fn args_default_to_plain_command_string() {
        let input = r#"
        [plain]
        command = "ls -la | wc -l"
        "#;
        let cfg = load_jobs_from_toml_str(input).expect("should parse");
        let job = &cfg.jobs["plain"];
        assert_eq!(job.command_line(), CommandLine::Line("ls -la | wc -l".to_string()));
        assert!(!job.options().verbose);
        assert!(job.options().environment.is_none());
    }
}
