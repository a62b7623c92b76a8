//! Supervise a long-running child process as a continuously-interacting
//! component: feed its stdin whenever you like and drain its output whenever
//! convenient, without ever blocking on process I/O.
//!
//! The entry point is [`spawn`], which runs a command through the shell in
//! its own process group and returns a [`ProcessHandle`]. The handle owns
//! three background workers: one drain task per output stream moving lines
//! into thread-safe queues, and one exit-wait task recording the exit
//! status. Termination kills the child's entire process tree, and a
//! program-exit hook reaps anything the caller forgot to close.
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> tether::Result<()> {
//! let mut repl = tether::spawn("python3 -i")?;
//! repl.write_line("1 + 1").await?;
//! // later, whenever convenient:
//! for line in repl.read_output() {
//!     println!("python said: {}", line);
//! }
//! repl.terminate();
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod command;
pub mod config;
pub mod error;

#[cfg(unix)]
mod cleanup;
#[cfg(unix)]
pub mod handle;
#[cfg(unix)]
pub mod process;

pub use buffer::LineBuffer;
pub use command::CommandLine;
pub use config::{load_jobs_from_toml_path, load_jobs_from_toml_str, JobSpec, JobsFile, SpawnOptions};
pub use error::{Result, TetherError};
#[cfg(unix)]
pub use handle::{spawn, ProcessHandle};

/// Crate utilities and helper functions
pub mod utils {
    use tracing::info;

    /// Initialize tracing for the application
    pub fn init_tracing(level: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| crate::TetherError::Configuration(e.to_string()))?;

        info!("Tracing initialized with level: {}", level);
        Ok(())
    }
}
