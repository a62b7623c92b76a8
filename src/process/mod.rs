//! Process management utilities for the handle
//!
//! Platform-specific code for spawning shell children in their own process
//! group and tearing down the whole process tree afterwards.
//!
//! ## Platform Support
//!
//! - **Unix**: full support, using `setsid()` process groups for cleanup
//! - **Windows**: out of scope (no Job Object backend)

#[cfg(unix)]
pub mod unix;

#[cfg(unix)]
pub use unix::*;
