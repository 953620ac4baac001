//! Tooling & Integration Layer
//!
//! Command-line access to the store through the same controller a UI would use.

pub mod cli;

pub use cli::{Cli, CliContext, Commands, OutputFormat};
