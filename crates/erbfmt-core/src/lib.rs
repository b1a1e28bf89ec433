//! erbfmt-core: ERB formatting through an external beautifier
//!
//! This crate does not format anything itself. It provides:
//! - `Config`: the formatter settings snapshot for one call
//! - `resolve()`: settings to executable, arguments, environment and cwd
//! - `IgnoreMatcher`: glob patterns for files that are never formatted
//! - `run()`: one subprocess per call with concurrent pipe handling
//! - `newline::apply()`: final-newline normalization of the output
//! - `FormatService`: the single entry point composing all of the above

pub mod config;
mod error;
pub mod ignore;
pub mod invocation;
pub mod newline;
pub mod platform;
pub mod runner;
mod service;

pub use config::{Config, FORMATTER_NAME};
pub use error::FormatError;
pub use ignore::{should_ignore, IgnoreMatcher};
pub use invocation::{resolve, CliOption, Invocation};
pub use newline::{EndOfLine, NewlinePolicy};
pub use platform::{ExecutableExtensions, Platform, PlatformExtensions};
pub use runner::{run, RunResult};
pub use service::{ConfigSource, FormatOutcome, FormatService};
