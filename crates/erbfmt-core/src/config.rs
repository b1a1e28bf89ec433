//! Formatter settings
//!
//! A [`Config`] is the snapshot taken at the start of one format call. Key
//! names match the editor settings (`executePath`, `indentBy`, ...) so the
//! same struct deserializes from a TOML file or from LSP JSON settings.
//! Unknown keys are ignored.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::newline::{EndOfLine, NewlinePolicy};
use crate::platform::ExecutableExtensions;

/// Name of the formatter program, also used after `bundle exec`
pub const FORMATTER_NAME: &str = "htmlbeautifier";

/// Settings for one format request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Formatter executable when not going through the bundler
    pub execute_path: String,
    /// Run the formatter as `<bundler> exec htmlbeautifier`
    pub use_bundler: bool,
    pub bundler_path: String,
    pub indent_by: u32,
    pub keep_blank_lines: u32,
    pub stop_on_errors: bool,
    pub tab: bool,
    pub tab_stops: u32,
    /// Merged over the inherited environment of the child process
    pub custom_env_var: BTreeMap<String, String>,
    /// Glob patterns of files that are never formatted
    pub ignore_format_file_patterns: Vec<String>,

    pub insert_final_newline: bool,
    pub eol: EndOfLine,
    /// Kill the formatter if it runs longer than this
    pub timeout_ms: Option<u64>,
    pub working_directory: Option<PathBuf>,
    pub executable_extensions: ExecutableExtensions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            execute_path: FORMATTER_NAME.to_string(),
            use_bundler: false,
            bundler_path: "bundle".to_string(),
            indent_by: 2,
            keep_blank_lines: 0,
            stop_on_errors: false,
            tab: false,
            tab_stops: 2,
            custom_env_var: BTreeMap::new(),
            ignore_format_file_patterns: Vec::new(),
            insert_final_newline: false,
            eol: EndOfLine::Auto,
            timeout_ms: None,
            working_directory: None,
            executable_extensions: ExecutableExtensions::default(),
        }
    }
}

impl Config {
    pub fn newline_policy(&self) -> NewlinePolicy {
        NewlinePolicy {
            insert_final_newline: self.insert_final_newline,
            eol: self.eol,
        }
    }

    pub fn timeout(&self) -> Option<std::time::Duration> {
        self.timeout_ms.map(std::time::Duration::from_millis)
    }
}
