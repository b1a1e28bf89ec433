//! Turning a [`Config`] into the command that runs the formatter

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::config::{Config, FORMATTER_NAME};
use crate::platform::Platform;

/// A fully resolved formatter command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub executable: String,
    pub args: Vec<String>,
    /// Overlay for the inherited environment; wins on collision
    pub env: BTreeMap<String, String>,
    /// `None` inherits the working directory of this process
    pub cwd: Option<PathBuf>,
}

/// Formatter options that map to command line flags
///
/// Flags are emitted in the order of [`CliOption::ORDERED`], whatever order
/// the settings source lists its keys in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliOption {
    IndentBy,
    KeepBlankLines,
    StopOnErrors,
    Tab,
    TabStops,
}

impl CliOption {
    pub const ORDERED: [CliOption; 5] = [
        CliOption::IndentBy,
        CliOption::KeepBlankLines,
        CliOption::StopOnErrors,
        CliOption::Tab,
        CliOption::TabStops,
    ];

    /// Settings key this option is read from
    pub fn key(self) -> &'static str {
        match self {
            CliOption::IndentBy => "indentBy",
            CliOption::KeepBlankLines => "keepBlankLines",
            CliOption::StopOnErrors => "stopOnErrors",
            CliOption::Tab => "tab",
            CliOption::TabStops => "tabStops",
        }
    }

    fn push_args(self, config: &Config, args: &mut Vec<String>) {
        match self {
            CliOption::IndentBy => {
                args.push("--indent-by".to_string());
                args.push(config.indent_by.to_string());
            }
            CliOption::KeepBlankLines => {
                args.push("--keep-blank-lines".to_string());
                args.push(config.keep_blank_lines.to_string());
            }
            CliOption::StopOnErrors => {
                if config.stop_on_errors {
                    args.push("--stop-on-errors".to_string());
                }
            }
            CliOption::Tab => {
                if config.tab {
                    args.push("--tab".to_string());
                }
            }
            CliOption::TabStops => {
                args.push("--tab-stops".to_string());
                args.push(config.tab_stops.to_string());
            }
        }
    }
}

/// Build the formatter command for `config` on `platform`
pub fn resolve(config: &Config, platform: Platform) -> Invocation {
    let extensions = &config.executable_extensions;
    let mut args = Vec::new();

    let executable = if config.use_bundler {
        args.push("exec".to_string());
        args.push(FORMATTER_NAME.to_string());
        format!(
            "{}{}",
            config.bundler_path,
            extensions.bundler.for_platform(platform)
        )
    } else {
        format!(
            "{}{}",
            config.execute_path,
            extensions.execute.for_platform(platform)
        )
    };

    for option in CliOption::ORDERED {
        option.push_args(config, &mut args);
    }

    Invocation {
        executable,
        args,
        env: config.custom_env_var.clone(),
        cwd: config.working_directory.clone(),
    }
}

impl fmt::Display for Invocation {
    /// Shell-like rendering for log lines
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.executable))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(word: &str) -> String {
    if !word.is_empty() && !word.contains(|c: char| c.is_whitespace() || c == '"' || c == '\'') {
        word.to_string()
    } else {
        format!("{:?}", word)
    }
}
