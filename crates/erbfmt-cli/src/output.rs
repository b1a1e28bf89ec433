//! Output formatting for erbfmt
//!
//! Supports text (colored terminal), JSON and unified diff output.

use colored::*;
use serde::Serialize;
use std::path::Path;

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Diff,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<OutputFormat> {
        match s.to_lowercase().as_str() {
            "text" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            "diff" => Some(OutputFormat::Diff),
            _ => None,
        }
    }
}

/// What happened to a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Unchanged,
    /// Would change (check mode)
    Changed,
    /// Rewritten on disk (write mode)
    Written,
    Ignored,
    Error,
}

/// Result of processing a single file
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub path: String,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileResult {
    fn new(path: &Path, status: FileStatus) -> Self {
        Self {
            path: path.display().to_string(),
            status,
            error: None,
        }
    }

    fn error(path: &Path, error: String) -> Self {
        Self {
            path: path.display().to_string(),
            status: FileStatus::Error,
            error: Some(error),
        }
    }
}

/// Summary statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub files_processed: usize,
    pub files_changed: usize,
    pub files_ignored: usize,
    pub errors: usize,
}

/// Full JSON output structure
#[derive(Debug, Serialize)]
pub struct JsonOutput {
    pub version: String,
    pub summary: Summary,
    pub files: Vec<FileResult>,
}

/// Reporter for accumulating and outputting results
pub struct Reporter {
    format: OutputFormat,
    verbose: bool,
    results: Vec<FileResult>,
    summary: Summary,
}

impl Reporter {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self {
            format,
            verbose,
            results: Vec::new(),
            summary: Summary::default(),
        }
    }

    /// Report a file whose formatting already matches
    pub fn report_unchanged(&mut self, path: &Path) {
        self.summary.files_processed += 1;
        if self.verbose && self.format == OutputFormat::Text {
            println!("{}: Already formatted", path.display());
        }
        self.results.push(FileResult::new(path, FileStatus::Unchanged));
    }

    /// Report a file skipped by `ignoreFormatFilePatterns`
    pub fn report_ignored(&mut self, path: &Path) {
        self.summary.files_processed += 1;
        self.summary.files_ignored += 1;
        if self.verbose && self.format == OutputFormat::Text {
            println!("{}: {}", path.display(), "Ignored".dimmed());
        }
        self.results.push(FileResult::new(path, FileStatus::Ignored));
    }

    /// Report a file that would change (check mode)
    pub fn report_check(&mut self, path: &Path, old_source: &str, new_source: &str) {
        self.summary.files_processed += 1;
        self.summary.files_changed += 1;

        match self.format {
            OutputFormat::Text => {
                println!("{} {}", "Would reformat:".yellow(), path.display().to_string().bold());
                if self.verbose {
                    print_diff(old_source, new_source);
                    println!();
                }
            }
            OutputFormat::Diff => {
                print_unified_diff(path, old_source, new_source);
            }
            OutputFormat::Json => {
                // JSON output is handled in finish()
            }
        }

        self.results.push(FileResult::new(path, FileStatus::Changed));
    }

    /// Report a file after rewriting it
    pub fn report_write(&mut self, path: &Path) {
        self.summary.files_processed += 1;
        self.summary.files_changed += 1;

        if self.format == OutputFormat::Text {
            println!("{} {}", "Formatted:".green(), path.display().to_string().bold());
        }

        self.results.push(FileResult::new(path, FileStatus::Written));
    }

    /// Report an error processing a file
    pub fn report_error(&mut self, path: &Path, error: &str) {
        self.summary.files_processed += 1;
        self.summary.errors += 1;

        if self.format != OutputFormat::Json {
            eprintln!("{}: {} - {}", "Warning".yellow(), path.display(), error);
        }

        self.results.push(FileResult::error(path, error.to_string()));
    }

    /// Print final summary/output
    pub fn finish(self, check_mode: bool) -> serde_json::Result<()> {
        match self.format {
            OutputFormat::Text => {
                println!();
                println!("{}", "Summary".bold().underline());
                println!("  Files processed: {}", self.summary.files_processed);
                println!("  Files changed: {}", self.summary.files_changed);
                if self.summary.files_ignored > 0 {
                    println!("  Files ignored: {}", self.summary.files_ignored);
                }
                if self.summary.errors > 0 {
                    println!("  Errors: {}", self.summary.errors);
                }

                if check_mode && self.summary.files_changed > 0 {
                    println!();
                    println!("{}", "Run with --write to apply changes".yellow());
                }
            }
            OutputFormat::Json => {
                let output = JsonOutput {
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    summary: self.summary,
                    files: self.results,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Diff => {
                // Diff output is printed per file; no summary so it stays patch-compatible
            }
        }
        Ok(())
    }

    /// Get summary for exit code determination
    pub fn summary(&self) -> &Summary {
        &self.summary
    }
}

/// Print changed lines only, colored
fn print_diff(old: &str, new: &str) {
    use similar::{ChangeTag, TextDiff};

    for change in TextDiff::from_lines(old, new).iter_all_changes() {
        let line = change.to_string_lossy();
        let line = line.trim_end_matches(['\r', '\n']);
        match change.tag() {
            ChangeTag::Delete => println!("  {}", format!("- {}", line).red()),
            ChangeTag::Insert => println!("  {}", format!("+ {}", line).green()),
            ChangeTag::Equal => {}
        }
    }
}

/// Print unified diff format (standard diff -u compatible)
fn print_unified_diff(path: &Path, old: &str, new: &str) {
    use similar::{ChangeTag, TextDiff};

    let diff = TextDiff::from_lines(old, new);
    let path_str = path.display().to_string();

    println!("--- a/{}", path_str);
    println!("+++ b/{}", path_str);

    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        println!("{}", hunk.header());
        for change in hunk.iter_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            print!("{}{}", sign, change);
            if change.missing_newline() {
                println!();
            }
        }
    }
}
