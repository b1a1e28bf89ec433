//! Skipping files by glob pattern (`ignoreFormatFilePatterns`)

use std::path::Path;

use glob::{MatchOptions, Pattern};

/// Compiled set of ignore patterns
#[derive(Debug, Default)]
pub struct IgnoreMatcher {
    patterns: Vec<Pattern>,
}

impl IgnoreMatcher {
    /// Compile `patterns`. Invalid patterns are skipped with a warning.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|raw| {
                let raw: &str = raw.as_ref();
                match Pattern::new(raw) {
                    Ok(pattern) => Some(pattern),
                    Err(err) => {
                        tracing::warn!(pattern = raw, %err, "ignoring invalid glob pattern");
                        None
                    }
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Check whether `path` matches any pattern
    ///
    /// The full path is tried first, then just the file name, so `*.text.erb`
    /// works without a leading `**/`.
    pub fn is_ignored(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        let path_str = normalize_separators(&path.to_string_lossy());
        let file_name = path.file_name().map(|name| name.to_string_lossy());

        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };

        self.patterns.iter().any(|pattern| {
            if pattern.matches_with(&path_str, options) {
                return true;
            }
            // `**/x` also has to match a path that starts at the root
            if let Some(relative) = path_str.strip_prefix('/') {
                if pattern.matches_with(relative, options) {
                    return true;
                }
            }
            file_name
                .as_deref()
                .is_some_and(|name| pattern.matches_with(name, options))
        })
    }
}

/// One-shot form of [`IgnoreMatcher::is_ignored`]
pub fn should_ignore<S: AsRef<str>>(path: &Path, patterns: &[S]) -> bool {
    IgnoreMatcher::new(patterns).is_ignored(path)
}

fn normalize_separators(path: &str) -> String {
    if cfg!(windows) {
        path.replace('\\', "/")
    } else {
        path.to_string()
    }
}
