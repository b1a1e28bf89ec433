//! The format entry point used by editor integrations

use std::future::Future;
use std::path::Path;
use std::sync::RwLock;
use std::time::Instant;

use crate::config::Config;
use crate::error::FormatError;
use crate::ignore::IgnoreMatcher;
use crate::invocation::{self, Invocation};
use crate::newline;
use crate::platform::Platform;
use crate::runner;

/// Where the per-call settings snapshot comes from
///
/// Settings may change between calls; a call only ever sees the snapshot
/// taken when it started.
pub trait ConfigSource: Send + Sync {
    fn snapshot(&self) -> Config;
}

impl ConfigSource for Config {
    fn snapshot(&self) -> Config {
        self.clone()
    }
}

impl ConfigSource for RwLock<Config> {
    fn snapshot(&self) -> Config {
        match self.read() {
            Ok(config) => config.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl<S: ConfigSource + ?Sized> ConfigSource for std::sync::Arc<S> {
    fn snapshot(&self) -> Config {
        (**self).snapshot()
    }
}

/// Successful result of [`FormatService::format`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOutcome {
    Formatted(String),
    /// The path matched `ignoreFormatFilePatterns`; text returned as given
    Ignored(String),
}

impl FormatOutcome {
    pub fn text(&self) -> &str {
        match self {
            FormatOutcome::Formatted(text) | FormatOutcome::Ignored(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            FormatOutcome::Formatted(text) | FormatOutcome::Ignored(text) => text,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, FormatOutcome::Ignored(_))
    }
}

/// Formats text by running the external beautifier once per call
///
/// Holds no process handle and no buffers between calls, so concurrent
/// calls on one service are independent.
pub struct FormatService<S = Config> {
    source: S,
    platform: Platform,
}

impl<S: ConfigSource> FormatService<S> {
    pub fn new(source: S) -> Self {
        Self::with_platform(source, Platform::current())
    }

    pub fn with_platform(source: S, platform: Platform) -> Self {
        Self { source, platform }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Format `text`, which belongs to the file at `path`
    ///
    /// For range formatting pass only the selected text. On error the
    /// caller keeps its original text; no partial output is ever returned.
    pub async fn format(&self, text: &str, path: &Path) -> Result<FormatOutcome, FormatError> {
        let config = self.source.snapshot();
        self.format_with_config(&config, text, path).await
    }

    /// Like [`format`](Self::format), but gives up when `cancel` resolves
    ///
    /// The running formatter process is killed and its output discarded.
    pub async fn format_with_cancel<F>(
        &self,
        text: &str,
        path: &Path,
        cancel: F,
    ) -> Result<FormatOutcome, FormatError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            outcome = self.format(text, path) => outcome,
            () = cancel => {
                tracing::info!(path = %path.display(), "formatting cancelled");
                Err(FormatError::Cancelled)
            }
        }
    }

    /// Format with an explicit snapshot instead of asking the source
    ///
    /// For callers that adjust the snapshot per request, e.g. with editor
    /// formatting options.
    pub async fn format_with_config(
        &self,
        config: &Config,
        text: &str,
        path: &Path,
    ) -> Result<FormatOutcome, FormatError> {
        let ignore = IgnoreMatcher::new(&config.ignore_format_file_patterns);
        if ignore.is_ignored(path) {
            tracing::debug!(path = %path.display(), "file matches ignoreFormatFilePatterns, skipping");
            return Ok(FormatOutcome::Ignored(text.to_string()));
        }

        let invocation = invocation::resolve(config, self.platform);
        log_invocation(&invocation);

        let started = Instant::now();
        let result = self.run(config, &invocation, text).await;
        let output = result.and_then(|result| {
            tracing::debug!(
                exit_code = ?result.exit_code,
                elapsed = ?started.elapsed(),
                "formatter finished"
            );
            result.into_stdout()
        });

        match output {
            Ok(output) => {
                let policy = config.newline_policy();
                Ok(FormatOutcome::Formatted(newline::apply(
                    text,
                    output,
                    policy,
                    self.platform,
                )))
            }
            Err(err) => {
                tracing::warn!(command = %invocation, error = %err, "formatting failed");
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        config: &Config,
        invocation: &Invocation,
        text: &str,
    ) -> Result<runner::RunResult, FormatError> {
        let run = runner::run(invocation, text.as_bytes(), self.platform);
        match config.timeout() {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| FormatError::Timeout(limit))?,
            None => run.await,
        }
    }
}

fn log_invocation(invocation: &Invocation) {
    tracing::info!(
        command = %invocation,
        cwd = ?invocation.cwd,
        env = ?invocation.env,
        "formatting ERB"
    );
}
