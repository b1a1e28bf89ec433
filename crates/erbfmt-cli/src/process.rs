//! File processing logic for erbfmt

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use erbfmt_core::{ConfigSource, FormatOutcome, FormatService};

/// Result of formatting a single file
#[derive(Debug)]
pub enum FileOutcome {
    Unchanged,
    Ignored,
    Changed { old_source: String, new_source: String },
}

/// Files named on the command line, with directories expanded to their `.erb` files
pub struct CollectedPaths {
    pub files: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
}

pub fn collect_files(paths: &[PathBuf]) -> CollectedPaths {
    let mut files = Vec::new();
    let mut missing = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            for entry in walkdir::WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "erb"))
            {
                files.push(entry.path().to_path_buf());
            }
        } else {
            missing.push(path.clone());
        }
    }

    files.sort();
    files.dedup();

    CollectedPaths { files, missing }
}

/// Format one file without touching it on disk
pub async fn format_file<S: ConfigSource>(
    service: &FormatService<S>,
    path: &Path,
) -> Result<FileOutcome> {
    let source = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let outcome = service.format(&source, path).await?;

    Ok(match outcome {
        FormatOutcome::Ignored(_) => FileOutcome::Ignored,
        FormatOutcome::Formatted(new_source) if new_source == source => FileOutcome::Unchanged,
        FormatOutcome::Formatted(new_source) => FileOutcome::Changed {
            old_source: source,
            new_source,
        },
    })
}

/// Write the formatted result to the file
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_files() {
        let temp = TempDir::new().unwrap();
        let views = temp.path().join("app").join("views");
        fs::create_dir_all(&views).unwrap();
        fs::write(views.join("index.html.erb"), "<p>x</p>").unwrap();
        fs::write(views.join("show.text.erb"), "x").unwrap();
        fs::write(views.join("helper.rb"), "x").unwrap();
        let single = temp.path().join("layout.html.erb");
        fs::write(&single, "<html>").unwrap();
        let missing = temp.path().join("nope.html.erb");

        let collected = collect_files(&[
            temp.path().join("app"),
            single.clone(),
            single.clone(),
            missing.clone(),
        ]);

        assert_eq!(
            collected.files,
            vec![
                views.join("index.html.erb"),
                views.join("show.text.erb"),
                single,
            ]
        );
        assert_eq!(collected.missing, vec![missing]);
    }

    #[test]
    fn test_write_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.html.erb");
        write_file(&path, "<div>\n</div>\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "<div>\n</div>\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_format_file_outcomes() {
        use erbfmt_core::{Config, Platform};

        let temp = TempDir::new().unwrap();
        let empty = temp.path().join("empty.html.erb");
        fs::write(&empty, "").unwrap();
        let page = temp.path().join("page.html.erb");
        fs::write(&page, "<p>x</p>").unwrap();
        let ignored = temp.path().join("mail.text.erb");
        fs::write(&ignored, "x").unwrap();

        // `true` accepts any arguments and prints nothing
        let config = Config {
            execute_path: "true".to_string(),
            ignore_format_file_patterns: vec!["*.text.erb".to_string()],
            ..Default::default()
        };
        let service = FormatService::with_platform(config, Platform::Unix);

        assert!(matches!(
            format_file(&service, &empty).await.unwrap(),
            FileOutcome::Unchanged
        ));
        match format_file(&service, &page).await.unwrap() {
            FileOutcome::Changed {
                old_source,
                new_source,
            } => {
                assert_eq!(old_source, "<p>x</p>");
                assert_eq!(new_source, "");
            }
            _ => panic!("expected a change"),
        }
        assert!(matches!(
            format_file(&service, &ignored).await.unwrap(),
            FileOutcome::Ignored
        ));
        assert!(format_file(&service, &temp.path().join("missing.html.erb"))
            .await
            .is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_format_file_failure_keeps_file() {
        use erbfmt_core::{Config, Platform};

        let temp = TempDir::new().unwrap();
        let page = temp.path().join("page.html.erb");
        fs::write(&page, "<p>x</p>").unwrap();

        let config = Config {
            execute_path: "false".to_string(),
            ..Default::default()
        };
        let service = FormatService::with_platform(config, Platform::Unix);

        let err = format_file(&service, &page).await.unwrap_err();
        assert!(format!("{:#}", err).contains("exit code 1"));
        assert_eq!(fs::read_to_string(&page).unwrap(), "<p>x</p>");
    }
}
