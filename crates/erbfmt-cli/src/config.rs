//! Configuration file support for erbfmt
//!
//! Loads `.erbfmt.toml` from current directory or parent directories. Keys
//! use the editor setting names, e.g.
//!
//! ```toml
//! useBundler = true
//! indentBy = 4
//! ignoreFormatFilePatterns = ["**/*.text.erb"]
//!
//! [customEnvVar]
//! BUNDLE_GEMFILE = "Gemfile"
//! ```

use anyhow::{Context, Result};
use erbfmt_core::Config;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = ".erbfmt.toml";

/// Load config from `.erbfmt.toml` searching from current directory upward
pub fn load() -> Result<Option<(Config, PathBuf)>> {
    load_from(std::env::current_dir()?)
}

/// Load config searching from the given directory upward
pub fn load_from(start_dir: PathBuf) -> Result<Option<(Config, PathBuf)>> {
    let mut current = Some(start_dir.as_path());

    while let Some(dir) = current {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            let config = load_path(&config_path)?;
            return Ok(Some((config, config_path)));
        }
        current = dir.parent();
    }

    Ok(None)
}

/// Load config from a specific path
///
/// A relative `workingDirectory` is taken relative to the file's directory.
pub fn load_path(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    if let (Some(dir), Some(cwd)) = (path.parent(), config.working_directory.as_ref()) {
        if cwd.is_relative() {
            config.working_directory = Some(dir.join(cwd));
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_config(dir: &Path, content: &str) {
        fs::write(dir.join(CONFIG_FILE), content).unwrap();
    }

    #[test]
    fn test_load_basic_config() {
        let temp = TempDir::new().unwrap();
        create_config(
            temp.path(),
            r#"
useBundler = true
bundlerPath = "/usr/local/bin/bundle"
indentBy = 4
stopOnErrors = true
ignoreFormatFilePatterns = ["**/*.text.erb"]

[customEnvVar]
RUBYOPT = "-W0"
"#,
        );

        let (config, path) = load_from(temp.path().to_path_buf()).unwrap().unwrap();

        assert_eq!(path, temp.path().join(CONFIG_FILE));
        assert!(config.use_bundler);
        assert_eq!(config.bundler_path, "/usr/local/bin/bundle");
        assert_eq!(config.indent_by, 4);
        assert!(config.stop_on_errors);
        assert_eq!(config.ignore_format_file_patterns, vec!["**/*.text.erb"]);
        assert_eq!(config.custom_env_var["RUBYOPT"], "-W0");
    }

    #[test]
    fn test_load_from_parent_directory() {
        let temp = TempDir::new().unwrap();
        create_config(temp.path(), "tab = true\n");
        let nested = temp.path().join("app").join("views");
        fs::create_dir_all(&nested).unwrap();

        let (config, path) = load_from(nested).unwrap().unwrap();
        assert!(config.tab);
        assert_eq!(path, temp.path().join(CONFIG_FILE));
    }

    #[test]
    fn test_load_empty_config() {
        let temp = TempDir::new().unwrap();
        create_config(temp.path(), "");

        let (config, _) = load_from(temp.path().to_path_buf()).unwrap().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_no_config_found() {
        let temp = TempDir::new().unwrap();
        let result = load_from(temp.path().to_path_buf()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_relative_working_directory() {
        let temp = TempDir::new().unwrap();
        create_config(temp.path(), "workingDirectory = \"rails\"\n");

        let config = load_path(&temp.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.working_directory, Some(temp.path().join("rails")));
    }

    #[test]
    fn test_invalid_config_has_context() {
        let temp = TempDir::new().unwrap();
        create_config(temp.path(), "indentBy = \"four\"\n");

        let err = load_path(&temp.path().join(CONFIG_FILE)).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse"));
    }
}
