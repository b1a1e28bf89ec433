//! Host platform detection and the executable extension table

use serde::{Deserialize, Serialize};

/// The platform family the formatter is launched on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Native Windows: `.bat` wrappers, `\r\n` line endings
    Windows,
    /// A POSIX compatibility layer on Windows (MSYS2, Cygwin, Git Bash)
    WindowsPosix,
    Unix,
}

impl Platform {
    /// Detect the platform this process runs on
    pub fn current() -> Self {
        if cfg!(windows) {
            if Self::posix_layer_detected(|key| std::env::var(key).ok()) {
                Platform::WindowsPosix
            } else {
                Platform::Windows
            }
        } else {
            Platform::Unix
        }
    }

    fn posix_layer_detected(var: impl Fn(&str) -> Option<String>) -> bool {
        if var("MSYSTEM").is_some_and(|v| !v.is_empty()) {
            return true;
        }
        var("OSTYPE").is_some_and(|v| {
            let v = v.to_lowercase();
            v.contains("cygwin") || v.contains("msys")
        })
    }

    pub fn is_native_windows(self) -> bool {
        self == Platform::Windows
    }

    /// Line ending used when the configured style is `auto`
    pub fn native_newline(self) -> &'static str {
        if self.is_native_windows() {
            "\r\n"
        } else {
            "\n"
        }
    }
}

/// Suffix appended to an executable name, per platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlatformExtensions {
    pub windows: String,
    pub windows_posix: String,
    pub unix: String,
}

impl PlatformExtensions {
    /// `.bat` on native Windows, nothing anywhere else
    pub fn batch_on_windows() -> Self {
        Self {
            windows: ".bat".to_string(),
            windows_posix: String::new(),
            unix: String::new(),
        }
    }

    pub fn for_platform(&self, platform: Platform) -> &str {
        match platform {
            Platform::Windows => &self.windows,
            Platform::WindowsPosix => &self.windows_posix,
            Platform::Unix => &self.unix,
        }
    }
}

impl Default for PlatformExtensions {
    fn default() -> Self {
        Self::batch_on_windows()
    }
}

/// Extensions for the two kinds of executables we may launch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutableExtensions {
    /// Applied to `bundlerPath` when `useBundler` is set
    pub bundler: PlatformExtensions,
    /// Applied to `executePath` otherwise
    pub execute: PlatformExtensions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_newline() {
        assert_eq!(Platform::Windows.native_newline(), "\r\n");
        assert_eq!(Platform::WindowsPosix.native_newline(), "\n");
        assert_eq!(Platform::Unix.native_newline(), "\n");
    }

    #[test]
    fn test_posix_layer_detection() {
        assert!(Platform::posix_layer_detected(|k| {
            (k == "MSYSTEM").then(|| "MINGW64".to_string())
        }));
        assert!(Platform::posix_layer_detected(|k| {
            (k == "OSTYPE").then(|| "cygwin".to_string())
        }));
        assert!(!Platform::posix_layer_detected(|_| None));
        assert!(!Platform::posix_layer_detected(|k| {
            (k == "MSYSTEM").then(String::new)
        }));
    }

    #[test]
    fn test_default_extensions() {
        let ext = ExecutableExtensions::default();
        assert_eq!(ext.bundler.for_platform(Platform::Windows), ".bat");
        assert_eq!(ext.bundler.for_platform(Platform::WindowsPosix), "");
        assert_eq!(ext.execute.for_platform(Platform::Windows), ".bat");
        assert_eq!(ext.execute.for_platform(Platform::Unix), "");
    }

    #[test]
    fn test_partial_extension_table() {
        let ext: ExecutableExtensions =
            serde_json::from_str(r#"{"execute": {"windows": ".cmd"}}"#).unwrap();
        assert_eq!(ext.execute.for_platform(Platform::Windows), ".cmd");
        assert_eq!(ext.execute.for_platform(Platform::Unix), "");
        assert_eq!(ext.bundler.for_platform(Platform::Windows), ".bat");
    }
}
