// Platform strategy for the daemon build
//
// Executable name, download artifact and PATH mechanism all depend on the OS.
// They are resolved once through `Platform` instead of being re-checked per call.

use std::path::Path;

use super::path_env::{PathRegistrar, ShellProfile, UserRegistry};
use crate::errors::{ErrorKind, OadinError, Result};

const WINDOWS_DOWNLOAD_URL: &str = "http://120.232.136.73:31619/byzedev/oadin.exe";
const MACOS_DOWNLOAD_URL: &str = "http://120.232.136.73:31619/byzedev/oadin.zip";

/// Operating systems the daemon ships for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
}

impl Platform {
    /// Platform of the running process
    pub fn current() -> Result<Self> {
        if cfg!(target_os = "windows") {
            Ok(Platform::Windows)
        } else if cfg!(target_os = "macos") {
            Ok(Platform::MacOs)
        } else {
            Err(OadinError::new(
                ErrorKind::UnsupportedPlatform,
                format!(
                    "Oadin is not available for this operating system ({})",
                    std::env::consts::OS
                ),
            ))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::MacOs => "macOS",
        }
    }

    /// File name of the daemon executable inside the product directory
    pub fn executable_name(&self) -> &'static str {
        match self {
            Platform::Windows => "oadin.exe",
            Platform::MacOs => "oadin",
        }
    }

    pub fn download_url(&self) -> &'static str {
        match self {
            Platform::Windows => WINDOWS_DOWNLOAD_URL,
            Platform::MacOs => MACOS_DOWNLOAD_URL,
        }
    }

    /// File name the download is saved under
    pub fn download_file_name(&self) -> &'static str {
        match self {
            Platform::Windows => "oadin.exe",
            Platform::MacOs => "oadin.zip",
        }
    }

    /// Whether the download is a zip that must be extracted
    pub fn ships_archive(&self) -> bool {
        matches!(self, Platform::MacOs)
    }

    /// PATH mechanism: registry on Windows, shell init file elsewhere
    pub fn path_registrar(&self, home: &Path) -> Box<dyn PathRegistrar> {
        match self {
            Platform::Windows => Box::new(UserRegistry),
            Platform::MacOs => Box::new(ShellProfile::for_home(home)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executable_names() {
        assert_eq!(Platform::Windows.executable_name(), "oadin.exe");
        assert_eq!(Platform::MacOs.executable_name(), "oadin");
    }

    #[test]
    fn test_only_macos_ships_archive() {
        assert!(Platform::MacOs.ships_archive());
        assert!(Platform::MacOs.download_url().ends_with(".zip"));
        assert!(!Platform::Windows.ships_archive());
        assert!(Platform::Windows.download_url().ends_with(".exe"));
    }

    #[test]
    fn test_current_platform() {
        let current = Platform::current();
        if cfg!(any(target_os = "windows", target_os = "macos")) {
            assert!(current.is_ok());
        } else {
            assert_eq!(current.unwrap_err().kind(), ErrorKind::UnsupportedPlatform);
        }
    }
}
