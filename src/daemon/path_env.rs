// PATH registration for the product directory
//
// Windows keeps the user PATH in the registry; macOS gets an export line in
// the user's shell init file. Both are idempotent.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::{OadinError, Result};

/// Outcome of a registration attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathUpdate {
    /// The directory was added; `target` names the file or registry value touched
    Added { target: String },
    /// The directory was already registered
    AlreadyPresent { target: String },
}

/// Persists a directory on the user's executable search path
pub trait PathRegistrar {
    fn register(&self, directory: &Path) -> Result<PathUpdate>;
}

/// Append `directory` to a separator-joined PATH value unless already an entry
///
/// Returns `None` when nothing needs to change.
pub fn append_path_entry(current: &str, directory: &str, separator: char) -> Option<String> {
    let present = current
        .split(separator)
        .any(|entry| entry.trim_end_matches(['/', '\\']) == directory.trim_end_matches(['/', '\\']));
    if present {
        return None;
    }

    if current.is_empty() {
        Some(directory.to_string())
    } else {
        Some(format!("{}{}{}", current, separator, directory))
    }
}

/// Shell init file used on macOS
#[derive(Debug, Clone)]
pub struct ShellProfile {
    path: PathBuf,
}

impl ShellProfile {
    /// `~/.zshrc` when it exists, otherwise `~/.bashrc`
    pub fn for_home(home: &Path) -> Self {
        let zshrc = home.join(".zshrc");
        let path = if zshrc.exists() {
            zshrc
        } else {
            home.join(".bashrc")
        };
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn export_line(directory: &Path) -> String {
        format!("export PATH=\"$PATH:{}\"", directory.display())
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

impl PathRegistrar for ShellProfile {
    fn register(&self, directory: &Path) -> Result<PathUpdate> {
        let export_line = Self::export_line(directory);
        let target = self.file_name();

        if self.path.exists() {
            let content = fs::read_to_string(&self.path).map_err(|e| {
                OadinError::io(format!("Failed to read {}", self.path.display()), e)
            })?;
            if content.contains(&export_line) {
                info!("Oadin directory already present in {}", target);
                return Ok(PathUpdate::AlreadyPresent { target });
            }

            let mut file = fs::OpenOptions::new()
                .append(true)
                .open(&self.path)
                .map_err(|e| OadinError::io(format!("Failed to open {}", self.path.display()), e))?;
            write!(file, "\n{}", export_line).map_err(|e| {
                OadinError::io(format!("Failed to write {}", self.path.display()), e)
            })?;
        } else {
            fs::write(&self.path, format!("{}\n", export_line)).map_err(|e| {
                OadinError::io(format!("Failed to create {}", self.path.display()), e)
            })?;
        }

        info!(
            "Added Oadin directory to {}; run `source {}` to apply it",
            target,
            self.path.display()
        );
        Ok(PathUpdate::Added { target })
    }
}

/// `HKEY_CURRENT_USER\Environment\Path` on Windows
#[derive(Debug, Clone, Copy, Default)]
pub struct UserRegistry;

#[cfg(target_family = "windows")]
impl PathRegistrar for UserRegistry {
    fn register(&self, directory: &Path) -> Result<PathUpdate> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;
        use winreg::enums::{RegType, HKEY_CURRENT_USER, KEY_READ, KEY_WRITE};
        use winreg::{RegKey, RegValue};

        const TARGET: &str = "HKCU\\Environment\\Path";

        let key = RegKey::predef(HKEY_CURRENT_USER)
            .open_subkey_with_flags("Environment", KEY_READ | KEY_WRITE)
            .map_err(|e| OadinError::io("Failed to open registry key Environment", e))?;

        // Read without expanding %VARIABLES% so they survive the rewrite
        let current = stored_path_value(key.get_value::<String, _>("Path"))?;
        let directory = directory.display().to_string();

        let Some(new_path) = append_path_entry(&current, &directory, ';') else {
            info!("Oadin directory already present in user PATH");
            return Ok(PathUpdate::AlreadyPresent {
                target: TARGET.to_string(),
            });
        };

        let bytes: Vec<u8> = OsStr::new(&new_path)
            .encode_wide()
            .chain(std::iter::once(0))
            .flat_map(|unit| unit.to_le_bytes())
            .collect();
        key.set_raw_value(
            "Path",
            &RegValue {
                bytes,
                vtype: RegType::REG_EXPAND_SZ,
            },
        )
        .map_err(|e| OadinError::io("Failed to write user PATH", e))?;

        info!("Added Oadin directory to user PATH");
        Ok(PathUpdate::Added {
            target: TARGET.to_string(),
        })
    }
}

/// A missing PATH value reads as empty; any other read failure is an error
#[cfg_attr(not(target_family = "windows"), allow(dead_code))]
fn stored_path_value(read: std::io::Result<String>) -> Result<String> {
    match read {
        Ok(value) => Ok(value),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(OadinError::io("Failed to read user PATH", e)),
    }
}

#[cfg(not(target_family = "windows"))]
impl PathRegistrar for UserRegistry {
    fn register(&self, _directory: &Path) -> Result<PathUpdate> {
        Err(OadinError::new(
            crate::errors::ErrorKind::UnsupportedPlatform,
            "The Windows registry is not available on this operating system",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_path_entry() {
        assert_eq!(
            append_path_entry("C:\\Windows", "C:\\Users\\u\\Oadin", ';').as_deref(),
            Some("C:\\Windows;C:\\Users\\u\\Oadin")
        );
        assert_eq!(
            append_path_entry("", "C:\\Users\\u\\Oadin", ';').as_deref(),
            Some("C:\\Users\\u\\Oadin")
        );
        assert_eq!(
            append_path_entry("C:\\Windows;C:\\Users\\u\\Oadin\\", "C:\\Users\\u\\Oadin", ';'),
            None
        );
    }

    #[test]
    fn test_append_path_entry_idempotent() {
        let once = append_path_entry("/usr/bin", "/home/u/Oadin", ':').unwrap();
        assert_eq!(append_path_entry(&once, "/home/u/Oadin", ':'), None);
    }

    #[test]
    fn test_append_path_entry_not_fooled_by_prefix() {
        assert_eq!(
            append_path_entry("/home/u/Oadin2", "/home/u/Oadin", ':').as_deref(),
            Some("/home/u/Oadin2:/home/u/Oadin")
        );
    }

    #[test]
    fn test_profile_prefers_zshrc() {
        let home = TempDir::new().unwrap();
        assert_eq!(
            ShellProfile::for_home(home.path()).path(),
            home.path().join(".bashrc")
        );

        fs::write(home.path().join(".zshrc"), "").unwrap();
        assert_eq!(
            ShellProfile::for_home(home.path()).path(),
            home.path().join(".zshrc")
        );
    }

    #[test]
    fn test_profile_created_when_missing() {
        let home = TempDir::new().unwrap();
        let dir = home.path().join("Oadin");
        let profile = ShellProfile::for_home(home.path());

        let update = profile.register(&dir).unwrap();
        assert_eq!(
            update,
            PathUpdate::Added {
                target: ".bashrc".to_string()
            }
        );

        let content = fs::read_to_string(home.path().join(".bashrc")).unwrap();
        assert_eq!(content, format!("{}\n", ShellProfile::export_line(&dir)));
    }

    #[test]
    fn test_profile_registration_idempotent() {
        let home = TempDir::new().unwrap();
        fs::write(home.path().join(".zshrc"), "alias ll='ls -l'").unwrap();
        let dir = home.path().join("Oadin");
        let profile = ShellProfile::for_home(home.path());

        profile.register(&dir).unwrap();
        let second = profile.register(&dir).unwrap();
        assert!(matches!(second, PathUpdate::AlreadyPresent { .. }));

        let content = fs::read_to_string(home.path().join(".zshrc")).unwrap();
        let line = ShellProfile::export_line(&dir);
        assert_eq!(content.matches(&line).count(), 1);
        assert!(content.starts_with("alias ll='ls -l'\nexport PATH="));
    }

    #[test]
    fn test_stored_path_value_only_tolerates_missing() {
        use std::io;

        assert_eq!(
            stored_path_value(Ok("C:\\Windows".to_string())).unwrap(),
            "C:\\Windows"
        );
        assert_eq!(
            stored_path_value(Err(io::Error::from(io::ErrorKind::NotFound))).unwrap(),
            ""
        );

        let err = stored_path_value(Err(io::Error::from(io::ErrorKind::PermissionDenied)))
            .unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Io);
        let bad_type = io::Error::new(io::ErrorKind::Other, "bad value type");
        let err = stored_path_value(Err(bad_type)).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Io);
    }

    #[cfg(not(target_family = "windows"))]
    #[test]
    fn test_registry_unsupported_off_windows() {
        let err = UserRegistry.register(Path::new("/tmp")).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::UnsupportedPlatform);
    }
}
