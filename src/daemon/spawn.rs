// Daemon launch
//
// Runs `<oadin> server start -d` from the product directory. The daemon forks
// itself into the background, so the launcher blocks only until that command exits.

use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tracing::{debug, info, warn};

use super::lifecycle::DaemonInstaller;
use crate::errors::{daemon_not_installed_error, ErrorKind, OadinError, Result};

/// Arguments passed to the daemon executable
pub const START_ARGS: [&str; 3] = ["server", "start", "-d"];

impl DaemonInstaller {
    /// Start the daemon service; succeeds only when the start command exits with 0
    pub fn launch(&self) -> Result<()> {
        let result = self.launch_with_path(ensure_process_path);
        match &result {
            Ok(()) => info!("Oadin service started"),
            Err(e) => warn!("Failed to start Oadin service: {}", e),
        }
        result
    }

    /// `update_path` receives the product directory before the command runs
    fn launch_with_path<U>(&self, update_path: U) -> Result<()>
    where
        U: FnOnce(&Path) -> Result<()>,
    {
        let executable = self.executable_path();
        if !executable.is_file() {
            return Err(OadinError::new(
                ErrorKind::NotInstalled,
                daemon_not_installed_error(&executable.display().to_string()),
            ));
        }

        update_path(self.product_dir())?;

        info!(exe = %executable.display(), "Starting Oadin service");
        let output = start_command(&executable).output().map_err(|e| {
            OadinError::new(
                ErrorKind::Process(None),
                format!("Failed to run {}: {}", executable.display(), e),
            )
        })?;

        check_exit(&output)
    }
}

fn start_command(executable: &Path) -> Command {
    let mut command = Command::new(executable);
    command
        .args(START_ARGS)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(target_family = "windows")]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    command
}

fn check_exit(output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(OadinError::new(
        ErrorKind::Process(output.status.code()),
        format!(
            "Oadin service failed to start, exit status: {}{}",
            output.status,
            if stderr.trim().is_empty() {
                String::new()
            } else {
                format!("\n{}", stderr.trim())
            }
        ),
    ))
}

/// Make sure this process's PATH contains `dir`
pub fn ensure_process_path(dir: &Path) -> Result<()> {
    let current = std::env::var_os("PATH").unwrap_or_default();
    let updated = path_with_entry(&current, dir)?;
    if let Some(updated) = updated {
        debug!(dir = %dir.display(), "Adding Oadin directory to process PATH");
        std::env::set_var("PATH", updated);
    }
    Ok(())
}

fn path_with_entry(current: &OsString, dir: &Path) -> Result<Option<OsString>> {
    if std::env::split_paths(current).any(|entry| entry == dir) {
        return Ok(None);
    }

    let mut entries: Vec<_> = std::env::split_paths(current).collect();
    entries.push(dir.to_path_buf());
    std::env::join_paths(entries)
        .map(Some)
        .map_err(|e| OadinError::new(ErrorKind::Config, format!("Invalid PATH entry: {}", e)))
}
