// Daemon installation management
//
// Locates the daemon executable in the product directory, downloads it when
// missing, unpacks the macOS archive and registers the directory on PATH.

use futures::stream::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::path_env::PathUpdate;
use super::platform::Platform;
use crate::config::{ClientConfig, PRODUCT_DIR_NAME};
use crate::errors::{ErrorKind, OadinError, Result};

/// Manages the daemon binary in `<home>/Oadin`
#[derive(Debug, Clone)]
pub struct DaemonInstaller {
    platform: Platform,
    home: PathBuf,
    product_dir: PathBuf,
    download_url: String,
}

impl DaemonInstaller {
    /// Installer for an explicit platform and home directory
    pub fn new(platform: Platform, home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            platform,
            product_dir: home.join(PRODUCT_DIR_NAME),
            download_url: platform.download_url().to_string(),
            home,
        }
    }

    /// Installer for the running OS and the current user's home directory
    pub fn detect() -> Result<Self> {
        let platform = Platform::current()?;
        let home = dirs::home_dir().ok_or_else(|| {
            OadinError::new(ErrorKind::Config, "Could not determine home directory")
        })?;
        Ok(Self::new(platform, home))
    }

    /// Like `detect`, with product directory and download URL taken from config
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut installer = Self::detect()?;
        if let Some(dir) = &config.product_dir {
            installer.product_dir = dir.clone();
        }
        if let Some(url) = &config.download_url {
            installer.download_url = url.clone();
        }
        Ok(installer)
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = url.into();
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn product_dir(&self) -> &Path {
        &self.product_dir
    }

    pub fn executable_path(&self) -> PathBuf {
        self.product_dir.join(self.platform.executable_name())
    }

    /// True when the executable exists, whatever its permissions
    pub fn is_installed(&self) -> bool {
        let path = self.executable_path();
        let installed = path.is_file();
        debug!(path = %path.display(), installed, "Checked for Oadin executable");
        installed
    }

    /// Download the daemon into the product directory and register it on PATH
    ///
    /// Returns the executable path. A PATH registration failure is logged and
    /// does not fail the download.
    pub async fn download(&self) -> Result<PathBuf> {
        let result = self.download_once().await;
        match &result {
            Ok(path) => info!(path = %path.display(), "Oadin download complete"),
            Err(e) => warn!("Failed to download Oadin: {}", e),
        }
        result
    }

    async fn download_once(&self) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.product_dir)
            .await
            .map_err(|e| {
                OadinError::io(format!("Failed to create {}", self.product_dir.display()), e)
            })?;

        let dest = self.product_dir.join(self.platform.download_file_name());
        fetch_to_file(&self.download_url, &dest).await?;
        info!(path = %dest.display(), "Downloaded {}", self.download_url);

        // Unpacking, chmod and PATH registration are blocking
        let installer = self.clone();
        tokio::task::spawn_blocking(move || installer.finish_install(&dest))
            .await
            .map_err(|e| {
                OadinError::new(ErrorKind::Io, format!("Install task failed: {}", e))
            })??;

        Ok(self.executable_path())
    }

    fn finish_install(&self, downloaded: &Path) -> Result<()> {
        if self.platform.ships_archive() {
            extract_archive(downloaded, &self.product_dir)?;
            fs::remove_file(downloaded).map_err(|e| {
                OadinError::io(format!("Failed to remove {}", downloaded.display()), e)
            })?;

            let executable = self.executable_path();
            info!(path = %executable.display(), "Extracted Oadin archive");
            if executable.exists() {
                mark_executable(&executable)?;
            }
        }

        if let Err(e) = self.register_path() {
            warn!("Failed to add Oadin directory to PATH: {}", e);
        }
        Ok(())
    }

    /// Persist the product directory on the user's PATH
    pub fn register_path(&self) -> Result<PathUpdate> {
        self.platform
            .path_registrar(&self.home)
            .register(&self.product_dir)
    }
}

/// True when the daemon is installed for the current user
///
/// An unsupported OS or unknown home directory counts as not installed.
pub fn is_daemon_installed() -> bool {
    match DaemonInstaller::detect() {
        Ok(installer) => installer.is_installed(),
        Err(e) => {
            warn!("Failed to check for Oadin executable: {}", e);
            false
        }
    }
}

async fn fetch_to_file(url: &str, dest: &Path) -> Result<()> {
    let context = format!("download {} failed", url);

    let response = reqwest::get(url)
        .await
        .map_err(|e| OadinError::from(e).context(&context))?;
    let status = response.status();
    if !status.is_success() {
        return Err(OadinError::new(
            ErrorKind::Status(status.as_u16()),
            format!("{}: status {}", context, status),
        ));
    }

    let progress = match response.content_length() {
        Some(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner} [{bar:40}] {bytes}/{total_bytes} ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            bar
        }
        None => ProgressBar::new_spinner(),
    };

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| OadinError::io(format!("Failed to create {}", dest.display()), e))?;

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let bytes = chunk.map_err(|e| OadinError::from(e).context(&context))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| OadinError::io(format!("Failed to write {}", dest.display()), e))?;
        progress.inc(bytes.len() as u64);
    }
    file.flush()
        .await
        .map_err(|e| OadinError::io(format!("Failed to write {}", dest.display()), e))?;

    progress.finish_and_clear();
    Ok(())
}

/// Unpack a zip archive into `dir`, overwriting existing files
pub fn extract_archive(archive: &Path, dir: &Path) -> Result<()> {
    let file = fs::File::open(archive)
        .map_err(|e| OadinError::io(format!("Failed to open {}", archive.display()), e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| {
        OadinError::new(
            ErrorKind::Io,
            format!("Invalid archive {}: {}", archive.display(), e),
        )
    })?;
    zip.extract(dir).map_err(|e| {
        OadinError::new(
            ErrorKind::Io,
            format!("Failed to extract {}: {}", archive.display(), e),
        )
    })
}

/// `chmod +x <path>`, output suppressed, waited on
fn mark_executable(path: &Path) -> Result<()> {
    let status = Command::new("chmod")
        .arg("+x")
        .arg(path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| {
            OadinError::new(
                ErrorKind::Process(None),
                format!("Failed to run chmod: {}", e),
            )
        })?;

    if !status.success() {
        return Err(OadinError::new(
            ErrorKind::Process(status.code()),
            format!("chmod +x {} exited with {}", path.display(), status),
        ));
    }
    Ok(())
}
