// Integration tests for daemon download and installation
//
// These tests verify, against a mock download server and a temporary home:
// 1. The macOS archive is extracted, removed and made executable
// 2. The product directory is registered in the shell profile exactly once
// 3. Download failures surface a structured error kind

use mockito::Server;
use oadin_client::daemon::{DaemonInstaller, Platform, ShellProfile};
use oadin_client::ErrorKind;
use std::io::Write;
use tempfile::TempDir;

fn zipped_daemon() -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        zip.start_file("oadin", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"#!/bin/sh\nexit 0\n").unwrap();
        zip.finish().unwrap();
    }
    buf.into_inner()
}

#[cfg(unix)]
#[tokio::test]
async fn test_download_extracts_archive_and_registers_path() {
    use std::os::unix::fs::PermissionsExt;

    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/byzedev/oadin.zip")
        .with_status(200)
        .with_body(zipped_daemon())
        .create_async()
        .await;

    let home = TempDir::new().unwrap();
    let installer = DaemonInstaller::new(Platform::MacOs, home.path())
        .with_download_url(format!("{}/byzedev/oadin.zip", server.url()));
    assert!(!installer.is_installed());

    let exe = installer.download().await.unwrap();
    mock.assert_async().await;

    assert_eq!(exe, home.path().join("Oadin").join("oadin"));
    assert!(installer.is_installed());
    assert!(!home.path().join("Oadin").join("oadin.zip").exists());

    let mode = std::fs::metadata(&exe).unwrap().permissions().mode();
    assert_ne!(mode & 0o111, 0, "extracted daemon should be executable");

    let profile = std::fs::read_to_string(home.path().join(".bashrc")).unwrap();
    let line = ShellProfile::export_line(installer.product_dir());
    assert_eq!(profile.matches(&line).count(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_second_download_keeps_single_profile_entry() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/byzedev/oadin.zip")
        .with_status(200)
        .with_body(zipped_daemon())
        .expect(2)
        .create_async()
        .await;

    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join(".zshrc"), "export EDITOR=vim\n").unwrap();
    let installer = DaemonInstaller::new(Platform::MacOs, home.path())
        .with_download_url(format!("{}/byzedev/oadin.zip", server.url()));

    installer.download().await.unwrap();
    installer.download().await.unwrap();

    let profile = std::fs::read_to_string(home.path().join(".zshrc")).unwrap();
    let line = ShellProfile::export_line(installer.product_dir());
    assert_eq!(profile.matches(&line).count(), 1);
    assert!(!home.path().join(".bashrc").exists());
}

// On Windows this would touch the real user registry
#[cfg(not(windows))]
#[tokio::test]
async fn test_download_plain_binary() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/byzedev/oadin.exe")
        .with_status(200)
        .with_body(b"MZ fake binary")
        .create_async()
        .await;

    let home = TempDir::new().unwrap();
    let installer = DaemonInstaller::new(Platform::Windows, home.path())
        .with_download_url(format!("{}/byzedev/oadin.exe", server.url()));

    // Registry registration fails off Windows; the download still succeeds
    let exe = installer.download().await.unwrap();

    assert_eq!(exe, home.path().join("Oadin").join("oadin.exe"));
    assert_eq!(std::fs::read(&exe).unwrap(), b"MZ fake binary");
}

#[tokio::test]
async fn test_download_not_found_is_status_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/byzedev/oadin.zip")
        .with_status(404)
        .create_async()
        .await;

    let home = TempDir::new().unwrap();
    let installer = DaemonInstaller::new(Platform::MacOs, home.path())
        .with_download_url(format!("{}/byzedev/oadin.zip", server.url()));

    let err = installer.download().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Status(404));
    assert!(!installer.is_installed());
}

#[tokio::test]
async fn test_download_unreachable_is_transport_error() {
    let home = TempDir::new().unwrap();
    let installer = DaemonInstaller::new(Platform::MacOs, home.path())
        .with_download_url("http://127.0.0.1:1/byzedev/oadin.zip");

    let err = installer.download().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}
