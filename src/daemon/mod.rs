// Daemon module for managing the local Oadin service
//
// This module locates, downloads and launches the Oadin daemon binary, and
// keeps its directory on the user's PATH.

pub mod lifecycle;
pub mod path_env;
pub mod platform;
pub mod spawn;

pub use lifecycle::{extract_archive, is_daemon_installed, DaemonInstaller};
pub use path_env::{append_path_entry, PathRegistrar, PathUpdate, ShellProfile, UserRegistry};
pub use platform::Platform;
pub use spawn::{ensure_process_path, START_ARGS};
