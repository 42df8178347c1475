//! Backup configuration: the validated record a run consumes and the INI
//! loader that produces it.

mod backup;
pub mod loader;

pub use backup::{BackupConfig, BackupConfigBuilder, PathLayout};
pub use loader::load_config;

/// Patterns used when a configuration file names none.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git/",
    "*.tmp",
    "*.temp",
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
];
