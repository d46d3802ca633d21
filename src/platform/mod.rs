// Platform paths for bookmark-admin
// Config: settings.json
// Data:   the default local SQLite document store
//
// Linux follows XDG, macOS uses Application Support, Windows uses %APPDATA%.

use std::env;
use std::path::PathBuf;

/// Directory name used under every platform root.
pub const APP_DIR: &str = "bookmark-admin";

/// File name of the default local document store.
pub const DATABASE_FILE: &str = "bookmarks.db";

fn home_dir() -> PathBuf {
    PathBuf::from(env::var("HOME").unwrap_or_else(|_| String::from("/tmp")))
}

/// Prefers `$var` when set and non-empty, otherwise `fallback()`.
fn env_root(var: &str, fallback: impl FnOnce() -> PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(value) if !value.is_empty() => PathBuf::from(value),
        _ => fallback(),
    }
}

/// Returns the configuration directory.
///
/// - **Linux**: `$XDG_CONFIG_HOME/bookmark-admin` or `~/.config/bookmark-admin`
/// - **macOS**: `~/Library/Application Support/bookmark-admin`
/// - **Windows**: `%APPDATA%/bookmark-admin`
pub fn get_config_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    let root = home_dir().join("Library").join("Application Support");
    #[cfg(target_os = "windows")]
    let root = env_root("APPDATA", || {
        PathBuf::from("C:\\Users\\Default\\AppData\\Roaming")
    });
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let root = env_root("XDG_CONFIG_HOME", || home_dir().join(".config"));

    root.join(APP_DIR)
}

/// Returns the data directory.
///
/// - **Linux**: `$XDG_DATA_HOME/bookmark-admin` or `~/.local/share/bookmark-admin`
/// - **macOS**: `~/Library/Application Support/bookmark-admin`
/// - **Windows**: `%APPDATA%/bookmark-admin`
pub fn get_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    let root = home_dir().join("Library").join("Application Support");
    #[cfg(target_os = "windows")]
    let root = env_root("APPDATA", || {
        PathBuf::from("C:\\Users\\Default\\AppData\\Roaming")
    });
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let root = env_root("XDG_DATA_HOME", || home_dir().join(".local").join("share"));

    root.join(APP_DIR)
}

/// Default path of the local SQLite document store.
pub fn default_database_path() -> PathBuf {
    get_data_dir().join(DATABASE_FILE)
}
