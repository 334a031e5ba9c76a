//! Path utilities for rozgar data storage.

use std::path::PathBuf;

/// Default database filename.
pub const DB_FILENAME: &str = "rozgar.db";

/// Get the data directory for rozgar.
///
/// Uses XDG base directory specification on Linux/macOS:
/// - Linux: `~/.local/share/rozgar`
/// - macOS: `~/Library/Application Support/rozgar`
/// - Windows: `%APPDATA%\rozgar`
pub fn get_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("rozgar"))
        .unwrap_or_else(|| PathBuf::from(".rozgar"))
}

/// Get the default path to the SQLite database.
pub fn get_db_path() -> PathBuf {
    get_data_dir().join(DB_FILENAME)
}
