//! Where `settings.toml` lives, resolved with the `dirs` crate.
//!
//!   Windows: %APPDATA%\screen-to-text\settings.toml
//!   macOS:   ~/Library/Application Support/screen-to-text/settings.toml
//!   Linux:   ~/.config/screen-to-text/settings.toml

use std::path::{Path, PathBuf};

const APP_DIR: &str = "screen-to-text";
const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
}

impl AppPaths {
    /// The platform config directory, or `./screen-to-text` when there is none.
    pub fn new() -> Self {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::under(&base)
    }

    /// Paths rooted at `base` instead of the platform directory.
    pub fn under(base: &Path) -> Self {
        let config_dir = base.join(APP_DIR);
        Self {
            settings_file: config_dir.join(SETTINGS_FILE),
            config_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
