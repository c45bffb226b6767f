//! Where `omdbq` keeps its config file and cache database.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Application name used for per-user directories.
const APP_DIR_NAME: &str = "omdbq";

/// Config file name inside the config directory.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Resolved config and data directories.
///
/// `--dir` puts both in one place; otherwise they follow the XDG layout
/// under `$HOME` (`~/.config/omdbq`, `~/.local/share/omdbq`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl AppDirs {
    /// Resolves directories from `--dir`, falling back to `$HOME`.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` is `None` and `HOME` is not set.
    pub fn resolve(dir: Option<&Path>) -> Result<Self> {
        if let Some(d) = dir {
            return Ok(Self::single(d));
        }
        let home = std::env::var_os("HOME").context("HOME environment variable is not set")?;
        Ok(Self::under_home(Path::new(&home)))
    }

    /// Both directories at `dir`.
    fn single(dir: &Path) -> Self {
        Self {
            config_dir: dir.to_path_buf(),
            data_dir: dir.to_path_buf(),
        }
    }

    /// XDG-style directories below `home`.
    fn under_home(home: &Path) -> Self {
        Self {
            config_dir: home.join(".config").join(APP_DIR_NAME),
            data_dir: home.join(".local").join("share").join(APP_DIR_NAME),
        }
    }

    /// Path of `config.toml`.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// Directory holding the cache database.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
