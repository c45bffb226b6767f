//! Configuration: `config.toml` contents and the directories `omdbq` uses.

#[allow(clippy::module_inception)]
mod config;
mod paths;

pub use config::{AppConfig, CacheBackend};
pub use paths::AppDirs;
