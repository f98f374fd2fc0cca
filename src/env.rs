use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_NAME: &str = "gen7.rimuaerisya.net";
const MANIFEST_FILE: &str = "webui_dependencies.json";
const METADATA_FILE: &str = "installed_dependencies.json";

/// Whether the process runs against the production config directory (`PROD=true`).
pub fn is_prod() -> bool {
    env::var("PROD").map(|value| value == "true").unwrap_or(false)
}

/// Returns the config directory (mirrors the shell defaults).
///
/// Production keeps state in a dotted folder under the home directory,
/// development keeps it under `transient/` in the working directory.
pub fn default_config_dir(prod: bool) -> PathBuf {
    if prod {
        let home = env::var_os("HOME")
            .or_else(|| env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        home.join(format!(".{CONFIG_NAME}"))
    } else {
        PathBuf::from("transient").join(CONFIG_NAME)
    }
}

pub fn default_target_dir() -> PathBuf {
    PathBuf::from("data").join("external")
}

/// Every location the synchronization engine reads or writes.
#[derive(Clone, Debug)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub target_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub metadata_path: PathBuf,
}

impl AppPaths {
    pub fn new(config_dir: impl AsRef<Path>, target_dir: impl AsRef<Path>) -> Self {
        let config_dir = config_dir.as_ref().to_path_buf();
        let target_dir = target_dir.as_ref().to_path_buf();
        Self {
            staging_dir: config_dir.join("temp"),
            manifest_path: config_dir.join(MANIFEST_FILE),
            metadata_path: target_dir.join(METADATA_FILE),
            config_dir,
            target_dir,
        }
    }

    /// Resolve paths from the environment, letting explicit overrides win.
    pub fn resolve(config_override: Option<PathBuf>, target_override: Option<PathBuf>) -> Self {
        let config_dir = config_override.unwrap_or_else(|| default_config_dir(is_prod()));
        let target_dir = target_override.unwrap_or_else(default_target_dir);
        Self::new(config_dir, target_dir)
    }

    /// Create the on-disk folder layout expected by the installer.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.config_dir, &self.target_dir, &self.staging_dir] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
