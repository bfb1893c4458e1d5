//! Locates the `site.kdl` file that drives siteflow.

pub mod error;

pub use error::*;

use std::path::{Path, PathBuf};

/// Environment variable that points directly at a site configuration file.
pub const CONFIG_PATH_ENV: &str = "SITEFLOW_CONFIG_PATH";

const CANDIDATES: [&str; 4] = ["site.local.kdl", ".site.local.kdl", "site.kdl", ".site.kdl"];
const PROJECT_DIR: &str = ".siteflow";

/// `~/.config/siteflow/site.kdl`, when a user config dir exists
fn global_site_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("siteflow").join("site.kdl"))
}

/// Finds the site configuration file.
///
/// Search order:
/// 1. an explicit path (the `--config` flag)
/// 2. `SITEFLOW_CONFIG_PATH`
/// 3. the current directory: site.local.kdl, .site.local.kdl, site.kdl, .site.kdl
/// 4. the same names inside `./.siteflow/`
/// 5. `~/.config/siteflow/site.kdl`
pub fn find_site_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(ConfigError::ExplicitPathMissing(path.display().to_string()));
    }

    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(&config_path);
        if path.exists() {
            tracing::debug!(path = %path.display(), "using site file from environment");
            return Ok(path);
        }
        return Err(ConfigError::ExplicitPathMissing(config_path));
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(PROJECT_DIR);
    if project_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(global_config) = global_site_file().filter(|p| p.exists()) {
        return Ok(global_config);
    }

    Err(ConfigError::SiteFileNotFound)
}

/// Project root for a site file: its directory, or the parent of `.siteflow/`.
pub fn project_root(site_file: &Path) -> PathBuf {
    let dir = site_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    if dir.file_name().is_some_and(|n| n == PROJECT_DIR) {
        dir.parent().map(Path::to_path_buf).unwrap_or(dir)
    } else {
        dir
    }
}
