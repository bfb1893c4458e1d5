//! Site loader
//!
//! Parses the site file and builds the registry in one step, so callers
//! never hold a config whose topology has not been validated.

use crate::error::Result;
use crate::model::SiteConfig;
use crate::parser::parse_site_file;
use crate::registry::StageRegistry;
use std::path::Path;
use tracing::{info, instrument};

/// A validated site: configuration plus stage registry
#[derive(Debug, Clone)]
pub struct Site {
    pub config: SiteConfig,
    pub registry: StageRegistry,
}

impl Site {
    pub fn from_config(config: SiteConfig) -> Result<Self> {
        let registry = StageRegistry::from_config(&config)?;
        Ok(Self { config, registry })
    }
}

#[instrument(fields(path = %path.display()))]
pub fn load_site(path: &Path) -> Result<Site> {
    let config = parse_site_file(path)?;
    let site = Site::from_config(config)?;
    info!(
        application = %site.config.application,
        stages = site.registry.len(),
        "site loaded"
    );
    Ok(site)
}
