//! KDL parser
//!
//! Turns `site.kdl` into a [`SiteConfig`]. Section parsers live in their own
//! modules.

mod sections;
mod stage;

use sections::{parse_approval, parse_build, parse_source, parse_synth};
use stage::parse_stage;

use crate::error::{Result, SiteError};
use crate::model::{SiteConfig, StageName};
use kdl::{KdlDocument, KdlNode};
use std::fs;
use std::path::Path;

/// Parse a site configuration file
pub fn parse_site_file<P: AsRef<Path>>(path: P) -> Result<SiteConfig> {
    let content = fs::read_to_string(path.as_ref()).map_err(|e| SiteError::IoError {
        path: path.as_ref().to_path_buf(),
        message: e.to_string(),
    })?;
    parse_site_string(&content)
}

/// Parse a site configuration from a string
pub fn parse_site_string(content: &str) -> Result<SiteConfig> {
    let doc: KdlDocument = content.parse()?;

    let mut application: Option<String> = None;
    let mut domain: Option<String> = None;
    let mut account: Option<String> = None;
    let mut config = SiteConfig::new("", "", "");

    for node in doc.nodes() {
        match node.name().value() {
            "application" => application = first_string(node),
            "domain" => domain = first_string(node),
            "account" => account = first_string(node),
            "region" => {
                if let Some(region) = first_string(node) {
                    config.region = region;
                }
            }
            "edge-rewrite" | "edge_rewrite" => {
                config.edge_rewrite = flag(node);
            }
            "source" => config.source = parse_source(node),
            "synth" => config.synth = parse_synth(node),
            "build" => config.build = parse_build(node),
            "approval" => config.approval = parse_approval(node)?,
            "stage" => {
                let (name, params) = parse_stage(node)?;
                if config.stages.insert(name, params).is_some() {
                    return Err(SiteError::DuplicateStage(name.to_string()));
                }
            }
            other => {
                tracing::debug!(node = other, "ignoring unknown node");
            }
        }
    }

    config.application = application
        .ok_or_else(|| SiteError::InvalidConfig("application is required".to_string()))?;
    config.apex_domain =
        domain.ok_or_else(|| SiteError::InvalidConfig("domain is required".to_string()))?;
    config.account =
        account.ok_or_else(|| SiteError::InvalidConfig("account is required".to_string()))?;

    if config.apex_domain.starts_with('.') || !config.apex_domain.contains('.') {
        return Err(SiteError::InvalidConfig(format!(
            "domain '{}' is not an apex domain",
            config.apex_domain
        )));
    }

    for stage in StageName::ALL {
        if !config.stages.contains_key(&stage) {
            tracing::debug!(stage = %stage, "stage not declared, using defaults");
        }
    }

    Ok(config)
}

/// First argument as a string
pub(crate) fn first_string(node: &KdlNode) -> Option<String> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

/// All string arguments
pub(crate) fn all_strings(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string().map(|s| s.to_string()))
        .collect()
}

/// Boolean flag node. A bare node (`edge-rewrite`) means true.
pub(crate) fn flag(node: &KdlNode) -> bool {
    match node.entries().first() {
        None => true,
        Some(entry) => {
            let value = entry.value();
            if let Some(b) = value.as_bool() {
                b
            } else if let Some(s) = value.as_string() {
                eprintln!(
                    "Warning: '{} \"{}\"' is a string, not a boolean.\n\
                     Hint: In KDL v2, use '#true' or '#false'.",
                    node.name().value(),
                    s
                );
                s == "true"
            } else {
                false
            }
        }
    }
}
