//! stage node parsing

use super::{first_string, flag};
use crate::error::{Result, SiteError};
use crate::model::{StageName, StageParams};
use kdl::KdlNode;

/// Parse a `stage "dev" { ... }` node
pub fn parse_stage(node: &KdlNode) -> Result<(StageName, StageParams)> {
    let name: StageName = first_string(node)
        .ok_or_else(|| SiteError::InvalidConfig("stage requires a name".to_string()))?
        .parse()?;

    let mut params = StageParams::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "bucket" => params.bucket = first_string(child),
                "oauth-client-id" | "oauth_client_id" => {
                    params.oauth_client_id = first_string(child);
                }
                "oauth-redirect-url" | "oauth_redirect_url" => {
                    params.oauth_redirect_url = first_string(child);
                }
                "account" => params.account = first_string(child),
                "region" => params.region = first_string(child),
                "compute" => params.compute = flag(child),
                "variables" => {
                    if let Some(vars) = child.children() {
                        for var in vars.nodes() {
                            let key = var.name().value().to_string();
                            let value = first_string(var).unwrap_or_default();
                            params.variables.insert(key, value);
                        }
                    }
                }
                other => {
                    tracing::debug!(stage = %name, node = other, "ignoring unknown stage node");
                }
            }
        }
    }

    Ok((name, params))
}
