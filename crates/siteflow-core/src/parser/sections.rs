//! source / synth / build / approval node parsing

use super::{all_strings, first_string};
use crate::error::{Result, SiteError};
use crate::model::{ApprovalConfig, BuildConfig, SourceConfig, SynthConfig};
use kdl::KdlNode;
use std::path::PathBuf;

/// Parse the `source { ... }` block
pub fn parse_source(node: &KdlNode) -> SourceConfig {
    let mut source = SourceConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "connection-arn" | "connection_arn" => source.connection_arn = first_string(child),
                "owner" => source.owner = first_string(child).unwrap_or_default(),
                "repo" => source.repo = first_string(child).unwrap_or_default(),
                "frontend-repo" | "frontend_repo" => {
                    source.frontend_repo = first_string(child).unwrap_or_default();
                }
                "branch" => {
                    if let Some(branch) = first_string(child) {
                        source.branch = branch;
                    }
                }
                "frontend-dir" | "frontend_dir" => {
                    if let Some(dir) = first_string(child) {
                        source.frontend_dir = PathBuf::from(dir);
                    }
                }
                _ => {}
            }
        }
    }

    source
}

/// Parse the `synth { command "..." }` block
///
/// Declaring any command replaces the defaults.
pub fn parse_synth(node: &KdlNode) -> SynthConfig {
    let mut commands = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == "command" {
                commands.extend(all_strings(child));
            }
        }
    }

    SynthConfig { commands }
}

/// Parse the `build { ... }` block
pub fn parse_build(node: &KdlNode) -> BuildConfig {
    let mut build = BuildConfig::default();
    let mut install = Vec::new();
    let mut commands = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "install" => install.extend(all_strings(child)),
                "command" => commands.extend(all_strings(child)),
                "output" => {
                    if let Some(output) = first_string(child) {
                        build.output_dir = output;
                    }
                }
                "env" => {
                    // env stage="REACT_APP_STAGE" client-id="..." redirect-url="..."
                    if let Some(v) = child.get("stage").and_then(|v| v.as_string()) {
                        build.stage_var = v.to_string();
                    }
                    if let Some(v) = child.get("client-id").and_then(|v| v.as_string()) {
                        build.client_id_var = v.to_string();
                    }
                    if let Some(v) = child.get("redirect-url").and_then(|v| v.as_string()) {
                        build.redirect_url_var = v.to_string();
                    }
                }
                _ => {}
            }
        }
    }

    if !install.is_empty() {
        build.install_commands = install;
    }
    if !commands.is_empty() {
        build.commands = commands;
    }

    build
}

/// Parse the `approval { ... }` block
pub fn parse_approval(node: &KdlNode) -> Result<ApprovalConfig> {
    let mut approval = ApprovalConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "comment" => {
                    if let Some(comment) = first_string(child) {
                        approval.comment = comment;
                    }
                }
                "timeout-minutes" | "timeout_minutes" => {
                    if let Some(entry) = child.entries().first()
                        && let Some(value) = entry.value().as_integer()
                    {
                        if value <= 0 {
                            return Err(SiteError::InvalidConfig(format!(
                                "approval timeout must be positive, got {value}"
                            )));
                        }
                        approval.timeout_minutes = value as u64;
                    }
                }
                _ => {}
            }
        }
    }

    Ok(approval)
}
