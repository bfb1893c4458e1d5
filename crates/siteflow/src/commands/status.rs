use crate::utils::{self, LoadedSite};
use colored::Colorize;
use siteflow_cloud::{CloudProvider, StackConfig, StageStatus, StateManager};
use siteflow_core::compute::compute_stack_name;
use siteflow_core::hosting_stack_name;

pub async fn handle(loaded: &LoadedSite, live: bool) -> anyhow::Result<()> {
    let state = StateManager::new(&loaded.project_root).load().await?;
    let application = &loaded.site.config.application;

    println!("{}", format!("Status of {application}").bold());
    for descriptor in loaded.site.registry.iter() {
        let name = descriptor.stage_name.as_str();
        match state.stage(name) {
            Some(record) => {
                let status = match record.status {
                    StageStatus::Deployed => record.status.to_string().green(),
                    StageStatus::Rejected => record.status.to_string().yellow(),
                    StageStatus::Failed => record.status.to_string().red(),
                    _ => record.status.to_string().normal(),
                };
                println!(
                    "  • {} {} ({})",
                    name.cyan(),
                    status,
                    record.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
                if let Some(message) = &record.message {
                    println!("      {message}");
                }
                if let Some(id) = &record.distribution_id {
                    println!("      distribution: {id}");
                }
                if let Some(id) = &record.last_invalidation {
                    println!("      last invalidation: {id}");
                }
            }
            None => println!("  • {} {}", name.cyan(), "never run".dimmed()),
        }
    }

    if !live {
        return Ok(());
    }

    let provider = utils::aws_provider(loaded).await?;
    let mut stacks = Vec::new();
    for descriptor in loaded.site.registry.iter() {
        let region = &descriptor.target_environment.region;
        stacks.push(StackConfig::new(
            hosting_stack_name(application, descriptor.stage_name),
            region.as_str(),
            serde_json::Value::Null,
        ));
        if descriptor.compute {
            stacks.push(StackConfig::new(
                compute_stack_name(application, descriptor.stage_name),
                region.as_str(),
                serde_json::Value::Null,
            ));
        }
    }

    let live_state = provider.get_state(&stacks).await?;
    println!();
    println!("{}", "Live stacks:".bold());
    for (name, stack) in live_state.iter() {
        println!("  • {} {} ({})", name, stack.status, stack.region);
        for (key, value) in &stack.outputs {
            println!("      {key} = {value}");
        }
    }

    Ok(())
}
