use crate::utils::{self, LoadedSite};
use colored::Colorize;
use siteflow_cloud::{ActionType, CloudProvider, DeliveryProvider, StackSet};
use siteflow_core::{PipelineDefinition, StepKind};

pub async fn handle(
    loaded: &LoadedSite,
    json: bool,
    diff: bool,
    hosted_zone_id: Option<&str>,
) -> anyhow::Result<()> {
    let provider = if diff || hosted_zone_id.is_none() {
        Some(utils::aws_provider(loaded).await?)
    } else {
        None
    };
    let delivery = provider.as_deref().map(|p| p as &dyn DeliveryProvider);
    let zone = utils::hosted_zone(loaded, delivery, hosted_zone_id).await?;
    let definition = utils::define(loaded, &zone)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&definition)?);
        return Ok(());
    }

    print_definition(&definition);

    if let Some(provider) = provider.filter(|_| diff) {
        let stacks: StackSet = definition
            .templates()
            .iter()
            .map(siteflow::stack_config)
            .collect();
        let plan = provider.plan(&stacks).await?;

        println!();
        println!("{}", "Stack changes:".bold());
        for action in &plan.actions {
            let marker = match action.action_type {
                ActionType::Create => "+".green(),
                ActionType::Update => "~".yellow(),
                ActionType::NoOp => "=".dimmed(),
            };
            println!("  {} {} ({})", marker, action.stack_name, action.region);
        }
        println!("  {}", plan.summary());
    }

    Ok(())
}

fn print_definition(definition: &PipelineDefinition) {
    println!("{}", format!("Pipeline {}", definition.application).bold());

    println!("  sources:");
    for source in &definition.sources {
        println!("    • {}@{}", source.full_name().cyan(), source.branch);
    }

    println!("  synth:");
    for command in &definition.synth.commands {
        println!("    $ {command}");
    }
    println!("    → {}/", definition.synth.output_dir);

    println!(
        "  certificate: {} ({})",
        definition.certificate.stack_name().cyan(),
        definition.certificate.subject_names().join(", ")
    );

    for stage in &definition.stages {
        println!();
        println!(
            "  {} {}",
            "stage".bold(),
            format!("{} → {}", stage.name(), stage.stage.domain).cyan()
        );
        for step in &stage.steps {
            let detail = match &step.kind {
                StepKind::ManualApproval(approval) => {
                    format!("timeout {}m", approval.timeout_minutes)
                }
                StepKind::Build(build) => build.commands.join(" && "),
                StepKind::Deploy(deploy) => {
                    format!("{} then {}", deploy.stacks.join(", "), deploy.sync_command())
                }
                StepKind::Invalidate(invalidate) => {
                    format!("{} {}", invalidate.stack_name, invalidate.paths.join(" "))
                }
            };
            println!(
                "    {:<26} {:<10} {}",
                step.id,
                step.kind.label().dimmed(),
                detail
            );
        }
    }
}
