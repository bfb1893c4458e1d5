use crate::utils::LoadedSite;
use colored::Colorize;
use siteflow_core::stage_domain;

pub fn handle(loaded: &LoadedSite) -> anyhow::Result<()> {
    let config = &loaded.site.config;
    println!("{}", format!("Stages ({}):", loaded.site.registry.len()).bold());

    for descriptor in loaded.site.registry.iter() {
        let marker = if descriptor.is_production {
            " (production)".yellow().to_string()
        } else {
            String::new()
        };
        println!("  • {}{}", descriptor.stage_name.to_string().cyan(), marker);
        println!(
            "      domain:  {}",
            stage_domain(descriptor, &config.apex_domain)
        );
        println!(
            "      target:  {}/{}",
            descriptor.target_environment.account, descriptor.target_environment.region
        );
        println!(
            "      bucket:  {}",
            descriptor.assets_location_name.as_deref().unwrap_or("-")
        );
        if descriptor.compute {
            println!("      compute: enabled");
        }
    }

    Ok(())
}
