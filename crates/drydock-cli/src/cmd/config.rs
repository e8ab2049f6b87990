use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use drydock_core::config::{Config, WarnLevel};
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Check the configuration for problems
    Validate,
    /// Display the parsed configuration
    Show,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;

    match subcmd {
        ConfigSubcommand::Validate => validate(&config, json),
        ConfigSubcommand::Show => show(&config, json),
    }
}

fn validate(config: &Config, json: bool) -> anyhow::Result<()> {
    let warnings = config.validate();

    if json {
        print_json(&warnings)?;
    } else if warnings.is_empty() {
        println!("Configuration OK: {} service(s), {} environment(s)",
            config.services.len(),
            config.environments.len()
        );
    } else {
        for w in &warnings {
            let tag = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("{tag}: {}", w.message);
        }
    }

    if Config::has_errors(&warnings) {
        anyhow::bail!("configuration has errors");
    }
    Ok(())
}

fn show(config: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(config);
    }

    println!("Project: {}", config.project.name);

    if !config.services.is_empty() {
        println!("\nServices:");
        let rows: Vec<Vec<String>> = config
            .services
            .iter()
            .map(|s| vec![s.name.clone(), s.path.clone(), s.dockerfile()])
            .collect();
        print_table(&["NAME", "PATH", "DOCKERFILE"], rows);
    }

    if let Some(gw) = &config.gateway {
        println!("\nGateway: {} ({})", gw.name, gw.path);
    }

    if !config.environments.is_empty() {
        println!("\nEnvironments:");
        let rows: Vec<Vec<String>> = config
            .environments
            .iter()
            .map(|(name, env)| {
                vec![
                    name.clone(),
                    env.registry.clone(),
                    env.terraform_dir.clone(),
                    if env.require_approval { "yes" } else { "" }.to_string(),
                ]
            })
            .collect();
        print_table(&["NAME", "REGISTRY", "TERRAFORM_DIR", "APPROVAL"], rows);
    }

    Ok(())
}
