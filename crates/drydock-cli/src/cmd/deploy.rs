use crate::cmd;
use crate::output::print_json;
use anyhow::Context;
use drydock_core::{classify::classify, config::Config, release::Release, types::StepAction};
use std::path::Path;

/// Drive a release through its remaining steps. Stops when the release is
/// done, or at the approval gate — the whole point of the gate is that a
/// human runs `approve`, not this loop.
pub fn run(root: &Path, slug: &str, json: bool) -> anyhow::Result<()> {
    loop {
        let config = Config::load(root).context("failed to load config")?;
        let release = Release::load(root, slug)?;
        let c = classify(&release, &config)?;

        match c.action {
            StepAction::Done => {
                if json {
                    return print_json(&c);
                }
                println!("{}", c.message);
                return Ok(());
            }
            StepAction::AwaitApproval => {
                if json {
                    return print_json(&c);
                }
                println!("{}", c.message);
                println!("Run: {}", c.next_command);
                return Ok(());
            }
            StepAction::DetectChanges => cmd::detect::run(root, slug, json)?,
            StepAction::BuildImages => cmd::build::run(root, slug, false, json)?,
            StepAction::RenderVars => cmd::render::run(root, slug, json)?,
            StepAction::Plan => cmd::plan::run(root, slug, json)?,
            StepAction::Apply => cmd::apply::run(root, slug, json)?,
            StepAction::ComposeGateway => cmd::compose::run(root, slug, false, json)?,
            StepAction::DeployGateway => cmd::finalize::run(root, slug, json)?,
        }
        if !json {
            println!();
        }
    }
}
