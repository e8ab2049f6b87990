use crate::cmd::persist_step;
use crate::output::print_json;
use anyhow::Context;
use drydock_core::{
    config::Config, gateway, release::Release, types::{ReleasePhase, StepAction},
};
use std::path::Path;
use std::time::Duration;

pub fn run(root: &Path, slug: &str, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let mut release = Release::load(root, slug)?;

    if config.gateway.is_none() {
        anyhow::bail!("no gateway configured; nothing to compose");
    }
    if release.phase != ReleasePhase::Applied {
        anyhow::bail!(
            "release '{slug}' is in phase '{}'; compose runs from 'applied'",
            release.phase
        );
    }

    let env = config.environment(&release.environment)?;

    if dry_run {
        let invs = gateway::compose_invocations(root, &config, env, &release)?;
        let lines: Vec<String> = invs.iter().map(|i| i.rendered()).collect();
        if json {
            return print_json(&lines);
        }
        for line in lines {
            println!("{line}");
        }
        return Ok(());
    }

    let timeout =
        Duration::from_secs(u64::from(StepAction::ComposeGateway.timeout_minutes()) * 60);
    let image = gateway::compose(root, &config, env, &release, Some(timeout))
        .context("gateway composition failed")?;

    release.record_gateway_image(&image.to_string());
    release.can_transition_to(ReleasePhase::Composed, false, true)?;
    release.advance(ReleasePhase::Composed);
    persist_step(
        root,
        &release,
        StepAction::ComposeGateway,
        &format!("pushed {image}"),
    )?;

    if json {
        return print_json(&serde_json::json!({ "gateway_image": image.to_string() }));
    }
    println!("Composed and pushed gateway image {image}.");
    println!("\nNext: drydock finalize {slug}");
    Ok(())
}
