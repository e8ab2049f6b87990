use crate::cmd::persist_step;
use crate::output::print_json;
use anyhow::Context;
use drydock_core::{
    config::Config,
    gateway, paths, plan,
    release::Release,
    runner::IacBinary,
    types::{ReleasePhase, StepAction},
};
use std::path::Path;
use std::time::Duration;

pub fn run(root: &Path, slug: &str, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let mut release = Release::load(root, slug)?;

    if release.phase != ReleasePhase::Composed {
        anyhow::bail!(
            "release '{slug}' is in phase '{}'; finalize runs from 'composed'",
            release.phase
        );
    }

    let gw = config
        .gateway
        .as_ref()
        .context("no gateway configured")?;
    let env = config.environment(&release.environment)?;
    let image = release
        .gateway_image
        .clone()
        .context("no gateway image recorded; run: drydock compose")?;

    gateway::render_gateway_var(root, env, gw, &image)
        .with_context(|| format!("failed to render {}", env.var_file))?;

    let iac = IacBinary::detect(config.tools.iac)?;
    let plan_file = paths::gateway_plan_file(root, slug);
    let timeout =
        Duration::from_secs(u64::from(StepAction::DeployGateway.timeout_minutes()) * 60);

    let summary = plan::run_plan(root, iac, env, &plan_file, Some(timeout))
        .context("gateway plan failed")?;
    release.record_gateway_plan(summary);

    plan::run_apply(root, iac, env, &plan_file, Some(timeout))
        .context("gateway apply failed")?;

    release.can_transition_to(ReleasePhase::Released, false, true)?;
    release.advance(ReleasePhase::Released);
    persist_step(
        root,
        &release,
        StepAction::DeployGateway,
        &summary.to_string(),
    )?;

    if json {
        return print_json(&serde_json::json!({
            "gateway_image": image,
            "plan": summary,
            "phase": release.phase,
        }));
    }
    println!("Gateway plan: {summary}");
    println!("Deployed gateway image {image}.");
    println!("\nRelease '{slug}' is fully deployed.");
    Ok(())
}
