use crate::cmd::persist_step;
use crate::output::print_json;
use anyhow::Context;
use drydock_core::{
    config::Config,
    paths, plan,
    release::Release,
    runner::IacBinary,
    types::{ReleasePhase, StepAction},
};
use std::path::Path;
use std::time::Duration;

pub fn run(root: &Path, slug: &str, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let mut release = Release::load(root, slug)?;
    let env = config.environment(&release.environment)?;
    let has_gateway = config.gateway.is_some();

    // A release sitting at 'planned' with its gate satisfied moves through
    // 'approved' here, the same way plan auto-approves ungated environments.
    if release.phase == ReleasePhase::Planned {
        release.can_transition_to(ReleasePhase::Approved, env.require_approval, has_gateway)?;
        if release.approvals.is_empty() {
            release.record_approval(
                "auto",
                Some("environment does not require approval".to_string()),
            );
        }
        release.advance(ReleasePhase::Approved);
    }

    release.can_transition_to(ReleasePhase::Applied, false, has_gateway)?;

    let plan_file = paths::backend_plan_file(root, slug);
    if !plan_file.exists() {
        anyhow::bail!(
            "no saved plan for release '{slug}'; re-run: drydock plan {slug}"
        );
    }

    let iac = IacBinary::detect(config.tools.iac)?;
    let timeout = Duration::from_secs(u64::from(StepAction::Apply.timeout_minutes()) * 60);

    plan::run_apply(root, iac, env, &plan_file, Some(timeout))
        .with_context(|| format!("apply failed for environment '{}'", release.environment))?;

    let urls = plan::read_service_urls(root, iac, env)
        .context("failed to read service URLs from outputs")?;
    release.record_urls(urls);
    release.advance(ReleasePhase::Applied);

    // Without a gateway there is no second phase; the release is done.
    if !has_gateway {
        release.can_transition_to(ReleasePhase::Released, false, false)?;
        release.advance(ReleasePhase::Released);
    }

    let outcome = format!("{} service URL(s) recorded", release.service_urls.len());
    persist_step(root, &release, StepAction::Apply, &outcome)?;

    if json {
        return print_json(&release.service_urls);
    }

    println!("Applied the saved plan for '{}'.", release.environment);
    if !release.service_urls.is_empty() {
        println!("\nService URLs:");
        for (svc, url) in &release.service_urls {
            println!("  {svc} -> {url}");
        }
    }
    if has_gateway {
        println!("\nNext: drydock compose {slug}");
    } else {
        println!("\nNo gateway configured; release '{slug}' is complete.");
    }
    Ok(())
}
