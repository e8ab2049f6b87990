use crate::cmd::persist_step;
use crate::output::print_json;
use anyhow::Context;
use drydock_core::{
    config::Config,
    paths, plan,
    release::Release,
    runner::IacBinary,
    state::State,
    types::{ReleasePhase, StepAction},
};
use std::path::Path;
use std::time::Duration;

pub fn run(root: &Path, slug: &str, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let mut release = Release::load(root, slug)?;

    if release.phase != ReleasePhase::Rendered {
        anyhow::bail!(
            "release '{slug}' is in phase '{}'; plan runs from 'rendered'",
            release.phase
        );
    }

    let env = config.environment(&release.environment)?;
    let iac = IacBinary::detect(config.tools.iac)?;
    let plan_file = paths::backend_plan_file(root, slug);
    let timeout = Duration::from_secs(u64::from(StepAction::Plan.timeout_minutes()) * 60);

    let summary = plan::run_plan(root, iac, env, &plan_file, Some(timeout))
        .with_context(|| format!("plan failed for environment '{}'", release.environment))?;

    release.record_plan(summary);
    release.can_transition_to(ReleasePhase::Planned, false, config.gateway.is_some())?;
    release.advance(ReleasePhase::Planned);

    // Environments without a gate approve themselves; the record keeps the
    // audit trail uniform.
    let auto_approved = !env.require_approval;
    if auto_approved {
        release.record_approval("auto", Some("environment does not require approval".to_string()));
        release.can_transition_to(
            ReleasePhase::Approved,
            env.require_approval,
            config.gateway.is_some(),
        )?;
        release.advance(ReleasePhase::Approved);
    }

    persist_step(root, &release, StepAction::Plan, &summary.to_string())?;

    if !auto_approved {
        let mut state = State::load(root)?;
        state.set_blocked(
            slug,
            &format!("awaiting approval for '{}'", release.environment),
        );
        state.save(root)?;
    }

    if json {
        return print_json(&serde_json::json!({
            "summary": summary,
            "plan_file": plan_file.display().to_string(),
            "auto_approved": auto_approved,
        }));
    }

    println!("Plan: {summary}");
    println!("Saved to {}.", plan_file.display());
    if auto_approved {
        println!("\nEnvironment '{}' does not require approval.", release.environment);
        println!("Next: drydock apply {slug}");
    } else {
        println!(
            "\nEnvironment '{}' requires approval before apply.",
            release.environment
        );
        println!("Next: drydock approve {slug} --by <you>");
    }
    Ok(())
}
