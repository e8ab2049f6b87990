use crate::cmd::persist_step;
use crate::output::print_json;
use anyhow::Context;
use drydock_core::{
    config::Config, release::Release, state::State, types::{ReleasePhase, StepAction},
};
use std::path::Path;

pub fn run(
    root: &Path,
    slug: &str,
    by: &str,
    note: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    if by.trim().is_empty() {
        anyhow::bail!("--by must name an approver");
    }

    let config = Config::load(root).context("failed to load config")?;
    let mut release = Release::load(root, slug)?;

    if release.phase != ReleasePhase::Planned {
        anyhow::bail!(
            "release '{slug}' is in phase '{}'; approvals are recorded at 'planned'",
            release.phase
        );
    }

    let env = config.environment(&release.environment)?;
    release.record_approval(by, note);
    release.can_transition_to(
        ReleasePhase::Approved,
        env.require_approval,
        config.gateway.is_some(),
    )?;
    release.advance(ReleasePhase::Approved);

    let outcome = format!("approved by {by}");
    persist_step(root, &release, StepAction::AwaitApproval, &outcome)?;

    let mut state = State::load(root)?;
    state.clear_blocked(slug);
    state.save(root)?;

    if json {
        return print_json(&release.approvals);
    }
    println!("Recorded approval by {by} for release '{slug}'.");
    println!("Next: drydock apply {slug}");
    Ok(())
}
