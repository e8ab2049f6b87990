pub mod apply;
pub mod approve;
pub mod build;
pub mod compose;
pub mod config;
pub mod deploy;
pub mod detect;
pub mod doctor;
pub mod finalize;
pub mod init;
pub mod next;
pub mod plan;
pub mod release;
pub mod render;
pub mod state;

use anyhow::Context;
use drydock_core::release::Release;
use drydock_core::state::State;
use drydock_core::types::StepAction;
use std::path::Path;

/// Persist a completed step: save the release manifest and append the
/// outcome to the project ledger.
pub(crate) fn persist_step(
    root: &Path,
    release: &Release,
    step: StepAction,
    outcome: &str,
) -> anyhow::Result<()> {
    release.save(root).context("failed to save release")?;
    let mut state = State::load(root).context("failed to load state")?;
    state.record_step(&release.slug, &release.environment, step, outcome);
    if release.phase == drydock_core::types::ReleasePhase::Released {
        state.remove_active_release(&release.slug);
    }
    state.save(root).context("failed to save state")?;
    Ok(())
}
