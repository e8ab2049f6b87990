use crate::cmd::persist_step;
use crate::output::print_json;
use anyhow::Context;
use drydock_core::{
    config::Config, detect, release::Release, state::State, types::{ReleasePhase, StepAction},
};
use std::path::Path;

pub fn run(root: &Path, slug: &str, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let mut release = Release::load(root, slug)?;

    release.can_transition_to(
        ReleasePhase::Detected,
        false,
        config.gateway.is_some(),
    )?;

    let detection = detect::detect(root, &config, &release.base_ref, &release.sha)
        .context("change detection failed")?;

    release.record_detection(
        detection.changed_services.clone(),
        detection.gateway_changed,
    );
    release.advance(ReleasePhase::Detected);

    let outcome = format!(
        "{} service(s) changed{}",
        detection.changed_services.len(),
        if detection.gateway_changed {
            ", gateway changed"
        } else {
            ""
        }
    );
    persist_step(root, &release, StepAction::DetectChanges, &outcome)?;

    if release.is_empty_release() {
        let mut state = State::load(root)?;
        state.remove_active_release(slug);
        state.save(root)?;
    }

    if json {
        return print_json(&detection);
    }

    if detection.changed_paths.is_empty() {
        println!("No files changed between {} and {}.", release.base_ref, release.sha);
    } else {
        println!(
            "{} file(s) changed between {} and {}.",
            detection.changed_paths.len(),
            release.base_ref,
            release.sha
        );
    }

    if release.is_empty_release() {
        println!("No services or gateway affected; release '{slug}' is complete with nothing to ship.");
        return Ok(());
    }

    if !detection.changed_services.is_empty() {
        println!("\nChanged services:");
        for svc in &detection.changed_services {
            println!("  {svc}");
        }
        if detection.shared_path_hit {
            println!("  (a shared path changed; all services marked)");
        }
    }
    if detection.gateway_changed {
        println!("\nGateway source changed (rebuilt during compose regardless).");
    }
    println!("\nNext: drydock build {slug}");
    Ok(())
}
