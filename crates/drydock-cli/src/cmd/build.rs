use crate::cmd::persist_step;
use crate::output::print_json;
use anyhow::Context;
use drydock_core::{
    config::Config,
    image::{self, ImageRef},
    release::Release,
    types::{ReleasePhase, StepAction},
};
use std::path::Path;
use std::time::Duration;

pub fn run(root: &Path, slug: &str, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let mut release = Release::load(root, slug)?;

    if release.phase != ReleasePhase::Detected {
        anyhow::bail!(
            "release '{slug}' is in phase '{}'; build runs from 'detected'",
            release.phase
        );
    }
    if release.is_empty_release() {
        anyhow::bail!("release '{slug}' has no changed services; nothing to build");
    }

    let env = config.environment(&release.environment)?;
    let tag = release.tag();

    if dry_run {
        let mut lines = Vec::new();
        for name in &release.changed_services {
            let service = config.service(name)?;
            let image = ImageRef::new(env, name.clone(), tag.clone());
            lines.push(image::build_invocation(root, service, &image, &[]).rendered());
            lines.push(image::push_invocation(root, &image).rendered());
        }
        if json {
            return print_json(&lines);
        }
        for line in lines {
            println!("{line}");
        }
        return Ok(());
    }

    let timeout = Duration::from_secs(u64::from(StepAction::BuildImages.timeout_minutes()) * 60);
    let changed = release.changed_services.clone();
    for name in &changed {
        let service = config.service(name)?;
        let image = ImageRef::new(env, name.clone(), tag.clone());
        image::build_and_push(root, service, &image, &[], Some(timeout))
            .with_context(|| format!("failed to build image for '{name}'"))?;
        release.record_image(name, &image.to_string());
        // Save after every image so a failed build resumes where it stopped.
        release.save(root)?;
    }

    release.can_transition_to(ReleasePhase::Built, false, config.gateway.is_some())?;
    release.advance(ReleasePhase::Built);
    let outcome = format!("{} image(s) pushed", changed.len());
    persist_step(root, &release, StepAction::BuildImages, &outcome)?;

    if json {
        return print_json(&release.images);
    }
    println!("Built and pushed {} image(s) tagged {tag}:", changed.len());
    for record in &release.images {
        println!("  {}", record.image);
    }
    println!("\nNext: drydock render {slug}");
    Ok(())
}
