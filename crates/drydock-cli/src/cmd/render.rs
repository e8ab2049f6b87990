use crate::cmd::persist_step;
use crate::output::print_json;
use anyhow::Context;
use drydock_core::{
    config::Config, release::Release, tfvars, types::{ReleasePhase, StepAction},
};
use std::collections::BTreeMap;
use std::path::Path;

pub fn run(root: &Path, slug: &str, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let mut release = Release::load(root, slug)?;

    release.can_transition_to(
        ReleasePhase::Rendered,
        false,
        config.gateway.is_some(),
    )?;

    let env = config.environment(&release.environment)?;
    let images: BTreeMap<String, String> = release
        .images
        .iter()
        .map(|i| (i.service.clone(), i.image.clone()))
        .collect();

    let var_file = root.join(&env.var_file);
    tfvars::write_images(&var_file, &images, None)
        .with_context(|| format!("failed to render {}", env.var_file))?;

    release.advance(ReleasePhase::Rendered);
    let outcome = format!("{} image ref(s) written to {}", images.len(), env.var_file);
    persist_step(root, &release, StepAction::RenderVars, &outcome)?;

    if json {
        return print_json(&images);
    }
    println!("Rendered {} image ref(s) into {}.", images.len(), env.var_file);
    println!("Unchanged services keep their previous refs.");
    println!("\nNext: drydock plan {slug}");
    Ok(())
}
