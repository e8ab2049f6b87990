use crate::output::print_json;
use anyhow::Context;
use drydock_core::{io, paths, state::State};
use std::path::Path;

const STARTER_CONFIG: &str = r#"version: 1
project:
  name: {project}
services: []
# services:
#   - name: agent
#     path: services/agent
#   - name: journal
#     path: services/journal
# gateway:
#   name: gateway
#   path: gateway
#   url_build_args:
#     agent: AGENT_SERVICE_URL
# shared_paths:
#   - libs/common
environments: {}
# environments:
#   staging:
#     registry: europe-west1-docker.pkg.dev/my-project-staging/services
#     terraform_dir: infra/envs/staging
#     var_file: infra/envs/staging/images.auto.tfvars
#   production:
#     registry: europe-west1-docker.pkg.dev/my-project-prod/services
#     terraform_dir: infra/envs/prod
#     var_file: infra/envs/prod/images.auto.tfvars
#     require_approval: true
"#;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    io::ensure_dir(&root.join(paths::RELEASES_DIR))?;
    io::ensure_dir(&root.join(paths::PLANS_DIR))?;

    let project = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());

    let config = STARTER_CONFIG.replace("{project}", &project);
    let wrote_config = io::write_if_missing(&paths::config_path(root), config.as_bytes())
        .context("failed to write config")?;

    let wrote_state = if paths::state_path(root).exists() {
        false
    } else {
        State::new(&project).save(root).context("failed to write state")?;
        true
    };

    // Plan files are binary and environment-specific; never commit them.
    io::ensure_gitignore_entry(root, ".drydock/plans/")?;

    if json {
        return print_json(&serde_json::json!({
            "root": root.display().to_string(),
            "wrote_config": wrote_config,
            "wrote_state": wrote_state,
        }));
    }

    if wrote_config {
        println!("Initialized drydock in {}", root.display());
        println!("Edit .drydock/config.yaml to declare services and environments,");
        println!("then run: drydock config validate");
    } else {
        println!("drydock already initialized in {}", root.display());
    }
    if wrote_state {
        tracing::debug!("created state file");
    }
    Ok(())
}
