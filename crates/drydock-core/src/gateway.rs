//! Gateway recomposition, the second phase of a deploy.
//!
//! The gateway's supergraph is composed at image build time, so the backend
//! service URLs recorded at apply are fed in as `--build-arg`s. Composition
//! refuses to run while any backend URL is missing.

use crate::config::{Config, EnvironmentConfig, GatewayConfig, ServiceConfig};
use crate::error::{DrydockError, Result};
use crate::image::{self, ImageRef};
use crate::release::Release;
use crate::runner::Invocation;
use crate::tfvars;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// One build arg per configured backend service. Every service must have a
/// URL — a gateway composed against a partial set would route into the void.
pub fn compose_build_args(config: &Config, release: &Release) -> Result<Vec<(String, String)>> {
    let gw = gateway_of(config)?;
    let mut args = Vec::with_capacity(config.services.len());
    for svc in &config.services {
        let url = release
            .service_urls
            .get(&svc.name)
            .ok_or_else(|| DrydockError::MissingServiceUrl {
                service: svc.name.clone(),
            })?;
        args.push((gw.build_arg_for(&svc.name), url.clone()));
    }
    Ok(args)
}

pub fn gateway_image_ref(env: &EnvironmentConfig, gw: &GatewayConfig, release: &Release) -> ImageRef {
    ImageRef::new(env, gw.name.clone(), release.tag())
}

/// The docker invocations for a compose, without running them. Dry-run and
/// tests go through this.
pub fn compose_invocations(
    root: &Path,
    config: &Config,
    env: &EnvironmentConfig,
    release: &Release,
) -> Result<Vec<Invocation>> {
    let gw = gateway_of(config)?;
    let image = gateway_image_ref(env, gw, release);
    let build_args = compose_build_args(config, release)?;
    let build_ctx = as_service(gw);
    Ok(vec![
        image::build_invocation(root, &build_ctx, &image, &build_args),
        image::push_invocation(root, &image),
    ])
}

/// Build and push the gateway image. Returns the pushed reference.
pub fn compose(
    root: &Path,
    config: &Config,
    env: &EnvironmentConfig,
    release: &Release,
    timeout: Option<Duration>,
) -> Result<ImageRef> {
    let gw = gateway_of(config)?;
    let image = gateway_image_ref(env, gw, release);
    let build_args = compose_build_args(config, release)?;
    image::build_and_push(root, &as_service(gw), &image, &build_args, timeout)?;
    Ok(image)
}

/// Write the gateway image ref into the environment's managed var block,
/// leaving the service image entries untouched.
pub fn render_gateway_var(
    root: &Path,
    env: &EnvironmentConfig,
    gw: &GatewayConfig,
    image: &str,
) -> Result<()> {
    let path = root.join(&env.var_file);
    tfvars::write_images(&path, &BTreeMap::new(), Some((&gw.image_var, image)))?;
    Ok(())
}

fn gateway_of(config: &Config) -> Result<&GatewayConfig> {
    config
        .gateway
        .as_ref()
        .ok_or_else(|| DrydockError::ServiceNotFound("gateway".to_string()))
}

fn as_service(gw: &GatewayConfig) -> ServiceConfig {
    ServiceConfig {
        name: gw.name.clone(),
        path: gw.path.clone(),
        dockerfile: gw.dockerfile.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    fn config() -> Config {
        serde_yaml::from_str(
            r#"
project:
  name: mindmirror
services:
  - name: agent
    path: services/agent
  - name: journal
    path: services/journal
gateway:
  name: gateway
  path: gateway
  url_build_args:
    agent: AGENT_URL
environments:
  staging:
    registry: reg.example/mm
    terraform_dir: infra/envs/staging
    var_file: infra/envs/staging/images.auto.tfvars
"#,
        )
        .unwrap()
    }

    fn applied_release() -> Release {
        let mut r = Release::new(
            "v1.4.0-staging",
            "staging",
            Version::new(1, 4, 0),
            "abc1234",
            "origin/main",
        )
        .unwrap();
        r.record_urls(
            [
                ("agent".to_string(), "https://agent.a.run.app".to_string()),
                ("journal".to_string(), "https://journal.a.run.app".to_string()),
            ]
            .into_iter()
            .collect(),
        );
        r
    }

    #[test]
    fn build_args_cover_every_service() {
        let args = compose_build_args(&config(), &applied_release()).unwrap();
        assert_eq!(
            args,
            vec![
                ("AGENT_URL".to_string(), "https://agent.a.run.app".to_string()),
                (
                    "JOURNAL_SERVICE_URL".to_string(),
                    "https://journal.a.run.app".to_string()
                ),
            ]
        );
    }

    #[test]
    fn missing_url_blocks_compose() {
        let mut release = applied_release();
        release.service_urls.remove("journal");
        let err = compose_build_args(&config(), &release).unwrap_err();
        match err {
            DrydockError::MissingServiceUrl { service } => assert_eq!(service, "journal"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn compose_invocations_build_then_push() {
        let cfg = config();
        let env = cfg.environment("staging").unwrap();
        let invs =
            compose_invocations(Path::new("/repo"), &cfg, env, &applied_release()).unwrap();
        assert_eq!(invs.len(), 2);
        assert_eq!(invs[0].args[0], "build");
        assert!(invs[0]
            .rendered()
            .contains("AGENT_URL=https://agent.a.run.app"));
        assert_eq!(invs[1].args[0], "push");
        assert!(invs[1].args[1].ends_with("gateway:v1.4.0-abc1234"));
    }

    #[test]
    fn gateway_image_uses_release_tag() {
        let cfg = config();
        let env = cfg.environment("staging").unwrap();
        let image = gateway_image_ref(env, cfg.gateway.as_ref().unwrap(), &applied_release());
        assert_eq!(image.to_string(), "reg.example/mm/gateway:v1.4.0-abc1234");
    }
}
