use crate::config::{EnvironmentConfig, ServiceConfig};
use crate::error::Result;
use crate::runner::{self, Invocation};
use crate::version::ImageTag;
use std::fmt;
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ImageRef
// ---------------------------------------------------------------------------

/// A fully qualified image reference: `{registry}/{name}:{tag}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub registry: String,
    pub name: String,
    pub tag: ImageTag,
}

impl ImageRef {
    pub fn new(env: &EnvironmentConfig, name: impl Into<String>, tag: ImageTag) -> Self {
        Self {
            registry: env.registry.trim_end_matches('/').to_string(),
            name: name.into(),
            tag,
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.name, self.tag)
    }
}

// ---------------------------------------------------------------------------
// Docker command construction
// ---------------------------------------------------------------------------

/// `docker build` argv for a backend service. Pure; dry-run and tests
/// inspect the result without docker installed.
pub fn build_invocation(
    root: &Path,
    service: &ServiceConfig,
    image: &ImageRef,
    extra_build_args: &[(String, String)],
) -> Invocation {
    let mut args = vec![
        "build".to_string(),
        "-t".to_string(),
        image.to_string(),
        "-f".to_string(),
        service.dockerfile(),
    ];
    for (key, value) in extra_build_args {
        args.push("--build-arg".to_string());
        args.push(format!("{key}={value}"));
    }
    args.push(service.path.clone());
    Invocation::new(runner::DOCKER, args).in_dir(root)
}

pub fn push_invocation(root: &Path, image: &ImageRef) -> Invocation {
    Invocation::new(
        runner::DOCKER,
        vec!["push".to_string(), image.to_string()],
    )
    .in_dir(root)
}

/// Build and push one image. Docker's own progress output streams to the
/// terminal; we only keep enough stdout to diagnose a failure.
pub fn build_and_push(
    root: &Path,
    service: &ServiceConfig,
    image: &ImageRef,
    extra_build_args: &[(String, String)],
    timeout: Option<Duration>,
) -> Result<()> {
    runner::require(runner::DOCKER)?;
    tracing::info!(image = %image, "building image");
    build_invocation(root, service, image, extra_build_args).run_collect(timeout)?;
    tracing::info!(image = %image, "pushing image");
    push_invocation(root, image).run_collect(timeout)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    fn env() -> EnvironmentConfig {
        serde_yaml::from_str(
            r#"
registry: europe-west1-docker.pkg.dev/mm-staging/services/
terraform_dir: infra/envs/staging
var_file: infra/envs/staging/images.auto.tfvars
"#,
        )
        .unwrap()
    }

    fn tag() -> ImageTag {
        ImageTag::new(Version::new(1, 4, 0), "abc1234").unwrap()
    }

    #[test]
    fn image_ref_format_strips_trailing_slash() {
        let image = ImageRef::new(&env(), "agent", tag());
        assert_eq!(
            image.to_string(),
            "europe-west1-docker.pkg.dev/mm-staging/services/agent:v1.4.0-abc1234"
        );
    }

    #[test]
    fn build_invocation_argv() {
        let service = ServiceConfig {
            name: "agent".to_string(),
            path: "services/agent".to_string(),
            dockerfile: None,
        };
        let image = ImageRef::new(&env(), "agent", tag());
        let inv = build_invocation(Path::new("/repo"), &service, &image, &[]);
        assert_eq!(inv.program, "docker");
        assert_eq!(inv.args[0], "build");
        assert!(inv.args.contains(&"services/agent/Dockerfile".to_string()));
        assert_eq!(inv.args.last().unwrap(), "services/agent");
    }

    #[test]
    fn build_invocation_carries_build_args() {
        let service = ServiceConfig {
            name: "gateway".to_string(),
            path: "gateway".to_string(),
            dockerfile: None,
        };
        let image = ImageRef::new(&env(), "gateway", tag());
        let inv = build_invocation(
            Path::new("/repo"),
            &service,
            &image,
            &[(
                "AGENT_SERVICE_URL".to_string(),
                "https://agent-xyz.a.run.app".to_string(),
            )],
        );
        let rendered = inv.rendered();
        assert!(rendered.contains("--build-arg"));
        assert!(rendered.contains("AGENT_SERVICE_URL=https://agent-xyz.a.run.app"));
    }

    #[test]
    fn push_invocation_argv() {
        let image = ImageRef::new(&env(), "journal", tag());
        let inv = push_invocation(Path::new("/repo"), &image);
        assert_eq!(inv.args[0], "push");
        assert!(inv.args[1].ends_with("journal:v1.4.0-abc1234"));
    }
}
