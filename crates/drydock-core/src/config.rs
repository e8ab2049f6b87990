use crate::error::{DrydockError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

fn warn(message: impl Into<String>) -> ConfigWarning {
    ConfigWarning {
        level: WarnLevel::Warning,
        message: message.into(),
    }
}

fn err(message: impl Into<String>) -> ConfigWarning {
    ConfigWarning {
        level: WarnLevel::Error,
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// ServiceConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    /// Source directory, relative to the repo root. Used both for change
    /// detection (path prefix match) and as the docker build context.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
}

impl ServiceConfig {
    pub fn dockerfile(&self) -> String {
        self.dockerfile
            .clone()
            .unwrap_or_else(|| format!("{}/Dockerfile", self.path))
    }
}

// ---------------------------------------------------------------------------
// GatewayConfig
// ---------------------------------------------------------------------------

/// The API gateway is a special service: it is never built in the backend
/// build phase because its supergraph composition needs the backend service
/// URLs as build-time inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    /// Override of the build-arg name per backend service. Anything not
    /// listed gets `{SERVICE}_SERVICE_URL` (uppercased, hyphens to
    /// underscores).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub url_build_args: BTreeMap<String, String>,
    /// Terraform variable carrying the gateway image ref in the rendered
    /// var file.
    #[serde(default = "default_gateway_var")]
    pub image_var: String,
}

fn default_gateway_var() -> String {
    "gateway_image".to_string()
}

impl GatewayConfig {
    pub fn dockerfile(&self) -> String {
        self.dockerfile
            .clone()
            .unwrap_or_else(|| format!("{}/Dockerfile", self.path))
    }

    pub fn build_arg_for(&self, service: &str) -> String {
        self.url_build_args.get(service).cloned().unwrap_or_else(|| {
            format!(
                "{}_SERVICE_URL",
                service.to_ascii_uppercase().replace('-', "_")
            )
        })
    }
}

// ---------------------------------------------------------------------------
// EnvironmentConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Image registry prefix, e.g. `europe-west1-docker.pkg.dev/myapp-prod/services`.
    pub registry: String,
    /// Directory holding the environment's root module.
    pub terraform_dir: String,
    /// Var file the renderer owns a managed block in, e.g.
    /// `infra/envs/prod/images.auto.tfvars`.
    pub var_file: String,
    #[serde(default)]
    pub require_approval: bool,
    /// Terraform output whose value maps service name to URL.
    #[serde(default = "default_url_output")]
    pub url_output: String,
}

fn default_url_output() -> String {
    "service_urls".to_string()
}

// ---------------------------------------------------------------------------
// ToolsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IacPreference {
    #[default]
    Auto,
    Tofu,
    Terraform,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub iac: IacPreference,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,
    /// Paths whose changes affect every service (shared libraries, proto
    /// definitions). A diff touching one of these marks all services changed.
    #[serde(default)]
    pub shared_paths: Vec<String>,
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(DrydockError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&data)?;
        Ok(config)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&paths::config_path(root), data.as_bytes())
    }

    pub fn service(&self, name: &str) -> Result<&ServiceConfig> {
        self.services
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| DrydockError::ServiceNotFound(name.to_string()))
    }

    pub fn environment(&self, name: &str) -> Result<&EnvironmentConfig> {
        self.environments
            .get(name)
            .ok_or_else(|| DrydockError::EnvironmentNotFound(name.to_string()))
    }

    // ---------------------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.services.is_empty() {
            warnings.push(warn("no services configured; detect will never match"));
        }

        let mut seen = std::collections::HashSet::new();
        for svc in &self.services {
            if paths::validate_slug(&svc.name).is_err() {
                warnings.push(err(format!("invalid service name: '{}'", svc.name)));
            }
            if !seen.insert(svc.name.as_str()) {
                warnings.push(err(format!("duplicate service name: '{}'", svc.name)));
            }
            if svc.path.trim().is_empty() {
                warnings.push(err(format!("service '{}' has an empty path", svc.name)));
            }
        }

        if let Some(gw) = &self.gateway {
            if seen.contains(gw.name.as_str()) {
                warnings.push(err(format!(
                    "gateway name '{}' collides with a backend service",
                    gw.name
                )));
            }
            for svc in gw.url_build_args.keys() {
                if !seen.contains(svc.as_str()) {
                    warnings.push(warn(format!(
                        "gateway url_build_args references unknown service '{svc}'"
                    )));
                }
            }
        } else {
            warnings.push(warn(
                "no gateway configured; releases complete without a compose phase",
            ));
        }

        if self.environments.is_empty() {
            warnings.push(err("no environments configured"));
        }
        for (name, env) in &self.environments {
            if paths::validate_slug(name).is_err() {
                warnings.push(err(format!("invalid environment name: '{name}'")));
            }
            if env.registry.trim().is_empty() {
                warnings.push(err(format!("environment '{name}' has an empty registry")));
            }
            if env.terraform_dir.trim().is_empty() {
                warnings.push(err(format!(
                    "environment '{name}' has an empty terraform_dir"
                )));
            }
            if env.var_file.trim().is_empty() {
                warnings.push(err(format!("environment '{name}' has an empty var_file")));
            }
        }

        warnings
    }

    pub fn has_errors(warnings: &[ConfigWarning]) -> bool {
        warnings.iter().any(|w| w.level == WarnLevel::Error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
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
    registry: europe-west1-docker.pkg.dev/mm-staging/services
    terraform_dir: infra/envs/staging
    var_file: infra/envs/staging/images.auto.tfvars
  production:
    registry: europe-west1-docker.pkg.dev/mm-prod/services
    terraform_dir: infra/envs/prod
    var_file: infra/envs/prod/images.auto.tfvars
    require_approval: true
"#,
        )
        .unwrap()
    }

    #[test]
    fn sample_config_is_clean() {
        let cfg = sample();
        let warnings = cfg.validate();
        assert!(!Config::has_errors(&warnings), "{warnings:?}");
        assert_eq!(cfg.version, 1);
        assert!(!cfg.environment("staging").unwrap().require_approval);
        assert!(cfg.environment("production").unwrap().require_approval);
    }

    #[test]
    fn unknown_environment_errors() {
        let cfg = sample();
        assert!(matches!(
            cfg.environment("qa"),
            Err(DrydockError::EnvironmentNotFound(_))
        ));
    }

    #[test]
    fn duplicate_service_is_error() {
        let mut cfg = sample();
        cfg.services.push(ServiceConfig {
            name: "agent".to_string(),
            path: "other".to_string(),
            dockerfile: None,
        });
        let warnings = cfg.validate();
        assert!(Config::has_errors(&warnings));
    }

    #[test]
    fn dockerfile_defaults_to_context() {
        let cfg = sample();
        assert_eq!(
            cfg.service("agent").unwrap().dockerfile(),
            "services/agent/Dockerfile"
        );
    }

    #[test]
    fn gateway_build_arg_naming() {
        let cfg = sample();
        let gw = cfg.gateway.as_ref().unwrap();
        assert_eq!(gw.build_arg_for("agent"), "AGENT_URL");
        assert_eq!(gw.build_arg_for("meal-plans"), "MEAL_PLANS_SERVICE_URL");
    }

    #[test]
    fn url_output_default() {
        let cfg = sample();
        assert_eq!(cfg.environment("staging").unwrap().url_output, "service_urls");
    }

    #[test]
    fn iac_preference_default_is_auto() {
        let cfg = sample();
        assert_eq!(cfg.tools.iac, IacPreference::Auto);
    }
}
