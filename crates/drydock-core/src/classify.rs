use crate::config::Config;
use crate::error::Result;
use crate::release::Release;
use crate::types::{ReleasePhase, StepAction};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Classification (output)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub release: String,
    pub environment: String,
    pub current_phase: ReleasePhase,
    pub action: StepAction,
    pub message: String,
    /// Suggested CLI invocation for the action, empty when done/blocked.
    pub next_command: String,
    /// Advisory hints for driver loops.
    pub is_heavy: bool,
    pub timeout_minutes: u32,
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Determine the next step for a release. The pipeline is linear, so this is
/// a phase match rather than a rule table; the interesting branches are the
/// zero-change short circuit, the approval gate, and the no-gateway tail.
pub fn classify(release: &Release, config: &Config) -> Result<Classification> {
    let env = config.environment(&release.environment)?;
    let slug = &release.slug;

    let (action, message, next_command) = if release.aborted {
        (
            StepAction::Done,
            format!("Release '{slug}' was aborted"),
            String::new(),
        )
    } else {
        match release.phase {
            ReleasePhase::Created => (
                StepAction::DetectChanges,
                format!("Detect changed services against {}", release.base_ref),
                format!("drydock detect {slug}"),
            ),
            ReleasePhase::Detected => {
                if release.is_empty_release() {
                    (
                        StepAction::Done,
                        "No services or gateway changed; nothing to ship".to_string(),
                        String::new(),
                    )
                } else {
                    (
                        StepAction::BuildImages,
                        format!(
                            "Build and push {} image(s) tagged {}",
                            release.changed_services.len(),
                            release.tag()
                        ),
                        format!("drydock build {slug}"),
                    )
                }
            }
            ReleasePhase::Built => (
                StepAction::RenderVars,
                format!("Render image refs into {}", env.var_file),
                format!("drydock render {slug}"),
            ),
            ReleasePhase::Rendered => (
                StepAction::Plan,
                format!("Plan {} against {}", release.environment, env.terraform_dir),
                format!("drydock plan {slug}"),
            ),
            ReleasePhase::Planned => {
                if env.require_approval && release.approvals.is_empty() {
                    (
                        StepAction::AwaitApproval,
                        format!(
                            "Environment '{}' requires approval before apply",
                            release.environment
                        ),
                        format!("drydock approve {slug} --by <you>"),
                    )
                } else {
                    (
                        StepAction::Apply,
                        "Apply the saved plan".to_string(),
                        format!("drydock apply {slug}"),
                    )
                }
            }
            ReleasePhase::Approved => (
                StepAction::Apply,
                "Apply the saved plan".to_string(),
                format!("drydock apply {slug}"),
            ),
            ReleasePhase::Applied => {
                if config.gateway.is_some() {
                    (
                        StepAction::ComposeGateway,
                        "Rebuild the gateway against the deployed service URLs".to_string(),
                        format!("drydock compose {slug}"),
                    )
                } else {
                    (
                        StepAction::Done,
                        "No gateway configured; release is complete".to_string(),
                        String::new(),
                    )
                }
            }
            ReleasePhase::Composed => (
                StepAction::DeployGateway,
                "Render, plan and apply the gateway image".to_string(),
                format!("drydock finalize {slug}"),
            ),
            ReleasePhase::Released => (
                StepAction::Done,
                format!("Release '{slug}' is fully deployed"),
                String::new(),
            ),
        }
    };

    Ok(Classification {
        release: slug.clone(),
        environment: release.environment.clone(),
        current_phase: release.phase,
        action,
        message,
        next_command,
        is_heavy: action.is_heavy(),
        timeout_minutes: action.timeout_minutes(),
    })
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
gateway:
  name: gateway
  path: gateway
environments:
  staging:
    registry: reg.example/mm
    terraform_dir: infra/envs/staging
    var_file: infra/envs/staging/images.auto.tfvars
  production:
    registry: reg.example/mm-prod
    terraform_dir: infra/envs/prod
    var_file: infra/envs/prod/images.auto.tfvars
    require_approval: true
"#,
        )
        .unwrap()
    }

    fn release(env: &str) -> Release {
        Release::new(
            format!("v1.4.0-{env}"),
            env,
            Version::new(1, 4, 0),
            "abc1234",
            "origin/main",
        )
        .unwrap()
    }

    #[test]
    fn fresh_release_detects_first() {
        let c = classify(&release("staging"), &config()).unwrap();
        assert_eq!(c.action, StepAction::DetectChanges);
        assert_eq!(c.next_command, "drydock detect v1.4.0-staging");
    }

    #[test]
    fn zero_change_release_is_done() {
        let mut r = release("staging");
        r.advance(ReleasePhase::Detected);
        r.record_detection(vec![], false);
        let c = classify(&r, &config()).unwrap();
        assert_eq!(c.action, StepAction::Done);
    }

    #[test]
    fn planned_production_awaits_approval() {
        let mut r = release("production");
        r.advance(ReleasePhase::Detected);
        r.record_detection(vec!["agent".to_string()], false);
        for p in [
            ReleasePhase::Built,
            ReleasePhase::Rendered,
            ReleasePhase::Planned,
        ] {
            r.advance(p);
        }
        let c = classify(&r, &config()).unwrap();
        assert_eq!(c.action, StepAction::AwaitApproval);

        r.record_approval("ops", None);
        let c = classify(&r, &config()).unwrap();
        assert_eq!(c.action, StepAction::Apply);
    }

    #[test]
    fn planned_staging_applies_directly() {
        let mut r = release("staging");
        for p in [
            ReleasePhase::Detected,
            ReleasePhase::Built,
            ReleasePhase::Rendered,
            ReleasePhase::Planned,
        ] {
            r.advance(p);
        }
        let c = classify(&r, &config()).unwrap();
        assert_eq!(c.action, StepAction::Apply);
    }

    #[test]
    fn applied_release_composes_gateway() {
        let mut r = release("staging");
        for p in [
            ReleasePhase::Detected,
            ReleasePhase::Built,
            ReleasePhase::Rendered,
            ReleasePhase::Planned,
            ReleasePhase::Approved,
            ReleasePhase::Applied,
        ] {
            r.advance(p);
        }
        let c = classify(&r, &config()).unwrap();
        assert_eq!(c.action, StepAction::ComposeGateway);
        assert!(c.is_heavy);
    }

    #[test]
    fn released_is_done() {
        let mut r = release("staging");
        for p in ReleasePhase::all().iter().skip(1) {
            r.advance(*p);
        }
        let c = classify(&r, &config()).unwrap();
        assert_eq!(c.action, StepAction::Done);
    }

    #[test]
    fn aborted_is_done() {
        let mut r = release("staging");
        r.aborted = true;
        let c = classify(&r, &config()).unwrap();
        assert_eq!(c.action, StepAction::Done);
        assert!(c.message.contains("aborted"));
    }
}
