use crate::config::Config;
use crate::error::Result;
use crate::runner;
use serde::Serialize;
use std::path::Path;

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub changed_paths: Vec<String>,
    pub changed_services: Vec<String>,
    pub gateway_changed: bool,
    /// True when a shared path changed and forced the full service set.
    pub shared_path_hit: bool,
}

/// Files changed between the diff base and the release SHA. Three-dot diff,
/// so the base is the merge-base — the same set CI change detection sees.
pub fn changed_paths(root: &Path, base: &str, sha: &str) -> Result<Vec<String>> {
    runner::require(runner::GIT)?;
    let range = format!("{base}...{sha}");
    let out = runner::git(&["diff", "--name-only", &range], root).run_capture()?;
    Ok(out
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

/// Map changed paths onto the configured services. Pure so the mapping rules
/// are testable without a git repo.
pub fn match_services(paths: &[String], config: &Config) -> Detection {
    let shared_path_hit = paths.iter().any(|p| {
        config
            .shared_paths
            .iter()
            .any(|shared| path_is_under(p, shared))
    });

    let gateway_changed = config
        .gateway
        .as_ref()
        .map(|gw| paths.iter().any(|p| path_is_under(p, &gw.path)))
        .unwrap_or(false);

    // Config order keeps build output deterministic.
    let changed_services: Vec<String> = config
        .services
        .iter()
        .filter(|svc| {
            shared_path_hit || paths.iter().any(|p| path_is_under(p, &svc.path))
        })
        .map(|svc| svc.name.clone())
        .collect();

    Detection {
        changed_paths: paths.to_vec(),
        changed_services,
        gateway_changed,
        shared_path_hit,
    }
}

pub fn detect(root: &Path, config: &Config, base: &str, sha: &str) -> Result<Detection> {
    let paths = changed_paths(root, base, sha)?;
    let detection = match_services(&paths, config);
    tracing::info!(
        changed = detection.changed_services.len(),
        gateway = detection.gateway_changed,
        "change detection complete"
    );
    Ok(detection)
}

/// Component-wise prefix match: `services/agent/main.py` is under
/// `services/agent` but `services/agent-v2/x` is not.
fn path_is_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return false;
    }
    path == prefix || path.starts_with(&format!("{prefix}/"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

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
  - name: habits
    path: services/habits
gateway:
  name: gateway
  path: gateway
shared_paths:
  - libs/common
environments: {}
"#,
        )
        .unwrap()
    }

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn maps_paths_to_owning_service() {
        let d = match_services(
            &paths(&["services/agent/main.py", "services/journal/api.py"]),
            &config(),
        );
        assert_eq!(d.changed_services, vec!["agent", "journal"]);
        assert!(!d.gateway_changed);
        assert!(!d.shared_path_hit);
    }

    #[test]
    fn no_partial_component_match() {
        let d = match_services(&paths(&["services/agent-v2/main.py"]), &config());
        assert!(d.changed_services.is_empty());
    }

    #[test]
    fn shared_path_marks_all_services() {
        let d = match_services(&paths(&["libs/common/models.py"]), &config());
        assert_eq!(d.changed_services, vec!["agent", "journal", "habits"]);
        assert!(d.shared_path_hit);
    }

    #[test]
    fn gateway_change_is_flagged_not_built() {
        let d = match_services(&paths(&["gateway/supergraph.yaml"]), &config());
        assert!(d.gateway_changed);
        assert!(d.changed_services.is_empty());
    }

    #[test]
    fn docs_only_diff_changes_nothing() {
        let d = match_services(&paths(&["README.md", "docs/runbook.md"]), &config());
        assert!(d.changed_services.is_empty());
        assert!(!d.gateway_changed);
    }

    #[test]
    fn service_order_follows_config() {
        let d = match_services(
            &paths(&["services/habits/x.py", "services/agent/y.py"]),
            &config(),
        );
        assert_eq!(d.changed_services, vec!["agent", "habits"]);
    }
}
