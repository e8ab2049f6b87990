//! Plan/apply orchestration against the environment's root module.
//!
//! The plan is always saved to a file and the apply replays that exact file,
//! so what was reviewed (and approved, for production) is what runs.

use crate::config::EnvironmentConfig;
use crate::error::{DrydockError, Result};
use crate::release::PlanSummary;
use crate::runner::{IacBinary, Invocation};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Invocations
// ---------------------------------------------------------------------------

pub fn init_invocation(iac: IacBinary, dir: &Path) -> Invocation {
    Invocation::new(
        iac.name(),
        vec!["init".to_string(), "-input=false".to_string()],
    )
    .in_dir(dir)
}

pub fn plan_invocation(
    iac: IacBinary,
    dir: &Path,
    var_file: &Path,
    out_file: &Path,
) -> Invocation {
    Invocation::new(
        iac.name(),
        vec![
            "plan".to_string(),
            "-input=false".to_string(),
            "-no-color".to_string(),
            format!("-var-file={}", var_file.display()),
            format!("-out={}", out_file.display()),
        ],
    )
    .in_dir(dir)
}

pub fn apply_invocation(iac: IacBinary, dir: &Path, plan_file: &Path) -> Invocation {
    Invocation::new(
        iac.name(),
        vec![
            "apply".to_string(),
            "-input=false".to_string(),
            "-no-color".to_string(),
            plan_file.display().to_string(),
        ],
    )
    .in_dir(dir)
}

pub fn output_invocation(iac: IacBinary, dir: &Path) -> Invocation {
    Invocation::new(
        iac.name(),
        vec!["output".to_string(), "-json".to_string()],
    )
    .in_dir(dir)
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

static PLAN_RE: OnceLock<Regex> = OnceLock::new();

fn plan_re() -> &'static Regex {
    PLAN_RE.get_or_init(|| {
        Regex::new(r"Plan:\s*(\d+)\s+to add,\s*(\d+)\s+to change,\s*(\d+)\s+to destroy").unwrap()
    })
}

/// Pull the resource counts out of plan output. "No changes." plans report
/// zeros rather than failing.
pub fn parse_plan_summary(output: &str) -> Result<PlanSummary> {
    if let Some(caps) = plan_re().captures(output) {
        let n = |i: usize| caps[i].parse::<u32>().unwrap_or(u32::MAX);
        return Ok(PlanSummary {
            add: n(1),
            change: n(2),
            destroy: n(3),
        });
    }
    if output.contains("No changes.") {
        return Ok(PlanSummary {
            add: 0,
            change: 0,
            destroy: 0,
        });
    }
    Err(DrydockError::ToolOutput {
        tool: "plan".to_string(),
        reason: "no plan summary line found".to_string(),
    })
}

/// Parse `output -json` and extract the configured URL map output. The
/// output's value must be an object of service name to URL string.
pub fn parse_service_urls(json: &str, output_name: &str) -> Result<BTreeMap<String, String>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let entry = value.get(output_name).ok_or_else(|| DrydockError::ToolOutput {
        tool: "output".to_string(),
        reason: format!("output '{output_name}' not found"),
    })?;
    let map = entry
        .get("value")
        .and_then(|v| v.as_object())
        .ok_or_else(|| DrydockError::ToolOutput {
            tool: "output".to_string(),
            reason: format!("output '{output_name}' is not an object"),
        })?;

    let mut urls = BTreeMap::new();
    for (service, url) in map {
        let url = url.as_str().ok_or_else(|| DrydockError::ToolOutput {
            tool: "output".to_string(),
            reason: format!("url for '{service}' is not a string"),
        })?;
        urls.insert(service.clone(), url.to_string());
    }
    Ok(urls)
}

// ---------------------------------------------------------------------------
// High-level operations
// ---------------------------------------------------------------------------

/// Run `init` once per working directory. Re-running init on an initialized
/// module is safe but slow, so skip when `.terraform/` already exists.
pub fn ensure_init(iac: IacBinary, dir: &Path, timeout: Option<Duration>) -> Result<()> {
    if dir.join(".terraform").is_dir() {
        return Ok(());
    }
    tracing::info!(dir = %dir.display(), "initializing module");
    init_invocation(iac, dir).run_collect(timeout)?;
    Ok(())
}

pub fn run_plan(
    root: &Path,
    iac: IacBinary,
    env: &EnvironmentConfig,
    plan_file: &Path,
    timeout: Option<Duration>,
) -> Result<PlanSummary> {
    let dir = root.join(&env.terraform_dir);
    ensure_init(iac, &dir, timeout)?;
    if let Some(parent) = plan_file.parent() {
        crate::io::ensure_dir(parent)?;
    }
    let var_file = root.join(&env.var_file);
    let output = plan_invocation(iac, &dir, &var_file, plan_file).run_collect(timeout)?;
    let summary = parse_plan_summary(&output)?;
    tracing::info!(%summary, "plan complete");
    Ok(summary)
}

pub fn run_apply(
    root: &Path,
    iac: IacBinary,
    env: &EnvironmentConfig,
    plan_file: &Path,
    timeout: Option<Duration>,
) -> Result<()> {
    let dir = root.join(&env.terraform_dir);
    apply_invocation(iac, &dir, plan_file).run_collect(timeout)?;
    Ok(())
}

pub fn read_service_urls(
    root: &Path,
    iac: IacBinary,
    env: &EnvironmentConfig,
) -> Result<BTreeMap<String, String>> {
    let dir = root.join(&env.terraform_dir);
    let json = output_invocation(iac, &dir).run_capture()?;
    parse_service_urls(&json, &env.url_output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
