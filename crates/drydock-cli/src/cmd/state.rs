use crate::output::{print_json, print_table_indented};
use anyhow::Context;
use drydock_core::{release::Release, state::State, types::ReleasePhase};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let state = State::load(root).context("failed to load state")?;
    let releases = Release::list(root).unwrap_or_default();

    if json {
        #[derive(serde::Serialize)]
        struct ReleaseSummary<'a> {
            slug: &'a str,
            environment: &'a str,
            version: String,
            phase: ReleasePhase,
            aborted: bool,
        }

        #[derive(serde::Serialize)]
        struct StateOutput<'a> {
            project: &'a str,
            releases: Vec<ReleaseSummary<'a>>,
            active: &'a [String],
            recent_steps: &'a [drydock_core::state::HistoryEntry],
            blocked: &'a [drydock_core::state::BlockedItem],
        }

        let summaries: Vec<ReleaseSummary> = releases
            .iter()
            .map(|r| ReleaseSummary {
                slug: &r.slug,
                environment: &r.environment,
                version: r.version.to_string(),
                phase: r.phase,
                aborted: r.aborted,
            })
            .collect();

        return print_json(&StateOutput {
            project: &state.project,
            releases: summaries,
            active: &state.active_releases,
            recent_steps: history_tail(&state, HISTORY_TAIL),
            blocked: &state.blocked,
        });
    }

    // -- Human-readable output ------------------------------------------------

    println!("Project: {}", state.project);

    if releases.is_empty() {
        println!("Releases: 0");
        println!("\nNo releases yet. Run: drydock release create <slug> --env <environment> --version <vX.Y.Z>");
        return Ok(());
    }

    println!("\nReleases:");
    let rows: Vec<Vec<String>> = releases
        .iter()
        .map(|r| {
            vec![
                r.slug.clone(),
                r.environment.clone(),
                r.version.to_string(),
                r.phase.to_string(),
                release_status(r).to_string(),
            ]
        })
        .collect();
    print_table_indented(&["SLUG", "ENV", "VERSION", "PHASE", "STATUS"], rows, 2);

    let tail = history_tail(&state, HISTORY_TAIL);
    if !tail.is_empty() {
        println!("\nRecent steps:");
        for entry in tail {
            println!(
                "  {} {} ({})",
                entry.release, entry.step, entry.outcome
            );
        }
    }

    if !state.blocked.is_empty() {
        println!("\nBlocked:");
        for b in &state.blocked {
            println!("  {} {}", b.release, truncate(&b.reason, 50));
        }
    }

    Ok(())
}

const HISTORY_TAIL: usize = 5;

fn history_tail(state: &State, n: usize) -> &[drydock_core::state::HistoryEntry] {
    let start = state.history.len().saturating_sub(n);
    &state.history[start..]
}

/// Char-aware truncation; reasons can carry non-ASCII environment names.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

fn release_status(r: &Release) -> &'static str {
    if r.aborted {
        "aborted"
    } else if r.phase == ReleasePhase::Released {
        "done"
    } else if r.is_empty_release() {
        "empty"
    } else {
        ""
    }
}
