use crate::output::{print_json, print_table};
use drydock_core::runner;
use std::path::Path;

const TOOLS: &[(&str, &str)] = &[
    ("git", "change detection"),
    ("docker", "image build and push"),
    ("tofu", "plan/apply (preferred)"),
    ("terraform", "plan/apply (fallback)"),
];

/// Report tool availability. Informational only; a missing tool fails the
/// step that needs it, with a sharper error.
pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let found: Vec<(&str, &str, bool)> = TOOLS
        .iter()
        .map(|(name, purpose)| (*name, *purpose, runner::available(name)))
        .collect();

    if json {
        let entries: Vec<_> = found
            .iter()
            .map(|(name, purpose, available)| {
                serde_json::json!({
                    "tool": name,
                    "purpose": purpose,
                    "available": available,
                })
            })
            .collect();
        return print_json(&entries);
    }

    println!("Checking tools for {}", root.display());
    let rows: Vec<Vec<String>> = found
        .iter()
        .map(|(name, purpose, available)| {
            vec![
                name.to_string(),
                if *available { "ok" } else { "missing" }.to_string(),
                purpose.to_string(),
            ]
        })
        .collect();
    print_table(&["TOOL", "STATUS", "PURPOSE"], rows);

    if !found.iter().any(|(n, _, a)| (*n == "tofu" || *n == "terraform") && *a) {
        println!("\nNo IaC binary found; install tofu (or terraform) before planning.");
    }
    Ok(())
}
