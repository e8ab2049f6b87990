use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use drydock_core::{
    config::Config, release::Release, runner, state::State, version::Version,
};
use std::path::Path;
use std::str::FromStr;

#[derive(Subcommand)]
pub enum ReleaseSubcommand {
    /// Create a new release targeting one environment
    #[command(disable_version_flag = true)]
    Create {
        slug: String,
        /// Target environment (must exist in config)
        #[arg(long = "env")]
        environment: String,
        /// Release version, vMAJOR.MINOR.PATCH
        #[arg(long)]
        version: String,
        /// Git SHA to release (default: HEAD)
        #[arg(long)]
        sha: Option<String>,
        /// Diff base (default: last released SHA for the environment, else origin/main)
        #[arg(long)]
        base: Option<String>,
    },
    /// List all releases
    List,
    /// Show release details
    Show { slug: String },
    /// Abort a release; no further transitions are allowed
    Abort { slug: String },
}

pub fn run(root: &Path, subcmd: ReleaseSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ReleaseSubcommand::Create {
            slug,
            environment,
            version,
            sha,
            base,
        } => create(root, &slug, &environment, &version, sha, base, json),
        ReleaseSubcommand::List => list(root, json),
        ReleaseSubcommand::Show { slug } => show(root, &slug, json),
        ReleaseSubcommand::Abort { slug } => abort(root, &slug, json),
    }
}

fn create(
    root: &Path,
    slug: &str,
    environment: &str,
    version: &str,
    sha: Option<String>,
    base: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    config
        .environment(environment)
        .with_context(|| format!("unknown environment '{environment}'"))?;

    let version = Version::from_str(version)?;

    let sha = match sha {
        Some(s) => s,
        None => runner::git_rev_parse(root, "HEAD").context("failed to resolve HEAD")?,
    };

    let base = match base {
        Some(b) => b,
        None => match Release::last_released(root, environment)? {
            Some(prev) => prev.sha,
            None => "origin/main".to_string(),
        },
    };

    let release = Release::create(root, slug, environment, version, sha, base)
        .with_context(|| format!("failed to create release '{slug}'"))?;

    let mut state = State::load(root).context("failed to load state")?;
    state.add_active_release(slug);
    state.save(root).context("failed to save state")?;

    if json {
        print_json(&release)?;
    } else {
        println!(
            "Created release: {slug} — {} of {} for {environment} (base {})",
            release.tag(),
            config.project.name,
            release.base_ref
        );
        println!("Next: drydock detect {slug}");
    }
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let releases = Release::list(root).context("failed to list releases")?;

    if json {
        let summaries: Vec<_> = releases
            .iter()
            .map(|r| {
                serde_json::json!({
                    "slug": r.slug,
                    "environment": r.environment,
                    "version": r.version.to_string(),
                    "sha": r.sha,
                    "phase": r.phase.to_string(),
                    "aborted": r.aborted,
                })
            })
            .collect();
        return print_json(&summaries);
    }

    if releases.is_empty() {
        println!("No releases yet.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = releases
        .iter()
        .map(|r| {
            vec![
                r.slug.clone(),
                r.environment.clone(),
                r.tag().to_string(),
                r.phase.to_string(),
            ]
        })
        .collect();
    print_table(&["SLUG", "ENV", "TAG", "PHASE"], rows);
    Ok(())
}

fn show(root: &Path, slug: &str, json: bool) -> anyhow::Result<()> {
    let release = Release::load(root, slug).with_context(|| format!("release '{slug}' not found"))?;

    if json {
        return print_json(&release);
    }

    println!("Release: {} — {}", release.slug, release.tag());
    println!("Env:     {}", release.environment);
    println!("Base:    {}", release.base_ref);
    println!("Phase:   {}", release.phase);
    println!("Created: {}", release.created_at.format("%Y-%m-%d %H:%M"));

    if !release.changed_services.is_empty() {
        println!("\nChanged services:");
        for svc in &release.changed_services {
            match release.image_for(svc) {
                Some(image) => println!("  {svc} -> {image}"),
                None => println!("  {svc}"),
            }
        }
    }
    if release.gateway_changed {
        println!("\nGateway source changed.");
    }

    if let Some(summary) = &release.plan_summary {
        println!("\nPlan: {summary}");
    }
    if !release.approvals.is_empty() {
        println!("\nApprovals:");
        for a in &release.approvals {
            let note = a.note.as_deref().unwrap_or("");
            println!("  {} at {} {}", a.by, a.at.format("%Y-%m-%d %H:%M"), note);
        }
    }
    if !release.service_urls.is_empty() {
        println!("\nService URLs:");
        for (svc, url) in &release.service_urls {
            println!("  {svc} -> {url}");
        }
    }
    if let Some(image) = &release.gateway_image {
        println!("\nGateway image: {image}");
    }

    Ok(())
}

fn abort(root: &Path, slug: &str, json: bool) -> anyhow::Result<()> {
    let mut release =
        Release::load(root, slug).with_context(|| format!("release '{slug}' not found"))?;
    release.aborted = true;
    release.save(root).context("failed to save release")?;

    let mut state = State::load(root).context("failed to load state")?;
    state.remove_active_release(slug);
    state.clear_blocked(slug);
    state.save(root).context("failed to save state")?;

    if json {
        print_json(&serde_json::json!({ "slug": slug, "aborted": true }))?;
    } else {
        println!("Aborted release: {slug}");
    }
    Ok(())
}
