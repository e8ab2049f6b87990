use crate::output::print_json;
use anyhow::Context;
use drydock_core::{
    classify::{classify, Classification},
    config::Config,
    release::Release,
    state::State,
};
use std::path::Path;

pub fn run(root: &Path, slug: Option<&str>, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;

    let classifications: Vec<Classification> = match slug {
        Some(slug) => {
            let release = Release::load(root, slug)?;
            vec![classify(&release, &config)?]
        }
        None => {
            let state = State::load(root).context("failed to load state")?;
            let mut out = Vec::with_capacity(state.active_releases.len());
            for slug in &state.active_releases {
                let release = Release::load(root, slug)?;
                out.push(classify(&release, &config)?);
            }
            out
        }
    };

    if json {
        return match slug {
            Some(_) => print_json(&classifications[0]),
            None => print_json(&classifications),
        };
    }

    if classifications.is_empty() {
        println!("No active releases.");
        return Ok(());
    }

    for c in &classifications {
        println!(
            "{:<20} [{:<15}] {} — {}",
            c.release, c.current_phase, c.action, c.message
        );
        if !c.next_command.is_empty() {
            println!("{:<20} run: {}", "", c.next_command);
        }
    }
    Ok(())
}
