use crate::error::{DrydockError, Result};
use crate::paths;
use crate::types::StepAction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub release: String,
    pub environment: String,
    pub step: StepAction,
    pub timestamp: DateTime<Utc>,
    pub outcome: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedItem {
    pub release: String,
    pub reason: String,
    pub since: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Project-level ledger: which releases are in flight, what happened last,
/// and what is blocked. Per-release detail lives in the release manifests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: String,
    pub active_releases: Vec<String>,
    pub history: Vec<HistoryEntry>,
    pub blocked: Vec<BlockedItem>,
    pub last_updated: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl State {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: project.into(),
            active_releases: Vec::new(),
            history: Vec::new(),
            blocked: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::state_path(root);
        if !path.exists() {
            return Err(DrydockError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let state: State = serde_yaml::from_str(&data)?;
        Ok(state)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&paths::state_path(root), data.as_bytes())
    }

    // ---------------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------------

    pub fn add_active_release(&mut self, slug: &str) {
        if !self.active_releases.contains(&slug.to_string()) {
            self.active_releases.push(slug.to_string());
        }
        self.last_updated = Utc::now();
    }

    pub fn remove_active_release(&mut self, slug: &str) {
        self.active_releases.retain(|s| s != slug);
        self.last_updated = Utc::now();
    }

    pub fn record_step(
        &mut self,
        release: &str,
        environment: &str,
        step: StepAction,
        outcome: &str,
    ) {
        self.history.push(HistoryEntry {
            release: release.to_string(),
            environment: environment.to_string(),
            step,
            timestamp: Utc::now(),
            outcome: outcome.to_string(),
        });
        // Trim history to last 200 entries
        if self.history.len() > 200 {
            self.history.drain(..self.history.len() - 200);
        }
        self.last_updated = Utc::now();
    }

    pub fn set_blocked(&mut self, release: &str, reason: &str) {
        self.blocked.retain(|b| b.release != release);
        self.blocked.push(BlockedItem {
            release: release.to_string(),
            reason: reason.to_string(),
            since: Utc::now(),
        });
        self.last_updated = Utc::now();
    }

    pub fn clear_blocked(&mut self, release: &str) {
        self.blocked.retain(|b| b.release != release);
        self.last_updated = Utc::now();
    }

    pub fn last_step(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn state_roundtrip() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".drydock")).unwrap();

        let mut state = State::new("mindmirror");
        state.add_active_release("v1.4.0-staging");
        state.record_step(
            "v1.4.0-staging",
            "staging",
            StepAction::DetectChanges,
            "2 services changed",
        );
        state.save(dir.path()).unwrap();

        let loaded = State::load(dir.path()).unwrap();
        assert_eq!(loaded.project, "mindmirror");
        assert!(loaded
            .active_releases
            .contains(&"v1.4.0-staging".to_string()));
        assert_eq!(loaded.history.len(), 1);
        assert_eq!(loaded.last_step().unwrap().environment, "staging");
    }

    #[test]
    fn state_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            State::load(dir.path()),
            Err(DrydockError::NotInitialized)
        ));
    }

    #[test]
    fn blocked_tracking() {
        let mut state = State::new("proj");
        state.set_blocked("v1.4.0-prod", "awaiting approval");
        assert_eq!(state.blocked.len(), 1);
        state.set_blocked("v1.4.0-prod", "plan failed");
        assert_eq!(state.blocked.len(), 1, "one entry per release");
        state.clear_blocked("v1.4.0-prod");
        assert!(state.blocked.is_empty());
    }

    #[test]
    fn history_is_bounded() {
        let mut state = State::new("proj");
        for i in 0..250 {
            state.record_step("r", "staging", StepAction::Plan, &format!("run {i}"));
        }
        assert_eq!(state.history.len(), 200);
        assert_eq!(state.history.last().unwrap().outcome, "run 249");
    }
}
