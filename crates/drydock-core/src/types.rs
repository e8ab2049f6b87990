use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ReleasePhase
// ---------------------------------------------------------------------------

/// The forward-only pipeline a release moves through. Backend services are
/// built and applied first; the gateway is composed afterwards because its
/// build inputs are the service URLs that only exist once the backends are
/// live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePhase {
    Created,
    Detected,
    Built,
    Rendered,
    Planned,
    Approved,
    Applied,
    Composed,
    Released,
}

impl ReleasePhase {
    pub fn all() -> &'static [ReleasePhase] {
        &[
            ReleasePhase::Created,
            ReleasePhase::Detected,
            ReleasePhase::Built,
            ReleasePhase::Rendered,
            ReleasePhase::Planned,
            ReleasePhase::Approved,
            ReleasePhase::Applied,
            ReleasePhase::Composed,
            ReleasePhase::Released,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<ReleasePhase> {
        let all = ReleasePhase::all();
        all.get(self.index() + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReleasePhase::Created => "created",
            ReleasePhase::Detected => "detected",
            ReleasePhase::Built => "built",
            ReleasePhase::Rendered => "rendered",
            ReleasePhase::Planned => "planned",
            ReleasePhase::Approved => "approved",
            ReleasePhase::Applied => "applied",
            ReleasePhase::Composed => "composed",
            ReleasePhase::Released => "released",
        }
    }
}

impl fmt::Display for ReleasePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReleasePhase {
    type Err = crate::error::DrydockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(ReleasePhase::Created),
            "detected" => Ok(ReleasePhase::Detected),
            "built" => Ok(ReleasePhase::Built),
            "rendered" => Ok(ReleasePhase::Rendered),
            "planned" => Ok(ReleasePhase::Planned),
            "approved" => Ok(ReleasePhase::Approved),
            "applied" => Ok(ReleasePhase::Applied),
            "composed" => Ok(ReleasePhase::Composed),
            "released" => Ok(ReleasePhase::Released),
            _ => Err(crate::error::DrydockError::InvalidPhase(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// StepAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    DetectChanges,
    BuildImages,
    RenderVars,
    Plan,
    AwaitApproval,
    Apply,
    ComposeGateway,
    DeployGateway,
    Done,
}

impl StepAction {
    pub fn all() -> &'static [StepAction] {
        &[
            StepAction::DetectChanges,
            StepAction::BuildImages,
            StepAction::RenderVars,
            StepAction::Plan,
            StepAction::AwaitApproval,
            StepAction::Apply,
            StepAction::ComposeGateway,
            StepAction::DeployGateway,
            StepAction::Done,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepAction::DetectChanges => "detect_changes",
            StepAction::BuildImages => "build_images",
            StepAction::RenderVars => "render_vars",
            StepAction::Plan => "plan",
            StepAction::AwaitApproval => "await_approval",
            StepAction::Apply => "apply",
            StepAction::ComposeGateway => "compose_gateway",
            StepAction::DeployGateway => "deploy_gateway",
            StepAction::Done => "done",
        }
    }

    /// Steps that shell out to docker or tofu and can run for minutes.
    pub fn is_heavy(self) -> bool {
        matches!(
            self,
            StepAction::BuildImages
                | StepAction::Plan
                | StepAction::Apply
                | StepAction::ComposeGateway
                | StepAction::DeployGateway
        )
    }

    /// Advisory timeout budget for driver loops.
    pub fn timeout_minutes(self) -> u32 {
        if self.is_heavy() {
            30
        } else {
            5
        }
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_ordering() {
        assert!(ReleasePhase::Created < ReleasePhase::Detected);
        assert!(ReleasePhase::Planned < ReleasePhase::Approved);
        assert!(ReleasePhase::Released > ReleasePhase::Composed);
    }

    #[test]
    fn phase_next() {
        assert_eq!(ReleasePhase::Created.next(), Some(ReleasePhase::Detected));
        assert_eq!(ReleasePhase::Applied.next(), Some(ReleasePhase::Composed));
        assert_eq!(ReleasePhase::Released.next(), None);
    }

    #[test]
    fn phase_roundtrip() {
        use std::str::FromStr;
        for phase in ReleasePhase::all() {
            let parsed = ReleasePhase::from_str(phase.as_str()).unwrap();
            assert_eq!(*phase, parsed);
        }
    }

    #[test]
    fn phase_serde_snake_case() {
        let yaml = serde_yaml::to_string(&ReleasePhase::Applied).unwrap();
        assert_eq!(yaml.trim(), "applied");
    }

    #[test]
    fn heavy_steps() {
        assert!(StepAction::BuildImages.is_heavy());
        assert!(StepAction::Apply.is_heavy());
        assert!(!StepAction::DetectChanges.is_heavy());
        assert!(!StepAction::AwaitApproval.is_heavy());
    }

    #[test]
    fn step_action_all_complete() {
        assert_eq!(StepAction::all().len(), 9);
    }
}
