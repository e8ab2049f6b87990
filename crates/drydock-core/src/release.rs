use crate::error::{DrydockError, Result};
use crate::paths;
use crate::types::ReleasePhase;
use crate::version::{validate_sha, ImageTag, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

// ---------------------------------------------------------------------------
// Supporting records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub phase: ReleasePhase,
    pub entered: DateTime<Utc>,
    pub exited: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub service: String,
    /// Full pushed reference, `{registry}/{service}:{tag}`.
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub by: String,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub add: u32,
    pub change: u32,
    pub destroy: u32,
}

impl PlanSummary {
    pub fn is_empty(&self) -> bool {
        self.add == 0 && self.change == 0 && self.destroy == 0
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to add, {} to change, {} to destroy",
            self.add, self.change, self.destroy
        )
    }
}

// ---------------------------------------------------------------------------
// Release
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub slug: String,
    pub environment: String,
    pub version: Version,
    pub sha: String,
    /// Git ref the change detector diffs against.
    pub base_ref: String,
    pub phase: ReleasePhase,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub changed_services: Vec<String>,
    #[serde(default)]
    pub gateway_changed: bool,
    #[serde(default)]
    pub images: Vec<ImageRecord>,
    #[serde(default)]
    pub service_urls: BTreeMap<String, String>,
    #[serde(default)]
    pub approvals: Vec<Approval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_summary: Option<PlanSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_plan_summary: Option<PlanSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_image: Option<String>,
    pub phase_history: Vec<PhaseTransition>,
    #[serde(default)]
    pub aborted: bool,
}

impl Release {
    pub fn new(
        slug: impl Into<String>,
        environment: impl Into<String>,
        version: Version,
        sha: impl Into<String>,
        base_ref: impl Into<String>,
    ) -> Result<Self> {
        let slug = slug.into();
        paths::validate_slug(&slug)?;
        let sha = sha.into();
        validate_sha(&sha)?;
        let now = Utc::now();

        Ok(Self {
            slug,
            environment: environment.into(),
            version,
            sha,
            base_ref: base_ref.into(),
            phase: ReleasePhase::Created,
            created_at: now,
            updated_at: now,
            changed_services: Vec::new(),
            gateway_changed: false,
            images: Vec::new(),
            service_urls: BTreeMap::new(),
            approvals: Vec::new(),
            plan_summary: None,
            gateway_plan_summary: None,
            gateway_image: None,
            phase_history: vec![PhaseTransition {
                phase: ReleasePhase::Created,
                entered: now,
                exited: None,
            }],
            aborted: false,
        })
    }

    /// The tag every image of this release carries.
    pub fn tag(&self) -> ImageTag {
        // sha was validated at construction
        ImageTag {
            version: self.version,
            sha: self.sha.clone(),
        }
    }

    pub fn image_for(&self, service: &str) -> Option<&str> {
        self.images
            .iter()
            .find(|i| i.service == service)
            .map(|i| i.image.as_str())
    }

    /// A release with nothing to ship completes at `detected`.
    pub fn is_empty_release(&self) -> bool {
        self.phase >= ReleasePhase::Detected
            && self.changed_services.is_empty()
            && !self.gateway_changed
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn create(
        root: &Path,
        slug: impl Into<String>,
        environment: impl Into<String>,
        version: Version,
        sha: impl Into<String>,
        base_ref: impl Into<String>,
    ) -> Result<Self> {
        let slug = slug.into();
        if paths::release_dir(root, &slug).exists() {
            return Err(DrydockError::ReleaseExists(slug));
        }
        let release = Self::new(slug, environment, version, sha, base_ref)?;
        release.save(root)?;
        Ok(release)
    }

    pub fn load(root: &Path, slug: &str) -> Result<Self> {
        let manifest = paths::release_manifest(root, slug);
        if !manifest.exists() {
            return Err(DrydockError::ReleaseNotFound(slug.to_string()));
        }
        let data = std::fs::read_to_string(&manifest)?;
        let release: Release = serde_yaml::from_str(&data)?;
        Ok(release)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let manifest = paths::release_manifest(root, &self.slug);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&manifest, data.as_bytes())
    }

    pub fn list(root: &Path) -> Result<Vec<Self>> {
        let releases_dir = root.join(paths::RELEASES_DIR);
        if !releases_dir.exists() {
            return Ok(Vec::new());
        }

        let mut releases = Vec::new();
        for entry in std::fs::read_dir(&releases_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                let slug = entry.file_name().to_string_lossy().into_owned();
                match Self::load(root, &slug) {
                    Ok(r) => releases.push(r),
                    Err(DrydockError::ReleaseNotFound(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }
        releases.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(releases)
    }

    /// The most recent fully released version for an environment, if any.
    /// Its SHA is the default diff base for the next release.
    pub fn last_released(root: &Path, environment: &str) -> Result<Option<Self>> {
        let mut released: Vec<Self> = Self::list(root)?
            .into_iter()
            .filter(|r| r.environment == environment && r.phase == ReleasePhase::Released)
            .collect();
        released.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        Ok(released.pop())
    }

    // ---------------------------------------------------------------------------
    // Phase transitions
    // ---------------------------------------------------------------------------

    /// Validate a forward transition. Each target phase has entry
    /// prerequisites: the records the preceding operation must have left
    /// behind.
    pub fn can_transition_to(
        &self,
        target: ReleasePhase,
        require_approval: bool,
        has_gateway: bool,
    ) -> Result<()> {
        let fail = |reason: String| {
            Err(DrydockError::InvalidTransition {
                from: self.phase.to_string(),
                to: target.to_string(),
                reason,
            })
        };

        if self.aborted {
            return fail("release is aborted".to_string());
        }
        if target <= self.phase {
            return fail("transitions are forward-only".to_string());
        }

        match target {
            ReleasePhase::Created => unreachable!("created is never a target"),
            ReleasePhase::Detected => Ok(()),
            ReleasePhase::Built => {
                if self.phase < ReleasePhase::Detected {
                    return fail("changes have not been detected".to_string());
                }
                if self.is_empty_release() {
                    return fail("nothing changed; release is already complete".to_string());
                }
                for svc in &self.changed_services {
                    if self.image_for(svc).is_none() {
                        return fail(format!("no image recorded for changed service '{svc}'"));
                    }
                }
                Ok(())
            }
            ReleasePhase::Rendered => {
                if self.phase < ReleasePhase::Built {
                    return fail("images have not been built".to_string());
                }
                Ok(())
            }
            ReleasePhase::Planned => {
                if self.phase < ReleasePhase::Rendered {
                    return fail("var file has not been rendered".to_string());
                }
                if self.plan_summary.is_none() {
                    return fail("no plan summary recorded".to_string());
                }
                Ok(())
            }
            ReleasePhase::Approved => {
                if self.phase < ReleasePhase::Planned {
                    return fail("release has not been planned".to_string());
                }
                if require_approval && self.approvals.is_empty() {
                    return Err(DrydockError::ApprovalRequired {
                        environment: self.environment.clone(),
                    });
                }
                Ok(())
            }
            ReleasePhase::Applied => {
                if self.phase < ReleasePhase::Approved {
                    return fail("release has not been approved".to_string());
                }
                Ok(())
            }
            ReleasePhase::Composed => {
                if !has_gateway {
                    return fail("no gateway configured".to_string());
                }
                if self.phase < ReleasePhase::Applied {
                    return fail("backends have not been applied".to_string());
                }
                if self.gateway_image.is_none() {
                    return fail("no gateway image recorded".to_string());
                }
                Ok(())
            }
            ReleasePhase::Released => {
                let required = if has_gateway {
                    ReleasePhase::Composed
                } else {
                    ReleasePhase::Applied
                };
                if self.phase < required {
                    return fail(format!("release must reach '{required}' first"));
                }
                Ok(())
            }
        }
    }

    pub fn advance(&mut self, target: ReleasePhase) {
        let now = Utc::now();
        if let Some(last) = self.phase_history.last_mut() {
            last.exited = Some(now);
        }
        self.phase = target;
        self.phase_history.push(PhaseTransition {
            phase: target,
            entered: now,
            exited: None,
        });
        self.updated_at = now;
    }

    // ---------------------------------------------------------------------------
    // Record helpers
    // ---------------------------------------------------------------------------

    pub fn record_detection(&mut self, changed: Vec<String>, gateway_changed: bool) {
        self.changed_services = changed;
        self.gateway_changed = gateway_changed;
        self.updated_at = Utc::now();
    }

    pub fn record_image(&mut self, service: &str, image: &str) {
        self.images.retain(|i| i.service != service);
        self.images.push(ImageRecord {
            service: service.to_string(),
            image: image.to_string(),
        });
        self.updated_at = Utc::now();
    }

    pub fn record_plan(&mut self, summary: PlanSummary) {
        self.plan_summary = Some(summary);
        self.updated_at = Utc::now();
    }

    pub fn record_gateway_plan(&mut self, summary: PlanSummary) {
        self.gateway_plan_summary = Some(summary);
        self.updated_at = Utc::now();
    }

    pub fn record_approval(&mut self, by: &str, note: Option<String>) {
        self.approvals.push(Approval {
            by: by.to_string(),
            at: Utc::now(),
            note,
        });
        self.updated_at = Utc::now();
    }

    pub fn record_urls(&mut self, urls: BTreeMap<String, String>) {
        self.service_urls = urls;
        self.updated_at = Utc::now();
    }

    pub fn record_gateway_image(&mut self, image: &str) {
        self.gateway_image = Some(image.to_string());
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn release() -> Release {
        Release::new(
            "v1.4.0-staging",
            "staging",
            Version::new(1, 4, 0),
            "abc1234",
            "origin/main",
        )
        .unwrap()
    }

    #[test]
    fn create_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let r = Release::create(
            dir.path(),
            "v1.4.0-staging",
            "staging",
            Version::new(1, 4, 0),
            "abc1234",
            "origin/main",
        )
        .unwrap();
        assert_eq!(r.phase, ReleasePhase::Created);

        let loaded = Release::load(dir.path(), "v1.4.0-staging").unwrap();
        assert_eq!(loaded.version, Version::new(1, 4, 0));
        assert_eq!(loaded.tag().to_string(), "v1.4.0-abc1234");
    }

    #[test]
    fn create_duplicate_fails() {
        let dir = TempDir::new().unwrap();
        let mk = || {
            Release::create(
                dir.path(),
                "v1.0.0-staging",
                "staging",
                Version::new(1, 0, 0),
                "abc1234",
                "origin/main",
            )
        };
        mk().unwrap();
        assert!(matches!(mk(), Err(DrydockError::ReleaseExists(_))));
    }

    #[test]
    fn invalid_sha_rejected() {
        let r = Release::new(
            "v1.0.0-staging",
            "staging",
            Version::new(1, 0, 0),
            "NOT-A-SHA",
            "origin/main",
        );
        assert!(matches!(r, Err(DrydockError::InvalidSha(_))));
    }

    #[test]
    fn transitions_are_forward_only() {
        let mut r = release();
        r.advance(ReleasePhase::Detected);
        let err = r
            .can_transition_to(ReleasePhase::Detected, false, true)
            .unwrap_err();
        assert!(matches!(err, DrydockError::InvalidTransition { .. }));
    }

    #[test]
    fn built_requires_images_for_changed_services() {
        let mut r = release();
        r.advance(ReleasePhase::Detected);
        r.record_detection(vec!["agent".to_string()], false);

        assert!(r.can_transition_to(ReleasePhase::Built, false, true).is_err());
        r.record_image("agent", "reg/agent:v1.4.0-abc1234");
        r.can_transition_to(ReleasePhase::Built, false, true).unwrap();
    }

    #[test]
    fn empty_release_cannot_build() {
        let mut r = release();
        r.advance(ReleasePhase::Detected);
        r.record_detection(vec![], false);
        assert!(r.is_empty_release());
        assert!(r.can_transition_to(ReleasePhase::Built, false, true).is_err());
    }

    #[test]
    fn approval_gate_blocks_until_recorded() {
        let mut r = release();
        r.advance(ReleasePhase::Detected);
        r.record_detection(vec!["agent".to_string()], false);
        r.record_image("agent", "reg/agent:v1.4.0-abc1234");
        r.advance(ReleasePhase::Built);
        r.advance(ReleasePhase::Rendered);
        r.record_plan(PlanSummary {
            add: 0,
            change: 1,
            destroy: 0,
        });
        r.advance(ReleasePhase::Planned);

        let err = r
            .can_transition_to(ReleasePhase::Approved, true, true)
            .unwrap_err();
        assert!(matches!(err, DrydockError::ApprovalRequired { .. }));

        r.record_approval("ops@swae", None);
        r.can_transition_to(ReleasePhase::Approved, true, true).unwrap();
    }

    #[test]
    fn released_without_gateway_skips_compose() {
        let mut r = release();
        r.advance(ReleasePhase::Detected);
        r.advance(ReleasePhase::Built);
        r.advance(ReleasePhase::Rendered);
        r.advance(ReleasePhase::Planned);
        r.advance(ReleasePhase::Approved);
        r.advance(ReleasePhase::Applied);

        // with a gateway, released requires composed first
        assert!(r
            .can_transition_to(ReleasePhase::Released, false, true)
            .is_err());
        // without one, applied releases directly
        r.can_transition_to(ReleasePhase::Released, false, false)
            .unwrap();
    }

    #[test]
    fn aborted_release_refuses_transitions() {
        let mut r = release();
        r.aborted = true;
        assert!(r
            .can_transition_to(ReleasePhase::Detected, false, true)
            .is_err());
    }

    #[test]
    fn last_released_picks_latest_for_environment() {
        let dir = TempDir::new().unwrap();
        let mut a = Release::create(
            dir.path(),
            "v1.0.0-staging",
            "staging",
            Version::new(1, 0, 0),
            "aaa1111",
            "origin/main",
        )
        .unwrap();
        for p in [
            ReleasePhase::Detected,
            ReleasePhase::Built,
            ReleasePhase::Rendered,
            ReleasePhase::Planned,
            ReleasePhase::Approved,
            ReleasePhase::Applied,
            ReleasePhase::Composed,
            ReleasePhase::Released,
        ] {
            a.advance(p);
        }
        a.save(dir.path()).unwrap();

        Release::create(
            dir.path(),
            "v1.1.0-staging",
            "staging",
            Version::new(1, 1, 0),
            "bbb2222",
            "origin/main",
        )
        .unwrap();

        let last = Release::last_released(dir.path(), "staging").unwrap().unwrap();
        assert_eq!(last.slug, "v1.0.0-staging");
        assert!(Release::last_released(dir.path(), "production")
            .unwrap()
            .is_none());
    }

    #[test]
    fn phase_history_tracks_transitions() {
        let mut r = release();
        r.advance(ReleasePhase::Detected);
        assert_eq!(r.phase_history.len(), 2);
        assert!(r.phase_history[0].exited.is_some());
        assert!(r.phase_history[1].exited.is_none());
    }
}
