use crate::error::{DrydockError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const DRYDOCK_DIR: &str = ".drydock";
pub const RELEASES_DIR: &str = ".drydock/releases";
pub const PLANS_DIR: &str = ".drydock/plans";

pub const CONFIG_FILE: &str = ".drydock/config.yaml";
pub const STATE_FILE: &str = ".drydock/state.yaml";

pub const MANIFEST_FILE: &str = "manifest.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn drydock_dir(root: &Path) -> PathBuf {
    root.join(DRYDOCK_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn state_path(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

pub fn release_dir(root: &Path, slug: &str) -> PathBuf {
    root.join(RELEASES_DIR).join(slug)
}

pub fn release_manifest(root: &Path, slug: &str) -> PathBuf {
    release_dir(root, slug).join(MANIFEST_FILE)
}

pub fn plans_dir(root: &Path, slug: &str) -> PathBuf {
    root.join(PLANS_DIR).join(slug)
}

/// Saved binary plan for the backend plan/apply cycle.
pub fn backend_plan_file(root: &Path, slug: &str) -> PathBuf {
    plans_dir(root, slug).join("backend.tfplan")
}

/// Saved binary plan for the final gateway cycle.
pub fn gateway_plan_file(root: &Path, slug: &str) -> PathBuf {
    plans_dir(root, slug).join("gateway.tfplan")
}

// ---------------------------------------------------------------------------
// Slug validation
// ---------------------------------------------------------------------------

static SLUG_RE: OnceLock<Regex> = OnceLock::new();

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-.]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

/// Release, service, and environment names share one slug grammar.
/// Dots are allowed so release slugs can embed versions ("v1.4.0-staging").
pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > 64 || !slug_re().is_match(slug) {
        return Err(DrydockError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_slugs() {
        for slug in ["v1.4.0-staging", "agent", "meals-service", "a", "x1"] {
            validate_slug(slug).unwrap_or_else(|_| panic!("expected valid: {slug}"));
        }
    }

    #[test]
    fn invalid_slugs() {
        for slug in [
            "",
            "-starts-with-dash",
            "ends-with-dash-",
            "has spaces",
            "UPPER",
            "a_b",
            ".hidden",
        ] {
            assert!(validate_slug(slug).is_err(), "expected invalid: {slug}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.drydock/config.yaml")
        );
        assert_eq!(
            release_manifest(root, "v1.4.0-staging"),
            PathBuf::from("/tmp/proj/.drydock/releases/v1.4.0-staging/manifest.yaml")
        );
        assert_eq!(
            backend_plan_file(root, "r1"),
            PathBuf::from("/tmp/proj/.drydock/plans/r1/backend.tfplan")
        );
    }
}
