use crate::error::{DrydockError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// A `v`-prefixed MAJOR.MINOR.PATCH release version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpKind {
    Major,
    Minor,
    Patch,
}

static VERSION_RE: OnceLock<Regex> = OnceLock::new();

fn version_re() -> &'static Regex {
    VERSION_RE.get_or_init(|| Regex::new(r"^v(\d+)\.(\d+)\.(\d+)$").unwrap())
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn bump(self, kind: BumpKind) -> Self {
        match kind {
            BumpKind::Major => Self::new(self.major + 1, 0, 0),
            BumpKind::Minor => Self::new(self.major, self.minor + 1, 0),
            BumpKind::Patch => Self::new(self.major, self.minor, self.patch + 1),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl std::str::FromStr for Version {
    type Err = DrydockError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = version_re()
            .captures(s)
            .ok_or_else(|| DrydockError::InvalidVersion(s.to_string()))?;
        // Component overflow (> u32) is rejected as invalid rather than panicking.
        let part = |i: usize| -> Result<u32> {
            caps[i]
                .parse()
                .map_err(|_| DrydockError::InvalidVersion(s.to_string()))
        };
        Ok(Self::new(part(1)?, part(2)?, part(3)?))
    }
}

impl TryFrom<String> for Version {
    type Error = DrydockError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Version> for String {
    fn from(v: Version) -> String {
        v.to_string()
    }
}

// ---------------------------------------------------------------------------
// Git SHA validation
// ---------------------------------------------------------------------------

static SHA_RE: OnceLock<Regex> = OnceLock::new();

fn sha_re() -> &'static Regex {
    SHA_RE.get_or_init(|| Regex::new(r"^[0-9a-f]{7,40}$").unwrap())
}

pub fn validate_sha(sha: &str) -> Result<()> {
    if !sha_re().is_match(sha) {
        return Err(DrydockError::InvalidSha(sha.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ImageTag
// ---------------------------------------------------------------------------

/// The immutable tag stamped on every image of a release:
/// `v{MAJOR}.{MINOR}.{PATCH}-{GIT_SHA}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageTag {
    pub version: Version,
    pub sha: String,
}

impl ImageTag {
    pub fn new(version: Version, sha: impl Into<String>) -> Result<Self> {
        let sha = sha.into();
        validate_sha(&sha)?;
        Ok(Self { version, sha })
    }
}

impl fmt::Display for ImageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.version, self.sha)
    }
}

impl std::str::FromStr for ImageTag {
    type Err = DrydockError;

    fn from_str(s: &str) -> Result<Self> {
        let (version, sha) = s
            .rsplit_once('-')
            .ok_or_else(|| DrydockError::InvalidVersion(s.to_string()))?;
        Self::new(version.parse()?, sha)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
