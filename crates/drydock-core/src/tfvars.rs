//! Rendering of the environment var file's managed image block.
//!
//! drydock owns one marker-delimited block inside each environment's
//! `*.auto.tfvars`. Everything outside the block is hand-maintained and
//! never touched. The block always carries the full `service_images` map:
//! services not rebuilt by the current release keep their previous refs,
//! which are parsed out of the existing block before rendering.

use crate::error::Result;
use crate::io;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

pub const BLOCK_START: &str = "# BEGIN drydock images";
pub const BLOCK_END: &str = "# END drydock images";

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the managed block. BTreeMap keeps the entry order stable so
/// repeated renders produce byte-identical output.
pub fn render_block(
    images: &BTreeMap<String, String>,
    gateway: Option<(&str, &str)>,
) -> String {
    let mut out = String::new();
    out.push_str(BLOCK_START);
    out.push('\n');
    out.push_str("# Managed by drydock. Edits inside this block are overwritten on render.\n");
    out.push_str("service_images = {\n");
    let width = images.keys().map(|k| k.len()).max().unwrap_or(0);
    for (service, image) in images {
        out.push_str(&format!(
            "  \"{service}\"{pad} = \"{image}\"\n",
            pad = " ".repeat(width - service.len())
        ));
    }
    out.push_str("}\n");
    if let Some((var, image)) = gateway {
        out.push_str(&format!("{var} = \"{image}\"\n"));
    }
    out.push_str(BLOCK_END);
    out
}

// ---------------------------------------------------------------------------
// Parsing (carry-forward)
// ---------------------------------------------------------------------------

static ENTRY_RE: OnceLock<Regex> = OnceLock::new();
static VAR_RE: OnceLock<Regex> = OnceLock::new();

fn entry_re() -> &'static Regex {
    ENTRY_RE.get_or_init(|| Regex::new(r#"^\s*"([^"]+)"\s*=\s*"([^"]+)"\s*$"#).unwrap())
}

fn var_re() -> &'static Regex {
    VAR_RE.get_or_init(|| Regex::new(r#"^(\w+)\s*=\s*"([^"]+)"\s*$"#).unwrap())
}

/// Extract the `service_images` entries from an existing managed block.
pub fn parse_block(content: &str) -> BTreeMap<String, String> {
    let mut images = BTreeMap::new();
    let Some(block) = block_of(content) else {
        return images;
    };
    for line in block.lines() {
        if let Some(caps) = entry_re().captures(line) {
            images.insert(caps[1].to_string(), caps[2].to_string());
        }
    }
    images
}

/// Extract a top-level string variable (e.g. the gateway image) from the
/// managed block.
pub fn parse_block_var(content: &str, var: &str) -> Option<String> {
    let block = block_of(content)?;
    for line in block.lines() {
        if let Some(caps) = var_re().captures(line) {
            if &caps[1] == var {
                return Some(caps[2].to_string());
            }
        }
    }
    None
}

fn block_of(content: &str) -> Option<&str> {
    let start = content.find(BLOCK_START)?;
    let end = content[start..].find(BLOCK_END)? + start;
    Some(&content[start..end])
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Merge `new_images` over whatever the existing block carries, then write
/// the block back: in-place when markers exist, appended when the file
/// exists without markers, or as a fresh file.
pub fn write_images(
    path: &Path,
    new_images: &BTreeMap<String, String>,
    gateway: Option<(&str, &str)>,
) -> Result<BTreeMap<String, String>> {
    let existing = if path.exists() {
        std::fs::read_to_string(path)?
    } else {
        String::new()
    };

    let mut merged = parse_block(&existing);
    for (k, v) in new_images {
        merged.insert(k.clone(), v.clone());
    }
    // carry the gateway image forward too when this release doesn't set it
    let carried_gateway;
    let gateway = match gateway {
        Some(g) => Some(g),
        None => match gateway_var_in(&existing) {
            Some((var, image)) => {
                carried_gateway = (var, image);
                Some((carried_gateway.0.as_str(), carried_gateway.1.as_str()))
            }
            None => None,
        },
    };

    let block = render_block(&merged, gateway);

    if io::replace_between_markers(path, BLOCK_START, BLOCK_END, &block)? {
        return Ok(merged);
    }

    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(&block);
    content.push('\n');
    io::atomic_write(path, content.as_bytes())?;
    Ok(merged)
}

fn gateway_var_in(content: &str) -> Option<(String, String)> {
    let block = block_of(content)?;
    for line in block.lines() {
        if let Some(caps) = var_re().captures(line) {
            return Some((caps[1].to_string(), caps[2].to_string()));
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn images(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn render_is_deterministic_and_sorted() {
        let block = render_block(
            &images(&[("journal", "r/journal:v1"), ("agent", "r/agent:v1")]),
            None,
        );
        let agent_pos = block.find("agent").unwrap();
        let journal_pos = block.find("journal").unwrap();
        assert!(agent_pos < journal_pos);
        assert!(block.starts_with(BLOCK_START));
        assert!(block.ends_with(BLOCK_END));
    }

    #[test]
    fn render_includes_gateway_var() {
        let block = render_block(
            &images(&[("agent", "r/agent:v1")]),
            Some(("gateway_image", "r/gateway:v1")),
        );
        assert!(block.contains("gateway_image = \"r/gateway:v1\""));
    }

    #[test]
    fn parse_roundtrips_render() {
        let m = images(&[("agent", "r/agent:v1.4.0-abc1234"), ("habits", "r/habits:v1.4.0-abc1234")]);
        let block = render_block(&m, None);
        assert_eq!(parse_block(&block), m);
    }

    #[test]
    fn write_creates_fresh_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("images.auto.tfvars");
        write_images(&path, &images(&[("agent", "r/agent:v1")]), None).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains(BLOCK_START));
        assert!(content.contains("\"agent\" = \"r/agent:v1\""));
    }

    #[test]
    fn write_preserves_surrounding_variables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("images.auto.tfvars");
        std::fs::write(&path, "region = \"europe-west1\"\nmin_instances = 0\n").unwrap();
        write_images(&path, &images(&[("agent", "r/agent:v1")]), None).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("region = \"europe-west1\""));
        assert!(content.contains("min_instances = 0"));
        assert!(content.contains("\"agent\" = \"r/agent:v1\""));
    }

    #[test]
    fn write_carries_forward_unchanged_services() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("images.auto.tfvars");
        write_images(
            &path,
            &images(&[("agent", "r/agent:v1.0.0-aaa1111"), ("journal", "r/journal:v1.0.0-aaa1111")]),
            None,
        )
        .unwrap();

        // next release only rebuilt agent
        let merged = write_images(&path, &images(&[("agent", "r/agent:v1.1.0-bbb2222")]), None).unwrap();
        assert_eq!(merged["agent"], "r/agent:v1.1.0-bbb2222");
        assert_eq!(merged["journal"], "r/journal:v1.0.0-aaa1111");

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("r/journal:v1.0.0-aaa1111"));
        assert!(!content.contains("r/agent:v1.0.0-aaa1111"));
    }

    #[test]
    fn write_carries_forward_gateway_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("images.auto.tfvars");
        write_images(
            &path,
            &images(&[("agent", "r/agent:v1")]),
            Some(("gateway_image", "r/gateway:v1.0.0-aaa1111")),
        )
        .unwrap();
        write_images(&path, &images(&[("agent", "r/agent:v2")]), None).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("gateway_image = \"r/gateway:v1.0.0-aaa1111\""));
    }

    #[test]
    fn repeated_writes_do_not_duplicate_block() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("images.auto.tfvars");
        let m = images(&[("agent", "r/agent:v1")]);
        write_images(&path, &m, None).unwrap();
        write_images(&path, &m, None).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches(BLOCK_START).count(), 1);
    }

    #[test]
    fn parse_block_var_reads_gateway() {
        let block = render_block(
            &images(&[("agent", "r/agent:v1")]),
            Some(("gateway_image", "r/gw:v1")),
        );
        assert_eq!(parse_block_var(&block, "gateway_image").unwrap(), "r/gw:v1");
        assert!(parse_block_var(&block, "missing").is_none());
    }
}
