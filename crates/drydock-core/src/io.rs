use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` via a tempfile in the same directory,
/// so a crash mid-write never leaves a truncated manifest or var file.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => {
            std::fs::create_dir_all(p)?;
            p
        }
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Write a file only if it does not already exist. Returns true if written.
pub fn write_if_missing(path: &Path, data: &[u8]) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    atomic_write(path, data)?;
    Ok(true)
}

/// Replace everything from the first character of `start_marker` through the
/// last character of `end_marker` with `replacement`. Returns `true` if both
/// markers were found and the file was rewritten, `false` otherwise (file
/// unchanged). The tfvars renderer uses this to own a block inside a var
/// file without clobbering hand-maintained variables around it.
pub fn replace_between_markers(
    path: &Path,
    start_marker: &str,
    end_marker: &str,
    replacement: &str,
) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let content = std::fs::read_to_string(path)?;
    let Some(block_start) = content.find(start_marker) else {
        return Ok(false);
    };
    let after_start = block_start + start_marker.len();
    let Some(rel_end) = content[after_start..].find(end_marker) else {
        return Ok(false);
    };
    let block_end = after_start + rel_end + end_marker.len();

    let updated = format!(
        "{}{}{}",
        &content[..block_start],
        replacement,
        &content[block_end..]
    );
    atomic_write(path, updated.as_bytes())?;
    Ok(true)
}

/// Add `entry` to `root/.gitignore` if it isn't already present.
/// Exact line match, so substrings of other entries don't count.
pub fn ensure_gitignore_entry(root: &Path, entry: &str) -> Result<()> {
    let gitignore = root.join(".gitignore");
    let mut content = match std::fs::read_to_string(&gitignore) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    if content.lines().any(|line| line == entry) {
        return Ok(());
    }
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(entry);
    content.push('\n');
    atomic_write(&gitignore, content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_file_and_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".drydock/releases/r1/manifest.yaml");
        atomic_write(&path, b"phase: created").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "phase: created"
        );
    }

    #[test]
    fn write_if_missing_skips_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, b"original").unwrap();
        assert!(!write_if_missing(&path, b"new").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");
    }

    #[test]
    fn replace_between_markers_rewrites_block() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("images.auto.tfvars");
        std::fs::write(
            &path,
            "region = \"europe-west1\"\n# BEGIN\nold\n# END\ntail = 1\n",
        )
        .unwrap();
        let replaced =
            replace_between_markers(&path, "# BEGIN", "# END", "# BEGIN\nnew\n# END").unwrap();
        assert!(replaced);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("new"));
        assert!(!content.contains("old"));
        assert!(content.contains("region"));
        assert!(content.contains("tail = 1"));
    }

    #[test]
    fn replace_between_markers_missing_marker_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vars.tfvars");
        std::fs::write(&path, "region = \"x\"\n").unwrap();
        assert!(!replace_between_markers(&path, "# BEGIN", "# END", "x").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "region = \"x\"\n");
    }

    #[test]
    fn gitignore_entry_keeps_existing_lines() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "node_modules\n*.pyc").unwrap();
        ensure_gitignore_entry(dir.path(), ".drydock/plans/").unwrap();
        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(content.contains("node_modules"));
        assert!(content.contains("*.pyc"));
        assert!(content.lines().any(|l| l == ".drydock/plans/"));
    }

    #[test]
    fn gitignore_entry_idempotent() {
        let dir = TempDir::new().unwrap();
        ensure_gitignore_entry(dir.path(), ".drydock/plans/").unwrap();
        ensure_gitignore_entry(dir.path(), ".drydock/plans/").unwrap();
        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(
            content.lines().filter(|l| *l == ".drydock/plans/").count(),
            1
        );
    }
}
