//! External tool detection and subprocess invocation.
//!
//! drydock drives three tools: `git` (change detection), `docker` (image
//! build/push) and an IaC binary (`tofu` or `terraform`) for plan/apply.
//! Commands are constructed as data (`Invocation`) so dry-run modes and
//! tests can inspect the exact argv without spawning anything.

use crate::config::IacPreference;
use crate::error::{DrydockError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

pub const GIT: &str = "git";
pub const DOCKER: &str = "docker";

/// Fail early with a clear error when a required binary is absent.
pub fn require(name: &str) -> Result<()> {
    if which::which(name).is_err() {
        return Err(DrydockError::ToolMissing(name.to_string()));
    }
    Ok(())
}

pub fn available(name: &str) -> bool {
    which::which(name).is_ok()
}

// ---------------------------------------------------------------------------
// IacBinary
// ---------------------------------------------------------------------------

/// The infrastructure-as-code binaries, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IacBinary {
    Tofu,
    Terraform,
}

impl IacBinary {
    pub fn name(&self) -> &'static str {
        match self {
            IacBinary::Tofu => "tofu",
            IacBinary::Terraform => "terraform",
        }
    }

    /// Resolve the binary to use. `auto` prefers tofu over terraform.
    pub fn detect(pref: IacPreference) -> Result<IacBinary> {
        match pref {
            IacPreference::Tofu => {
                require("tofu")?;
                Ok(IacBinary::Tofu)
            }
            IacPreference::Terraform => {
                require("terraform")?;
                Ok(IacBinary::Terraform)
            }
            IacPreference::Auto => {
                if available("tofu") {
                    Ok(IacBinary::Tofu)
                } else if available("terraform") {
                    Ok(IacBinary::Terraform)
                } else {
                    Err(DrydockError::ToolMissing("tofu (or terraform)".to_string()))
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: None,
        }
    }

    pub fn in_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Single-line rendering for logs and `--dry-run` output.
    pub fn rendered(&self) -> String {
        let mut parts = vec![self.program.clone()];
        for arg in &self.args {
            if arg.contains(' ') {
                parts.push(format!("'{arg}'"));
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }

    /// Run to completion, capturing stdout. Stderr flows through so docker
    /// and tofu progress output stays visible in the terminal.
    pub fn run_capture(&self) -> Result<String> {
        tracing::debug!(command = %self.rendered(), "running");
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        let output = cmd.output().map_err(|e| DrydockError::ToolFailed {
            tool: self.program.clone(),
            hint: format!("failed to spawn: {e}"),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            return Err(DrydockError::ToolFailed {
                tool: self.program.clone(),
                hint: tail(&stdout, 500),
            });
        }
        Ok(stdout)
    }

    /// Run with both streams captured and an optional timeout. Used where
    /// the combined output is the artifact (plan summaries) or where a hung
    /// subprocess must not hang the release driver.
    pub fn run_collect(&self, timeout: Option<Duration>) -> Result<String> {
        tracing::debug!(command = %self.rendered(), "running");
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| DrydockError::ToolFailed {
            tool: self.program.clone(),
            hint: format!("failed to spawn: {e}"),
        })?;
        let child_pid = child.id();

        // Read stdout/stderr in dedicated threads to avoid pipe-buffer deadlocks
        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();

        let stdout_thread = std::thread::spawn(move || -> String {
            let mut buf = String::new();
            if let Some(mut r) = stdout_handle {
                use std::io::Read;
                let _ = r.read_to_string(&mut buf);
            }
            buf
        });
        let stderr_thread = std::thread::spawn(move || -> String {
            let mut buf = String::new();
            if let Some(mut r) = stderr_handle {
                use std::io::Read;
                let _ = r.read_to_string(&mut buf);
            }
            buf
        });

        let wait_result = match timeout {
            None => child.wait(),
            Some(timeout_dur) => {
                // Waiter thread + channel; on timeout kill by PID. The reader
                // threads see EOF once the killed process's pipes close.
                let (tx, rx) = std::sync::mpsc::channel();
                std::thread::spawn(move || {
                    let _ = tx.send(child.wait());
                });

                match rx.recv_timeout(timeout_dur) {
                    Ok(result) => result,
                    Err(_) => {
                        kill_process(child_pid);
                        let secs = timeout_dur.as_secs();
                        return Err(DrydockError::ToolFailed {
                            tool: self.program.clone(),
                            hint: format!("timed out after {secs}s"),
                        });
                    }
                }
            }
        };

        let stdout_buf = stdout_thread.join().unwrap_or_default();
        let stderr_buf = stderr_thread.join().unwrap_or_default();

        let status = wait_result.map_err(|e| DrydockError::ToolFailed {
            tool: self.program.clone(),
            hint: format!("wait failed: {e}"),
        })?;

        let mut combined = stdout_buf;
        if !stderr_buf.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr_buf);
        }

        if !status.success() {
            return Err(DrydockError::ToolFailed {
                tool: self.program.clone(),
                hint: tail(&combined, 2000),
            });
        }
        Ok(combined)
    }
}

/// Keep the last `max` characters; the end of tofu/docker output is where
/// the error lives.
fn tail(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let cut = s.len() - max;
    // don't split a char
    let start = (cut..s.len()).find(|&i| s.is_char_boundary(i)).unwrap_or(cut);
    format!("...{}", &s[start..])
}

/// Terminate a process by PID using SIGKILL. Best-effort; errors are silently ignored.
fn kill_process(pid: u32) {
    let _ = Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

// ---------------------------------------------------------------------------
// Git helpers
// ---------------------------------------------------------------------------

pub fn git(args: &[&str], cwd: &Path) -> Invocation {
    Invocation::new(GIT, args.iter().map(|s| s.to_string()).collect()).in_dir(cwd)
}

/// Resolve a ref to a full SHA.
pub fn git_rev_parse(root: &Path, rev: &str) -> Result<String> {
    require(GIT)?;
    let out = git(&["rev-parse", rev], root).run_capture()?;
    let sha = out.trim().to_string();
    if sha.is_empty() {
        return Err(DrydockError::ToolOutput {
            tool: GIT.to_string(),
            reason: format!("rev-parse {rev} returned nothing"),
        });
    }
    Ok(sha)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
