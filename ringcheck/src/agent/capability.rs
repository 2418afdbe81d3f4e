//! File and command capability handed to the reasoning agent
//!
//! Reads are confined to the scan root. Command execution is gated by the
//! approval policy; a refused action returns `CapabilityError::Denied`
//! instead of running anything.

use ringcheck_common::config::ApprovalSetting;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Directories never listed to the agent
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules"];

/// Capability errors
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("Denied by approval policy: {0}")]
    Denied(String),

    #[error("Path escapes scan root: {0}")]
    OutsideRoot(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// What the agent may do beyond reading files
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalPolicy {
    /// File reads only
    ReadOnly,
    /// File reads plus the named programs
    AllowList(Vec<String>),
    /// Unrestricted
    Full,
}

impl ApprovalPolicy {
    pub fn from_config(setting: ApprovalSetting, allow: &[String]) -> Self {
        match setting {
            ApprovalSetting::ReadOnly => ApprovalPolicy::ReadOnly,
            ApprovalSetting::AllowList => ApprovalPolicy::AllowList(allow.to_vec()),
            ApprovalSetting::Full => ApprovalPolicy::Full,
        }
    }

    /// Whether `program` may be executed
    ///
    /// Allow-list entries match the program as given or its file name.
    pub fn permits_command(&self, program: &str) -> bool {
        match self {
            ApprovalPolicy::ReadOnly => false,
            ApprovalPolicy::Full => true,
            ApprovalPolicy::AllowList(allowed) => {
                let name = Path::new(program)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or(program);
                allowed.iter().any(|a| a == program || a == name)
            }
        }
    }
}

/// Captured output of an approved command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Scan-root-confined workspace access
#[derive(Debug, Clone)]
pub struct WorkspaceCapability {
    root: PathBuf,
    policy: ApprovalPolicy,
}

impl WorkspaceCapability {
    /// # Arguments
    /// * `root` - Scan root (must exist)
    /// * `policy` - Approval policy for command execution
    pub fn new(root: &Path, policy: ApprovalPolicy) -> io::Result<Self> {
        Ok(Self {
            root: root.canonicalize()?,
            policy,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> &ApprovalPolicy {
        &self.policy
    }

    /// Resolve a scan-relative path, rejecting anything outside the root
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, CapabilityError> {
        let candidate = Path::new(relative);
        if candidate.is_absolute()
            || candidate
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(CapabilityError::OutsideRoot(relative.to_string()));
        }

        let resolved = self.root.join(candidate).canonicalize()?;
        // Symlinks can still point outside
        if !resolved.starts_with(&self.root) {
            return Err(CapabilityError::OutsideRoot(relative.to_string()));
        }
        Ok(resolved)
    }

    /// Read a UTF-8 file under the scan root
    pub async fn read_file(&self, relative: &str) -> Result<String, CapabilityError> {
        let path = self.resolve(relative)?;
        debug!(path = %relative, "Agent read");
        Ok(tokio::fs::read_to_string(path).await?)
    }

    /// List every file under the scan root (relative, `/`-separated, sorted)
    pub async fn list_files(&self) -> Result<Vec<String>, CapabilityError> {
        let mut files = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let name = entry.file_name();
                if file_type.is_dir() {
                    if !SKIPPED_DIRS.iter().any(|s| name == *s) {
                        pending.push(entry.path());
                    }
                } else if file_type.is_file() {
                    if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                        let parts: Vec<String> = relative
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy().into_owned())
                            .collect();
                        files.push(parts.join("/"));
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Run a command in the scan root if the approval policy permits it
    pub async fn run_command(&self, argv: &[String]) -> Result<CommandOutput, CapabilityError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(CapabilityError::Denied("empty command".to_string()));
        };

        if !self.policy.permits_command(program) {
            warn!(program = %program, policy = ?self.policy, "Agent command refused");
            return Err(CapabilityError::Denied(program.clone()));
        }

        info!(program = %program, args = args.len(), "Running agent command");
        let output = Command::new(program)
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
