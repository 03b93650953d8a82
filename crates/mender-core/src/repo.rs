//! Repository intake: clone the target into a temporary working directory.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::info;

use crate::domain::{MenderError, Result};

/// A cloned working copy. The backing directory is removed on drop unless the
/// workspace was opened over an existing path.
pub struct Workspace {
    path: PathBuf,
    _tempdir: Option<tempfile::TempDir>,
}

impl Workspace {
    /// Clone `repo_url` into a fresh temporary directory.
    pub async fn clone(repo_url: &str) -> Result<Self> {
        let tempdir = tempfile::tempdir()?;
        let checkout = tempdir.path().join("repo");

        info!(%repo_url, "cloning repository");
        let output = Command::new("git")
            .arg("clone")
            .arg(repo_url)
            .arg(&checkout)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MenderError::RepoIntake(format!(
                "git clone failed: {}",
                stderr.trim()
            )));
        }

        Ok(Self {
            path: checkout,
            _tempdir: Some(tempdir),
        })
    }

    /// Use a pre-cloned working copy (offline runs, tests). Not cleaned up.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _tempdir: None,
        }
    }

    /// Path of the working copy root.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
