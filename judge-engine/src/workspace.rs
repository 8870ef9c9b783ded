use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nix::unistd::{self, Gid, Uid};
use tracing::{debug, warn};
use uuid::Uuid;

const TESTCASE_DIR: &str = "testcase";

/// A private scratch directory for one judging request.
///
/// The directory and everything in it are removed when the value is dropped,
/// whatever the outcome of the request.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    pub fn ensure_root(root: &Path) -> Result<()> {
        if !root.exists() {
            fs::create_dir_all(root)
                .with_context(|| format!("failed to create workspace root: {}", root.display()))?;
        }
        Ok(())
    }

    pub fn create(root: &Path, owner: Option<(Uid, Gid)>) -> Result<Self> {
        Self::ensure_root(root)?;

        let dir = root.join(Uuid::new_v4().to_string());
        fs::create_dir(&dir)
            .with_context(|| format!("failed to create workspace: {}", dir.display()))?;
        let workspace = Self { dir };

        // the judged program writes its build artifacts here
        if let Some((uid, gid)) = owner {
            unistd::chown(&workspace.dir, Some(uid), Some(gid)).with_context(|| {
                format!("failed to chown workspace: {}", workspace.dir.display())
            })?;
        }

        debug!(dir = %workspace.dir.display(), "workspace created");
        Ok(workspace)
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn testcase_dir(&self) -> PathBuf {
        self.dir.join(TESTCASE_DIR)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!(dir = %self.dir.display(), "workspace removed"),
            Err(err) => warn!(%err, dir = %self.dir.display(), "failed to remove workspace"),
        }
    }
}
