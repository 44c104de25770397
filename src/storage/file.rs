// JSON workspace snapshot on disk, guarded by an exclusive file lock

use anyhow::{Context, Result};
use fd_lock::RwLock;
use std::fs::{self, File, OpenOptions};
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::storage::memory::WorkspaceSnapshot;

/// Snapshot file plus a sibling `.lock` file serializing writers across processes
#[derive(Debug, Clone)]
pub struct WorkspaceFile {
    path: PathBuf,
}

impl WorkspaceFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot under a shared lock. A missing file is an empty workspace.
    pub fn read(&self) -> Result<WorkspaceSnapshot> {
        let lock = RwLock::new(self.open_lock_file()?);
        let _guard = lock
            .read()
            .with_context(|| format!("Failed to lock {}", self.path.display()))?;
        self.read_unlocked()
    }

    /// Replace the snapshot under an exclusive lock.
    pub fn write(&self, snapshot: &WorkspaceSnapshot) -> Result<()> {
        let mut lock = RwLock::new(self.open_lock_file()?);
        let _guard = lock
            .write()
            .with_context(|| format!("Failed to lock {}", self.path.display()))?;
        self.write_unlocked(snapshot)
    }

    /// Read, modify and write back while holding the exclusive lock.
    /// Nothing is written if `update` fails.
    ///
    /// The lock is a blocking OS lock taken on the calling task and held across
    /// `update`, so a contended call blocks its worker thread. Meant for one-shot
    /// CLI runs, not for sharing inside a long-lived async server.
    pub async fn transact<F, Fut, T>(&self, update: F) -> Result<T>
    where
        F: FnOnce(WorkspaceSnapshot) -> Fut,
        Fut: Future<Output = Result<(WorkspaceSnapshot, T)>>,
    {
        let mut lock = RwLock::new(self.open_lock_file()?);
        let _guard = lock
            .write()
            .with_context(|| format!("Failed to lock {}", self.path.display()))?;

        let snapshot = self.read_unlocked()?;
        let (snapshot, output) = update(snapshot).await?;
        self.write_unlocked(&snapshot)?;
        Ok(output)
    }

    fn read_unlocked(&self) -> Result<WorkspaceSnapshot> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "Workspace file missing, starting empty");
            return Ok(WorkspaceSnapshot::default());
        }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid workspace file {}", self.path.display()))
    }

    fn write_unlocked(&self, snapshot: &WorkspaceSnapshot) -> Result<()> {
        self.ensure_parent()?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_string_pretty(snapshot)?)
            .with_context(|| format!("Failed to write {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        debug!(path = %self.path.display(), cases = snapshot.cases.len(), "Workspace saved");
        Ok(())
    }

    fn open_lock_file(&self) -> Result<File> {
        self.ensure_parent()?;
        let lock_path = self.path.with_extension("lock");
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {}", lock_path.display()))
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}
