//! Mount lifecycle: explicit shared state plus a background mount task.
//!
//! The real virtual-filesystem process is an external collaborator behind
//! [`MountBackend`]; the engine only depends on mount/unmount success and on
//! the root being present as an ordinary directory afterwards.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{error, info};

use crate::error::{ChatFsError, Result};

/// Whether a mount is currently serving commands, and where.
#[derive(Debug, Clone)]
pub struct MountState {
    pub active: bool,
    pub root: PathBuf,
}

/// Shared handle to a [`MountState`]. Written only by start/stop; read by
/// every command as a precondition gate.
#[derive(Clone)]
pub struct MountHandle {
    inner: Arc<RwLock<MountState>>,
}

impl MountHandle {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MountState {
                active: false,
                root: root.as_ref().to_path_buf(),
            })),
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.read().expect("mount state poisoned").active
    }

    pub fn root(&self) -> PathBuf {
        self.inner.read().expect("mount state poisoned").root.clone()
    }

    /// Precondition gate for command execution.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(ChatFsError::MountInactive)
        }
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.inner.write().expect("mount state poisoned").active = active;
    }
}

/// The mount/unmount collaborator. `mount` may block for the lifetime of the
/// mount; it is run on a background task.
pub trait MountBackend: Send + Sync {
    fn mount(&self, root: &Path) -> Result<()>;
    fn unmount(&self, root: &Path) -> Result<()>;
}

/// Backend for roots that are ordinary directories already: mounting just
/// ensures the directory exists, unmounting is a no-op. Used by the CLI and
/// in tests.
pub struct PassthroughBackend;

impl MountBackend for PassthroughBackend {
    fn mount(&self, root: &Path) -> Result<()> {
        std::fs::create_dir_all(root)?;
        Ok(())
    }

    fn unmount(&self, _root: &Path) -> Result<()> {
        Ok(())
    }
}

/// Owns the mount state and the background mount task.
pub struct MountSupervisor {
    handle: MountHandle,
    backend: Arc<dyn MountBackend>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl MountSupervisor {
    pub fn new(root: impl AsRef<Path>, backend: Arc<dyn MountBackend>) -> Self {
        Self {
            handle: MountHandle::new(root),
            backend,
            task: Mutex::new(None),
        }
    }

    pub fn handle(&self) -> MountHandle {
        self.handle.clone()
    }

    /// Spawn the blocking mount call on a background task and mark the mount
    /// active. Fire-and-forget relative to command processing.
    pub fn start(&self) -> Result<()> {
        if self.handle.is_active() {
            return Ok(());
        }
        let backend = self.backend.clone();
        let handle = self.handle.clone();
        let root = self.handle.root();

        self.handle.set_active(true);
        let task = tokio::task::spawn_blocking(move || {
            if let Err(e) = backend.mount(&root) {
                error!(root = %root.display(), error = %e, "mount task failed");
                handle.set_active(false);
            }
        });
        *self.task.lock().expect("task slot poisoned") = Some(task);

        info!(root = %self.handle.root().display(), "mount started");
        Ok(())
    }

    /// Unmount, clear the activity flag, and reap the background task.
    pub async fn stop(&self) -> Result<()> {
        self.handle.ensure_active()?;
        let root = self.handle.root();
        self.backend.unmount(&root)?;
        self.handle.set_active(false);

        let task = self.task.lock().expect("task slot poisoned").take();
        if let Some(task) = task {
            let _ = task.await;
        }
        info!(root = %root.display(), "mount stopped");
        Ok(())
    }
}
