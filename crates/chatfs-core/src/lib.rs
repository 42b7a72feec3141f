//! chatfs-core: the engine behind a chat-driven remote file manager.
//!
//! A [`ChatFs`] instance owns one sandboxed mount root and exposes the
//! command engine (mkdir/mv/cp/rm/listings/timestamps), the image conversion
//! workflow with its confirmation sessions, the tag-based grouping indexer,
//! and the persisted metadata snapshots that back timestamp queries. The chat
//! transport, the real virtual-filesystem process, and real tag extraction
//! live behind the [`MountBackend`] and [`TagReader`] traits.

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod group;
pub mod mount;
pub mod resolver;
pub mod snapshot;

use std::path::PathBuf;
use std::process::Command;
use std::sync::{Arc, Mutex};

use tracing::info;

pub use config::{ChatFsConfig, ChatFsConfigBuilder};
pub use convert::{AnswerOutcome, CommitReport, ConvertReport, Converter, SessionState};
pub use engine::{CommandEngine, CopyOutcome, FlatListing, Mutated, TreeListing};
pub use error::{ChatFsError, Result};
pub use group::{AudioTags, GroupIndexer, GroupReport, NoopTagReader, TagReader};
pub use mount::{MountBackend, MountHandle, MountSupervisor, PassthroughBackend};
pub use snapshot::{Snapshot, SnapshotStore, TimestampKind};

use resolver::{resolve_display, resolve_relative, two_args};

/// A secondary mount driven by an operator-supplied command file.
struct CustomMount {
    supervisor: MountSupervisor,
    snapshots: Arc<SnapshotStore>,
    config_path: PathBuf,
    root: PathBuf,
}

/// Top-level instance: one mount root, its snapshot store, and the engine
/// components wired to a shared mount gate.
pub struct ChatFs {
    config: ChatFsConfig,
    supervisor: MountSupervisor,
    snapshots: Arc<SnapshotStore>,
    backend: Arc<dyn MountBackend>,
    custom: Mutex<Option<CustomMount>>,
    pub engine: CommandEngine,
    pub converter: Converter,
    pub groups: GroupIndexer,
}

impl ChatFs {
    pub fn new(
        config: ChatFsConfig,
        backend: Arc<dyn MountBackend>,
        tags: Arc<dyn TagReader>,
    ) -> Self {
        let supervisor = MountSupervisor::new(&config.mount_root, backend.clone());
        let handle = supervisor.handle();
        let snapshots = Arc::new(SnapshotStore::new(
            &config.mount_root,
            &config.attrs_path,
            &config.content_path,
            config.max_walk_depth,
        ));
        let engine = CommandEngine::new(
            &config.mount_root,
            handle.clone(),
            snapshots.clone(),
            config.max_walk_depth,
        );
        let converter = Converter::new(&config.mount_root, handle.clone(), snapshots.clone());
        let groups = GroupIndexer::new(
            &config.mount_root,
            &config.group_dest_name,
            handle,
            snapshots.clone(),
            tags,
            config.max_walk_depth,
        );
        Self {
            config,
            supervisor,
            snapshots,
            backend,
            custom: Mutex::new(None),
            engine,
            converter,
            groups,
        }
    }

    pub fn config(&self) -> &ChatFsConfig {
        &self.config
    }

    pub fn mount_handle(&self) -> MountHandle {
        self.supervisor.handle()
    }

    pub fn snapshots(&self) -> Arc<SnapshotStore> {
        self.snapshots.clone()
    }

    /// Activate the mount and take an initial snapshot. Persistence problems
    /// are returned as warnings, never as failure.
    pub fn start(&self) -> Result<Vec<String>> {
        self.supervisor.start()?;
        Ok(self.snapshots.refresh())
    }

    pub async fn stop(&self) -> Result<()> {
        self.supervisor.stop().await
    }

    /// Bring up a secondary mount described by `<mount-point> <config-file>`.
    ///
    /// The config file is a relative-form path under the primary root and must
    /// already exist there; the mount point is taken as a plain filesystem
    /// path and must differ from the config file. The custom mount keeps its
    /// own snapshot artifacts.
    pub fn start_custom(&self, args: &str) -> Result<Vec<String>> {
        let (mount_raw, config_raw) = two_args(args)?;
        let config_path = resolve_relative(&self.config.mount_root, &config_raw)?;
        if !config_path.is_file() {
            return Err(ChatFsError::NotFound { path: config_raw });
        }
        let mount_path = PathBuf::from(&mount_raw);
        if mount_path == config_path {
            return Err(ChatFsError::IdenticalSourceDestination { path: mount_raw });
        }

        let mut slot = self.custom.lock().expect("custom mount slot poisoned");
        if slot.is_some() {
            return Err(ChatFsError::AlreadyExists { path: mount_raw });
        }

        let supervisor = MountSupervisor::new(&mount_path, self.backend.clone());
        supervisor.start()?;
        let snapshots = Arc::new(SnapshotStore::new(
            &mount_path,
            &self.config.custom_attrs_path,
            &self.config.custom_content_path,
            self.config.max_walk_depth,
        ));
        let warnings = snapshots.refresh();
        info!(mount = %mount_path.display(), config = %config_path.display(), "custom mount started");
        *slot = Some(CustomMount {
            supervisor,
            snapshots,
            config_path,
            root: mount_path,
        });
        Ok(warnings)
    }

    /// Run the custom config's command lines in a directory of the primary
    /// tree (display-form path, `/` for the primary root). The literal line
    /// `pass` stands for a plain `ls -l` with its `total` header dropped.
    pub fn custom_list(&self, args: Option<&str>) -> Result<String> {
        let slot = self.custom.lock().expect("custom mount slot poisoned");
        let custom = slot.as_ref().ok_or(ChatFsError::MountInactive)?;
        custom.supervisor.handle().ensure_active()?;

        let raw = args.unwrap_or("/").trim();
        let target = resolve_display(&self.config.mount_root, raw)?;
        if !target.is_dir() {
            return Err(ChatFsError::NotADirectory {
                path: raw.to_string(),
            });
        }

        let script = std::fs::read_to_string(&custom.config_path)?;
        let mut output = String::new();
        for line in script.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let is_listing = line == "pass";
            let command = if is_listing { "ls -l" } else { line };
            let result = Command::new("sh")
                .arg("-c")
                .arg(command)
                .current_dir(&target)
                .output()?;
            let stdout = String::from_utf8_lossy(&result.stdout);
            if is_listing {
                // ls -l leads with a "total N" summary line
                output.push_str(stdout.splitn(2, '\n').nth(1).unwrap_or(""));
            } else {
                output.push_str(&stdout);
            }
            if !result.status.success() {
                output.push_str(&String::from_utf8_lossy(&result.stderr));
            }
        }
        Ok(output)
    }

    /// Tear the custom mount down and resnapshot the primary tree.
    pub async fn stop_custom(&self) -> Result<Vec<String>> {
        let custom = self
            .custom
            .lock()
            .expect("custom mount slot poisoned")
            .take()
            .ok_or(ChatFsError::MountInactive)?;
        custom.supervisor.stop().await?;
        let mut warnings = custom.snapshots.refresh();
        warnings.extend(self.snapshots.refresh());
        info!(mount = %custom.root.display(), "custom mount stopped");
        Ok(warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn instance(dir: &TempDir) -> ChatFs {
        let config = ChatFsConfig::builder(dir.path().join("mnt")).build();
        ChatFs::new(config, Arc::new(PassthroughBackend), Arc::new(NoopTagReader))
    }

    #[tokio::test]
    async fn start_gates_and_snapshots() {
        let dir = TempDir::new().unwrap();
        let fs_ = instance(&dir);

        assert!(matches!(
            fs_.engine.mkdir("docs"),
            Err(ChatFsError::MountInactive)
        ));

        fs_.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        fs_.engine.mkdir("docs").unwrap();
        assert!(dir.path().join("mnt/docs").is_dir());
        assert!(fs_.config().attrs_path.is_file());

        fs_.stop().await.unwrap();
        assert!(matches!(
            fs_.engine.rm("docs"),
            Err(ChatFsError::MountInactive)
        ));
    }

    #[tokio::test]
    async fn custom_mount_validation() {
        let dir = TempDir::new().unwrap();
        let fs_ = instance(&dir);
        fs_.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // config file must already exist under the primary root
        assert!(matches!(
            fs_.start_custom("/tmp/custom-mnt commands.txt"),
            Err(ChatFsError::NotFound { .. })
        ));

        fs::write(dir.path().join("mnt/commands.txt"), "pass\n").unwrap();
        let config_abs = dir.path().join("mnt/commands.txt");
        assert!(matches!(
            fs_.start_custom(&format!("{} commands.txt", config_abs.display())),
            Err(ChatFsError::IdenticalSourceDestination { .. })
        ));

        let custom_root = dir.path().join("custom-mnt");
        fs::create_dir_all(&custom_root).unwrap();
        fs_.start_custom(&format!("{} commands.txt", custom_root.display()))
            .unwrap();
        // a second custom mount is refused while one is up
        assert!(matches!(
            fs_.start_custom(&format!("{} commands.txt", custom_root.display())),
            Err(ChatFsError::AlreadyExists { .. })
        ));
        fs_.stop_custom().await.unwrap();
        assert!(matches!(
            fs_.stop_custom().await,
            Err(ChatFsError::MountInactive)
        ));
    }

    #[tokio::test]
    async fn custom_list_runs_config_commands() {
        let dir = TempDir::new().unwrap();
        let fs_ = instance(&dir);
        fs_.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        fs::write(
            dir.path().join("mnt/commands.txt"),
            "echo alpha\npass\necho omega\n",
        )
        .unwrap();
        fs::write(dir.path().join("mnt/present.txt"), b"x").unwrap();
        let custom_root = dir.path().join("custom-mnt");
        fs::create_dir_all(&custom_root).unwrap();

        fs_.start_custom(&format!("{} commands.txt", custom_root.display()))
            .unwrap();
        let out = fs_.custom_list(None).unwrap();
        assert!(out.starts_with("alpha\n"));
        assert!(out.contains("present.txt"));
        // the ls header line is dropped for the pass substitution
        assert!(!out.contains("total"));
        assert!(out.ends_with("omega\n"));

        // display-form path rules apply to the listing target
        assert!(matches!(
            fs_.custom_list(Some("relative")),
            Err(ChatFsError::InvalidPath { .. })
        ));

        fs_.stop_custom().await.unwrap();
        assert!(matches!(
            fs_.custom_list(None),
            Err(ChatFsError::MountInactive)
        ));
    }

    #[tokio::test]
    async fn custom_list_targets_the_primary_tree() {
        let dir = TempDir::new().unwrap();
        let fs_ = instance(&dir);
        fs_.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        fs::write(dir.path().join("mnt/commands.txt"), "pass\n").unwrap();
        fs::create_dir(dir.path().join("mnt/foo")).unwrap();
        fs::write(dir.path().join("mnt/foo/inner.txt"), b"x").unwrap();
        let custom_root = dir.path().join("custom-mnt");
        fs::create_dir_all(custom_root.join("bar")).unwrap();

        fs_.start_custom(&format!("{} commands.txt", custom_root.display()))
            .unwrap();

        // directories under the primary root are valid listing targets
        let out = fs_.custom_list(Some("/foo")).unwrap();
        assert!(out.contains("inner.txt"));

        // ones that exist only under the custom mount are not
        assert!(matches!(
            fs_.custom_list(Some("/bar")),
            Err(ChatFsError::NotADirectory { .. })
        ));

        fs_.stop_custom().await.unwrap();
    }
}
