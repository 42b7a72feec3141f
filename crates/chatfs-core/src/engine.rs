//! The path command engine: mutating and read operations over the live tree.
//!
//! Every operation validates its arguments through the resolver, checks the
//! mount-active gate, and — for mutations — triggers a snapshot refresh on
//! success. Refresh failures are soft warnings, never command failures.

use std::fs;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;
use walkdir::WalkDir;

use crate::error::{ChatFsError, Result};
use crate::mount::MountHandle;
use crate::resolver::{one_arg, resolve_display, resolve_relative, two_args};
use crate::snapshot::{SnapshotStore, TimestampKind};

/// Outcome of a mutating command: the mutation succeeded; the snapshot
/// refresh may have produced warnings.
#[derive(Debug, Default)]
pub struct Mutated {
    pub warnings: Vec<String>,
}

/// Outcome of a collision-avoiding copy: the relative destination actually
/// used, which may differ from the requested one.
#[derive(Debug)]
pub struct CopyOutcome {
    pub dest: String,
    pub warnings: Vec<String>,
}

/// Flat listing of every file under the mount root, filtered by directory tag.
#[derive(Debug)]
pub struct FlatListing {
    pub path: String,
    pub lines: Vec<String>,
}

impl FlatListing {
    /// Reply text: the lines, or the distinct empty-subtree message.
    pub fn render(&self) -> String {
        if self.lines.is_empty() {
            format!(
                "Directory {} and all subdirectories are empty.",
                self.path
            )
        } else {
            self.lines.join("\n")
        }
    }
}

/// ASCII-art rendering of one subtree.
#[derive(Debug)]
pub struct TreeListing {
    pub path: String,
    pub lines: Vec<String>,
}

impl TreeListing {
    pub fn render(&self) -> String {
        if self.lines.is_empty() {
            format!(
                "Directory {} and all subdirectories are empty.",
                self.path
            )
        } else {
            self.lines.join("\n")
        }
    }
}

/// Executes operator commands against the live tree under the mount root.
pub struct CommandEngine {
    root: PathBuf,
    mount: MountHandle,
    snapshots: Arc<SnapshotStore>,
    max_depth: usize,
}

impl CommandEngine {
    pub fn new(
        root: impl AsRef<Path>,
        mount: MountHandle,
        snapshots: Arc<SnapshotStore>,
        max_depth: usize,
    ) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            mount,
            snapshots,
            max_depth,
        }
    }

    fn refreshed(&self) -> Mutated {
        Mutated {
            warnings: self.snapshots.refresh(),
        }
    }

    /// Create a directory (and missing intermediates) with permissive mode.
    /// Fails if the name resolves to an existing entry.
    pub fn mkdir(&self, args: &str) -> Result<Mutated> {
        self.mount.ensure_active()?;
        let name = one_arg(args)?;
        let path = resolve_relative(&self.root, &name)?;
        if path.exists() {
            return Err(ChatFsError::AlreadyExists { path: name });
        }
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o777)
            .create(&path)?;
        info!(dir = %name, "directory created");
        Ok(self.refreshed())
    }

    /// Move `src` to `dst`. Both endpoints must already exist; moving onto an
    /// existing directory places the source inside it.
    pub fn mv(&self, args: &str) -> Result<Mutated> {
        self.mount.ensure_active()?;
        let (src_raw, dst_raw) = two_args(args)?;
        let src = resolve_relative(&self.root, &src_raw)?;
        let dst = resolve_relative(&self.root, &dst_raw)?;

        if src == dst {
            return Err(ChatFsError::IdenticalSourceDestination { path: src_raw });
        }
        if !src.exists() {
            return Err(ChatFsError::NotFound { path: src_raw });
        }
        if !dst.exists() {
            return Err(ChatFsError::NotFound { path: dst_raw });
        }

        let target = if dst.is_dir() {
            dst.join(basename(&src)?)
        } else {
            dst
        };
        fs::rename(&src, &target)?;
        info!(src = %src_raw, dst = %dst_raw, "moved");
        Ok(self.refreshed())
    }

    /// Collision-avoiding copy: never overwrites; picks the smallest free
    /// numeric suffix when the effective destination is taken. Returns the
    /// relative path actually used.
    pub fn cp(&self, args: &str) -> Result<CopyOutcome> {
        self.mount.ensure_active()?;
        let (src_raw, dst_raw) = two_args(args)?;
        let src = resolve_relative(&self.root, &src_raw)?;
        let dst = resolve_relative(&self.root, &dst_raw)?;

        if !src.exists() {
            return Err(ChatFsError::NotFound { path: src_raw });
        }

        let effective = if dst.exists() && dst.is_dir() {
            dst.join(basename(&src)?)
        } else {
            dst
        };
        let mut target = effective.clone();
        let mut counter = 1;
        while target.exists() {
            target = with_suffix(&effective, counter, src.is_dir())?;
            counter += 1;
        }

        if src.is_dir() {
            copy_tree(&src, &target, self.max_depth)?;
        } else {
            fs::copy(&src, &target)?;
        }

        let dest = target
            .strip_prefix(&self.root)
            .map_err(|_| ChatFsError::InvalidPath {
                path: dst_raw.clone(),
            })?
            .to_string_lossy()
            .into_owned();
        info!(src = %src_raw, dest = %dest, "copied");
        let warnings = self.snapshots.refresh();
        Ok(CopyOutcome { dest, warnings })
    }

    /// Remove one path: files directly, directories recursively.
    pub fn rm(&self, args: &str) -> Result<Mutated> {
        self.mount.ensure_active()?;
        let raw = one_arg(args)?;
        let path = resolve_relative(&self.root, &raw)?;
        if !path.exists() {
            return Err(ChatFsError::NotFound { path: raw });
        }
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        info!(path = %raw, "removed");
        Ok(self.refreshed())
    }

    /// Flat listing: one `<dir> name` line per file anywhere under the root,
    /// filtered to lines whose directory tag starts with the requested path.
    pub fn ls(&self, args: Option<&str>) -> Result<FlatListing> {
        self.mount.ensure_active()?;
        let raw = match args {
            Some(text) => one_arg(text)?,
            None => "/".to_string(),
        };
        let requested = resolve_display(&self.root, &raw)?;
        if !requested.exists() {
            return Err(ChatFsError::NotFound { path: raw });
        }

        let mut lines = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(true)
            .max_depth(self.max_depth)
        {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if entry.depth() == 0 || !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(&self.root) {
                Ok(r) => r,
                Err(_) => continue,
            };
            let tag = match rel.parent() {
                Some(p) if p.as_os_str().is_empty() => "/".to_string(),
                Some(p) => format!("/{}", p.to_string_lossy()),
                None => "/".to_string(),
            };
            let name = entry.file_name().to_string_lossy();
            if entry.path_is_symlink() {
                lines.push(format!("<{tag}> {name} ->"));
            } else {
                lines.push(format!("<{tag}> {name}"));
            }
        }

        let filter = format!("<{raw}");
        lines.retain(|line| line.starts_with(&filter));
        Ok(FlatListing { path: raw, lines })
    }

    /// Recursive tree rendering of one subtree, depth-guarded.
    pub fn trls(&self, args: Option<&str>) -> Result<TreeListing> {
        self.mount.ensure_active()?;
        let raw = match args {
            Some(text) => one_arg(text)?,
            None => "/".to_string(),
        };
        let target = resolve_display(&self.root, &raw)?;
        if !target.exists() {
            return Err(ChatFsError::NotFound { path: raw });
        }
        if !target.is_dir() {
            return Err(ChatFsError::NotADirectory { path: raw });
        }

        let mut lines = Vec::new();
        render_tree(&target, "", self.max_depth, &mut lines)?;
        Ok(TreeListing { path: raw, lines })
    }

    /// Creation timestamp from the last persisted snapshot. Reads the
    /// snapshot artifact, not the live tree, and needs no active mount.
    pub fn ctime(&self, args: &str) -> Result<String> {
        let raw = one_arg(args)?;
        self.snapshots.timestamp_of(&raw, TimestampKind::Created)
    }

    /// Modification timestamp from the last persisted snapshot.
    pub fn mtime(&self, args: &str) -> Result<String> {
        let raw = one_arg(args)?;
        self.snapshots.timestamp_of(&raw, TimestampKind::Modified)
    }

    /// Upload landing: store `bytes` under `dir/filename` (dir defaults to
    /// the root), creating parents. Fails if the file already exists.
    pub fn save(&self, dir: Option<&str>, filename: &str, bytes: &[u8]) -> Result<Mutated> {
        self.mount.ensure_active()?;
        let dir_path = match dir {
            Some(raw) => resolve_relative(&self.root, raw)?,
            None => self.root.clone(),
        };
        // suggested filenames come from the transport; keep the basename only
        let name = Path::new(filename)
            .file_name()
            .ok_or_else(|| ChatFsError::InvalidPath {
                path: filename.to_string(),
            })?;
        let target = dir_path.join(name);
        fs::create_dir_all(&dir_path)?;
        if target.exists() {
            return Err(ChatFsError::AlreadyExists {
                path: name.to_string_lossy().into_owned(),
            });
        }
        fs::write(&target, bytes)?;
        info!(file = %name.to_string_lossy(), bytes = bytes.len(), "file saved");
        Ok(self.refreshed())
    }

    /// Download source: the exact bytes of one existing regular file.
    pub fn read_file(&self, args: &str) -> Result<Vec<u8>> {
        self.mount.ensure_active()?;
        let raw = one_arg(args)?;
        let path = resolve_relative(&self.root, &raw)?;
        if !path.exists() || !path.is_file() {
            return Err(ChatFsError::NotFound { path: raw });
        }
        Ok(fs::read(path)?)
    }
}

fn basename(path: &Path) -> Result<&std::ffi::OsStr> {
    path.file_name().ok_or_else(|| ChatFsError::InvalidPath {
        path: path.to_string_lossy().into_owned(),
    })
}

/// Append `(counter)` before the extension for files, after the full name for
/// directories.
fn with_suffix(path: &Path, counter: u32, is_dir: bool) -> Result<PathBuf> {
    let parent = path.parent().unwrap_or(Path::new(""));
    let name = basename(path)?.to_string_lossy();
    let suffixed = if is_dir {
        format!("{name}({counter})")
    } else {
        match (path.file_stem(), path.extension()) {
            (Some(stem), Some(ext)) => format!(
                "{}({counter}).{}",
                stem.to_string_lossy(),
                ext.to_string_lossy()
            ),
            _ => format!("{name}({counter})"),
        }
    };
    Ok(parent.join(suffixed))
}

/// Recursive directory copy with a depth guard.
fn copy_tree(src: &Path, dst: &Path, depth: usize) -> Result<()> {
    if depth == 0 {
        return Err(ChatFsError::Other(format!(
            "copy depth limit reached at {}",
            src.display()
        )));
    }
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target, depth - 1)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// One level of the ASCII tree: entries sorted case-insensitively, branch
/// connectors for all but the last entry, corner for the last; directories
/// are recursed with the matching continuation prefix, symlinks are not.
fn render_tree(dir: &Path, prefix: &str, depth: usize, out: &mut Vec<String>) -> Result<()> {
    if depth == 0 {
        return Ok(());
    }
    let mut entries: Vec<(String, PathBuf)> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
        .collect();
    entries.sort_by_key(|(name, _)| name.to_lowercase());

    let count = entries.len();
    for (i, (name, path)) in entries.into_iter().enumerate() {
        let last = i + 1 == count;
        let pointer = if last { "└── " } else { "├── " };
        let is_link = fs::symlink_metadata(&path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);

        if path.is_dir() && !is_link {
            out.push(format!("{prefix}{pointer}{name}/"));
            let extension = if last { "    " } else { "│   " };
            render_tree(&path, &format!("{prefix}{extension}"), depth - 1, out)?;
        } else if is_link {
            out.push(format!("{prefix}{pointer}{name} ->"));
        } else {
            out.push(format!("{prefix}{pointer}{name}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> CommandEngine {
        let root = dir.path().join("mnt");
        fs::create_dir_all(&root).unwrap();
        let mount = MountHandle::new(&root);
        mount.set_active(true);
        let snapshots = Arc::new(SnapshotStore::new(
            &root,
            dir.path().join("attrs.json"),
            dir.path().join("data.json"),
            64,
        ));
        CommandEngine::new(&root, mount, snapshots, 64)
    }

    fn root(dir: &TempDir) -> PathBuf {
        dir.path().join("mnt")
    }

    #[test]
    fn gate_rejects_inactive_mount() {
        let dir = TempDir::new().unwrap();
        let eng = engine(&dir);
        eng.mount.set_active(false);
        assert!(matches!(eng.mkdir("a"), Err(ChatFsError::MountInactive)));
        assert!(matches!(eng.ls(None), Err(ChatFsError::MountInactive)));
    }

    #[test]
    fn mkdir_creates_and_collides() {
        let dir = TempDir::new().unwrap();
        let eng = engine(&dir);

        eng.mkdir("a/b/c").unwrap();
        assert!(root(&dir).join("a/b/c").is_dir());

        assert!(matches!(
            eng.mkdir("a/b/c"),
            Err(ChatFsError::AlreadyExists { .. })
        ));
        assert!(matches!(
            eng.mkdir("/abs"),
            Err(ChatFsError::InvalidPath { .. })
        ));
        // exactly one token
        assert!(matches!(
            eng.mkdir("one two"),
            Err(ChatFsError::InvalidPath { .. })
        ));
        // quoted names may contain spaces
        eng.mkdir(r#""with space""#).unwrap();
        assert!(root(&dir).join("with space").is_dir());
    }

    #[test]
    fn mv_requires_both_endpoints() {
        let dir = TempDir::new().unwrap();
        let eng = engine(&dir);
        fs::write(root(&dir).join("a.txt"), b"a").unwrap();

        assert!(matches!(
            eng.mv("a.txt missing_dir"),
            Err(ChatFsError::NotFound { .. })
        ));
        assert!(matches!(
            eng.mv("ghost.txt a.txt"),
            Err(ChatFsError::NotFound { .. })
        ));
        assert!(matches!(
            eng.mv("a.txt a.txt"),
            Err(ChatFsError::IdenticalSourceDestination { .. })
        ));
    }

    #[test]
    fn mv_into_existing_directory() {
        let dir = TempDir::new().unwrap();
        let eng = engine(&dir);
        fs::write(root(&dir).join("a.txt"), b"a").unwrap();
        fs::create_dir(root(&dir).join("sub")).unwrap();

        eng.mv("a.txt sub").unwrap();
        assert!(!root(&dir).join("a.txt").exists());
        assert!(root(&dir).join("sub/a.txt").is_file());
    }

    #[test]
    fn cp_picks_smallest_free_suffix() {
        let dir = TempDir::new().unwrap();
        let eng = engine(&dir);
        fs::write(root(&dir).join("a.txt"), b"src").unwrap();
        fs::write(root(&dir).join("b.txt"), b"taken").unwrap();

        let out = eng.cp("a.txt b.txt").unwrap();
        assert_eq!(out.dest, "b(1).txt");
        assert_eq!(fs::read(root(&dir).join("b(1).txt")).unwrap(), b"src");
        // nothing was overwritten
        assert_eq!(fs::read(root(&dir).join("b.txt")).unwrap(), b"taken");

        let out = eng.cp("a.txt b.txt").unwrap();
        assert_eq!(out.dest, "b(2).txt");
    }

    #[test]
    fn cp_into_directory_and_recursive() {
        let dir = TempDir::new().unwrap();
        let eng = engine(&dir);
        fs::create_dir(root(&dir).join("src")).unwrap();
        fs::write(root(&dir).join("src/inner.txt"), b"x").unwrap();
        fs::create_dir(root(&dir).join("dst")).unwrap();

        let out = eng.cp("src dst").unwrap();
        assert_eq!(out.dest, "dst/src");
        assert!(root(&dir).join("dst/src/inner.txt").is_file());

        // copying again collides on the directory name
        let out = eng.cp("src dst").unwrap();
        assert_eq!(out.dest, "dst/src(1)");
    }

    #[test]
    fn cp_missing_source() {
        let dir = TempDir::new().unwrap();
        let eng = engine(&dir);
        assert!(matches!(
            eng.cp("ghost dst"),
            Err(ChatFsError::NotFound { .. })
        ));
    }

    #[test]
    fn rm_files_and_trees() {
        let dir = TempDir::new().unwrap();
        let eng = engine(&dir);
        fs::write(root(&dir).join("a.txt"), b"a").unwrap();
        fs::create_dir_all(root(&dir).join("d/e")).unwrap();
        fs::write(root(&dir).join("d/e/f.txt"), b"f").unwrap();

        eng.rm("a.txt").unwrap();
        assert!(!root(&dir).join("a.txt").exists());

        eng.rm("d").unwrap();
        assert!(!root(&dir).join("d").exists());

        assert!(matches!(eng.rm("d"), Err(ChatFsError::NotFound { .. })));
        assert!(matches!(
            eng.rm("a b"),
            Err(ChatFsError::InvalidPath { .. })
        ));
    }

    #[test]
    fn ls_tags_filters_and_marks_symlinks() {
        let dir = TempDir::new().unwrap();
        let eng = engine(&dir);
        fs::write(root(&dir).join("top.txt"), b"t").unwrap();
        fs::create_dir(root(&dir).join("sub")).unwrap();
        fs::write(root(&dir).join("sub/inner.txt"), b"i").unwrap();
        std::os::unix::fs::symlink(root(&dir).join("top.txt"), root(&dir).join("sub/link.txt"))
            .unwrap();

        let all = eng.ls(None).unwrap();
        assert!(all.lines.contains(&"</> top.txt".to_string()));
        assert!(all.lines.contains(&"</sub> inner.txt".to_string()));
        assert!(all.lines.contains(&"</sub> link.txt ->".to_string()));

        let sub = eng.ls(Some("/sub")).unwrap();
        assert_eq!(sub.lines.len(), 2);

        // display form requires the leading separator
        assert!(matches!(
            eng.ls(Some("sub")),
            Err(ChatFsError::InvalidPath { .. })
        ));
        assert!(matches!(
            eng.ls(Some("/ghost")),
            Err(ChatFsError::NotFound { .. })
        ));
    }

    #[test]
    fn ls_empty_subtree_message() {
        let dir = TempDir::new().unwrap();
        let eng = engine(&dir);
        fs::create_dir(root(&dir).join("empty")).unwrap();

        let listing = eng.ls(Some("/empty")).unwrap();
        assert!(listing.lines.is_empty());
        assert_eq!(
            listing.render(),
            "Directory /empty and all subdirectories are empty."
        );
    }

    #[test]
    fn tree_sorts_and_connects() {
        let dir = TempDir::new().unwrap();
        let eng = engine(&dir);
        fs::write(root(&dir).join("b"), b"").unwrap();
        fs::write(root(&dir).join("a"), b"").unwrap();

        let tree = eng.trls(None).unwrap();
        assert_eq!(tree.lines, vec!["├── a", "└── b"]);
    }

    #[test]
    fn tree_nested_prefixes_and_symlinks() {
        let dir = TempDir::new().unwrap();
        let eng = engine(&dir);
        fs::create_dir(root(&dir).join("Adir")).unwrap();
        fs::write(root(&dir).join("Adir/x.txt"), b"").unwrap();
        fs::write(root(&dir).join("z.txt"), b"").unwrap();
        std::os::unix::fs::symlink(root(&dir).join("Adir"), root(&dir).join("mirror")).unwrap();

        let tree = eng.trls(None).unwrap();
        assert_eq!(
            tree.lines,
            vec![
                "├── Adir/",
                "│   └── x.txt",
                "├── mirror ->",
                "└── z.txt",
            ]
        );
    }

    #[test]
    fn timestamps_skip_the_mount_gate() {
        let dir = TempDir::new().unwrap();
        let eng = engine(&dir);
        fs::write(root(&dir).join("a.txt"), b"a").unwrap();
        eng.snapshots.refresh();

        eng.mount.set_active(false);
        assert!(eng.ctime("a.txt").is_ok());
        assert!(eng.mtime("a.txt").is_ok());
        assert!(matches!(
            eng.ctime("ghost.txt"),
            Err(ChatFsError::NotFound { .. })
        ));
    }

    #[test]
    fn save_lands_uploads_without_overwriting() {
        let dir = TempDir::new().unwrap();
        let eng = engine(&dir);

        eng.save(Some("uploads"), "report.pdf", b"pdf bytes").unwrap();
        assert_eq!(
            fs::read(root(&dir).join("uploads/report.pdf")).unwrap(),
            b"pdf bytes"
        );
        assert!(matches!(
            eng.save(Some("uploads"), "report.pdf", b"other"),
            Err(ChatFsError::AlreadyExists { .. })
        ));
        assert!(matches!(
            eng.save(Some("/uploads"), "x", b""),
            Err(ChatFsError::InvalidPath { .. })
        ));
        // suggested filenames are reduced to their basename
        eng.save(None, "../escape.txt", b"safe").unwrap();
        assert!(root(&dir).join("escape.txt").is_file());
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn read_file_for_download() {
        let dir = TempDir::new().unwrap();
        let eng = engine(&dir);
        fs::write(root(&dir).join("doc.txt"), b"body").unwrap();
        fs::create_dir(root(&dir).join("d")).unwrap();

        assert_eq!(eng.read_file("doc.txt").unwrap(), b"body");
        assert!(matches!(
            eng.read_file("d"),
            Err(ChatFsError::NotFound { .. })
        ));
        assert!(matches!(
            eng.read_file("ghost"),
            Err(ChatFsError::NotFound { .. })
        ));
    }
}
