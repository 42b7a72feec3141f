//! Metadata snapshot engine: full-tree walks, persistence, point lookups.
//!
//! Timestamp queries read the last persisted snapshot, never the live tree.
//! That staleness is the contract: the snapshot is the system of record for
//! "when was this created/modified" until the next mutating command re-walks.

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::TimeZone;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ChatFsError, Result};

/// POSIX kind bits.
const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;
const S_IFLNK: u32 = 0o120000;
const S_IFMT: u32 = 0o170000;

/// Attributes of one filesystem node, keyed by its relative path in the
/// enclosing [`Snapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub mode: u32,
    pub ctime: f64,
    pub mtime: f64,
    pub atime: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub nlink: u32,
}

impl Node {
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_file(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    pub fn is_symlink(&self) -> bool {
        self.mode & S_IFMT == S_IFLNK
    }
}

/// Point-in-time capture of the tree under the mount root: attributes for
/// every node plus the raw bytes of every regular file.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub files: BTreeMap<String, Node>,
    pub data: BTreeMap<String, Vec<u8>>,
}

/// Which timestamp field a query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampKind {
    Created,
    Modified,
}

#[derive(Serialize)]
struct AttrsDocRef<'a> {
    files: &'a BTreeMap<String, Node>,
}

#[derive(Deserialize)]
struct AttrsDoc {
    files: BTreeMap<String, Node>,
}

/// Walks the mount root, persists snapshots, answers timestamp queries.
pub struct SnapshotStore {
    root: PathBuf,
    attrs_path: PathBuf,
    content_path: PathBuf,
    max_depth: usize,
}

impl SnapshotStore {
    pub fn new(
        root: impl AsRef<Path>,
        attrs_path: impl AsRef<Path>,
        content_path: impl AsRef<Path>,
        max_depth: usize,
    ) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            attrs_path: attrs_path.as_ref().to_path_buf(),
            content_path: content_path.as_ref().to_path_buf(),
            max_depth,
        }
    }

    /// Recursively capture every entry under the root, following directory
    /// symlinks, bounded by the configured depth. Entries that cannot be read
    /// are skipped with a warning; the walk itself never aborts mid-tree.
    pub fn walk(&self) -> Result<Snapshot> {
        let now = epoch_now();
        let mut snapshot = Snapshot::default();

        for entry in WalkDir::new(&self.root)
            .follow_links(true)
            .max_depth(self.max_depth)
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry during walk");
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }
            let rel = match entry.path().strip_prefix(&self.root) {
                Ok(r) => r.to_string_lossy().into_owned(),
                Err(_) => continue,
            };

            if entry.file_type().is_dir() {
                snapshot.files.insert(
                    rel,
                    Node {
                        mode: S_IFDIR | 0o755,
                        ctime: now,
                        mtime: now,
                        atime: now,
                        size: None,
                        nlink: 2,
                    },
                );
            } else if entry.path_is_symlink() {
                // Followed file symlinks keep their link identity; content
                // belongs to the target, not the snapshot.
                let meta = match fs::symlink_metadata(entry.path()) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(path = %rel, error = %e, "skipping unreadable symlink");
                        continue;
                    }
                };
                snapshot.files.insert(
                    rel,
                    Node {
                        mode: S_IFLNK | 0o777,
                        ctime: meta.ctime() as f64 + meta.ctime_nsec() as f64 * 1e-9,
                        mtime: meta.mtime() as f64 + meta.mtime_nsec() as f64 * 1e-9,
                        atime: meta.atime() as f64 + meta.atime_nsec() as f64 * 1e-9,
                        size: None,
                        nlink: 1,
                    },
                );
            } else if entry.file_type().is_file() {
                let meta = match entry.metadata() {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(path = %rel, error = %e, "skipping unreadable file");
                        continue;
                    }
                };
                let content = match fs::read(entry.path()) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(path = %rel, error = %e, "skipping unreadable file content");
                        continue;
                    }
                };
                snapshot.files.insert(
                    rel.clone(),
                    Node {
                        mode: S_IFREG | 0o644,
                        ctime: meta.ctime() as f64 + meta.ctime_nsec() as f64 * 1e-9,
                        mtime: meta.mtime() as f64 + meta.mtime_nsec() as f64 * 1e-9,
                        atime: meta.atime() as f64 + meta.atime_nsec() as f64 * 1e-9,
                        size: Some(content.len() as u64),
                        nlink: 1,
                    },
                );
                snapshot.data.insert(rel, content);
            }
        }

        debug!(nodes = snapshot.files.len(), "walk complete");
        Ok(snapshot)
    }

    /// Persist the two artifacts independently. A failure writing one is
    /// logged and collected, and does not prevent attempting the other.
    pub fn persist(&self, snapshot: &Snapshot) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Err(e) = self.write_attrs(snapshot) {
            warn!(path = %self.attrs_path.display(), error = %e, "failed to persist attributes");
            warnings.push(format!("failed to persist attributes: {e}"));
        }
        if let Err(e) = self.write_content(snapshot) {
            warn!(path = %self.content_path.display(), error = %e, "failed to persist content");
            warnings.push(format!("failed to persist content: {e}"));
        }
        warnings
    }

    fn write_attrs(&self, snapshot: &Snapshot) -> Result<()> {
        let file = fs::File::create(&self.attrs_path)?;
        serde_json::to_writer(file, &AttrsDocRef {
            files: &snapshot.files,
        })?;
        Ok(())
    }

    fn write_content(&self, snapshot: &Snapshot) -> Result<()> {
        let encoded: BTreeMap<&String, String> = snapshot
            .data
            .iter()
            .map(|(path, bytes)| (path, BASE64.encode(bytes)))
            .collect();
        let file = fs::File::create(&self.content_path)?;
        serde_json::to_writer(file, &encoded)?;
        Ok(())
    }

    /// Walk and persist in one step. Errors at either stage are demoted to
    /// warnings: by the time a refresh runs, the triggering command has
    /// already succeeded on the live tree.
    pub fn refresh(&self) -> Vec<String> {
        match self.walk() {
            Ok(snapshot) => self.persist(&snapshot),
            Err(e) => {
                warn!(error = %e, "snapshot walk failed");
                vec![format!("snapshot walk failed: {e}")]
            }
        }
    }

    /// Load attributes from the last persisted artifact. Content is loaded
    /// separately by whichever caller needs it.
    pub fn load(&self) -> Result<Snapshot> {
        let file = fs::File::open(&self.attrs_path)?;
        let doc: AttrsDoc = serde_json::from_reader(file)?;
        Ok(Snapshot {
            files: doc.files,
            data: BTreeMap::new(),
        })
    }

    /// Load the content artifact, decoding each entry back to raw bytes.
    pub fn load_content(&self) -> Result<BTreeMap<String, Vec<u8>>> {
        let file = fs::File::open(&self.content_path)?;
        let encoded: BTreeMap<String, String> = serde_json::from_reader(file)?;
        encoded
            .into_iter()
            .map(|(path, b64)| {
                let bytes = BASE64.decode(b64.as_bytes()).map_err(|e| {
                    ChatFsError::Other(format!("corrupt content entry {path}: {e}"))
                })?;
                Ok((path, bytes))
            })
            .collect()
    }

    /// Format the requested timestamp of `path` from the last persisted
    /// snapshot. Distinguishes an absent path from a present path whose
    /// timestamp field is zero or missing.
    pub fn timestamp_of(&self, path: &str, which: TimestampKind) -> Result<String> {
        let snapshot = self.load()?;
        let key = path.trim_start_matches('/');
        let node = snapshot.files.get(key).ok_or_else(|| ChatFsError::NotFound {
            path: path.to_string(),
        })?;
        let value = match which {
            TimestampKind::Created => node.ctime,
            TimestampKind::Modified => node.mtime,
        };
        format_timestamp(value).ok_or_else(|| ChatFsError::TimestampUnavailable {
            path: path.to_string(),
        })
    }
}

/// Current time as float epoch seconds.
pub(crate) fn epoch_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Format epoch seconds as `YYYY-MM-DD HH:MM:SS` in local time. Zero, NaN,
/// and out-of-range values have no representation.
fn format_timestamp(epoch: f64) -> Option<String> {
    if epoch == 0.0 || !epoch.is_finite() {
        return None;
    }
    let secs = epoch.trunc() as i64;
    let nanos = (epoch.fract() * 1e9) as u32;
    chrono::Local
        .timestamp_opt(secs, nanos)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> SnapshotStore {
        let root = dir.path().join("mnt");
        fs::create_dir_all(&root).unwrap();
        SnapshotStore::new(
            &root,
            dir.path().join("attrs.json"),
            dir.path().join("data.json"),
            64,
        )
    }

    #[test]
    fn walk_captures_attributes_and_content() {
        let dir = TempDir::new().unwrap();
        let st = store(&dir);
        fs::create_dir_all(dir.path().join("mnt/sub")).unwrap();
        fs::write(dir.path().join("mnt/sub/a.txt"), b"hello").unwrap();

        let snap = st.walk().unwrap();
        let d = snap.files.get("sub").unwrap();
        assert!(d.is_dir());
        assert_eq!(d.nlink, 2);
        let f = snap.files.get("sub/a.txt").unwrap();
        assert!(f.is_file());
        assert_eq!(f.size, Some(5));
        assert_eq!(f.nlink, 1);
        assert!(f.mtime > 0.0);
        assert_eq!(snap.data.get("sub/a.txt").unwrap(), b"hello");
    }

    #[test]
    fn walk_records_file_symlinks_without_content() {
        let dir = TempDir::new().unwrap();
        let st = store(&dir);
        fs::write(dir.path().join("mnt/target.txt"), b"x").unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("mnt/target.txt"),
            dir.path().join("mnt/link.txt"),
        )
        .unwrap();

        let snap = st.walk().unwrap();
        let link = snap.files.get("link.txt").unwrap();
        assert!(link.is_symlink());
        assert_eq!(link.size, None);
        assert!(!snap.data.contains_key("link.txt"));
    }

    #[test]
    fn persist_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let st = store(&dir);
        fs::write(dir.path().join("mnt/b.bin"), [0u8, 159, 146, 150]).unwrap();

        let snap = st.walk().unwrap();
        assert!(st.persist(&snap).is_empty());

        let loaded = st.load().unwrap();
        assert!(loaded.files.get("b.bin").unwrap().is_file());
        // content comes back byte-exact through the textual encoding
        let content = st.load_content().unwrap();
        assert_eq!(content.get("b.bin").unwrap(), &vec![0u8, 159, 146, 150]);
    }

    #[test]
    fn persist_failure_is_a_warning_not_an_error() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("mnt");
        fs::create_dir_all(&root).unwrap();
        // attrs destination is an unwritable location; content still lands
        let st = SnapshotStore::new(
            &root,
            dir.path().join("missing/attrs.json"),
            dir.path().join("data.json"),
            64,
        );
        fs::write(root.join("a.txt"), b"a").unwrap();

        let warnings = st.refresh();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("attributes"));
        assert!(dir.path().join("data.json").exists());
    }

    #[test]
    fn timestamp_query_reads_persisted_snapshot_only() {
        let dir = TempDir::new().unwrap();
        let st = store(&dir);
        fs::write(dir.path().join("mnt/a.txt"), b"a").unwrap();
        assert!(st.refresh().is_empty());

        let first = st.timestamp_of("a.txt", TimestampKind::Created).unwrap();
        assert_eq!(first.len(), "2026-01-01 00:00:00".len());

        // external mutation with no new walk: the query must not see it
        fs::write(dir.path().join("mnt/b.txt"), b"b").unwrap();
        assert!(matches!(
            st.timestamp_of("b.txt", TimestampKind::Modified),
            Err(ChatFsError::NotFound { .. })
        ));
        // the pre-mutation answer is stable
        assert_eq!(
            st.timestamp_of("a.txt", TimestampKind::Created).unwrap(),
            first
        );

        assert!(st.refresh().is_empty());
        assert!(st.timestamp_of("b.txt", TimestampKind::Modified).is_ok());
    }

    #[test]
    fn zero_timestamp_is_unavailable_not_missing() {
        let dir = TempDir::new().unwrap();
        let st = store(&dir);
        fs::write(dir.path().join("mnt/a.txt"), b"a").unwrap();

        let mut snap = st.walk().unwrap();
        snap.files.get_mut("a.txt").unwrap().ctime = 0.0;
        assert!(st.persist(&snap).is_empty());

        assert!(matches!(
            st.timestamp_of("a.txt", TimestampKind::Created),
            Err(ChatFsError::TimestampUnavailable { .. })
        ));
        assert!(matches!(
            st.timestamp_of("ghost.txt", TimestampKind::Created),
            Err(ChatFsError::NotFound { .. })
        ));
    }
}
