//! Tag-based grouping: derived symlink indices over audio files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::engine::Mutated;
use crate::error::{ChatFsError, Result};
use crate::mount::MountHandle;
use crate::resolver::{one_arg, resolve_relative};
use crate::snapshot::SnapshotStore;

/// Sentinels substituted independently per missing/unreadable field.
const NO_ARTIST: &str = "no_artist";
const NO_GENRE: &str = "no_genre";
const NO_YEAR: &str = "no_year";

/// Extracted audio tags. Every field is independently optional.
#[derive(Debug, Clone, Default)]
pub struct AudioTags {
    pub artist: Option<String>,
    pub genre: Option<String>,
    /// Raw date tag; the year is its leading `-`-separated component.
    pub date: Option<String>,
}

/// The tag-extraction collaborator.
pub trait TagReader: Send + Sync {
    fn read_tags(&self, path: &Path) -> Result<AudioTags>;
}

/// Reader that never finds tags: every file lands under the sentinels.
pub struct NoopTagReader;

impl TagReader for NoopTagReader {
    fn read_tags(&self, _path: &Path) -> Result<AudioTags> {
        Ok(AudioTags::default())
    }
}

/// Result of one indexing run.
#[derive(Debug)]
pub struct GroupReport {
    /// Number of source files visited.
    pub indexed: usize,
    pub warnings: Vec<String>,
}

/// Builds and tears down the three parallel derived trees
/// (`Artist/<v>`, `Genre/<v>`, `Year/<v>`) under the index destination.
pub struct GroupIndexer {
    root: PathBuf,
    dest_name: String,
    mount: MountHandle,
    snapshots: Arc<SnapshotStore>,
    tags: Arc<dyn TagReader>,
    max_depth: usize,
}

impl GroupIndexer {
    pub fn new(
        root: impl AsRef<Path>,
        dest_name: impl Into<String>,
        mount: MountHandle,
        snapshots: Arc<SnapshotStore>,
        tags: Arc<dyn TagReader>,
        max_depth: usize,
    ) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            dest_name: dest_name.into(),
            mount,
            snapshots,
            tags,
            max_depth,
        }
    }

    /// Index every `.mp3` under the source subtree. Idempotent per file per
    /// dimension: a same-named link that already exists is left alone.
    pub fn group(&self, args: &str) -> Result<GroupReport> {
        self.mount.ensure_active()?;
        let raw = one_arg(args)?;
        let source = resolve_relative(&self.root, &raw)?;
        if !source.is_dir() {
            return Err(ChatFsError::NotFound { path: raw });
        }

        let dest = self.root.join(&self.dest_name);
        let mut indexed = 0usize;

        for entry in WalkDir::new(&source)
            .follow_links(true)
            .max_depth(self.max_depth)
        {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !name.ends_with(".mp3") {
                continue;
            }

            let tags = self
                .tags
                .read_tags(entry.path())
                .unwrap_or_else(|_| AudioTags::default());
            let artist = tags.artist.unwrap_or_else(|| NO_ARTIST.to_string());
            let genre = tags.genre.unwrap_or_else(|| NO_GENRE.to_string());
            let year = tags
                .date
                .as_deref()
                .and_then(|d| d.split('-').next())
                .filter(|y| !y.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| NO_YEAR.to_string());

            for (dimension, value) in [("Artist", &artist), ("Genre", &genre), ("Year", &year)] {
                let value_dir = dest.join(dimension).join(value);
                std::fs::create_dir_all(&value_dir)?;
                let link = value_dir.join(name.as_ref());
                if link.exists() {
                    continue;
                }
                if let Err(e) = std::os::unix::fs::symlink(entry.path(), &link) {
                    warn!(
                        source = %entry.path().display(),
                        link = %link.display(),
                        error = %e,
                        "failed to create index link"
                    );
                }
            }
            indexed += 1;
        }

        info!(source = %raw, indexed, "grouping complete");
        Ok(GroupReport {
            indexed,
            warnings: self.snapshots.refresh(),
        })
    }

    /// Delete the whole derived index in one recursive removal.
    pub fn remove_index(&self) -> Result<Mutated> {
        self.mount.ensure_active()?;
        let dest = self.root.join(&self.dest_name);
        if !dest.exists() {
            return Err(ChatFsError::NotFound {
                path: self.dest_name.clone(),
            });
        }
        std::fs::remove_dir_all(&dest)?;
        info!(dest = %self.dest_name, "grouping index removed");
        Ok(Mutated {
            warnings: self.snapshots.refresh(),
        })
    }
}
