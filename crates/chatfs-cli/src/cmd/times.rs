use std::path::PathBuf;

use clap::Subcommand;

use super::{open, quote};

/// Timestamp queries read the last persisted snapshot, never the live tree,
/// so they work without activating the mount.
#[derive(Subcommand)]
pub enum TimesCommands {
    /// Creation time of a path, from the snapshot
    Ctime {
        /// Mount root directory
        root: PathBuf,
        /// Path, relative form
        path: String,
    },
    /// Last modification time of a path, from the snapshot
    Mtime {
        /// Mount root directory
        root: PathBuf,
        /// Path, relative form
        path: String,
    },
}

pub fn run(cmd: TimesCommands, json: bool) -> anyhow::Result<()> {
    let (fs, path, field) = match cmd {
        TimesCommands::Ctime { root, path } => (open(&root), path, "ctime"),
        TimesCommands::Mtime { root, path } => (open(&root), path, "mtime"),
    };
    let stamp = match field {
        "ctime" => fs.engine.ctime(&quote(&path))?,
        _ => fs.engine.mtime(&quote(&path))?,
    };
    if json {
        println!("{}", serde_json::json!({ "path": path, field: stamp }));
    } else {
        println!("{stamp}");
    }
    Ok(())
}
