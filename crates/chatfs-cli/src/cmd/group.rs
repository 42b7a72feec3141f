use std::path::PathBuf;

use clap::Subcommand;

use super::{open_started, quote, report_warnings};

#[derive(Subcommand)]
pub enum GroupCommands {
    /// Build (or extend) the symlink index over a source subtree
    Index {
        /// Mount root directory
        root: PathBuf,
        /// Source directory, relative form
        source: String,
    },
    /// Delete the whole grouping index
    Remove {
        /// Mount root directory
        root: PathBuf,
    },
}

pub async fn run(cmd: GroupCommands, json: bool) -> anyhow::Result<()> {
    match cmd {
        GroupCommands::Index { root, source } => {
            let fs = open_started(&root).await?;
            let report = fs.groups.group(&quote(&source))?;
            report_warnings(&report.warnings);
            if json {
                println!("{}", serde_json::json!({ "indexed": report.indexed }));
            } else {
                println!("Indexed {} files", report.indexed);
            }
        }
        GroupCommands::Remove { root } => {
            let fs = open_started(&root).await?;
            let out = fs.groups.remove_index()?;
            report_warnings(&out.warnings);
            if json {
                println!("{}", serde_json::json!({ "removed": true }));
            } else {
                println!("Grouping index removed");
            }
        }
    }
    Ok(())
}
