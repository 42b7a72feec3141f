use std::path::PathBuf;

use clap::Args;

use super::open_started;

#[derive(Args)]
pub struct SnapshotArgs {
    /// Mount root directory
    pub root: PathBuf,
}

pub async fn run(args: SnapshotArgs, json: bool) -> anyhow::Result<()> {
    let fs = open_started(&args.root).await?;
    let warnings = fs.snapshots().refresh();
    if json {
        println!("{}", serde_json::json!({ "warnings": warnings }))
    } else if warnings.is_empty() {
        println!("Snapshot written");
    } else {
        for w in &warnings {
            println!("warning: {w}");
        }
    }
    Ok(())
}
