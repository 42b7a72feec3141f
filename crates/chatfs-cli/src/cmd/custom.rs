use std::path::PathBuf;

use clap::Args;

use super::{open_started, quote, report_warnings};

/// One-shot custom listing: bring the secondary mount up, run the command
/// file, tear it back down.
#[derive(Args)]
pub struct CustomLsArgs {
    /// Primary mount root directory
    pub root: PathBuf,
    /// Secondary mount point
    pub mount: PathBuf,
    /// Command file, relative form under the primary root
    pub config: String,
    /// Listing target under the primary root, display form
    #[arg(default_value = "/")]
    pub path: String,
}

pub async fn run(args: CustomLsArgs) -> anyhow::Result<()> {
    let fs = open_started(&args.root).await?;
    let warnings = fs.start_custom(&format!(
        "{} {}",
        quote(&args.mount.to_string_lossy()),
        quote(&args.config)
    ))?;
    report_warnings(&warnings);
    // the secondary passthrough mount also lands on a background task
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let result = fs.custom_list(Some(&args.path));
    let warnings = fs.stop_custom().await?;
    report_warnings(&warnings);

    print!("{}", result?);
    Ok(())
}
