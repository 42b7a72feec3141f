pub mod convert;
pub mod custom;
pub mod fs;
pub mod group;
pub mod snapshot;
pub mod times;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chatfs_core::{ChatFs, ChatFsConfig, NoopTagReader, PassthroughBackend};
use tracing::warn;

/// Build an instance over an ordinary-directory mount root.
pub fn open(root: &Path) -> ChatFs {
    let config = ChatFsConfig::builder(root).build();
    ChatFs::new(config, Arc::new(PassthroughBackend), Arc::new(NoopTagReader))
}

/// Build, activate, and wait for the passthrough mount to land.
pub async fn open_started(root: &Path) -> anyhow::Result<ChatFs> {
    let fs = open(root);
    report_warnings(&fs.start()?);
    // passthrough mount runs on a background task
    tokio::time::sleep(Duration::from_millis(20)).await;
    Ok(fs)
}

pub fn report_warnings(warnings: &[String]) {
    for w in warnings {
        warn!("{w}");
    }
}

/// Tokens with whitespace survive the engine's argument splitter when quoted.
pub fn quote(raw: &str) -> String {
    format!("\"{raw}\"")
}
