use std::io::Write;
use std::path::PathBuf;

use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};

use super::{open_started, quote, report_warnings};

#[derive(Subcommand)]
pub enum FsCommands {
    /// Create a directory (and missing intermediates)
    Mkdir {
        /// Mount root directory
        root: PathBuf,
        /// Directory path, relative form
        path: String,
    },
    /// Move a file or directory; both endpoints must already exist
    Mv {
        /// Mount root directory
        root: PathBuf,
        /// Source path, relative form
        from: String,
        /// Destination path, relative form
        to: String,
    },
    /// Copy without overwriting; collisions get a numeric suffix
    Cp {
        /// Mount root directory
        root: PathBuf,
        /// Source path, relative form
        from: String,
        /// Destination path, relative form
        to: String,
    },
    /// Remove a file or directory tree
    Rm {
        /// Mount root directory
        root: PathBuf,
        /// Path, relative form
        path: String,
    },
    /// Flat listing of every file, filtered by directory tag
    Ls {
        /// Mount root directory
        root: PathBuf,
        /// Directory path, display form (default: /)
        #[arg(default_value = "/")]
        path: String,
    },
    /// Recursive directory tree
    Tree {
        /// Mount root directory
        root: PathBuf,
        /// Directory path, display form (default: /)
        #[arg(default_value = "/")]
        path: String,
    },
    /// Store a local file inside the mount
    Save {
        /// Mount root directory
        root: PathBuf,
        /// Local file to store
        file: PathBuf,
        /// Destination directory, relative form (default: mount root)
        dir: Option<String>,
    },
    /// Print a stored file to stdout
    Get {
        /// Mount root directory
        root: PathBuf,
        /// File path, relative form
        path: String,
    },
}

pub async fn run(cmd: FsCommands, json: bool) -> anyhow::Result<()> {
    match cmd {
        FsCommands::Mkdir { root, path } => {
            let fs = open_started(&root).await?;
            let out = fs.engine.mkdir(&quote(&path))?;
            report_warnings(&out.warnings);
            if json {
                println!("{}", serde_json::json!({ "created": path }));
            } else {
                println!("Created directory {path}");
            }
        }
        FsCommands::Mv { root, from, to } => {
            let fs = open_started(&root).await?;
            let out = fs.engine.mv(&format!("{} {}", quote(&from), quote(&to)))?;
            report_warnings(&out.warnings);
            if json {
                println!("{}", serde_json::json!({ "moved": { "from": from, "to": to } }));
            } else {
                println!("Moved {from} to {to}");
            }
        }
        FsCommands::Cp { root, from, to } => {
            let fs = open_started(&root).await?;
            let out = fs.engine.cp(&format!("{} {}", quote(&from), quote(&to)))?;
            report_warnings(&out.warnings);
            if json {
                println!("{}", serde_json::json!({ "copied": from, "dest": out.dest }));
            } else {
                println!("Copied {from} to {}", out.dest);
            }
        }
        FsCommands::Rm { root, path } => {
            let fs = open_started(&root).await?;
            let out = fs.engine.rm(&quote(&path))?;
            report_warnings(&out.warnings);
            if json {
                println!("{}", serde_json::json!({ "removed": path }));
            } else {
                println!("Removed {path}");
            }
        }
        FsCommands::Ls { root, path } => {
            let fs = open_started(&root).await?;
            let listing = fs.engine.ls(Some(&path))?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "path": listing.path,
                        "lines": listing.lines,
                    }))?
                );
            } else if listing.lines.is_empty() {
                println!("{}", listing.render());
            } else {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL_CONDENSED);
                table.set_header(vec!["Directory", "Name"]);
                for line in &listing.lines {
                    // lines read "<dir> name", symlinks keep their marker
                    let (tag, name) = line
                        .strip_prefix('<')
                        .and_then(|rest| rest.split_once("> "))
                        .unwrap_or(("", line));
                    table.add_row(vec![tag, name]);
                }
                println!("{table}");
            }
        }
        FsCommands::Tree { root, path } => {
            let fs = open_started(&root).await?;
            let tree = fs.engine.trls(Some(&path))?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "path": tree.path,
                        "lines": tree.lines,
                    }))?
                );
            } else {
                println!("{}", tree.render());
            }
        }
        FsCommands::Save { root, file, dir } => {
            let fs = open_started(&root).await?;
            let bytes = std::fs::read(&file)?;
            let filename = file
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("not a file path: {}", file.display()))?
                .to_string_lossy()
                .into_owned();
            let out = fs.engine.save(dir.as_deref(), &filename, &bytes)?;
            report_warnings(&out.warnings);
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "saved": filename, "bytes": bytes.len() })
                );
            } else {
                println!("Saved {filename} ({} bytes)", bytes.len());
            }
        }
        FsCommands::Get { root, path } => {
            let fs = open_started(&root).await?;
            let data = fs.engine.read_file(&quote(&path))?;
            std::io::stdout().write_all(&data)?;
        }
    }
    Ok(())
}
