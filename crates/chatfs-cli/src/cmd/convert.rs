use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use chatfs_core::AnswerOutcome;
use clap::Args;

use super::{open_started, quote, report_warnings};

#[derive(Args)]
pub struct ConvertArgs {
    /// Mount root directory
    pub root: PathBuf,
    /// Source directory, relative form
    pub source: String,
    /// Operator identity owning the confirmation session
    #[arg(long, default_value = "cli")]
    pub operator: String,
}

pub async fn run(args: ConvertArgs, json: bool) -> anyhow::Result<()> {
    let fs = open_started(&args.root).await?;
    let report = fs.converter.convert(&args.operator, &quote(&args.source))?;
    report_warnings(&report.warnings);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "converted": report.converted,
                "moved": report.moved,
                "existing": report.existing,
                "conflicts": report.conflicts.len(),
            }))?
        );
    } else {
        for name in &report.converted {
            println!("Converted {name}");
        }
        for name in &report.moved {
            println!("Moved {name}");
        }
        for name in &report.existing {
            println!("Already exists: {name}");
        }
    }

    let Some(mut prompt) = report.first_prompt() else {
        return Ok(());
    };

    // answers come from stdin until the last conflict commits
    let stdin = io::stdin();
    loop {
        println!("{prompt}");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            fs.converter.cancel(&args.operator);
            anyhow::bail!("input closed with unresolved conflicts");
        }
        match fs.converter.answer(&args.operator, line.trim())? {
            AnswerOutcome::Invalid { prompt: p } | AnswerOutcome::Next { prompt: p } => prompt = p,
            AnswerOutcome::Committed(commit) => {
                report_warnings(&commit.warnings);
                if json {
                    println!(
                        "{}",
                        serde_json::json!({ "overwritten": commit.overwritten })
                    );
                } else {
                    for pair in &commit.overwritten {
                        println!("Overwrote {pair}");
                    }
                }
                return Ok(());
            }
        }
    }
}
