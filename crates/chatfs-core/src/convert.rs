//! Bulk image-format pairing with interactive conflict resolution.
//!
//! "Conversion" is a placeholder-pairing policy, not pixel transcoding: a
//! processed image is copied to the mount root under its own name and an
//! empty marker file is created under the paired extension.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::error::{ChatFsError, Result};
use crate::mount::MountHandle;
use crate::resolver::{one_arg, resolve_relative};
use crate::snapshot::SnapshotStore;

/// Answer tokens accepted as confirmation / refusal.
const AFFIRMATIVE: &[&str] = &["да", "ок", "конечно", "хорошо", "+"];
const NEGATIVE: &[&str] = &["нет", "не", "неа", "-"];

/// A destination-name collision detected during classification, awaiting an
/// operator decision. Read-only once created.
#[derive(Debug, Clone)]
pub struct ConflictEntry {
    /// File name in the source directory.
    pub source_name: String,
    /// Paired-extension name already present at the mount root.
    pub counterpart: String,
    pub reason: String,
}

impl ConflictEntry {
    fn prompt(&self) -> String {
        format!(
            "Overwrite {} -> {}? (да/нет)",
            self.source_name, self.counterpart
        )
    }
}

/// Result of the classification pass over a source directory.
#[derive(Debug, Default)]
pub struct ConvertReport {
    pub converted: Vec<String>,
    pub moved: Vec<String>,
    pub existing: Vec<String>,
    pub conflicts: Vec<ConflictEntry>,
    pub warnings: Vec<String>,
}

impl ConvertReport {
    /// Prompt for the first unresolved conflict, if any.
    pub fn first_prompt(&self) -> Option<String> {
        self.conflicts.first().map(ConflictEntry::prompt)
    }
}

/// Where a session stands: waiting for the answer at one conflict index, or
/// finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingAnswer(usize),
    Done,
}

/// What one incoming answer produced.
#[derive(Debug)]
pub enum AnswerOutcome {
    /// Unrecognized token: re-prompt the same conflict without advancing.
    Invalid { prompt: String },
    /// Answer recorded; more conflicts remain.
    Next { prompt: String },
    /// Last answer recorded; the commit ran and the session was torn down.
    Committed(CommitReport),
}

/// Result of committing a finished session.
#[derive(Debug)]
pub struct CommitReport {
    pub overwritten: Vec<String>,
    pub warnings: Vec<String>,
}

/// Per-operator confirmation state. Created only when classification finds at
/// least one conflict, destroyed when every conflict is answered.
struct ConversionSession {
    source_dir: PathBuf,
    conflicts: Vec<ConflictEntry>,
    answers: Vec<bool>,
}

impl ConversionSession {
    fn state(&self) -> SessionState {
        if self.answers.len() < self.conflicts.len() {
            SessionState::AwaitingAnswer(self.answers.len())
        } else {
            SessionState::Done
        }
    }

    fn current(&self) -> &ConflictEntry {
        &self.conflicts[self.answers.len()]
    }
}

/// Classifies source directories and drives the confirmation state machine.
pub struct Converter {
    root: PathBuf,
    mount: MountHandle,
    snapshots: Arc<SnapshotStore>,
    sessions: Mutex<HashMap<String, ConversionSession>>,
}

impl Converter {
    pub fn new(
        root: impl AsRef<Path>,
        mount: MountHandle,
        snapshots: Arc<SnapshotStore>,
    ) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            mount,
            snapshots,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Classification pass over every entry of the source directory.
    ///
    /// Image entries (`.png`/`.jpg`) are paired against the mount root: both
    /// destinations present means "already exists"; only the counterpart
    /// present opens a conflict; neither present converts immediately. Other
    /// files are copied to the root unconditionally. If conflicts were found,
    /// a session is opened for `operator` and the commit (plus the snapshot
    /// refresh) waits for the answers.
    pub fn convert(&self, operator: &str, args: &str) -> Result<ConvertReport> {
        self.mount.ensure_active()?;
        let raw = one_arg(args)?;
        let source_dir = resolve_relative(&self.root, &raw)?;
        if !source_dir.exists() {
            return Err(ChatFsError::NotFound { path: raw });
        }
        if !source_dir.is_dir() {
            return Err(ChatFsError::NotADirectory { path: raw });
        }

        let mut names: Vec<String> = fs::read_dir(&source_dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| !t.is_dir()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        let mut report = ConvertReport::default();
        for name in names {
            let source_path = source_dir.join(&name);
            let paired = match paired_name(&name) {
                Some(p) => p,
                None => {
                    // non-image entry: copied to the root unconditionally
                    fs::copy(&source_path, self.root.join(&name))?;
                    report.moved.push(name);
                    continue;
                }
            };

            let dest_self = self.root.join(&name);
            let dest_pair = self.root.join(&paired);
            match (dest_self.exists(), dest_pair.exists()) {
                (true, true) => report
                    .existing
                    .push(format!("{name} - both counterparts already exist")),
                (false, true) => report.conflicts.push(ConflictEntry {
                    reason: format!("{} already exists", extension_label(&paired)),
                    source_name: name,
                    counterpart: paired,
                }),
                // only the same-named destination exists: nothing this entry
                // must produce is missing, nothing to ask about
                (true, false) => {}
                (false, false) => {
                    fs::copy(&source_path, &dest_self)?;
                    fs::File::create(&dest_pair)?;
                    report.converted.push(format!("{name} -> {paired}"));
                }
            }
        }

        if report.conflicts.is_empty() {
            info!(
                source = %raw,
                converted = report.converted.len(),
                moved = report.moved.len(),
                "conversion complete"
            );
            report.warnings = self.snapshots.refresh();
        } else {
            info!(
                source = %raw,
                conflicts = report.conflicts.len(),
                "conversion awaiting confirmation"
            );
            self.sessions.lock().expect("sessions poisoned").insert(
                operator.to_string(),
                ConversionSession {
                    source_dir,
                    conflicts: report.conflicts.clone(),
                    answers: Vec::new(),
                },
            );
        }
        Ok(report)
    }

    /// Feed one answer token into the operator's session. Invalid tokens
    /// re-prompt the same conflict; the final valid answer commits and tears
    /// the session down.
    pub fn answer(&self, operator: &str, text: &str) -> Result<AnswerOutcome> {
        self.mount.ensure_active()?;
        let mut sessions = self.sessions.lock().expect("sessions poisoned");
        let session = sessions
            .get_mut(operator)
            .ok_or_else(|| ChatFsError::NoSession {
                operator: operator.to_string(),
            })?;

        let token = text.trim().to_lowercase();
        if AFFIRMATIVE.contains(&token.as_str()) {
            session.answers.push(true);
        } else if NEGATIVE.contains(&token.as_str()) {
            session.answers.push(false);
        } else {
            return Ok(AnswerOutcome::Invalid {
                prompt: session.current().prompt(),
            });
        }

        match session.state() {
            SessionState::AwaitingAnswer(_) => Ok(AnswerOutcome::Next {
                prompt: session.current().prompt(),
            }),
            SessionState::Done => {
                let session = sessions.remove(operator).expect("session vanished");
                drop(sessions);
                Ok(AnswerOutcome::Committed(self.commit(session)?))
            }
        }
    }

    /// Current state of the operator's session, if one is open.
    pub fn session_state(&self, operator: &str) -> Option<SessionState> {
        self.sessions
            .lock()
            .expect("sessions poisoned")
            .get(operator)
            .map(ConversionSession::state)
    }

    /// Abandon any open session for the operator.
    pub fn cancel(&self, operator: &str) -> bool {
        self.sessions
            .lock()
            .expect("sessions poisoned")
            .remove(operator)
            .is_some()
    }

    fn commit(&self, session: ConversionSession) -> Result<CommitReport> {
        let mut overwritten = Vec::new();
        for (entry, yes) in session.conflicts.iter().zip(&session.answers) {
            if !yes {
                continue;
            }
            let counterpart_path = self.root.join(&entry.counterpart);
            if counterpart_path.exists() {
                fs::remove_file(&counterpart_path)?;
            }
            fs::copy(
                session.source_dir.join(&entry.source_name),
                self.root.join(&entry.source_name),
            )?;
            fs::File::create(&counterpart_path)?;
            overwritten.push(format!("{} -> {}", entry.source_name, entry.counterpart));
        }

        info!(overwritten = overwritten.len(), "conversion commit complete");
        let warnings = self.snapshots.refresh();
        Ok(CommitReport {
            overwritten,
            warnings,
        })
    }
}

/// The paired-extension name for an image entry, `None` for anything else.
fn paired_name(name: &str) -> Option<String> {
    if let Some(stem) = name.strip_suffix(".png") {
        Some(format!("{stem}.jpg"))
    } else {
        name.strip_suffix(".jpg").map(|stem| format!("{stem}.png"))
    }
}

fn extension_label(name: &str) -> &'static str {
    if name.ends_with(".png") {
        "PNG"
    } else {
        "JPG"
    }
}
