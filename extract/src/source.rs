//! Directory-backed email source.
//!
//! Reads `.eml` files (raw messages, decoded through [`TextNormalizer`])
//! and `.txt` files (already-decoded bodies) from an inbox directory. Each
//! file is yielded once per source, in file-name order. Unreadable files
//! are logged and skipped.
//!
//! Files are tracked by file name. A caller that persists
//! [`seen_names`](DirectorySource::seen_names) and hands them back through
//! [`with_seen`](DirectorySource::with_seen) gets the same once-only
//! delivery across processes.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use amendment_core::{Email, EmailSource};

use crate::events::{EventLog, EventSink};
use crate::normalize::TextNormalizer;

pub const COMPONENT: &str = "inbox";

#[derive(Debug)]
pub struct DirectorySource {
    dir: PathBuf,
    normalizer: TextNormalizer,
    seen: BTreeSet<String>,
    log: EventLog,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>, normalizer: TextNormalizer, sink: Arc<dyn EventSink>) -> Self {
        Self {
            dir: dir.into(),
            normalizer,
            seen: BTreeSet::new(),
            log: EventLog::new(sink, COMPONENT),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Marks file names as already delivered.
    pub fn with_seen<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seen.extend(names.into_iter().map(Into::into));
        self
    }

    /// Number of files already yielded.
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// File names already yielded, sorted.
    pub fn seen_names(&self) -> impl Iterator<Item = &str> {
        self.seen.iter().map(String::as_str)
    }

    fn candidate_files(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                self.log
                    .warn(format!("cannot read inbox {}: {err}", self.dir.display()));
                return Vec::new();
            }
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && message_kind(path).is_some())
            .filter(|path| !file_name(path).is_some_and(|name| self.seen.contains(name)))
            .collect();
        files.sort();
        files
    }

    fn read_message(&self, path: &Path) -> Option<Email> {
        let kind = message_kind(path)?;
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.log.warn(format!("skipping {}: {err}", path.display()));
                return None;
            }
        };
        match kind {
            MessageKind::Raw => match self.normalizer.email_from_raw(&bytes) {
                Ok(email) => Some(email),
                Err(err) => {
                    self.log.warn(format!("skipping {}: {err}", path.display()));
                    None
                }
            },
            MessageKind::Body => {
                let subject = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let body = self
                    .normalizer
                    .normalize_text(&String::from_utf8_lossy(&bytes));
                Some(Email::new("", subject, body))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageKind {
    Raw,
    Body,
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name()?.to_str()
}

fn message_kind(path: &Path) -> Option<MessageKind> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "eml" => Some(MessageKind::Raw),
        "txt" => Some(MessageKind::Body),
        _ => None,
    }
}

impl EmailSource for DirectorySource {
    fn pull(&mut self) -> Vec<Email> {
        let mut emails = Vec::new();
        for path in self.candidate_files() {
            let email = self.read_message(&path);
            // Unreadable files are not retried.
            if let Some(name) = file_name(&path) {
                self.seen.insert(name.to_string());
            }
            emails.extend(email);
        }
        if !emails.is_empty() {
            self.log
                .info(format!("pulled {} new message(s)", emails.len()));
        }
        emails
    }
}
