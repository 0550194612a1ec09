//! Amendment sessions and their on-disk format.
//!
//! A session is the ordered list of amendments shown to the room (insertion
//! order is display order) plus a cursor. It is persisted as a single JSON
//! document that is fully overwritten on every save:
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "session": { "session_name": "Day 1", "committee": "GA3", "current_index": 0 },
//!   "amendments": [ { "submitter_delegate": "France", "clause": "4", "amendment_type": "ADD", ... } ]
//! }
//! ```

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ingest::EmailSource;
use crate::record::{AmendmentRecord, RecordError};
use crate::{Amendment, Email};

/// Version written to the `schema_version` field of session files.
pub const SESSION_SCHEMA_VERSION: u32 = 1;

/// Errors raised while saving or loading a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The file was written by a newer, incompatible format.
    #[error("unsupported session schema version {found}")]
    UnsupportedVersion { found: u32 },

    /// An amendment entry could not be loaded.
    #[error("amendment #{index}: {source}")]
    Record {
        index: usize,
        #[source]
        source: RecordError,
    },

    /// The session has no amendments to act on.
    #[error("no amendments in session")]
    Empty,
}

/// Session metadata block of the file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHeader {
    pub session_name: String,
    pub committee: String,
    #[serde(default)]
    pub current_index: usize,
}

#[derive(Serialize)]
struct SessionDocument<'a> {
    schema_version: u32,
    session: SessionHeader,
    amendments: &'a [Amendment],
}

#[derive(Deserialize)]
struct StoredSession {
    #[serde(default = "default_schema_version")]
    schema_version: u32,
    session: SessionHeader,
    #[serde(default)]
    amendments: Vec<AmendmentRecord>,
}

fn default_schema_version() -> u32 {
    SESSION_SCHEMA_VERSION
}

/// Ordered amendments with a display cursor.
///
/// # Examples
///
/// ```
/// use amendment_core::*;
///
/// let mut session = AmendmentSession::new("Day 1", "GA3");
/// for clause in ["1", "2", "3"] {
///     let amendment = AmendmentDraft::new("France", clause, AmendmentType::Strike)
///         .build()
///         .unwrap();
///     session.add_amendment(amendment);
/// }
/// session.next();
/// session.last();
/// assert_eq!(session.current().unwrap().clause(), "3");
/// assert_eq!(session.render_footer(), "GA3 | 3 / 3");
/// ```
pub struct AmendmentSession {
    pub session_name: String,
    pub committee: String,
    amendments: Vec<Amendment>,
    current_index: usize,
    source: Option<Box<dyn EmailSource + Send>>,
}

impl fmt::Debug for AmendmentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmendmentSession")
            .field("session_name", &self.session_name)
            .field("committee", &self.committee)
            .field("amendments", &self.amendments.len())
            .field("current_index", &self.current_index)
            .field("source_bound", &self.source.is_some())
            .finish()
    }
}

impl AmendmentSession {
    pub fn new(session_name: impl Into<String>, committee: impl Into<String>) -> Self {
        Self {
            session_name: session_name.into(),
            committee: committee.into(),
            amendments: Vec::new(),
            current_index: 0,
            source: None,
        }
    }

    pub fn amendments(&self) -> &[Amendment] {
        &self.amendments
    }

    /// Mutable access for link backfilling. The slice cannot grow or shrink,
    /// so the cursor stays valid.
    pub fn amendments_mut(&mut self) -> &mut [Amendment] {
        &mut self.amendments
    }

    pub fn len(&self) -> usize {
        self.amendments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amendments.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    // ---------- Navigation ----------

    pub fn current(&self) -> Result<&Amendment, SessionError> {
        self.amendments.get(self.current_index).ok_or(SessionError::Empty)
    }

    pub fn next(&mut self) {
        if self.current_index + 1 < self.amendments.len() {
            self.current_index += 1;
        }
    }

    pub fn previous(&mut self) {
        self.current_index = self.current_index.saturating_sub(1);
    }

    pub fn first(&mut self) {
        self.current_index = 0;
    }

    pub fn last(&mut self) {
        self.current_index = self.amendments.len().saturating_sub(1);
    }

    /// Moves the cursor to `index`, clamped to the last amendment.
    pub fn go_to(&mut self, index: usize) {
        self.current_index = index.min(self.amendments.len().saturating_sub(1));
    }

    // ---------- Editing ----------

    pub fn add_amendment(&mut self, amendment: Amendment) {
        self.amendments.push(amendment);
    }

    /// Removes the amendment under the cursor.
    pub fn delete_current(&mut self) -> Result<Amendment, SessionError> {
        if self.amendments.is_empty() {
            return Err(SessionError::Empty);
        }
        let removed = self.amendments.remove(self.current_index);
        self.clamp_cursor();
        Ok(removed)
    }

    /// Removes the amendment with `id`, if present.
    pub fn delete_by_id(&mut self, id: &str) -> Option<Amendment> {
        let position = self.amendments.iter().position(|a| a.id() == id)?;
        let removed = self.amendments.remove(position);
        if position < self.current_index {
            self.current_index -= 1;
        }
        self.clamp_cursor();
        Some(removed)
    }

    /// Flips the friendly flag of the amendment under the cursor and returns
    /// the new value.
    pub fn toggle_friendly(&mut self) -> Result<bool, SessionError> {
        let amendment = self
            .amendments
            .get_mut(self.current_index)
            .ok_or(SessionError::Empty)?;
        amendment.toggle_friendly();
        Ok(amendment.is_friendly())
    }

    fn clamp_cursor(&mut self) {
        if self.current_index >= self.amendments.len() {
            self.current_index = self.amendments.len().saturating_sub(1);
        }
    }

    /// Footer line shown under each slide: `committee | position / total`.
    pub fn render_footer(&self) -> String {
        let position = if self.amendments.is_empty() {
            0
        } else {
            self.current_index + 1
        };
        format!("{} | {} / {}", self.committee, position, self.amendments.len())
    }

    // ---------- Email ----------

    /// Binds the email source used by [`pull_from_email`](Self::pull_from_email).
    pub fn bind_source(&mut self, source: Box<dyn EmailSource + Send>) {
        self.source = Some(source);
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Pulls new emails from the bound source and appends every amendment
    /// `extract` produces. Returns the number of amendments added; 0 when no
    /// source is bound.
    pub fn pull_from_email<F>(&mut self, mut extract: F) -> usize
    where
        F: FnMut(&Email) -> Option<Amendment>,
    {
        let Some(source) = self.source.as_mut() else {
            return 0;
        };
        let emails = source.pull();
        let before = self.amendments.len();
        self.amendments.extend(emails.iter().filter_map(&mut extract));
        self.amendments.len() - before
    }

    // ---------- Persistence ----------

    pub fn header(&self) -> SessionHeader {
        SessionHeader {
            session_name: self.session_name.clone(),
            committee: self.committee.clone(),
            current_index: self.current_index,
        }
    }

    /// Serializes the session to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, SessionError> {
        let document = SessionDocument {
            schema_version: SESSION_SCHEMA_VERSION,
            session: self.header(),
            amendments: &self.amendments,
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Parses a session document. Every amendment goes through the same
    /// record conversion and validation as extracted amendments.
    pub fn from_json_str(raw: &str) -> Result<Self, SessionError> {
        let stored: StoredSession = serde_json::from_str(raw)?;
        if stored.schema_version > SESSION_SCHEMA_VERSION {
            return Err(SessionError::UnsupportedVersion {
                found: stored.schema_version,
            });
        }

        let amendments = stored
            .amendments
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                record
                    .into_amendment()
                    .map_err(|source| SessionError::Record { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut session = Self::new(stored.session.session_name, stored.session.committee);
        session.amendments = amendments;
        session.go_to(stored.session.current_index);
        Ok(session)
    }

    /// Writes the session to `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}
