//! Amendment type definitions.
//!
//! This module defines the data model used to represent a single proposed
//! change to a resolution clause. An [`Amendment`] can only be obtained by
//! building an [`AmendmentDraft`] (or loading an
//! [`AmendmentRecord`](crate::AmendmentRecord)), both of which run the
//! validator, so a partially-valid amendment never exists.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::record::{AmendmentRecord, RecordError};
use crate::resolution::{NodeAddress, Resolution};
use crate::validate::{ValidationError, check_invariants, validate_amendment};

/// Kind of change an amendment proposes.
///
/// Serialized as the literal strings `"ADD"`, `"AMEND"` and `"STRIKE"`.
///
/// # Examples
///
/// ```
/// use amendment_core::AmendmentType;
///
/// assert_eq!("strike".parse::<AmendmentType>().unwrap(), AmendmentType::Strike);
/// assert_eq!(AmendmentType::Amend.to_string(), "AMEND");
/// assert!(AmendmentType::Add.requires_text());
/// assert!(!AmendmentType::Strike.requires_text());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AmendmentType {
    /// Insert new text at the clause path (the default for free-text emails).
    #[default]
    #[serde(rename = "ADD")]
    Add,
    /// Replace the wording at the clause path.
    #[serde(rename = "AMEND")]
    Amend,
    /// Remove the clause path entirely.
    #[serde(rename = "STRIKE")]
    Strike,
}

impl AmendmentType {
    /// All variants, in declaration order.
    pub const ALL: [AmendmentType; 3] = [Self::Add, Self::Amend, Self::Strike];

    /// Returns the wire name (`"ADD"`, `"AMEND"`, `"STRIKE"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Amend => "AMEND",
            Self::Strike => "STRIKE",
        }
    }

    /// Whether amendments of this type must carry replacement text.
    pub fn requires_text(self) -> bool {
        matches!(self, Self::Add | Self::Amend)
    }
}

impl fmt::Display for AmendmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name an [`AmendmentType`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown amendment type: {0}")]
pub struct UnknownAmendmentType(pub String);

impl FromStr for AmendmentType {
    type Err = UnknownAmendmentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownAmendmentType(trimmed.to_string()))
    }
}

/// A single ingested message, already decoded to text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Email {
    pub from: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn new(from: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "From: {}", self.from)?;
        writeln!(f, "Subject: {}", self.subject)?;
        writeln!(f)?;
        f.write_str(&self.body)
    }
}

/// Location of an amendment inside a resolution: clause, sub-clause and
/// sub-sub-clause tokens as written by the delegate (`4`, `a`, `ii`).
///
/// # Examples
///
/// ```
/// use amendment_core::ClausePath;
///
/// let path = ClausePath::parse_dotted("4.a.ii");
/// assert_eq!(path.clause, "4");
/// assert_eq!(path.sub_clause.as_deref(), Some("a"));
/// assert_eq!(path.sub_sub_clause.as_deref(), Some("ii"));
/// assert_eq!(path.to_string(), "4.a.ii");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClausePath {
    pub clause: String,
    pub sub_clause: Option<String>,
    pub sub_sub_clause: Option<String>,
}

impl ClausePath {
    pub fn new(clause: impl Into<String>) -> Self {
        Self {
            clause: clause.into(),
            sub_clause: None,
            sub_sub_clause: None,
        }
    }

    /// Splits a dotted token such as `4.a.ii` into its three components.
    ///
    /// Components past the third are ignored; empty components are treated
    /// as absent.
    pub fn parse_dotted(raw: &str) -> Self {
        let mut parts = raw
            .trim()
            .split('.')
            .map(str::trim)
            .map(|part| (!part.is_empty()).then(|| part.to_string()));
        Self {
            clause: parts.next().flatten().unwrap_or_default(),
            sub_clause: parts.next().flatten(),
            sub_sub_clause: parts.next().flatten(),
        }
    }
}

impl fmt::Display for ClausePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.clause)?;
        if let Some(sub) = &self.sub_clause {
            write!(f, ".{sub}")?;
        }
        if let Some(sub_sub) = &self.sub_sub_clause {
            write!(f, ".{sub_sub}")?;
        }
        Ok(())
    }
}

/// Resolved link from an amendment to the resolution it addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionLink {
    pub topic: String,
    pub main_submitter: String,
}

impl From<&Resolution> for ResolutionLink {
    fn from(resolution: &Resolution) -> Self {
        Self {
            topic: resolution.topic.clone(),
            main_submitter: resolution.main_submitter.clone(),
        }
    }
}

/// Unvalidated amendment fields.
///
/// Drafts are what extractors produce; [`build`](Self::build) runs the
/// validator and is the only way to turn one into an [`Amendment`].
///
/// # Examples
///
/// ```
/// use amendment_core::{AmendmentDraft, AmendmentType, ValidationError};
///
/// let amendment = AmendmentDraft::new("France", "4", AmendmentType::Add)
///     .with_text("promote renewable energy")
///     .build()
///     .unwrap();
/// assert_eq!(amendment.submitter_delegate(), "France");
///
/// let err = AmendmentDraft::new("France", "4", AmendmentType::Strike)
///     .with_text("should not be here")
///     .build()
///     .unwrap_err();
/// assert_eq!(err, ValidationError::StrikeWithText);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AmendmentDraft {
    /// Identifier to keep; a fresh UUID is generated when absent.
    pub id: Option<String>,
    /// ISO-8601 creation time to keep; "now" is used when absent.
    pub created_at: Option<String>,
    pub submitter_delegate: String,
    pub resolution_main_submitter: Option<String>,
    pub resolution_topic: Option<String>,
    pub clause: String,
    pub sub_clause: Option<String>,
    pub sub_sub_clause: Option<String>,
    pub amendment_type: AmendmentType,
    pub text: Option<String>,
    pub reason: Option<String>,
    /// Source text retained for audit and display.
    pub context: String,
    pub friendly: bool,
    pub address_resolution: Option<ResolutionLink>,
    pub address_node: Option<NodeAddress>,
}

impl AmendmentDraft {
    pub fn new(
        submitter_delegate: impl Into<String>,
        clause: impl Into<String>,
        amendment_type: AmendmentType,
    ) -> Self {
        Self {
            submitter_delegate: submitter_delegate.into(),
            clause: clause.into(),
            amendment_type,
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Sets the resolution the delegate says this amendment targets.
    pub fn with_resolution(mut self, topic: impl Into<String>, main_submitter: impl Into<String>) -> Self {
        self.resolution_topic = Some(topic.into());
        self.resolution_main_submitter = Some(main_submitter.into());
        self
    }

    /// Replaces clause, sub-clause and sub-sub-clause with `path`.
    pub fn with_path(mut self, path: ClausePath) -> Self {
        self.clause = path.clause;
        self.sub_clause = path.sub_clause;
        self.sub_sub_clause = path.sub_sub_clause;
        self
    }

    /// Validates the draft and produces an [`Amendment`].
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant; see [`ValidationError`].
    pub fn build(self) -> Result<Amendment, ValidationError> {
        validate_amendment(&self)?;
        Ok(Amendment {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            created_at: self.created_at.unwrap_or_else(|| Utc::now().to_rfc3339()),
            submitter_delegate: self.submitter_delegate,
            resolution_main_submitter: self.resolution_main_submitter,
            resolution_topic: self.resolution_topic,
            clause: self.clause,
            sub_clause: self.sub_clause,
            sub_sub_clause: self.sub_sub_clause,
            amendment_type: self.amendment_type,
            text: self.text,
            reason: self.reason,
            context: self.context,
            friendly: self.friendly,
            address_resolution: self.address_resolution,
            address_node: self.address_node,
        })
    }
}

/// A validated proposal to add, change or delete text at a clause path.
///
/// Fields are private; every mutation that could break an invariant goes
/// through a checked setter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AmendmentRecord")]
pub struct Amendment {
    id: String,
    created_at: String,
    submitter_delegate: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution_main_submitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution_topic: Option<String>,
    clause: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub_clause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub_sub_clause: Option<String>,
    amendment_type: AmendmentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    context: String,
    friendly: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    address_resolution: Option<ResolutionLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address_node: Option<NodeAddress>,
}

impl TryFrom<AmendmentRecord> for Amendment {
    type Error = RecordError;

    fn try_from(record: AmendmentRecord) -> Result<Self, Self::Error> {
        record.into_amendment()
    }
}

impl Amendment {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    pub fn submitter_delegate(&self) -> &str {
        &self.submitter_delegate
    }

    pub fn resolution_main_submitter(&self) -> Option<&str> {
        self.resolution_main_submitter.as_deref()
    }

    pub fn resolution_topic(&self) -> Option<&str> {
        self.resolution_topic.as_deref()
    }

    pub fn clause(&self) -> &str {
        &self.clause
    }

    pub fn sub_clause(&self) -> Option<&str> {
        self.sub_clause.as_deref()
    }

    pub fn sub_sub_clause(&self) -> Option<&str> {
        self.sub_sub_clause.as_deref()
    }

    pub fn clause_path(&self) -> ClausePath {
        ClausePath {
            clause: self.clause.clone(),
            sub_clause: self.sub_clause.clone(),
            sub_sub_clause: self.sub_sub_clause.clone(),
        }
    }

    pub fn amendment_type(&self) -> AmendmentType {
        self.amendment_type
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn is_friendly(&self) -> bool {
        self.friendly
    }

    pub fn address_resolution(&self) -> Option<&ResolutionLink> {
        self.address_resolution.as_ref()
    }

    pub fn address_node(&self) -> Option<&NodeAddress> {
        self.address_node.as_ref()
    }

    pub fn set_friendly(&mut self, friendly: bool) {
        self.friendly = friendly;
    }

    pub fn toggle_friendly(&mut self) {
        self.friendly = !self.friendly;
    }

    /// Replaces type and text together.
    ///
    /// # Errors
    ///
    /// Leaves the amendment untouched and returns the violation when the
    /// new pair breaks an invariant (e.g. STRIKE with text).
    pub fn set_payload(
        &mut self,
        amendment_type: AmendmentType,
        text: Option<String>,
    ) -> Result<(), ValidationError> {
        check_invariants(
            amendment_type,
            text.as_deref(),
            &self.submitter_delegate,
            &self.clause,
        )?;
        self.amendment_type = amendment_type;
        self.text = text;
        Ok(())
    }

    /// Links (or unlinks) the resolution this amendment addresses. The
    /// resolved node is cleared since it belonged to the previous link.
    pub fn link_resolution(&mut self, link: Option<ResolutionLink>) {
        if self.address_resolution != link {
            self.address_node = None;
        }
        self.address_resolution = link;
    }

    /// Resolves the clause path inside `resolution` and stores the result in
    /// `address_node`. Returns the node when the path exists.
    pub fn resolve_node(&mut self, resolution: &Resolution) -> Option<NodeAddress> {
        let node = resolution.locate(&self.clause_path());
        self.address_node = node;
        node
    }

    /// Converts back into an editable draft, keeping id and timestamp.
    pub fn into_draft(self) -> AmendmentDraft {
        AmendmentDraft {
            id: Some(self.id),
            created_at: Some(self.created_at),
            submitter_delegate: self.submitter_delegate,
            resolution_main_submitter: self.resolution_main_submitter,
            resolution_topic: self.resolution_topic,
            clause: self.clause,
            sub_clause: self.sub_clause,
            sub_sub_clause: self.sub_sub_clause,
            amendment_type: self.amendment_type,
            text: self.text,
            reason: self.reason,
            context: self.context,
            friendly: self.friendly,
            address_resolution: self.address_resolution,
            address_node: self.address_node,
        }
    }
}

fn preview(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let head: String = text.chars().take(limit).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

impl fmt::Display for Amendment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short_id: String = self.id.chars().take(8).collect();
        writeln!(f, "Amendment {short_id}...")?;
        writeln!(f, "Submitted by: {}", self.submitter_delegate)?;

        let mut resolution_info = Vec::new();
        if let Some(topic) = self.resolution_topic.as_deref().filter(|t| !t.is_empty()) {
            resolution_info.push(format!("Topic: {topic}"));
        }
        if let Some(main) = self.resolution_main_submitter.as_deref().filter(|m| !m.is_empty()) {
            resolution_info.push(format!("Main submitter: {main}"));
        }
        if !resolution_info.is_empty() {
            writeln!(f, "Resolution ({})", resolution_info.join(", "))?;
        }

        writeln!(f, "Location: Clause {}", self.clause_path())?;
        writeln!(f, "Type: {}", self.amendment_type)?;
        match (self.amendment_type, self.text.as_deref()) {
            (AmendmentType::Strike, _) => writeln!(f, "Action: Strike")?,
            (_, Some(text)) => writeln!(f, "Text: {}", preview(text, 100))?,
            (_, None) => {}
        }
        if let Some(reason) = &self.reason {
            writeln!(f, "Reason: {}", preview(reason, 80))?;
        }
        if self.friendly {
            writeln!(f, "(Friendly amendment)")?;
        }
        write!(f, "Created: {}", self.created_at)
    }
}
