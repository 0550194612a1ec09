//! Amendment JSON record shape.
//!
//! [`AmendmentRecord`] mirrors the wire format shared by persisted sessions
//! and AI extraction responses: field names as on [`Amendment`], every field
//! optional, scalar values accepted as strings. Converting a record into an
//! amendment is the single JSON loading path.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::resolution::NodeAddress;
use crate::{Amendment, AmendmentDraft, AmendmentType, ResolutionLink, ValidationError};

/// Fields that must be present and non-blank for a record to describe an
/// amendment at all.
pub const REQUIRED_FIELDS: [&str; 2] = ["submitter_delegate", "clause"];

/// Why a record could not become an [`Amendment`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// A required field is absent or blank.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    /// `amendment_type` names no known variant.
    #[error("unknown amendment type: {0}")]
    UnknownAmendmentType(String),
    /// The record is complete but violates an amendment invariant.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Loosely-typed amendment as found in JSON documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmendmentRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub created_at: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub submitter_delegate: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub resolution_main_submitter: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub resolution_topic: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub clause: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub sub_clause: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub sub_sub_clause: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub amendment_type: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub text: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub reason: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub context: Option<String>,
    pub friendly: bool,
    pub address_resolution: Option<ResolutionLink>,
    pub address_node: Option<NodeAddress>,
}

impl AmendmentRecord {
    /// Returns the first required field that is absent or blank.
    pub fn missing_required(&self) -> Option<&'static str> {
        let is_blank = |value: &Option<String>| value.as_deref().is_none_or(|v| v.trim().is_empty());
        if is_blank(&self.submitter_delegate) {
            Some(REQUIRED_FIELDS[0])
        } else if is_blank(&self.clause) {
            Some(REQUIRED_FIELDS[1])
        } else {
            None
        }
    }

    /// Converts the record into an unvalidated draft.
    ///
    /// A missing `amendment_type` defaults to AMEND. Blank optional strings
    /// are treated as absent; submitter and clause are trimmed.
    ///
    /// # Errors
    ///
    /// [`RecordError::MissingField`] or [`RecordError::UnknownAmendmentType`].
    pub fn into_draft(self) -> Result<AmendmentDraft, RecordError> {
        if let Some(field) = self.missing_required() {
            return Err(RecordError::MissingField(field));
        }

        let amendment_type = match self.amendment_type.as_deref().map(str::trim) {
            None | Some("") => AmendmentType::Amend,
            Some(raw) => raw
                .parse::<AmendmentType>()
                .map_err(|err| RecordError::UnknownAmendmentType(err.0))?,
        };

        Ok(AmendmentDraft {
            id: non_blank(self.id),
            created_at: non_blank(self.created_at),
            submitter_delegate: self.submitter_delegate.unwrap_or_default().trim().to_string(),
            resolution_main_submitter: non_blank(self.resolution_main_submitter),
            resolution_topic: self.resolution_topic,
            clause: self.clause.unwrap_or_default().trim().to_string(),
            sub_clause: non_blank(self.sub_clause).map(|s| s.trim().to_string()),
            sub_sub_clause: non_blank(self.sub_sub_clause).map(|s| s.trim().to_string()),
            amendment_type,
            text: self.text,
            reason: non_blank(self.reason),
            context: self.context.unwrap_or_default(),
            friendly: self.friendly,
            address_resolution: self.address_resolution,
            address_node: self.address_node,
        })
    }

    /// Converts and validates the record.
    pub fn into_amendment(self) -> Result<Amendment, RecordError> {
        Ok(self.into_draft()?.build()?)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected a string value, found {other}"
        ))),
    }
}
