//! Amendment validation.
//!
//! Every construction path (rule-based extraction, AI extraction, session
//! load) ends in [`validate_amendment`], and every checked mutation reuses
//! the same invariant check, so there is one definition of validity.
//!
//! # Examples
//!
//! ```
//! use amendment_core::*;
//!
//! let draft = AmendmentDraft::new("Kenya", "3", AmendmentType::Amend)
//!     .with_text("replace with stronger wording");
//! assert!(validate_amendment(&draft).is_ok());
//!
//! // AMEND without text
//! let bad = AmendmentDraft::new("Kenya", "3", AmendmentType::Amend);
//! assert!(matches!(
//!     validate_amendment(&bad),
//!     Err(ValidationError::MissingText { .. })
//! ));
//! ```

use thiserror::Error;

use crate::{AmendmentDraft, AmendmentType};

/// Amendment invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// ADD or AMEND without non-blank text.
    #[error("{amendment_type} amendments require non-empty text")]
    MissingText { amendment_type: AmendmentType },
    /// STRIKE carrying text.
    #[error("STRIKE amendments must not include text")]
    StrikeWithText,
    /// Submitter delegate is empty or whitespace-only.
    #[error("submitter delegate cannot be empty")]
    EmptySubmitter,
    /// Clause is empty or whitespace-only.
    #[error("clause must be specified")]
    EmptyClause,
}

/// Validates a candidate amendment.
///
/// Invariants are checked in a fixed order (text for ADD/AMEND, text for
/// STRIKE, submitter, clause) and the first violation is returned.
pub fn validate_amendment(draft: &AmendmentDraft) -> Result<(), ValidationError> {
    check_invariants(
        draft.amendment_type,
        draft.text.as_deref(),
        &draft.submitter_delegate,
        &draft.clause,
    )
}

pub(crate) fn check_invariants(
    amendment_type: AmendmentType,
    text: Option<&str>,
    submitter_delegate: &str,
    clause: &str,
) -> Result<(), ValidationError> {
    match amendment_type {
        AmendmentType::Add | AmendmentType::Amend => {
            if text.is_none_or(|t| t.trim().is_empty()) {
                return Err(ValidationError::MissingText { amendment_type });
            }
        }
        AmendmentType::Strike => {
            if text.is_some() {
                return Err(ValidationError::StrikeWithText);
            }
        }
    }

    if submitter_delegate.trim().is_empty() {
        return Err(ValidationError::EmptySubmitter);
    }

    if clause.trim().is_empty() {
        return Err(ValidationError::EmptyClause);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_blank_text_for_add_and_amend() {
        for kind in [AmendmentType::Add, AmendmentType::Amend] {
            for text in [None, Some(""), Some("   \n")] {
                let mut draft = AmendmentDraft::new("Chile", "1", kind);
                draft.text = text.map(String::from);
                assert_eq!(
                    validate_amendment(&draft),
                    Err(ValidationError::MissingText {
                        amendment_type: kind
                    })
                );
            }
        }
    }

    #[test]
    fn test_validate_rejects_any_text_for_strike() {
        for text in ["", " ", "remove this"] {
            let draft = AmendmentDraft::new("Chile", "1", AmendmentType::Strike).with_text(text);
            assert_eq!(
                validate_amendment(&draft),
                Err(ValidationError::StrikeWithText)
            );
        }
        let draft = AmendmentDraft::new("Chile", "1", AmendmentType::Strike);
        assert_eq!(validate_amendment(&draft), Ok(()));
    }

    #[test]
    fn test_validate_rejects_blank_submitter_then_clause() {
        let draft = AmendmentDraft::new("  ", "", AmendmentType::Strike);
        assert_eq!(
            validate_amendment(&draft),
            Err(ValidationError::EmptySubmitter)
        );

        let draft = AmendmentDraft::new("Chile", " ", AmendmentType::Strike);
        assert_eq!(validate_amendment(&draft), Err(ValidationError::EmptyClause));
    }

    #[test]
    fn test_validate_reports_text_violation_first() {
        let draft = AmendmentDraft::new("", "", AmendmentType::Add);
        assert_eq!(
            validate_amendment(&draft),
            Err(ValidationError::MissingText {
                amendment_type: AmendmentType::Add
            })
        );
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(
            ValidationError::MissingText {
                amendment_type: AmendmentType::Amend
            }
            .to_string(),
            "AMEND amendments require non-empty text"
        );
        assert_eq!(
            ValidationError::StrikeWithText.to_string(),
            "STRIKE amendments must not include text"
        );
    }
}
