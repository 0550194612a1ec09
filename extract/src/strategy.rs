//! Extraction strategies.
//!
//! A strategy turns one (normalized) email into an [`Extraction`]. The
//! rule-based strategy lives here; the AI-backed one is in [`crate::ai`].
//! Both hand their candidate to the same validator.

use std::sync::Arc;

use amendment_core::{Amendment, Email, ValidationError};

use crate::error::{ExtractionMiss, StrategyError};
use crate::events::EventSink;
use crate::fields::FieldExtractor;

/// Outcome of one extraction attempt that did not fail outright.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Amendment(Amendment),
    Miss(ExtractionMiss),
}

impl Extraction {
    pub fn into_amendment(self) -> Option<Amendment> {
        match self {
            Self::Amendment(amendment) => Some(amendment),
            Self::Miss(_) => None,
        }
    }

    pub fn amendment(&self) -> Option<&Amendment> {
        match self {
            Self::Amendment(amendment) => Some(amendment),
            Self::Miss(_) => None,
        }
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss(_))
    }
}

impl From<ExtractionMiss> for Extraction {
    fn from(miss: ExtractionMiss) -> Self {
        Self::Miss(miss)
    }
}

/// `(Email) -> Amendment | ExtractionMiss` contract shared by all strategies.
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Extracts an amendment from an email whose body is already normalized.
    fn extract(&self, email: &Email) -> Result<Extraction, StrategyError>;
}

/// Label-pattern extraction followed by validation.
#[derive(Debug, Clone)]
pub struct RuleBasedStrategy {
    fields: FieldExtractor,
}

impl RuleBasedStrategy {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            fields: FieldExtractor::new(sink),
        }
    }

    pub fn field_extractor(&self) -> &FieldExtractor {
        &self.fields
    }

    /// Extracts and validates; never contacts a provider.
    pub fn run(&self, email: &Email) -> Result<Extraction, ValidationError> {
        match self.fields.draft(&email.body) {
            Ok(draft) => Ok(Extraction::Amendment(draft.build()?)),
            Err(miss) => Ok(Extraction::Miss(miss)),
        }
    }
}

impl ExtractionStrategy for RuleBasedStrategy {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    fn extract(&self, email: &Email) -> Result<Extraction, StrategyError> {
        Ok(self.run(email)?)
    }
}
